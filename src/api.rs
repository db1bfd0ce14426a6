//! Axum REST API handlers.
//!
//! Domain errors map to specific status codes (400/404/409) through
//! [`crate::errors::LedgerError`]'s `IntoResponse`; only store failures
//! surface as 500.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::db::{self, FreelancerStats, PlatformAnalytics, ProjectFilter};
use crate::errors::Result;
use crate::ledger;
use crate::lifecycle::{self, LifecycleEvent};
use crate::models::{
    Freelancer, FreelancerUpdate, NewFreelancer, NewProject, Payment, Project, ProjectUpdate,
};
use crate::tier;

#[derive(Clone)]
pub struct ApiState {
    pub pool: SqlitePool,
}

// ─────────────────────────────────────────────────────────
// Request / response shapes
// ─────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct FreelancersResponse {
    pub count: usize,
    pub freelancers: Vec<Freelancer>,
}

#[derive(Serialize)]
pub struct ProjectsResponse {
    pub count: usize,
    pub projects: Vec<Project>,
}

#[derive(Serialize)]
pub struct PaymentsResponse {
    pub count: usize,
    pub payments: Vec<Payment>,
}

#[derive(Deserialize)]
pub struct ProjectEventRequest {
    pub event: LifecycleEvent,
}

#[derive(Deserialize)]
pub struct CreatePaymentRequest {
    pub project_id: String,
}

#[derive(Deserialize)]
pub struct CompletePaymentRequest {
    pub gateway_transaction_id: String,
}

#[derive(Deserialize)]
pub struct FailPaymentRequest {
    pub reason: String,
}

// ─────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────

/// `GET /health`
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `GET /freelancers`
pub async fn list_freelancers(State(state): State<Arc<ApiState>>) -> Result<Json<FreelancersResponse>> {
    let freelancers = db::list_freelancers(&state.pool).await?;
    Ok(Json(FreelancersResponse {
        count: freelancers.len(),
        freelancers,
    }))
}

/// `GET /freelancers/:id`
pub async fn get_freelancer(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> Result<Json<Freelancer>> {
    let freelancer = db::fetch_freelancer(&state.pool, &id)
        .await?
        .ok_or(crate::errors::LedgerError::NotFound("freelancer"))?;
    Ok(Json(freelancer))
}

/// `POST /freelancers`
pub async fn create_freelancer(
    State(state): State<Arc<ApiState>>,
    Json(new): Json<NewFreelancer>,
) -> Result<Json<Freelancer>> {
    Ok(Json(db::insert_freelancer(&state.pool, &new).await?))
}

/// `PATCH /freelancers/:id`
pub async fn patch_freelancer(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
    Json(updates): Json<FreelancerUpdate>,
) -> Result<Json<Freelancer>> {
    Ok(Json(db::update_freelancer(&state.pool, &id, &updates).await?))
}

/// `POST /freelancers/:id/promote`
pub async fn promote_freelancer(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> Result<Json<Freelancer>> {
    Ok(Json(tier::promote(&state.pool, &id).await?))
}

/// `POST /freelancers/:id/suspend`
pub async fn suspend_freelancer(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> Result<Json<Freelancer>> {
    Ok(Json(tier::suspend(&state.pool, &id).await?))
}

/// `GET /freelancers/:id/stats`
pub async fn get_freelancer_stats(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> Result<Json<FreelancerStats>> {
    Ok(Json(db::freelancer_stats(&state.pool, &id).await?))
}

/// `GET /projects?q=&status=&category=&freelancer_id=`
pub async fn list_projects(
    State(state): State<Arc<ApiState>>,
    Query(filter): Query<ProjectFilter>,
) -> Result<Json<ProjectsResponse>> {
    let projects = db::search_projects(&state.pool, &filter).await?;
    Ok(Json(ProjectsResponse {
        count: projects.len(),
        projects,
    }))
}

/// `POST /projects` — new projects always start in `draft`.
pub async fn create_project(
    State(state): State<Arc<ApiState>>,
    Json(new): Json<NewProject>,
) -> Result<Json<Project>> {
    Ok(Json(db::insert_project(&state.pool, &new).await?))
}

/// `GET /projects/:id`
pub async fn get_project(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> Result<Json<Project>> {
    let project = db::fetch_project(&state.pool, &id)
        .await?
        .ok_or(crate::errors::LedgerError::NotFound("project"))?;
    Ok(Json(project))
}

/// `PATCH /projects/:id`
pub async fn patch_project(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
    Json(updates): Json<ProjectUpdate>,
) -> Result<Json<Project>> {
    Ok(Json(db::update_project(&state.pool, &id, &updates).await?))
}

/// `POST /projects/:id/events` — apply a lifecycle event.
pub async fn apply_project_event(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
    Json(req): Json<ProjectEventRequest>,
) -> Result<Json<Project>> {
    Ok(Json(
        lifecycle::transition_project(&state.pool, &id, req.event).await?,
    ))
}

/// `GET /payments`
pub async fn list_payments(State(state): State<Arc<ApiState>>) -> Result<Json<PaymentsResponse>> {
    let payments = db::list_payments(&state.pool).await?;
    Ok(Json(PaymentsResponse {
        count: payments.len(),
        payments,
    }))
}

/// `GET /payments/:id`
pub async fn get_payment(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> Result<Json<Payment>> {
    let payment = db::fetch_payment(&state.pool, &id)
        .await?
        .ok_or(crate::errors::LedgerError::NotFound("payment"))?;
    Ok(Json(payment))
}

/// `POST /payments`
pub async fn create_payment(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<CreatePaymentRequest>,
) -> Result<Json<Payment>> {
    Ok(Json(ledger::create_payment(&state.pool, &req.project_id).await?))
}

/// `POST /payments/:id/processing`
pub async fn payment_processing(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> Result<Json<Payment>> {
    Ok(Json(ledger::mark_processing(&state.pool, &id).await?))
}

/// `POST /payments/:id/complete` — gateway success callback.
pub async fn payment_complete(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
    Json(req): Json<CompletePaymentRequest>,
) -> Result<Json<Payment>> {
    Ok(Json(
        ledger::mark_completed(&state.pool, &id, &req.gateway_transaction_id).await?,
    ))
}

/// `POST /payments/:id/fail` — gateway failure callback.
pub async fn payment_fail(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
    Json(req): Json<FailPaymentRequest>,
) -> Result<Json<Payment>> {
    Ok(Json(ledger::mark_failed(&state.pool, &id, &req.reason).await?))
}

/// `POST /payments/:id/refund` — admin action.
pub async fn payment_refund(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> Result<Json<Payment>> {
    Ok(Json(ledger::refund(&state.pool, &id).await?))
}

/// `GET /analytics/platform`
pub async fn get_platform_analytics(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<PlatformAnalytics>> {
    Ok(Json(db::platform_analytics(&state.pool).await?))
}
