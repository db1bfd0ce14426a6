//! PayVidi Commission & Project Ledger — entry point.
//!
//! Exposes the project lifecycle, payment ledger, and freelancer tier
//! operations as an Axum REST API backed by SQLite.  The payment gateway is
//! an external collaborator: it calls back into `/payments/:id/complete`
//! and `/payments/:id/fail`; this service never calls out.

mod api;
mod commission;
mod config;
mod db;
mod errors;
mod ledger;
mod lifecycle;
mod models;
mod tier;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging (RUST_LOG controls verbosity).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Load optional .env file (ignored if missing).
    let _ = dotenvy::dotenv();

    // Load config from environment.
    let config = Config::from_env().map_err(|e| anyhow::anyhow!("{e}"))?;

    // Set up the SQLite connection pool and run migrations.
    let pool = db::init_pool(&config.database_url).await?;

    let state = Arc::new(api::ApiState { pool });

    let app = Router::new()
        .route("/health", get(api::health))
        .route(
            "/freelancers",
            get(api::list_freelancers).post(api::create_freelancer),
        )
        .route(
            "/freelancers/:id",
            get(api::get_freelancer).patch(api::patch_freelancer),
        )
        .route("/freelancers/:id/promote", post(api::promote_freelancer))
        .route("/freelancers/:id/suspend", post(api::suspend_freelancer))
        .route("/freelancers/:id/stats", get(api::get_freelancer_stats))
        .route("/projects", get(api::list_projects).post(api::create_project))
        .route(
            "/projects/:id",
            get(api::get_project).patch(api::patch_project),
        )
        .route("/projects/:id/events", post(api::apply_project_event))
        .route("/payments", get(api::list_payments).post(api::create_payment))
        .route("/payments/:id", get(api::get_payment))
        .route("/payments/:id/processing", post(api::payment_processing))
        .route("/payments/:id/complete", post(api::payment_complete))
        .route("/payments/:id/fail", post(api::payment_fail))
        .route("/payments/:id/refund", post(api::payment_refund))
        .route("/analytics/platform", get(api::get_platform_analytics))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.api_port);
    info!("API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
