//! Database layer — migrations, CRUD reads/writes, and aggregate queries.
//!
//! Reads that the ledger and lifecycle modules perform mid-transaction take
//! a generic executor so the same query runs against a pool or an open
//! transaction.

use chrono::Utc;
use serde::Serialize;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Executor, QueryBuilder, Sqlite, SqlitePool};
use tracing::info;
use uuid::Uuid;

use crate::commission::DEFAULT_RATE_BPS;
use crate::errors::{LedgerError, Result};
use crate::models::{
    Freelancer, FreelancerUpdate, NewFreelancer, NewProject, Payment, Project, ProjectStatus,
    ProjectUpdate,
};

/// Establish a SQLite connection pool and run pending migrations.
pub async fn init_pool(database_url: &str) -> Result<SqlitePool> {
    let url = if database_url.starts_with("sqlite:") {
        database_url.to_string()
    } else {
        format!("sqlite:{database_url}")
    };

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database migrations applied successfully");
    Ok(pool)
}

// ─────────────────────────────────────────────────────────
// Freelancers
// ─────────────────────────────────────────────────────────

const FREELANCER_COLUMNS: &str = "id, user_id, business_name, subdomain, commission_rate_bps, \
     is_verified, status, total_earnings_minor, total_projects, created_at, updated_at";

pub async fn fetch_freelancer<'e, E: Executor<'e, Database = Sqlite>>(
    exec: E,
    id: &str,
) -> Result<Option<Freelancer>> {
    let row = sqlx::query_as::<_, Freelancer>(&format!(
        "SELECT {FREELANCER_COLUMNS} FROM freelancers WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(exec)
    .await?;
    Ok(row)
}

pub async fn list_freelancers(pool: &SqlitePool) -> Result<Vec<Freelancer>> {
    let rows = sqlx::query_as::<_, Freelancer>(&format!(
        "SELECT {FREELANCER_COLUMNS} FROM freelancers ORDER BY created_at DESC"
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn insert_freelancer(pool: &SqlitePool, new: &NewFreelancer) -> Result<Freelancer> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO freelancers
             (id, user_id, business_name, subdomain, commission_rate_bps,
              is_verified, status, total_earnings_minor, total_projects, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 0, 'active', 0, 0, ?6, ?6)",
    )
    .bind(&id)
    .bind(&new.user_id)
    .bind(&new.business_name)
    .bind(&new.subdomain)
    .bind(DEFAULT_RATE_BPS)
    .bind(now)
    .execute(pool)
    .await?;

    fetch_freelancer(pool, &id)
        .await?
        .ok_or(LedgerError::NotFound("freelancer"))
}

pub async fn update_freelancer(
    pool: &SqlitePool,
    id: &str,
    updates: &FreelancerUpdate,
) -> Result<Freelancer> {
    let updated = sqlx::query(
        "UPDATE freelancers SET
             business_name = COALESCE(?2, business_name),
             subdomain     = COALESCE(?3, subdomain),
             updated_at    = ?4
         WHERE id = ?1",
    )
    .bind(id)
    .bind(&updates.business_name)
    .bind(&updates.subdomain)
    .bind(Utc::now())
    .execute(pool)
    .await?
    .rows_affected();

    if updated == 0 {
        return Err(LedgerError::NotFound("freelancer"));
    }
    fetch_freelancer(pool, id)
        .await?
        .ok_or(LedgerError::NotFound("freelancer"))
}

// ─────────────────────────────────────────────────────────
// Projects
// ─────────────────────────────────────────────────────────

const PROJECT_COLUMNS: &str = "id, freelancer_id, client_email, client_name, title, description, \
     category, price_minor, status, deadline, created_at, updated_at";

pub async fn fetch_project<'e, E: Executor<'e, Database = Sqlite>>(
    exec: E,
    id: &str,
) -> Result<Option<Project>> {
    let row = sqlx::query_as::<_, Project>(&format!(
        "SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(exec)
    .await?;
    Ok(row)
}

pub async fn insert_project(pool: &SqlitePool, new: &NewProject) -> Result<Project> {
    if new.price_minor <= 0 {
        return Err(LedgerError::InvalidAmount(new.price_minor));
    }
    if fetch_freelancer(pool, &new.freelancer_id).await?.is_none() {
        return Err(LedgerError::NotFound("freelancer"));
    }

    let id = Uuid::new_v4().to_string();
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO projects
             (id, freelancer_id, client_email, client_name, title, description,
              category, price_minor, status, deadline, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'draft', ?9, ?10, ?10)",
    )
    .bind(&id)
    .bind(&new.freelancer_id)
    .bind(&new.client_email)
    .bind(&new.client_name)
    .bind(&new.title)
    .bind(&new.description)
    .bind(&new.category)
    .bind(new.price_minor)
    .bind(&new.deadline)
    .bind(now)
    .execute(pool)
    .await?;

    fetch_project(pool, &id)
        .await?
        .ok_or(LedgerError::NotFound("project"))
}

/// Update descriptive fields.  Rejected with `ProjectLocked` once the
/// project has reached `paid` (or any later state).
///
/// The editability check and the write run in one transaction, and the
/// UPDATE swaps against the status that was read, so an edit can never land
/// on a project that a concurrent payment completion just moved to `paid`.
pub async fn update_project(
    pool: &SqlitePool,
    id: &str,
    updates: &ProjectUpdate,
) -> Result<Project> {
    let mut tx = pool.begin().await?;

    let project = fetch_project(&mut *tx, id)
        .await?
        .ok_or(LedgerError::NotFound("project"))?;
    if !project.status.is_editable() {
        return Err(LedgerError::ProjectLocked(project.status));
    }

    let updated = sqlx::query(
        "UPDATE projects SET
             client_email = COALESCE(?2, client_email),
             client_name  = COALESCE(?3, client_name),
             title        = COALESCE(?4, title),
             description  = COALESCE(?5, description),
             category     = COALESCE(?6, category),
             deadline     = COALESCE(?7, deadline),
             updated_at   = ?8
         WHERE id = ?1 AND status = ?9",
    )
    .bind(id)
    .bind(&updates.client_email)
    .bind(&updates.client_name)
    .bind(&updates.title)
    .bind(&updates.description)
    .bind(&updates.category)
    .bind(&updates.deadline)
    .bind(Utc::now())
    .bind(project.status)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    // A concurrent transition moved the project between our read and the swap.
    if updated == 0 {
        return Err(LedgerError::Conflict("project"));
    }

    let project = fetch_project(&mut *tx, id)
        .await?
        .ok_or(LedgerError::NotFound("project"))?;
    tx.commit().await?;
    Ok(project)
}

/// Filters accepted by `GET /projects`.
#[derive(Debug, Default, serde::Deserialize)]
pub struct ProjectFilter {
    /// Substring match against title and description.
    pub q: Option<String>,
    pub status: Option<ProjectStatus>,
    pub category: Option<String>,
    pub freelancer_id: Option<String>,
}

pub async fn search_projects(pool: &SqlitePool, filter: &ProjectFilter) -> Result<Vec<Project>> {
    let mut qb = QueryBuilder::new(format!(
        "SELECT {PROJECT_COLUMNS} FROM projects WHERE 1 = 1"
    ));

    if let Some(q) = filter.q.as_deref().filter(|q| !q.is_empty()) {
        let pattern = format!("%{q}%");
        qb.push(" AND (title LIKE ")
            .push_bind(pattern.clone())
            .push(" OR description LIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status);
    }
    if let Some(category) = &filter.category {
        qb.push(" AND category = ").push_bind(category);
    }
    if let Some(freelancer_id) = &filter.freelancer_id {
        qb.push(" AND freelancer_id = ").push_bind(freelancer_id);
    }
    qb.push(" ORDER BY created_at DESC");

    let rows = qb.build_query_as::<Project>().fetch_all(pool).await?;
    Ok(rows)
}

// ─────────────────────────────────────────────────────────
// Payments
// ─────────────────────────────────────────────────────────

const PAYMENT_COLUMNS: &str = "id, project_id, freelancer_id, amount_minor, commission_minor, \
     freelancer_minor, status, gateway_transaction_id, failure_reason, created_at, processed_at";

pub async fn fetch_payment<'e, E: Executor<'e, Database = Sqlite>>(
    exec: E,
    id: &str,
) -> Result<Option<Payment>> {
    let row = sqlx::query_as::<_, Payment>(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(exec)
    .await?;
    Ok(row)
}

pub async fn list_payments(pool: &SqlitePool) -> Result<Vec<Payment>> {
    let rows = sqlx::query_as::<_, Payment>(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments ORDER BY created_at DESC"
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

// ─────────────────────────────────────────────────────────
// Aggregates
// ─────────────────────────────────────────────────────────

/// Platform-wide totals over completed payments plus entity counts.
#[derive(Debug, Serialize)]
pub struct PlatformAnalytics {
    pub total_revenue_minor: i64,
    pub total_commissions_minor: i64,
    pub freelancer_count: i64,
    pub project_count: i64,
    pub active_projects: i64,
    pub average_project_value_minor: i64,
}

pub async fn platform_analytics(pool: &SqlitePool) -> Result<PlatformAnalytics> {
    let (total_revenue_minor, total_commissions_minor): (i64, i64) = sqlx::query_as(
        "SELECT COALESCE(SUM(amount_minor), 0), COALESCE(SUM(commission_minor), 0)
         FROM payments WHERE status = 'completed'",
    )
    .fetch_one(pool)
    .await?;

    let (freelancer_count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM freelancers")
        .fetch_one(pool)
        .await?;
    let (project_count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM projects")
        .fetch_one(pool)
        .await?;
    let (active_projects,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM projects WHERE status IN ('preview_sent', 'approved')",
    )
    .fetch_one(pool)
    .await?;

    Ok(PlatformAnalytics {
        total_revenue_minor,
        total_commissions_minor,
        freelancer_count,
        project_count,
        active_projects,
        average_project_value_minor: if project_count > 0 {
            total_revenue_minor / project_count
        } else {
            0
        },
    })
}

/// Per-freelancer aggregates, recomputed from the payment and project
/// tables (the source of truth the incremental counters must agree with).
#[derive(Debug, Serialize)]
pub struct FreelancerStats {
    pub total_projects: i64,
    pub completed_projects: i64,
    pub active_projects: i64,
    pub total_earnings_minor: i64,
    pub total_commissions_minor: i64,
}

pub async fn freelancer_stats(pool: &SqlitePool, freelancer_id: &str) -> Result<FreelancerStats> {
    if fetch_freelancer(pool, freelancer_id).await?.is_none() {
        return Err(LedgerError::NotFound("freelancer"));
    }

    let (total_projects, completed_projects, active_projects): (i64, i64, i64) = sqlx::query_as(
        "SELECT COUNT(*),
                COALESCE(SUM(status = 'delivered'), 0),
                COALESCE(SUM(status IN ('preview_sent', 'approved')), 0)
         FROM projects WHERE freelancer_id = ?1",
    )
    .bind(freelancer_id)
    .fetch_one(pool)
    .await?;

    let (total_earnings_minor, total_commissions_minor): (i64, i64) = sqlx::query_as(
        "SELECT COALESCE(SUM(freelancer_minor), 0), COALESCE(SUM(commission_minor), 0)
         FROM payments WHERE freelancer_id = ?1 AND status = 'completed'",
    )
    .bind(freelancer_id)
    .fetch_one(pool)
    .await?;

    Ok(FreelancerStats {
        total_projects,
        completed_projects,
        active_projects,
        total_earnings_minor,
        total_commissions_minor,
    })
}
