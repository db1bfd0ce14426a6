//! Freelancer tier engine — manual promotion and suspension.
//!
//! Promotion to SuperFreelancer is an explicit admin action; there is no
//! automatic threshold evaluation.  Only this module mutates a freelancer's
//! commission rate or verification flag.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;

use crate::commission::SUPER_RATE_BPS;
use crate::db;
use crate::errors::{LedgerError, Result};
use crate::models::Freelancer;

/// Promote to SuperFreelancer: verified badge plus the reduced rate.
///
/// Idempotent — promoting an already-promoted freelancer sets the same
/// values again and is not an error.
pub async fn promote(pool: &SqlitePool, freelancer_id: &str) -> Result<Freelancer> {
    let updated = sqlx::query(
        "UPDATE freelancers
         SET is_verified = 1, commission_rate_bps = ?2, updated_at = ?3
         WHERE id = ?1",
    )
    .bind(freelancer_id)
    .bind(SUPER_RATE_BPS)
    .bind(Utc::now())
    .execute(pool)
    .await?
    .rows_affected();

    if updated == 0 {
        return Err(LedgerError::NotFound("freelancer"));
    }

    info!("freelancer {freelancer_id} promoted to SuperFreelancer");
    db::fetch_freelancer(pool, freelancer_id)
        .await?
        .ok_or(LedgerError::NotFound("freelancer"))
}

/// Suspend the account.  Rate and verification are untouched; existing
/// projects keep their state, but new payment creation for this owner is
/// rejected by the ledger.
pub async fn suspend(pool: &SqlitePool, freelancer_id: &str) -> Result<Freelancer> {
    let updated =
        sqlx::query("UPDATE freelancers SET status = 'suspended', updated_at = ?2 WHERE id = ?1")
            .bind(freelancer_id)
            .bind(Utc::now())
            .execute(pool)
            .await?
            .rows_affected();

    if updated == 0 {
        return Err(LedgerError::NotFound("freelancer"));
    }

    info!("freelancer {freelancer_id} suspended");
    db::fetch_freelancer(pool, freelancer_id)
        .await?
        .ok_or(LedgerError::NotFound("freelancer"))
}
