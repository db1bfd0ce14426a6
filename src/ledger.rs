//! Payment ledger — the source of truth for financial state.
//!
//! Every operation runs inside one sqlx transaction and re-reads current
//! state before mutating.  Status changes are compare-and-swap updates, so
//! two racing writers cannot both succeed; the loser gets a conflict and
//! the transaction rolls back.  `mark_completed` couples the payment, the
//! project's `approved → paid` transition, and the owner's earnings counter
//! into a single commit — the ledger's core correctness contract.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::commission;
use crate::db;
use crate::errors::{is_lock_contention, LedgerError, Result};
use crate::models::{FreelancerStatus, Payment, PaymentStatus, ProjectStatus};

/// Create a `pending` payment for an approved project.
///
/// The split is computed from the owner's current commission rate and the
/// project price is snapshotted into the payment; later price or rate
/// changes do not touch existing rows.
pub async fn create_payment(pool: &SqlitePool, project_id: &str) -> Result<Payment> {
    let mut tx = pool.begin().await?;

    let project = db::fetch_project(&mut *tx, project_id)
        .await?
        .ok_or(LedgerError::NotFound("project"))?;
    if project.status != ProjectStatus::Approved {
        return Err(LedgerError::ProjectNotApproved(project.status));
    }

    let freelancer = db::fetch_freelancer(&mut *tx, &project.freelancer_id)
        .await?
        .ok_or(LedgerError::NotFound("freelancer"))?;
    if freelancer.status == FreelancerStatus::Suspended {
        return Err(LedgerError::FreelancerSuspended);
    }

    // At most one non-failed payment per project.  The partial unique index
    // on payments(project_id) backs this check for racing writers.
    let existing: Option<(String,)> =
        sqlx::query_as("SELECT id FROM payments WHERE project_id = ?1 AND status != 'failed'")
            .bind(project_id)
            .fetch_optional(&mut *tx)
            .await?;
    if existing.is_some() {
        return Err(LedgerError::DuplicatePayment(project_id.to_string()));
    }

    let split = commission::compute_split(project.price_minor, freelancer.commission_rate_bps)?;

    let id = Uuid::new_v4().to_string();
    let inserted = sqlx::query(
        "INSERT INTO payments
             (id, project_id, freelancer_id, amount_minor, commission_minor,
              freelancer_minor, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'pending', ?7)",
    )
    .bind(&id)
    .bind(project_id)
    .bind(&project.freelancer_id)
    .bind(project.price_minor)
    .bind(split.commission_minor)
    .bind(split.freelancer_minor)
    .bind(Utc::now())
    .execute(&mut *tx)
    .await;

    match inserted {
        Ok(_) => {}
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            return Err(LedgerError::DuplicatePayment(project_id.to_string()));
        }
        // A racing ledger transaction holds the write lock; the invariant is
        // already protected by the unique index, so the loser just retries.
        Err(e) if is_lock_contention(&e) => return Err(LedgerError::Conflict("payment")),
        Err(e) => return Err(e.into()),
    }

    let payment = db::fetch_payment(&mut *tx, &id)
        .await?
        .ok_or(LedgerError::NotFound("payment"))?;
    tx.commit().await?;

    info!(
        "payment {id} created for project {project_id}: {} = {} + {}",
        payment.amount_minor, payment.commission_minor, payment.freelancer_minor
    );
    Ok(payment)
}

/// Gateway accepted the charge: `pending → processing`.
pub async fn mark_processing(pool: &SqlitePool, payment_id: &str) -> Result<Payment> {
    let mut tx = pool.begin().await?;

    let payment = db::fetch_payment(&mut *tx, payment_id)
        .await?
        .ok_or(LedgerError::NotFound("payment"))?;
    if payment.status != PaymentStatus::Pending {
        return Err(LedgerError::InvalidPaymentState(payment.status));
    }

    let updated =
        sqlx::query("UPDATE payments SET status = 'processing' WHERE id = ?1 AND status = 'pending'")
            .bind(payment_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
    if updated == 0 {
        return Err(LedgerError::Conflict("payment"));
    }

    let payment = db::fetch_payment(&mut *tx, payment_id)
        .await?
        .ok_or(LedgerError::NotFound("payment"))?;
    tx.commit().await?;
    Ok(payment)
}

/// Gateway callback: the charge settled.
///
/// Transitions the payment to `completed`, the project `approved → paid`,
/// and adds the freelancer share to the owner's earnings — all in one
/// transaction.  If the project is no longer `approved` (e.g. a cancellation
/// won the race) the whole transaction rolls back and the payment keeps its
/// pre-call state.
pub async fn mark_completed(
    pool: &SqlitePool,
    payment_id: &str,
    gateway_transaction_id: &str,
) -> Result<Payment> {
    let mut tx = pool.begin().await?;

    let payment = db::fetch_payment(&mut *tx, payment_id)
        .await?
        .ok_or(LedgerError::NotFound("payment"))?;
    if payment.status.is_terminal() {
        return Err(LedgerError::InvalidPaymentState(payment.status));
    }

    let now = Utc::now();
    let updated = sqlx::query(
        "UPDATE payments
         SET status = 'completed', gateway_transaction_id = ?2, processed_at = ?3
         WHERE id = ?1 AND status IN ('pending', 'processing')",
    )
    .bind(payment_id)
    .bind(gateway_transaction_id)
    .bind(now)
    .execute(&mut *tx)
    .await?
    .rows_affected();
    if updated == 0 {
        return Err(LedgerError::Conflict("payment"));
    }

    let project_updated = sqlx::query(
        "UPDATE projects SET status = 'paid', updated_at = ?2
         WHERE id = ?1 AND status = 'approved'",
    )
    .bind(&payment.project_id)
    .bind(now)
    .execute(&mut *tx)
    .await?
    .rows_affected();
    if project_updated == 0 {
        // Completion against a project that left `approved` mid-flight is a
        // reportable anomaly; roll everything back and surface the conflict
        // so the external refund workflow can take over.
        warn!(
            "payment {payment_id} completed but project {} is no longer approved; rolled back",
            payment.project_id
        );
        return Err(LedgerError::Conflict("project"));
    }

    sqlx::query(
        "UPDATE freelancers
         SET total_earnings_minor = total_earnings_minor + ?2, updated_at = ?3
         WHERE id = ?1",
    )
    .bind(&payment.freelancer_id)
    .bind(payment.freelancer_minor)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    let payment = db::fetch_payment(&mut *tx, payment_id)
        .await?
        .ok_or(LedgerError::NotFound("payment"))?;
    tx.commit().await?;

    info!("payment {payment_id} completed (gateway tx {gateway_transaction_id})");
    Ok(payment)
}

/// Gateway callback: the charge failed.  The project stays `approved` so a
/// fresh payment attempt may be created.
pub async fn mark_failed(pool: &SqlitePool, payment_id: &str, reason: &str) -> Result<Payment> {
    let mut tx = pool.begin().await?;

    let payment = db::fetch_payment(&mut *tx, payment_id)
        .await?
        .ok_or(LedgerError::NotFound("payment"))?;
    if payment.status.is_terminal() {
        return Err(LedgerError::InvalidPaymentState(payment.status));
    }

    let updated = sqlx::query(
        "UPDATE payments
         SET status = 'failed', failure_reason = ?2, processed_at = ?3
         WHERE id = ?1 AND status IN ('pending', 'processing')",
    )
    .bind(payment_id)
    .bind(reason)
    .bind(Utc::now())
    .execute(&mut *tx)
    .await?
    .rows_affected();
    if updated == 0 {
        return Err(LedgerError::Conflict("payment"));
    }

    let payment = db::fetch_payment(&mut *tx, payment_id)
        .await?
        .ok_or(LedgerError::NotFound("payment"))?;
    tx.commit().await?;

    info!("payment {payment_id} failed: {reason}");
    Ok(payment)
}

/// Admin action: `completed → refunded`.
///
/// A refund is a financial event, not a fulfillment event: the project's
/// `paid`/`delivered` status is deliberately left alone.  The owner's
/// earnings counter is decremented because the payment no longer counts
/// toward the sum over completed payments.
pub async fn refund(pool: &SqlitePool, payment_id: &str) -> Result<Payment> {
    let mut tx = pool.begin().await?;

    let payment = db::fetch_payment(&mut *tx, payment_id)
        .await?
        .ok_or(LedgerError::NotFound("payment"))?;
    if payment.status != PaymentStatus::Completed {
        return Err(LedgerError::InvalidPaymentState(payment.status));
    }

    let now = Utc::now();
    let updated =
        sqlx::query("UPDATE payments SET status = 'refunded' WHERE id = ?1 AND status = 'completed'")
            .bind(payment_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
    if updated == 0 {
        return Err(LedgerError::Conflict("payment"));
    }

    sqlx::query(
        "UPDATE freelancers
         SET total_earnings_minor = total_earnings_minor - ?2, updated_at = ?3
         WHERE id = ?1",
    )
    .bind(&payment.freelancer_id)
    .bind(payment.freelancer_minor)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    let payment = db::fetch_payment(&mut *tx, payment_id)
        .await?
        .ok_or(LedgerError::NotFound("payment"))?;
    tx.commit().await?;

    info!("payment {payment_id} refunded");
    Ok(payment)
}
