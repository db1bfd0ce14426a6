//! Project lifecycle manager.
//!
//! The transition table is a pure function ([`apply`]); persisting a
//! transition is a compare-and-swap against the status that was read, so a
//! losing concurrent writer gets [`LedgerError::Conflict`] instead of
//! silently clobbering the winner.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;

use crate::db;
use crate::errors::{LedgerError, Result};
use crate::models::{Project, ProjectStatus};

/// Externally triggered lifecycle events.
///
/// The `approved → paid` edge has no event here: it belongs to the payment
/// ledger and fires only when a payment reaches `completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// Freelancer sends the preview to the client.
    SendPreview,
    /// Client approves the preview.
    Approve,
    /// Client requests a revision; the project stays in `preview_sent`.
    RequestRevision,
    /// Freelancer marks final delivery; only permitted once paid.
    Deliver,
    /// Admin or freelancer cancels; allowed from any non-terminal state.
    Cancel,
}

impl LifecycleEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SendPreview => "send_preview",
            Self::Approve => "approve",
            Self::RequestRevision => "request_revision",
            Self::Deliver => "deliver",
            Self::Cancel => "cancel",
        }
    }
}

impl std::fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolve the destination status for `event` in `from`, or fail with
/// `InvalidTransition`.  Never a silent no-op: the `request_revision`
/// self-loop is an explicit entry in the table.
pub fn apply(from: ProjectStatus, event: LifecycleEvent) -> Result<ProjectStatus> {
    use LifecycleEvent as E;
    use ProjectStatus as S;

    let to = match (from, event) {
        (S::Draft, E::SendPreview) => S::PreviewSent,
        (S::PreviewSent, E::Approve) => S::Approved,
        (S::PreviewSent, E::RequestRevision) => S::PreviewSent,
        (S::Paid, E::Deliver) => S::Delivered,
        (s, E::Cancel) if !s.is_terminal() => S::Cancelled,
        _ => return Err(LedgerError::InvalidTransition { from, event }),
    };
    Ok(to)
}

/// Apply `event` to the stored project and persist the result.
///
/// Delivery also bumps the owner's `total_projects` aggregate in the same
/// transaction, keeping it equal to the count of delivered projects.
pub async fn transition_project(
    pool: &SqlitePool,
    project_id: &str,
    event: LifecycleEvent,
) -> Result<Project> {
    let mut tx = pool.begin().await?;

    let project = db::fetch_project(&mut *tx, project_id)
        .await?
        .ok_or(LedgerError::NotFound("project"))?;

    let from = project.status;
    let to = apply(from, event)?;

    let updated = sqlx::query(
        "UPDATE projects SET status = ?2, updated_at = ?3 WHERE id = ?1 AND status = ?4",
    )
    .bind(project_id)
    .bind(to)
    .bind(Utc::now())
    .bind(from)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    // A concurrent writer moved the project between our read and the swap.
    if updated == 0 {
        return Err(LedgerError::Conflict("project"));
    }

    if to == ProjectStatus::Delivered {
        sqlx::query(
            "UPDATE freelancers SET total_projects = total_projects + 1, updated_at = ?2
             WHERE id = ?1",
        )
        .bind(&project.freelancer_id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;
    }

    let project = db::fetch_project(&mut *tx, project_id)
        .await?
        .ok_or(LedgerError::NotFound("project"))?;
    tx.commit().await?;

    info!("project {project_id}: {from} → {to} ({event})");
    Ok(project)
}

#[cfg(test)]
mod tests {
    use super::*;
    use LifecycleEvent as E;
    use ProjectStatus as S;

    const ALL_STATES: [S; 6] = [
        S::Draft,
        S::PreviewSent,
        S::Approved,
        S::Paid,
        S::Delivered,
        S::Cancelled,
    ];
    const ALL_EVENTS: [E; 5] = [
        E::SendPreview,
        E::Approve,
        E::RequestRevision,
        E::Deliver,
        E::Cancel,
    ];

    #[test]
    fn happy_path_transitions() {
        assert_eq!(apply(S::Draft, E::SendPreview).unwrap(), S::PreviewSent);
        assert_eq!(apply(S::PreviewSent, E::Approve).unwrap(), S::Approved);
        assert_eq!(apply(S::Paid, E::Deliver).unwrap(), S::Delivered);
    }

    #[test]
    fn revision_request_keeps_preview_sent() {
        assert_eq!(
            apply(S::PreviewSent, E::RequestRevision).unwrap(),
            S::PreviewSent
        );
    }

    #[test]
    fn cancel_allowed_from_any_non_terminal_state() {
        for s in [S::Draft, S::PreviewSent, S::Approved, S::Paid] {
            assert_eq!(apply(s, E::Cancel).unwrap(), S::Cancelled);
        }
    }

    #[test]
    fn terminal_states_accept_nothing() {
        for s in [S::Delivered, S::Cancelled] {
            for e in ALL_EVENTS {
                assert!(matches!(
                    apply(s, e),
                    Err(LedgerError::InvalidTransition { .. })
                ));
            }
        }
    }

    #[test]
    fn every_pair_outside_the_table_is_rejected() {
        let allowed = |s: S, e: E| {
            matches!(
                (s, e),
                (S::Draft, E::SendPreview)
                    | (S::PreviewSent, E::Approve)
                    | (S::PreviewSent, E::RequestRevision)
                    | (S::Paid, E::Deliver)
            ) || (e == E::Cancel && !s.is_terminal())
        };

        for s in ALL_STATES {
            for e in ALL_EVENTS {
                let result = apply(s, e);
                if allowed(s, e) {
                    assert!(result.is_ok(), "expected {s} + {e} to be valid");
                } else {
                    assert!(
                        matches!(result, Err(LedgerError::InvalidTransition { .. })),
                        "expected {s} + {e} to be rejected"
                    );
                }
            }
        }
    }

    #[test]
    fn deliver_requires_paid() {
        for s in [S::Draft, S::PreviewSent, S::Approved] {
            assert!(matches!(
                apply(s, E::Deliver),
                Err(LedgerError::InvalidTransition { .. })
            ));
        }
    }

    mod persisted {
        use super::*;
        use crate::test_support::{seed_freelancer, seed_project, test_pool};

        #[tokio::test]
        async fn transition_is_persisted() {
            let pool = test_pool().await;
            let freelancer = seed_freelancer(&pool).await;
            let project = seed_project(&pool, &freelancer.id, 50_000).await;
            assert_eq!(project.status, S::Draft);

            let project = transition_project(&pool, &project.id, E::SendPreview)
                .await
                .unwrap();
            assert_eq!(project.status, S::PreviewSent);

            let stored = db::fetch_project(&pool, &project.id).await.unwrap().unwrap();
            assert_eq!(stored.status, S::PreviewSent);
        }

        #[tokio::test]
        async fn invalid_event_leaves_status_unchanged() {
            let pool = test_pool().await;
            let freelancer = seed_freelancer(&pool).await;
            let project = seed_project(&pool, &freelancer.id, 50_000).await;

            let err = transition_project(&pool, &project.id, E::Deliver)
                .await
                .unwrap_err();
            assert!(matches!(err, LedgerError::InvalidTransition { .. }));

            let stored = db::fetch_project(&pool, &project.id).await.unwrap().unwrap();
            assert_eq!(stored.status, S::Draft);
        }

        #[tokio::test]
        async fn delivery_bumps_the_completed_project_counter() {
            let pool = test_pool().await;
            let freelancer = seed_freelancer(&pool).await;
            let project = crate::test_support::approved_project(&pool, &freelancer.id, 50_000)
                .await;

            // Walk to delivered via the ledger's paid edge.
            let payment = crate::ledger::create_payment(&pool, &project.id).await.unwrap();
            crate::ledger::mark_completed(&pool, &payment.id, "gw").await.unwrap();
            transition_project(&pool, &project.id, E::Deliver).await.unwrap();

            let freelancer = db::fetch_freelancer(&pool, &freelancer.id)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(freelancer.total_projects, 1);
        }

        #[tokio::test]
        async fn unknown_project_is_not_found() {
            let pool = test_pool().await;
            assert!(matches!(
                transition_project(&pool, "missing", E::Cancel).await.unwrap_err(),
                LedgerError::NotFound("project")
            ));
        }
    }
}
