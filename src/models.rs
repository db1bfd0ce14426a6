//! Canonical entity records and status enums for the ledger.
//!
//! All monetary columns hold integer minor units (cents) and commission
//! rates are stored in basis points (10.00% = 1000 bps) so that split
//! arithmetic is exact.  The JSON surface exposes rates as decimal percent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────
// Status enums
// ─────────────────────────────────────────────────────────

/// Lifecycle status of a project.
///
/// ```text
/// draft ──► preview_sent ──► approved ──► paid ──► delivered
///   │            │  ▲ │          │          │
///   │            │  └─┘          │          │        (revision loop)
///   └────────────┴───────────────┴──────────┴──────► cancelled
/// ```
///
/// `delivered` and `cancelled` are terminal.  The `approved → paid` edge is
/// driven exclusively by the payment ledger (see [`crate::ledger`]), never
/// by an external lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ProjectStatus {
    Draft,
    PreviewSent,
    Approved,
    Paid,
    Delivered,
    Cancelled,
}

impl ProjectStatus {
    /// Terminal states have no outgoing transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// Descriptive fields stay editable until the project is paid.
    pub fn is_editable(self) -> bool {
        matches!(self, Self::Draft | Self::PreviewSent | Self::Approved)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::PreviewSent => "preview_sent",
            Self::Approved => "approved",
            Self::Paid => "paid",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a payment record in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    /// `completed` still accepts the refund transition; `failed` and
    /// `refunded` accept nothing.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Refunded)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Account status of a freelancer.  Suspension blocks new payment creation
/// but leaves existing projects and payments untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum FreelancerStatus {
    Active,
    Suspended,
}

// ─────────────────────────────────────────────────────────
// Records
// ─────────────────────────────────────────────────────────

/// A project as stored in / read from the database.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Project {
    pub id: String,
    pub freelancer_id: String,
    pub client_email: String,
    pub client_name: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price_minor: i64,
    pub status: ProjectStatus,
    pub deadline: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A payment ledger entry.  `amount_minor` snapshots the project price at
/// creation time; `commission_minor + freelancer_minor == amount_minor`
/// always holds.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Payment {
    pub id: String,
    pub project_id: String,
    pub freelancer_id: String,
    pub amount_minor: i64,
    pub commission_minor: i64,
    pub freelancer_minor: i64,
    pub status: PaymentStatus,
    pub gateway_transaction_id: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

/// A freelancer account.  `total_earnings_minor` and `total_projects` are
/// maintained incrementally inside the same transaction as the payment or
/// lifecycle mutation that changes them, and always match the recomputed
/// aggregates over the payment and project tables.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Freelancer {
    pub id: String,
    pub user_id: String,
    pub business_name: Option<String>,
    pub subdomain: Option<String>,
    #[serde(rename = "commission_rate", serialize_with = "bps_as_percent")]
    pub commission_rate_bps: i64,
    pub is_verified: bool,
    pub status: FreelancerStatus,
    pub total_earnings_minor: i64,
    pub total_projects: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn bps_as_percent<S: serde::Serializer>(bps: &i64, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_f64(*bps as f64 / 100.0)
}

// ─────────────────────────────────────────────────────────
// Mutation payloads
// ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct NewFreelancer {
    pub user_id: String,
    pub business_name: Option<String>,
    pub subdomain: Option<String>,
}

/// Partial update of descriptive fields.  Commission rate, verification and
/// account status are not patchable; only the tier engine mutates those.
#[derive(Debug, Default, Deserialize)]
pub struct FreelancerUpdate {
    pub business_name: Option<String>,
    pub subdomain: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NewProject {
    pub freelancer_id: String,
    pub client_email: String,
    pub client_name: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price_minor: i64,
    pub deadline: Option<String>,
}

/// Partial update of a project's descriptive fields.  Status is never
/// writable here; it moves only through the lifecycle manager.
#[derive(Debug, Default, Deserialize)]
pub struct ProjectUpdate {
    pub client_email: Option<String>,
    pub client_name: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub deadline: Option<String>,
}
