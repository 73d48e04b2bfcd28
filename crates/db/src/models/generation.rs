//! The generation ledger: the durable record of one end-user request.

use genselfie_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Lifecycle status of a ledger row. Moves only forward:
/// `Pending -> Processing -> Completed | Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl GenerationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationStatus::Pending => "pending",
            GenerationStatus::Processing => "processing",
            GenerationStatus::Completed => "completed",
            GenerationStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(GenerationStatus::Pending),
            "processing" => Some(GenerationStatus::Processing),
            "completed" => Some(GenerationStatus::Completed),
            "failed" => Some(GenerationStatus::Failed),
            _ => None,
        }
    }

    /// Whether this status admits no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, GenerationStatus::Completed | GenerationStatus::Failed)
    }
}

/// How the request was admitted.
pub const AUTH_METHOD_CODE: &str = "code";
pub const AUTH_METHOD_STRIPE: &str = "stripe";
pub const AUTH_METHOD_LIGHTNING: &str = "lightning";

/// A row from the `generations` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Generation {
    pub id: DbId,
    /// Uploaded file path or externally-fetched URL of the input image.
    pub source_image_ref: String,
    pub preset_id: Option<DbId>,
    pub authorization_method: String,
    pub authorization_ref: Option<String>,
    pub status: String,
    /// Backend-assigned job id, set on submission.
    pub backend_job_id: Option<String>,
    /// Durable location of the finished output.
    pub result_ref: Option<String>,
    /// Single-use retry code minted on failure, at most once.
    pub compensation_code: Option<String>,
    /// Sanitized failure description for the audit trail.
    pub error: Option<String>,
    pub created_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

impl Generation {
    pub fn status(&self) -> GenerationStatus {
        GenerationStatus::parse(&self.status).unwrap_or(GenerationStatus::Failed)
    }
}

/// Input for creating a ledger row. Rows are always created in `pending`
/// immediately after admission succeeds, so a consumed code or payment is
/// never lost even if submission subsequently fails.
#[derive(Debug, Clone)]
pub struct CreateGeneration {
    pub source_image_ref: String,
    pub preset_id: Option<DbId>,
    pub authorization_method: String,
    pub authorization_ref: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips() {
        for s in [
            GenerationStatus::Pending,
            GenerationStatus::Processing,
            GenerationStatus::Completed,
            GenerationStatus::Failed,
        ] {
            assert_eq!(GenerationStatus::parse(s.as_str()), Some(s));
        }
    }

    #[test]
    fn terminal_statuses() {
        assert!(!GenerationStatus::Pending.is_terminal());
        assert!(!GenerationStatus::Processing.is_terminal());
        assert!(GenerationStatus::Completed.is_terminal());
        assert!(GenerationStatus::Failed.is_terminal());
    }
}
