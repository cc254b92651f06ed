use crate::types::DcId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Precondition failed for DCID {dcid}: {reason}")]
    Precondition { dcid: DcId, reason: String },
}
