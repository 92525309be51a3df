use thiserror::Error;

use super::identifier::IdentifierKind;
use super::projection::ProjectionError;
use crate::store::StoreError;

/// Failures a run lookup can surface to the route layer
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("Invalid {kind} identifier '{value}': {reason}")]
    InvalidIdentifier {
        kind: IdentifierKind,
        value: String,
        reason: &'static str,
    },

    /// No run matched, or the run has no such field. Both look the same to clients.
    #[error("Run not found")]
    NotFound,

    #[error("Run store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    #[error("Lookup cancelled")]
    Cancelled,
}

impl From<ProjectionError> for LookupError {
    fn from(err: ProjectionError) -> Self {
        match err {
            ProjectionError::FieldAbsent(_) => LookupError::NotFound,
        }
    }
}
