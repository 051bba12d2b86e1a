//! Errors surfaced by dataset sync and dashboard clone operations

use crate::api::resilience::{CallFailure, CallOutcome};

#[derive(Debug, Clone, thiserror::Error)]
pub enum SyncError {
    /// A remote call a whole operation depends on did not succeed
    #[error("{stage} failed: {failure}")]
    Call { stage: String, failure: CallFailure },

    #[error("dataset {dataset_id} is not referenced by dashboard {dashboard_id}")]
    DatasetNotReferenced {
        dashboard_id: String,
        dataset_id: String,
    },

    #[error("dataset {0} has no columns")]
    EmptySchema(String),

    #[error("invalid dashboard document: {0}")]
    InvalidDocument(String),

    #[error("invalid sync message: {0}")]
    InvalidMessage(String),
}

impl SyncError {
    pub fn call(stage: impl Into<String>, failure: CallFailure) -> Self {
        SyncError::Call {
            stage: stage.into(),
            failure,
        }
    }

    /// Underlying call failure, if this error came from a remote call
    pub fn failure(&self) -> Option<&CallFailure> {
        match self {
            SyncError::Call { failure, .. } => Some(failure),
            _ => None,
        }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;

/// Attach a stage label to a call outcome, turning failures into [`SyncError::Call`]
pub trait StageContext<T> {
    fn stage(self, stage: impl Into<String>) -> SyncResult<T>;
}

impl<T> StageContext<T> for CallOutcome<T> {
    fn stage(self, stage: impl Into<String>) -> SyncResult<T> {
        self.into_result().map_err(|failure| SyncError::call(stage, failure))
    }
}
