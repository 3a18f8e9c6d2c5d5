//! Dispatch errors.

use crate::types::FailureKind;
use iris_client::IrisError;
use moim_client::MoimError;
use session_cache::CacheError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Auth unavailable: {0}")]
    Auth(#[from] CacheError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] IrisError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Board error: {0}")]
    Board(#[from] MoimError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl DispatchError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        DispatchError::InvalidInput(message.into())
    }

    /// Failure category reported to callers.
    pub fn kind(&self) -> FailureKind {
        match self {
            DispatchError::Auth(_) => FailureKind::AuthUnavailable,
            DispatchError::Gateway(IrisError::Http(_)) => FailureKind::NetworkFailure,
            DispatchError::Gateway(_) => FailureKind::BackendRejected,
            DispatchError::Http(_) => FailureKind::NetworkFailure,
            DispatchError::Json(_) | DispatchError::Api { .. } => FailureKind::BackendRejected,
            DispatchError::Board(MoimError::Http(_)) => FailureKind::NetworkFailure,
            DispatchError::Board(MoimError::InvalidPoll(_)) => FailureKind::InvalidInput,
            DispatchError::Board(_) => FailureKind::BackendRejected,
            DispatchError::InvalidInput(_) => FailureKind::InvalidInput,
        }
    }

    /// HTTP or backend status code associated with the failure, if any.
    pub fn status(&self) -> Option<i64> {
        match self {
            DispatchError::Api { status, .. } => Some(i64::from(*status)),
            DispatchError::Gateway(IrisError::Api { status, .. }) => Some(i64::from(*status)),
            DispatchError::Board(MoimError::Api { status, .. }) => Some(i64::from(*status)),
            DispatchError::Board(e) => e.rejection_status(),
            _ => None,
        }
    }
}
