//! Board client errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MoimError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Rejected by board backend ({status}): {message}")]
    Rejected { status: i64, message: String },

    #[error("Invalid poll: {0}")]
    InvalidPoll(String),
}

impl MoimError {
    /// Backend status code carried by a rejection.
    pub fn rejection_status(&self) -> Option<i64> {
        match self {
            MoimError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}
