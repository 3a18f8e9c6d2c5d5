//! Application error types.

use thiserror::Error;

/// Main application error type.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] talk_client::DispatchError),
}

/// Result type alias for application errors.
pub type AppResult<T> = Result<T, AppError>;
