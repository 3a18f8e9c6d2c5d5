//! Iris gateway client errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IrisError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Gateway refused to issue an AOT token")]
    AotRejected,

    #[error("Missing field in gateway response: {0}")]
    MissingField(&'static str),

    #[error("Room not found: {0}")]
    RoomNotFound(String),
}
