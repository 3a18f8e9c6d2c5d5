//! Chat-room board client: notices, shared posts and polls.

mod client;
mod error;
mod types;

pub use client::{MoimClient, DEFAULT_OPEN_BASE_URL, DEFAULT_TALK_BASE_URL};
pub use error::MoimError;
pub use types::*;
