//! Outbound dispatch for an Iris gateway.
//!
//! `DispatchClient` sends messages and reactions to the messaging backends
//! using credentials fetched from the gateway sidecar. Sends never fail with
//! `Err`: every outcome is a `DispatchResult`. Fire-and-forget sends go
//! through a bounded `TaskExecutor`.

pub mod attachment;
mod client;
mod error;
pub mod executor;
pub mod message_id;
mod retry;
mod types;

pub use client::{
    Completion, DispatchClient, DispatchOptions, DEFAULT_REACTION_BASE_URL, DEFAULT_WRITE_URL,
};
pub use error::DispatchError;
pub use executor::{InlineExecutor, SubmitError, TaskExecutor, WorkerPool};
pub use retry::RetryPolicy;
pub use types::*;

pub use moim_client::{PollSpec, Post, PostKind};
pub use session_cache::Credential;
