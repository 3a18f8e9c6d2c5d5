//! In-memory TTL caches for gateway credentials and room link ids.
//!
//! Entries are replaced whole and expire lazily: a lookup past the TTL
//! refetches instead of returning the stale value.

mod credential;
mod error;
mod link_id;

pub use credential::{Credential, CredentialCache, DEFAULT_CREDENTIAL_TTL};
pub use error::CacheError;
pub use link_id::{LinkIdCache, LinkIdResolver, DEFAULT_LINK_ID_TTL};
