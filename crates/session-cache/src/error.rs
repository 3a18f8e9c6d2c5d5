//! Cache errors.

use iris_client::IrisError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Auth unavailable: {0}")]
    AuthUnavailable(#[source] IrisError),

    #[error("Link id lookup failed: {0}")]
    Resolve(#[source] IrisError),
}
