//! Retry hook for board operations.

use crate::error::DispatchError;
use moim_client::STATUS_NO_PERMISSION;
use std::time::Duration;

/// Which backend rejections get one retry with a refreshed credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub codes: Vec<i64>,
    pub delay: Duration,
}

impl RetryPolicy {
    /// Never retry.
    pub fn none() -> Self {
        Self {
            codes: Vec::new(),
            delay: Duration::ZERO,
        }
    }

    /// Poll creation: a stale credential shows up as a permission error.
    pub fn poll() -> Self {
        Self {
            codes: vec![STATUS_NO_PERMISSION],
            delay: Duration::from_secs(1),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Whether `error` is a board rejection this policy retries.
    pub fn applies_to(&self, error: &DispatchError) -> bool {
        match error {
            DispatchError::Board(e) => e
                .rejection_status()
                .is_some_and(|status| self.codes.contains(&status)),
            _ => false,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use moim_client::MoimError;

    fn rejected(status: i64) -> DispatchError {
        DispatchError::Board(MoimError::Rejected {
            status,
            message: String::new(),
        })
    }

    #[test]
    fn test_poll_policy_matches_permission_error() {
        let policy = RetryPolicy::poll();
        assert!(policy.applies_to(&rejected(-4001)));
        assert!(!policy.applies_to(&rejected(-4046)));
        assert!(!policy.applies_to(&DispatchError::invalid("x")));
        assert_eq!(policy.delay, Duration::from_secs(1));
    }

    #[test]
    fn test_none_policy() {
        assert!(!RetryPolicy::none().applies_to(&rejected(-4001)));
    }
}
