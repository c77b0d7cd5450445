use std::num::NonZeroU32;
use std::sync::Arc;

use governor::{DefaultDirectRateLimiter, Quota};
use nonzero_ext::nonzero;

/// Throttles outgoing supplier requests so large scans do not trip provider limits.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Option<Arc<DefaultDirectRateLimiter>>,
}

impl RateLimiter {
    /// Allows `per_second` requests per second with a burst of the same size.
    /// Zero disables throttling.
    pub fn per_second(per_second: u32) -> Self {
        match NonZeroU32::new(per_second) {
            Some(rate) => Self::direct(Quota::per_second(rate)),
            None => Self::unlimited(),
        }
    }

    pub fn direct(quota: Quota) -> Self {
        Self {
            inner: Some(Arc::new(DefaultDirectRateLimiter::direct(quota))),
        }
    }

    pub fn unlimited() -> Self {
        Self { inner: None }
    }

    /// One request per second, the most conservative setting.
    pub fn conservative() -> Self {
        Self::direct(Quota::per_second(nonzero!(1u32)))
    }

    pub fn is_limited(&self) -> bool {
        self.inner.is_some()
    }

    /// Waits until a request may be issued.
    pub async fn until_ready(&self) {
        if let Some(inner) = &self.inner {
            inner.until_ready().await;
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::unlimited()
    }
}
