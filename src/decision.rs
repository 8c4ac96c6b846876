//! Admission decision returned to caller middleware.

use std::time::Duration;

/// The outcome of a single rate limit check.
///
/// Middleware turns `allowed = false` into an HTTP 429 and `allowed = true`
/// into normal pass-through; the remaining fields feed the conventional
/// response headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// Whether the request may proceed.
    pub allowed: bool,
    /// The configured capacity for this limiter.
    pub limit: u64,
    /// Permits still available in the current window, in `[0, limit]`.
    pub remaining: u64,
    /// How long the caller should wait before retrying. Zero when allowed.
    pub retry_after: Duration,
}

impl Decision {
    /// An admitted request with the given quota left.
    pub fn allowed(limit: u64, remaining: u64) -> Self {
        Self {
            allowed: true,
            limit,
            remaining: remaining.min(limit),
            retry_after: Duration::ZERO,
        }
    }

    /// A denied request with a retry hint.
    pub fn denied(limit: u64, remaining: u64, retry_after: Duration) -> Self {
        Self {
            allowed: false,
            limit,
            remaining: remaining.min(limit),
            retry_after,
        }
    }

    /// Value for the `X-RateLimit-Limit` response header.
    pub fn limit_header(&self) -> String {
        self.limit.to_string()
    }

    /// Value for the `X-RateLimit-Remaining` response header.
    pub fn remaining_header(&self) -> String {
        self.remaining.to_string()
    }

    /// Value for the `Retry-After` response header, in whole seconds
    /// (rounded up so a client never retries early).
    pub fn retry_after_header(&self) -> String {
        let secs = self.retry_after.as_secs_f64().ceil() as u64;
        secs.to_string()
    }
}
