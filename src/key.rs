//! Rate limit key generation and handling.
//!
//! Extracting an identity from an inbound request (IP, API key, user id) is
//! the caller's job; the engine only consumes the resulting key. [`LimitKey`]
//! is the canonical form middleware builds once resolution is done, keeping
//! quotas for different scopes (per-route, per-tenant) from colliding on the
//! same identity.

/// A key that uniquely identifies one tracked quota.
///
/// Composed of a scope (typically the route or limiter name) and the resolved
/// client identity, serialized in a consistent order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LimitKey {
    /// The scope this quota belongs to
    pub scope: String,
    /// The resolved client identity
    pub identity: String,
}

impl LimitKey {
    /// Create a new limit key from a scope and identity.
    pub fn new(scope: impl Into<String>, identity: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            identity: identity.into(),
        }
    }

    /// Convert the key to its canonical string representation.
    ///
    /// This is the form handed to [`crate::limiter::RateLimiter::check`] and
    /// used as the store key.
    pub fn to_string_key(&self) -> String {
        format!("{}:{}", self.scope, self.identity)
    }
}

impl std::fmt::Display for LimitKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_string_key())
    }
}
