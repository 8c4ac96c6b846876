//! Error types for the Floodgate engine.

use thiserror::Error;

/// Main error type for Floodgate operations.
#[derive(Error, Debug)]
pub enum FloodgateError {
    /// Limit configuration violates an invariant. Raised at construction
    /// time only, never during a check.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The state store could not be reached within the configured timeout.
    #[error("State store unavailable: {0}")]
    StoreUnavailable(String),

    /// Too many concurrent-write retries on a single key. Treated the same
    /// as an unavailable store for the affected request.
    #[error("Compare-and-swap retries exhausted after {attempts} attempts for key {key}")]
    CasContention { key: String, attempts: u32 },

    /// I/O errors (configuration file loading).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Floodgate operations.
pub type Result<T> = std::result::Result<T, FloodgateError>;
