//! Policy error types.

use thiserror::Error;

/// Errors that can occur while reading the policy file.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// The policy file exists but could not be read.
    #[error("failed to read policy file {path}: {reason}")]
    Unreadable {
        /// Path to the policy file.
        path: String,
        /// Underlying I/O failure.
        reason: String,
    },

    /// The policy file exists but is not valid TOML / not the expected shape.
    #[error("malformed policy file {path}: {source}")]
    Malformed {
        /// Path to the policy file.
        path: String,
        /// TOML parse error.
        #[source]
        source: toml::de::Error,
    },
}

/// Result type for policy operations.
pub type PolicyResult<T> = Result<T, PolicyError>;
