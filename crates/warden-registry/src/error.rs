//! Registry error types.

use thiserror::Error;

/// Errors that can occur in the request registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The registry lock could not be acquired within the retry budget.
    ///
    /// Mutating callers must fail closed on this.
    #[error("registry lock at {path} still held after {attempts} attempts")]
    LockContended {
        /// Path to the lock file.
        path: String,
        /// Number of acquisition attempts made.
        attempts: u32,
    },

    /// A freshly generated code collided with a live request.
    #[error("code {code} already identifies a live request")]
    CodeCollision {
        /// The colliding code.
        code: String,
    },

    /// No live request with the given code.
    #[error("no live request with code {code}")]
    NotFound {
        /// The code that was looked up.
        code: String,
    },

    /// The registry file could not be written.
    #[error("failed to persist registry: {0}")]
    Persist(String),

    /// I/O error on the registry or lock file.
    #[error("I/O error: {0}")]
    Io(String),
}

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;
