//! Gate error types.

use thiserror::Error;

/// Errors that can occur while running the gate or listener.
///
/// Expected security conditions (lock contention, missing key, policy
/// faults) are not errors; they surface as structured denials or
/// rejection outcomes. This type covers genuine I/O failure.
#[derive(Debug, Error)]
pub enum GateError {
    /// The registry could not be read or rewritten.
    #[error(transparent)]
    Registry(#[from] warden_registry::RegistryError),
}

/// Result type for gate operations.
pub type GateResult<T> = Result<T, GateError>;
