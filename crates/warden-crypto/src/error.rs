//! Cryptographic error types.

use thiserror::Error;

/// Errors that can occur during cryptographic operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The key file does not exist.
    ///
    /// Surfaced separately from other I/O failures so operators get a
    /// remediation hint (`warden keygen`) instead of a bare ENOENT.
    #[error("key file not found at {path}; provision one with `warden keygen`")]
    KeyFileMissing {
        /// Path that was checked.
        path: String,
    },

    /// Invalid key length.
    #[error("invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength {
        /// Expected length in bytes.
        expected: usize,
        /// Actual length in bytes.
        actual: usize,
    },

    /// Invalid MAC length.
    #[error("invalid MAC length: expected {expected} bytes, got {actual}")]
    InvalidMacLength {
        /// Expected length in bytes.
        expected: usize,
        /// Actual length in bytes.
        actual: usize,
    },

    /// Invalid hex encoding.
    #[error("invalid hex encoding")]
    InvalidHexEncoding,

    /// I/O error (e.g. reading/writing the key file).
    #[error("I/O error: {0}")]
    IoError(String),
}

/// Result type for cryptographic operations.
pub type CryptoResult<T> = Result<T, CryptoError>;
