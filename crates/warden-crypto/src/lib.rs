//! Warden Crypto - Cryptographic primitives for the authorization gate.
//!
//! This crate provides:
//! - A symmetric secret key with secure memory handling, provisioned once
//!   and read-only at runtime
//! - Keyed BLAKE3 message-authentication codes over structured fields
//!
//! # Security Philosophy
//!
//! **Cryptography over trust.** The agent being gated is assumed to be able
//! to read and rewrite every file except the key file. Authorization state
//! is therefore only honored when its MAC checks out against the shared
//! secret that both the gate and the approval listener read.
//!
//! # Example
//!
//! ```no_run
//! use warden_crypto::{MacSigner, SecretKey};
//!
//! let key = SecretKey::load_or_provision("/var/lib/warden/warden.key")?;
//! let signer = MacSigner::new(&key);
//!
//! let mac = signer.sign(&["K7M3Q9", "payments", "charge"]);
//! assert!(signer.verify(&["K7M3Q9", "payments", "charge"], &mac));
//! assert!(!signer.verify(&["K7M3Q9", "payments", "refund"], &mac));
//! # Ok::<(), warden_crypto::CryptoError>(())
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;
mod keystore;
mod mac;

pub use error::{CryptoError, CryptoResult};
pub use keystore::SecretKey;
pub use mac::{Mac, MacSigner};
