//! Warden Registry - persisted authorization requests with cross-process
//! mutual exclusion.
//!
//! The registry is the rendezvous point between the gate (which creates
//! and consumes requests) and the approval listener (which flips them to
//! approved). Both run as short-lived independent processes with no
//! shared memory, so every read-modify-write goes through [`LockFile`],
//! a mutex built on exclusive file creation with staleness takeover.
//!
//! Integrity does not come from the registry file itself - the gated
//! agent can rewrite it at will. It comes from the MACs each record
//! carries (see `warden-crypto`); a record that fails verification is
//! deleted and never honored.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod code;
mod error;
mod lock;
mod request;
mod store;

pub use code::{ApprovalCode, ParseCodeError, CODE_ALPHABET, CODE_LEN};
pub use error::{RegistryError, RegistryResult};
pub use lock::{LockFile, LockGuard, LOCK_BUDGET, LOCK_STALE_AFTER};
pub use request::{AuthorizationRequest, RequestStatus, REQUEST_TTL_SECS};
pub use store::RegistryStore;
