//! Warden Policy - which operations are gated, and how.
//!
//! The policy file is **security-critical configuration**: a corrupted or
//! spoofable policy could silently disable protection. Loading therefore
//! distinguishes three states with different failure semantics:
//!
//! 1. File absent -> [`PolicyDecision::NoPolicy`] for every lookup; the
//!    gate decides whether that means "nothing configured yet, allow" or
//!    "policy was deleted, fail closed" based on its own configuration.
//! 2. File present but malformed -> every lookup is a
//!    [`PolicyDecision::Fault`] denial until the file is fixed.
//! 3. File loaded -> per-operation lookup, with groups that appear
//!    nowhere in the file denied as [`PolicyDecision::UnknownGroup`] so
//!    the agent cannot dodge policy by inventing a fresh group name.
//!
//! The store is loaded once at startup and immutable during a run.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;
mod store;
mod types;

pub use error::{PolicyError, PolicyResult};
pub use store::{LoadState, PolicyDecision, PolicyStore};
pub use types::{ApprovalTier, OperationId, ProtectionRequirement};
