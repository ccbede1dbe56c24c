//! Warden Gate - the decision point for human-gated agent operations.
//!
//! The host runtime calls [`Gate::check`] before each sensitive
//! operation and gets back a binary [`Verdict`]. A denial carries the
//! one-time code and approval phrase the human must reproduce; the
//! [`Listener`] watches the human's free text for that utterance and
//! flips the matching registry record to approved. The next matching
//! check consumes the approval exactly once.
//!
//! # Adversarial Model
//!
//! The gated agent can read, edit, and re-run everything here except two
//! things: the secret key file, and the human's own input channel. Every
//! decision therefore reduces to "does this registry record carry MACs
//! only the key could have produced", and every ambiguity fails closed.
//!
//! # Process Model
//!
//! Each check and each listener invocation is a short-lived independent
//! process. There is no in-memory state between invocations; concurrency
//! correctness lives entirely in the locked registry file (see
//! `warden-registry`).

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod config;
mod error;
mod gate;
mod listener;
mod verdict;

pub use config::GateConfig;
pub use error::{GateError, GateResult};
pub use gate::Gate;
pub use listener::{Listener, ListenerOutcome, RejectReason};
pub use verdict::{Denial, DenialReason, Verdict};
