//! The approval listener.
//!
//! Watches human-originated free text for an approval utterance of the
//! shape `APPROVE <phrase> <code>` and, when one validates, flips the
//! matching registry record to approved. It never performs the protected
//! operation itself; it only changes the state the gate will later honor.
//!
//! Outcomes are advisory: the channel must never block or alter the
//! human's own interaction flow, so every failure is a loggable
//! rejection, never a crash, and unrelated message content is ignored.

use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, info, warn};
use warden_crypto::{MacSigner, SecretKey};
use warden_registry::{ApprovalCode, LockFile, RegistryError, RegistryStore};

use crate::config::GateConfig;

/// Matches `APPROVE <phrase> <code>` case-insensitively anywhere in a
/// message. The phrase may span several words; the lazy group stops at
/// the first six-character token, which is then validated as a code.
fn utterance_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        #[allow(clippy::expect_used)]
        Regex::new(r"(?i)\bapprove\s+(.+?)\s+([0-9a-z]{6})\b").expect("static pattern compiles")
    })
}

/// Why an approval utterance was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// The six-character token is not a well-formed code.
    MalformedCode,
    /// No live request carries this code: it never existed, was already
    /// consumed, or expired.
    NoSuchRequest,
    /// The stored record failed creation-MAC verification and was
    /// deleted as forged.
    Forged,
    /// The supplied phrase does not match the request's phrase.
    PhraseMismatch,
    /// The secret key is unavailable, so nothing can be verified or
    /// signed.
    KeyUnavailable,
    /// The registry lock was not acquired within its budget.
    LockContended,
    /// The registry could not be rewritten.
    Storage,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedCode => write!(f, "malformed approval code"),
            Self::NoSuchRequest => write!(f, "unknown, already used, or expired code"),
            Self::Forged => write!(f, "request failed signature verification"),
            Self::PhraseMismatch => write!(f, "approval phrase does not match"),
            Self::KeyUnavailable => write!(f, "secret key unavailable"),
            Self::LockContended => write!(f, "registry lock contended"),
            Self::Storage => write!(f, "registry write failed"),
        }
    }
}

/// What the listener did with one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerOutcome {
    /// The message contained no approval utterance; nothing happened.
    Ignored,
    /// A request was flipped to approved.
    Approved {
        /// Code of the approved request.
        code: ApprovalCode,
    },
    /// An approval utterance was present but rejected.
    Rejected {
        /// The code as typed, when one parsed.
        code: Option<ApprovalCode>,
        /// Why it was rejected.
        reason: RejectReason,
    },
}

/// Watches the approval channel and updates the registry.
pub struct Listener {
    registry: RegistryStore,
    lock: LockFile,
    signer: Option<MacSigner>,
}

impl Listener {
    /// Build a listener from configuration.
    ///
    /// Like the gate, construction is infallible; a missing key fails
    /// closed per utterance.
    #[must_use]
    pub fn open(config: &GateConfig) -> Self {
        let signer = match SecretKey::load(&config.key_path) {
            Ok(key) => Some(MacSigner::new(&key)),
            Err(e) => {
                warn!(error = %e, "listener has no usable key; approvals will be rejected");
                None
            },
        };
        Self {
            registry: RegistryStore::new(&config.registry_path),
            lock: LockFile::new(&config.lock_path),
            signer,
        }
    }

    /// Process one human message.
    ///
    /// The return value is advisory; callers log it and move on. The
    /// message itself passes through to whatever else consumes it
    /// regardless of the outcome.
    #[must_use]
    pub fn observe(&self, text: &str) -> ListenerOutcome {
        let Some(captures) = utterance_pattern().captures(text) else {
            return ListenerOutcome::Ignored;
        };
        let supplied_phrase = &captures[1];
        let code: ApprovalCode = match captures[2].parse() {
            Ok(code) => code,
            Err(e) => {
                debug!(error = %e, "utterance matched but code is malformed");
                return ListenerOutcome::Rejected {
                    code: None,
                    reason: RejectReason::MalformedCode,
                };
            },
        };

        let Some(signer) = &self.signer else {
            return self.reject(Some(code), RejectReason::KeyUnavailable);
        };

        let guard = match self.lock.acquire() {
            Ok(guard) => guard,
            Err(RegistryError::LockContended { .. }) => {
                return self.reject(Some(code), RejectReason::LockContended);
            },
            Err(e) => {
                warn!(error = %e, "lock acquisition failed");
                return self.reject(Some(code), RejectReason::Storage);
            },
        };

        let Some(mut request) = self.registry.get(&code) else {
            return self.reject(Some(code), RejectReason::NoSuchRequest);
        };

        if !request.verify_pending(signer) {
            warn!(
                code = %code,
                operation = %request.operation,
                "approval target failed creation-MAC check; deleting forged request"
            );
            let _ = self.registry.delete(&guard, &code);
            return self.reject(Some(code), RejectReason::Forged);
        }

        if !phrase_matches(&request.phrase, supplied_phrase) {
            return self.reject(Some(code), RejectReason::PhraseMismatch);
        }

        request.approve(signer);
        if let Err(e) = self.registry.update(&guard, request.clone()) {
            warn!(code = %code, error = %e, "failed to persist approval");
            return self.reject(Some(code), RejectReason::Storage);
        }

        info!(code = %code, operation = %request.operation, "request approved");
        ListenerOutcome::Approved { code }
    }

    fn reject(&self, code: Option<ApprovalCode>, reason: RejectReason) -> ListenerOutcome {
        match &code {
            Some(c) => info!(code = %c, reason = %reason, "approval rejected"),
            None => info!(reason = %reason, "approval rejected"),
        }
        ListenerOutcome::Rejected { code, reason }
    }
}

/// Compare the supplied phrase to the stored one, case-insensitively.
///
/// Either side may carry a leading imperative `APPROVE`; both forms are
/// accepted. Stakeholder note: collapsing this dual acceptance to one
/// canonical form needs confirmation before simplifying, since existing
/// policies write phrases both ways.
fn phrase_matches(stored: &str, supplied: &str) -> bool {
    canonical(stored) == canonical(supplied)
}

fn canonical(phrase: &str) -> String {
    let upper = phrase.trim().to_uppercase();
    match upper.strip_prefix("APPROVE ") {
        Some(rest) => rest.trim_start().to_owned(),
        None => upper,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_extracts_phrase_and_code() {
        let caps = utterance_pattern()
            .captures("please APPROVE PROD K7M3Q9 thanks")
            .unwrap();
        assert_eq!(&caps[1], "PROD");
        assert_eq!(&caps[2], "K7M3Q9");
    }

    #[test]
    fn test_pattern_multiword_phrase() {
        let caps = utterance_pattern().captures("approve ship it A3B4C6").unwrap();
        assert_eq!(&caps[1], "ship it");
        assert_eq!(&caps[2], "A3B4C6");
    }

    #[test]
    fn test_pattern_ignores_unrelated_text() {
        assert!(utterance_pattern().captures("deploy it already").is_none());
        assert!(utterance_pattern().captures("I approve of this plan").is_none());
    }

    #[test]
    fn test_phrase_match_case_insensitive() {
        assert!(phrase_matches("PROD", "prod"));
        assert!(phrase_matches("Ship It", "SHIP IT"));
        assert!(!phrase_matches("PROD", "PRODUCTION"));
    }

    #[test]
    fn test_phrase_match_tolerates_leading_imperative() {
        assert!(phrase_matches("APPROVE PROD", "PROD"));
        assert!(phrase_matches("PROD", "approve PROD"));
        assert!(phrase_matches("APPROVE PROD", "APPROVE PROD"));
    }
}
