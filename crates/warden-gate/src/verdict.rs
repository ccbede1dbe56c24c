//! Gate verdicts.

use std::fmt;

use serde::{Deserialize, Serialize};
use warden_policy::ApprovalTier;
use warden_registry::ApprovalCode;

/// The gate's answer to one attempted operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "verdict")]
pub enum Verdict {
    /// Proceed with the operation.
    Allow,
    /// Do not proceed.
    Deny(Denial),
}

impl Verdict {
    /// Whether the operation may proceed.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// A denial: structured reason plus the human-facing instruction text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Denial {
    /// Machine-readable reason for the host runtime.
    pub reason: DenialReason,
    /// Human-facing text: what was attempted, with what arguments, and
    /// (when approval is possible) the phrase and code to type.
    pub instruction: String,
}

/// Why the gate denied.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum DenialReason {
    /// The operation is protected and no valid approval was waiting; a
    /// fresh request was issued.
    ApprovalRequired {
        /// One-time code identifying the new request.
        code: ApprovalCode,
        /// Phrase the human must reproduce.
        phrase: String,
        /// Approval tier for this operation.
        tier: ApprovalTier,
    },
    /// The policy file is present but unusable (configuration error).
    PolicyFault {
        /// Operator-facing detail.
        detail: String,
    },
    /// The policy file is missing and the gate is not configured to
    /// treat absence as "nothing defined yet" (configuration error).
    PolicyAbsent,
    /// The operation's group appears nowhere in policy (aliasing
    /// defense).
    UnknownGroup,
    /// The secret key could not be loaded, so no signature can be
    /// checked (configuration error).
    KeyUnavailable {
        /// Operator-facing detail.
        detail: String,
    },
    /// The registry lock was not acquired within its budget.
    LockContended,
}

impl DenialReason {
    /// Whether this denial stems from broken security configuration
    /// rather than from the normal approval flow.
    #[must_use]
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::PolicyFault { .. } | Self::PolicyAbsent | Self::KeyUnavailable { .. }
        )
    }
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ApprovalRequired { code, .. } => {
                write!(f, "approval required (code {code})")
            },
            Self::PolicyFault { detail } => write!(f, "policy fault: {detail}"),
            Self::PolicyAbsent => write!(f, "policy file missing"),
            Self::UnknownGroup => write!(f, "operation group unknown to policy"),
            Self::KeyUnavailable { detail } => write!(f, "secret key unavailable: {detail}"),
            Self::LockContended => write!(f, "registry lock contended"),
        }
    }
}
