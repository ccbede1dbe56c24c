//! Operation identity and protection requirement types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of an operation the host runtime may attempt: `(group, name)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationId {
    /// Operation group (e.g. `payments`).
    pub group: String,
    /// Operation name within the group (e.g. `charge`).
    pub name: String,
}

impl OperationId {
    /// Create a new operation identity.
    pub fn new(group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group, self.name)
    }
}

/// Which approval path a protected operation takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalTier {
    /// The human approval authority approves directly.
    Direct,
    /// A delegated reviewer screens the request before the human is asked.
    ///
    /// Registry and signature mechanics are identical to [`Self::Direct`];
    /// only the denial instruction and the party expected to eventually
    /// type the approval differ.
    Delegated,
}

impl Default for ApprovalTier {
    fn default() -> Self {
        Self::Direct
    }
}

impl fmt::Display for ApprovalTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => write!(f, "direct"),
            Self::Delegated => write!(f, "delegated"),
        }
    }
}

/// What it takes to run a protected operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectionRequirement {
    /// The approval phrase the human must reproduce (display string).
    pub phrase: String,
    /// The approval tier.
    pub tier: ApprovalTier,
}
