//! Policy file loading and lookup.
//!
//! # Lookup Order
//!
//! 1. Policy failed to load? -> `Fault` (fail closed)
//! 2. No policy file? -> `NoPolicy` (caller decides)
//! 3. Group has a `[groups.<name>]` entry and the operation is listed in
//!    `protected`? -> `Protected`
//! 4. Group has an entry but the operation is not listed? -> `Allow`
//! 5. Group listed in `unprotected_groups`? -> `Allow`
//! 6. Otherwise -> `UnknownGroup` (fail closed)
//!
//! A group that appears both under `[groups]` and in `unprotected_groups`
//! is treated as protected; the more restrictive reading wins.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::error::{PolicyError, PolicyResult};
use crate::types::{ApprovalTier, OperationId, ProtectionRequirement};

/// On-disk policy document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct PolicyFile {
    /// Groups exempt from any protection.
    #[serde(default)]
    unprotected_groups: Vec<String>,

    /// Per-group protection rules.
    #[serde(default)]
    groups: BTreeMap<String, GroupPolicy>,
}

/// Protection rules for one operation group.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct GroupPolicy {
    /// Approval tier for the group's protected operations.
    #[serde(default)]
    tier: ApprovalTier,

    /// Approval phrase the human must reproduce.
    phrase: String,

    /// Operations within the group that require approval.
    ///
    /// Operations of this group *not* listed here pass through untouched.
    #[serde(default)]
    protected: Vec<String>,
}

/// How the policy file loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    /// No policy file exists at the configured path.
    Absent,
    /// The policy file exists but could not be read or parsed.
    Failed {
        /// Operator-facing description of the failure.
        reason: String,
    },
    /// The policy file loaded successfully.
    Loaded,
}

/// Outcome of a policy lookup for one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyDecision {
    /// The operation is not protected; let it through untouched.
    Allow,
    /// The operation requires human approval.
    Protected(ProtectionRequirement),
    /// No policy file exists. The gate maps this to allow or deny based
    /// on its `allow_when_policy_absent` configuration.
    NoPolicy,
    /// The policy file is present but unusable; fail closed.
    Fault {
        /// Operator-facing remediation message.
        reason: String,
    },
    /// The operation's group appears nowhere in the policy file; fail
    /// closed so a fresh group name cannot be used to dodge policy.
    UnknownGroup,
}

impl PolicyDecision {
    /// Whether this decision denies without consulting the registry.
    #[must_use]
    pub fn is_configuration_denial(&self) -> bool {
        matches!(self, Self::Fault { .. } | Self::UnknownGroup)
    }
}

/// The loaded protection policy, immutable for the life of the process.
#[derive(Debug)]
pub struct PolicyStore {
    state: LoadState,
    policy: PolicyFile,
}

impl PolicyStore {
    /// Load the policy from `path`.
    ///
    /// Never returns an error: an unreadable or malformed file produces a
    /// store in the [`LoadState::Failed`] state whose every lookup fails
    /// closed, which is the behavior the gate needs. Use
    /// [`PolicyStore::try_parse`] to surface the underlying error to
    /// operators.
    #[must_use]
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::try_parse(path) {
            Ok(Some(policy)) => {
                info!(
                    path = %path.display(),
                    groups = policy.groups.len(),
                    unprotected = policy.unprotected_groups.len(),
                    "loaded protection policy"
                );
                Self {
                    state: LoadState::Loaded,
                    policy,
                }
            },
            Ok(None) => {
                debug!(path = %path.display(), "no policy file present");
                Self {
                    state: LoadState::Absent,
                    policy: PolicyFile::default(),
                }
            },
            Err(e) => {
                error!(path = %path.display(), error = %e, "policy file unusable; failing closed");
                Self {
                    state: LoadState::Failed {
                        reason: e.to_string(),
                    },
                    policy: PolicyFile::default(),
                }
            },
        }
    }

    /// Parse the policy file, distinguishing "absent" (`Ok(None)`) from
    /// unreadable or malformed (`Err`).
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Unreadable`] or [`PolicyError::Malformed`].
    fn try_parse(path: &Path) -> PolicyResult<Option<PolicyFile>> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(PolicyError::Unreadable {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                });
            },
        };
        let policy = toml::from_str(&contents).map_err(|source| PolicyError::Malformed {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Some(policy))
    }

    /// How the policy loaded (for operator diagnostics).
    #[must_use]
    pub fn load_state(&self) -> &LoadState {
        &self.state
    }

    /// Look up the protection requirement for an operation.
    #[must_use]
    pub fn lookup(&self, op: &OperationId) -> PolicyDecision {
        match &self.state {
            LoadState::Failed { reason } => {
                return PolicyDecision::Fault {
                    reason: format!("protection policy is unusable ({reason}); fix or restore the policy file"),
                };
            },
            LoadState::Absent => return PolicyDecision::NoPolicy,
            LoadState::Loaded => {},
        }

        if let Some(group) = self.policy.groups.get(&op.group) {
            if group.protected.iter().any(|n| n == &op.name) {
                return PolicyDecision::Protected(ProtectionRequirement {
                    phrase: group.phrase.clone(),
                    tier: group.tier,
                });
            }
            return PolicyDecision::Allow;
        }

        if self.policy.unprotected_groups.iter().any(|g| g == &op.group) {
            return PolicyDecision::Allow;
        }

        PolicyDecision::UnknownGroup
    }

    /// Render the policy for `warden policy show`.
    #[must_use]
    pub fn describe(&self) -> String {
        match &self.state {
            LoadState::Absent => "no policy file present".to_owned(),
            LoadState::Failed { reason } => format!("POLICY UNUSABLE (failing closed): {reason}"),
            LoadState::Loaded => {
                let mut out = String::new();
                out.push_str("unprotected groups: ");
                if self.policy.unprotected_groups.is_empty() {
                    out.push_str("(none)");
                } else {
                    out.push_str(&self.policy.unprotected_groups.join(", "));
                }
                for (name, group) in &self.policy.groups {
                    out.push_str(&format!(
                        "\n[{name}] tier={} phrase={:?} protected: {}",
                        group.tier,
                        group.phrase,
                        if group.protected.is_empty() {
                            "(none)".to_owned()
                        } else {
                            group.protected.join(", ")
                        }
                    ));
                }
                out
            },
        }
    }
}
