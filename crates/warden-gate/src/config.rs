//! Runtime configuration for the gate and listener.
//!
//! One explicit struct, built once by the process entry point and passed
//! into each component at construction. Components never read the
//! process environment themselves.

use std::path::{Path, PathBuf};

/// File locations and policy toggles shared by the gate and listener.
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Directory holding all warden state files.
    pub state_dir: PathBuf,
    /// Protection policy file (TOML).
    pub policy_path: PathBuf,
    /// Shared secret key file (hex).
    pub key_path: PathBuf,
    /// Request registry file (JSON).
    pub registry_path: PathBuf,
    /// Registry lock file.
    pub lock_path: PathBuf,
    /// Whether an *absent* policy file means "nothing configured yet,
    /// allow everything" (bootstrap installs) instead of the default
    /// fail-closed denial.
    ///
    /// Defaults to `false`: the gated agent can delete files, and
    /// deleting the policy must not disable the gate.
    pub allow_when_policy_absent: bool,
}

impl GateConfig {
    /// Standard layout under a single state directory.
    #[must_use]
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        let state_dir = state_dir.into();
        Self {
            policy_path: state_dir.join("policy.toml"),
            key_path: state_dir.join("warden.key"),
            registry_path: state_dir.join("registry.json"),
            lock_path: state_dir.join("registry.lock"),
            state_dir,
            allow_when_policy_absent: false,
        }
    }

    /// Override the policy file location.
    #[must_use]
    pub fn with_policy_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.policy_path = path.into();
        self
    }

    /// Override the key file location.
    #[must_use]
    pub fn with_key_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.key_path = path.into();
        self
    }

    /// Override the registry file location (the lock file moves with it).
    #[must_use]
    pub fn with_registry_path(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        self.lock_path = path.with_extension("lock");
        self.registry_path = path;
        self
    }

    /// Treat an absent policy file as "no policies defined yet".
    #[must_use]
    pub fn with_allow_when_policy_absent(mut self, allow: bool) -> Self {
        self.allow_when_policy_absent = allow;
        self
    }

    /// The state directory.
    #[must_use]
    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }
}
