//! The persisted request collection.
//!
//! A JSON file rewritten atomically on every mutation. The storage
//! medium is deliberately boring: correctness comes from two places
//! only - every read-modify-write happens under a [`LockGuard`], and
//! every record carries MACs that are verified before it is honored.
//!
//! Expired requests are treated as absent by every reader and swept
//! opportunistically whenever a writer rewrites the file.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, warn};

use crate::code::ApprovalCode;
use crate::error::{RegistryError, RegistryResult};
use crate::lock::LockGuard;
use crate::request::AuthorizationRequest;

/// Handle to the registry file.
#[derive(Debug, Clone)]
pub struct RegistryStore {
    path: PathBuf,
}

impl RegistryStore {
    /// Create a handle for the registry at `path`. Does not touch the
    /// filesystem.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The registry file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All live (unexpired) requests.
    ///
    /// Safe to call without the lock: a stale read means "request not
    /// yet visible", never corruption, because writers replace the file
    /// atomically. Callers that will mutate based on what they see must
    /// instead scan under the lock and keep holding it through the
    /// write.
    #[must_use]
    pub fn scan(&self) -> Vec<AuthorizationRequest> {
        let now = Utc::now();
        self.read_all()
            .into_iter()
            .filter(|r| !r.is_expired(now))
            .collect()
    }

    /// Look up a live request by code.
    #[must_use]
    pub fn get(&self, code: &ApprovalCode) -> Option<AuthorizationRequest> {
        self.scan().into_iter().find(|r| &r.code == code)
    }

    /// Insert a new request.
    ///
    /// Sweeps expired entries as a side effect.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::CodeCollision`] if the code already
    /// identifies a live request (the caller should generate a fresh
    /// code and retry), or [`RegistryError::Persist`] if the rewrite
    /// fails.
    pub fn put(
        &self,
        _lock: &LockGuard,
        request: AuthorizationRequest,
    ) -> RegistryResult<()> {
        let mut live = self.scan();
        if live.iter().any(|r| r.code == request.code) {
            return Err(RegistryError::CodeCollision {
                code: request.code.as_str().to_owned(),
            });
        }
        live.push(request);
        self.write_all(&live)
    }

    /// Replace an existing live request (same code) with an updated one.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if no live request has the
    /// code, or [`RegistryError::Persist`] if the rewrite fails.
    pub fn update(
        &self,
        _lock: &LockGuard,
        request: AuthorizationRequest,
    ) -> RegistryResult<()> {
        let mut live = self.scan();
        let Some(slot) = live.iter_mut().find(|r| r.code == request.code) else {
            return Err(RegistryError::NotFound {
                code: request.code.as_str().to_owned(),
            });
        };
        *slot = request;
        self.write_all(&live)
    }

    /// Delete a request by code. Returns whether a live request was
    /// removed.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Persist`] if the rewrite fails.
    pub fn delete(&self, _lock: &LockGuard, code: &ApprovalCode) -> RegistryResult<bool> {
        let mut live = self.scan();
        let before = live.len();
        live.retain(|r| &r.code != code);
        let removed = live.len() < before;
        if removed {
            self.write_all(&live)?;
        }
        Ok(removed)
    }

    /// Read every record in the file, expired or not.
    ///
    /// An unreadable or unparseable registry is treated as empty with a
    /// warning: the file carries no authority of its own (that lives in
    /// the MACs), and starting from empty is the fail-closed direction -
    /// approvals disappear, nothing becomes allowed.
    fn read_all(&self) -> Vec<AuthorizationRequest> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "registry unreadable; treating as empty");
                return Vec::new();
            },
        };
        match serde_json::from_str(&contents) {
            Ok(requests) => requests,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "registry corrupt; treating as empty");
                Vec::new()
            },
        }
    }

    /// Atomically replace the registry file: write a temp file in the
    /// same directory, then rename over the target.
    fn write_all(&self, requests: &[AuthorizationRequest]) -> RegistryResult<()> {
        let parent = self
            .path
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        std::fs::create_dir_all(&parent).map_err(|e| RegistryError::Persist(e.to_string()))?;

        let json = serde_json::to_string_pretty(requests)
            .map_err(|e| RegistryError::Persist(e.to_string()))?;

        let tmp = tempfile::NamedTempFile::new_in(&parent)
            .map_err(|e| RegistryError::Persist(e.to_string()))?;
        std::fs::write(tmp.path(), json).map_err(|e| RegistryError::Persist(e.to_string()))?;
        tmp.persist(&self.path)
            .map_err(|e| RegistryError::Persist(e.to_string()))?;

        debug!(path = %self.path.display(), live = requests.len(), "registry rewritten");
        Ok(())
    }
}
