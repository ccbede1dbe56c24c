//! The shared symmetric secret with secure memory handling.
//!
//! Both the gate and the approval listener read the same key file; the
//! MACs they produce only interoperate because the key bytes are
//! identical. The key is provisioned once and never rotated by this
//! crate (credential management is out of scope).

use std::io::Write;
use std::path::Path;

use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::{CryptoError, CryptoResult};

/// Length of the secret key in bytes.
pub(crate) const KEY_LEN: usize = 32;

/// A 32-byte symmetric secret, zeroized on drop.
///
/// Stored on disk as a hex-encoded line in a file that must only be
/// readable by the approval authority's account (mode 0o600 on Unix).
/// The gated agent is assumed to be unable to read this file; everything
/// else in the system may be under its control.
#[derive(ZeroizeOnDrop)]
pub struct SecretKey([u8; KEY_LEN]);

impl SecretKey {
    /// Generate a fresh random key from the OS entropy source.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKeyLength`] if the slice is not
    /// exactly 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() != KEY_LEN {
            return Err(CryptoError::InvalidKeyLength {
                expected: KEY_LEN,
                actual: bytes.len(),
            });
        }
        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(bytes);
        Ok(Self(key))
    }

    /// Get the raw key bytes.
    #[must_use]
    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Load the key from a hex-encoded file.
    ///
    /// Refuses to read key files that are symlinks (symlink attack
    /// protection). The read buffer is wrapped in [`Zeroizing`] so key
    /// material is cleared from memory when no longer needed.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::KeyFileMissing`] if the file does not exist,
    /// [`CryptoError::InvalidHexEncoding`] / [`CryptoError::InvalidKeyLength`]
    /// if the contents are malformed, or [`CryptoError::IoError`] on other
    /// I/O failures.
    pub fn load(path: impl AsRef<Path>) -> CryptoResult<Self> {
        let path = path.as_ref();

        let meta = std::fs::symlink_metadata(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CryptoError::KeyFileMissing {
                    path: path.display().to_string(),
                }
            } else {
                CryptoError::IoError(e.to_string())
            }
        })?;
        if meta.file_type().is_symlink() {
            return Err(CryptoError::IoError(format!(
                "key file {} is a symlink; refusing to read",
                path.display()
            )));
        }

        let contents = Zeroizing::new(
            std::fs::read_to_string(path).map_err(|e| CryptoError::IoError(e.to_string()))?,
        );
        let mut bytes = Zeroizing::new(
            hex::decode(contents.trim()).map_err(|_| CryptoError::InvalidHexEncoding)?,
        );
        let key = Self::from_bytes(&bytes);
        bytes.zeroize();
        key
    }

    /// Load an existing key from a file, or generate and save a new one.
    ///
    /// Uses atomic exclusive creation (`O_CREAT | O_EXCL`, mode 0o600 on
    /// Unix) so two racing first runs cannot clobber each other and there
    /// is no world-readable window. The loser of the creation race falls
    /// back to [`SecretKey::load`].
    ///
    /// Creates parent directories if needed.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::IoError`] on I/O failures, or the
    /// [`SecretKey::load`] errors if an existing file is malformed.
    pub fn load_or_provision(path: impl AsRef<Path>) -> CryptoResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CryptoError::IoError(e.to_string()))?;
        }

        let mut options = std::fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        match options.open(path) {
            Ok(mut file) => {
                let key = Self::generate();
                let encoded = Zeroizing::new(hex::encode(key.as_bytes()));
                file.write_all(encoded.as_bytes())
                    .and_then(|()| file.write_all(b"\n"))
                    .and_then(|()| file.sync_all())
                    .map_err(|e| CryptoError::IoError(e.to_string()))?;
                Ok(key)
            },
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Self::load(path),
            Err(e) => Err(CryptoError::IoError(e.to_string())),
        }
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material.
        write!(f, "SecretKey(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_is_random() {
        let a = SecretKey::generate();
        let b = SecretKey::generate();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_from_bytes_rejects_wrong_length() {
        let err = SecretKey::from_bytes(&[0u8; 16]).unwrap_err();
        assert!(matches!(
            err,
            CryptoError::InvalidKeyLength {
                expected: 32,
                actual: 16
            }
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = SecretKey::load(dir.path().join("nope.key")).unwrap_err();
        assert!(matches!(err, CryptoError::KeyFileMissing { .. }));
    }

    #[test]
    fn test_provision_then_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warden.key");

        let first = SecretKey::load_or_provision(&path).unwrap();
        let second = SecretKey::load_or_provision(&path).unwrap();
        let loaded = SecretKey::load(&path).unwrap();

        assert_eq!(first.as_bytes(), second.as_bytes());
        assert_eq!(first.as_bytes(), loaded.as_bytes());
    }

    #[test]
    fn test_load_rejects_malformed_hex() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warden.key");
        std::fs::write(&path, "not hex at all\n").unwrap();
        let err = SecretKey::load(&path).unwrap_err();
        assert!(matches!(err, CryptoError::InvalidHexEncoding));
    }

    #[test]
    fn test_load_rejects_truncated_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warden.key");
        std::fs::write(&path, hex::encode([7u8; 16])).unwrap();
        let err = SecretKey::load(&path).unwrap_err();
        assert!(matches!(err, CryptoError::InvalidKeyLength { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_load_refuses_symlink() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("real.key");
        let link = dir.path().join("link.key");
        std::fs::write(&real, hex::encode([7u8; 32])).unwrap();
        std::os::unix::fs::symlink(&real, &link).unwrap();
        let err = SecretKey::load(&link).unwrap_err();
        assert!(matches!(err, CryptoError::IoError(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_provisioned_key_is_private() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warden.key");
        SecretKey::load_or_provision(&path).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
