//! Keyed message-authentication codes over structured fields.
//!
//! MACs bind registry records to the shared secret: a `pending` record
//! proves the gate created it, and an `approved` record proves the
//! approval listener (not the gated agent) performed the transition.

use std::fmt;

use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use zeroize::ZeroizeOnDrop;

use crate::error::CryptoError;
use crate::keystore::{SecretKey, KEY_LEN};

/// A 32-byte keyed BLAKE3 tag.
///
/// Serialized as a hex string in the registry file. Equality is
/// constant-time so a forger learns nothing from comparison timing.
#[derive(Clone, Copy)]
pub struct Mac([u8; 32]);

impl Mac {
    /// Get the raw tag bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Encode as hex string.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Decode from hex string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not valid hex or not 32 bytes.
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(s).map_err(|_| CryptoError::InvalidHexEncoding)?;
        if bytes.len() != 32 {
            return Err(CryptoError::InvalidMacLength {
                expected: 32,
                actual: bytes.len(),
            });
        }
        let mut tag = [0u8; 32];
        tag.copy_from_slice(&bytes);
        Ok(Self(tag))
    }
}

impl PartialEq for Mac {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl Eq for Mac {}

impl fmt::Debug for Mac {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Mac({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for Mac {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for Mac {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Mac {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Signs and verifies field tuples with the shared secret.
///
/// Fields are length-prefixed before hashing, so no two distinct field
/// tuples can produce the same input stream (`["ab", "c"]` never collides
/// with `["a", "bc"]`). A signer can only be constructed from a loaded
/// [`SecretKey`]; callers that fail to load the key have no signer and
/// must treat every signature as unverifiable (fail-closed).
#[derive(ZeroizeOnDrop)]
pub struct MacSigner {
    key: [u8; KEY_LEN],
}

impl MacSigner {
    /// Create a signer over the shared secret.
    #[must_use]
    pub fn new(key: &SecretKey) -> Self {
        Self {
            key: *key.as_bytes(),
        }
    }

    /// Compute the MAC over a tuple of fields.
    #[must_use]
    pub fn sign(&self, fields: &[&str]) -> Mac {
        let mut hasher = blake3::Hasher::new_keyed(&self.key);
        for field in fields {
            hasher.update(&(field.len() as u64).to_le_bytes());
            hasher.update(field.as_bytes());
        }
        Mac(*hasher.finalize().as_bytes())
    }

    /// Verify a MAC over a tuple of fields (constant-time comparison).
    #[must_use]
    pub fn verify(&self, fields: &[&str], mac: &Mac) -> bool {
        self.sign(fields) == *mac
    }
}

impl fmt::Debug for MacSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MacSigner(..)")
    }
}
