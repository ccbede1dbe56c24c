//! One-time approval codes.

use std::fmt;
use std::str::FromStr;

use rand::rngs::OsRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Length of an approval code in characters.
pub const CODE_LEN: usize = 6;

/// Code alphabet with ambiguous glyphs excluded (no 0/O, 1/I/L, 2/Z, 5/S)
/// so a human can read a code off one screen and type it into another
/// without transcription errors.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRTUVWXY346789";

/// A 6-character one-time code identifying exactly one pending
/// authorization request.
///
/// Generated from the OS CSPRNG; parsing normalizes to uppercase and
/// rejects characters outside [`CODE_ALPHABET`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ApprovalCode(String);

impl ApprovalCode {
    /// Generate a fresh random code.
    ///
    /// Uniqueness among live requests is enforced by the registry at
    /// insertion time, not here.
    #[must_use]
    pub fn generate() -> Self {
        let mut rng = OsRng;
        let code = (0..CODE_LEN)
            .map(|_| char::from(CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())]))
            .collect();
        Self(code)
    }

    /// The code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ApprovalCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ApprovalCode {
    type Err = ParseCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();
        if normalized.len() != CODE_LEN {
            return Err(ParseCodeError::Length {
                actual: normalized.len(),
            });
        }
        if let Some(c) = normalized
            .bytes()
            .find(|b| !CODE_ALPHABET.contains(b))
            .map(char::from)
        {
            return Err(ParseCodeError::Alphabet { character: c });
        }
        Ok(Self(normalized))
    }
}

impl TryFrom<String> for ApprovalCode {
    type Error = ParseCodeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ApprovalCode> for String {
    fn from(code: ApprovalCode) -> Self {
        code.0
    }
}

/// Errors from parsing an approval code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseCodeError {
    /// Wrong number of characters.
    #[error("approval codes are {CODE_LEN} characters, got {actual}")]
    Length {
        /// Actual character count.
        actual: usize,
    },

    /// Character outside the restricted alphabet.
    #[error("character {character:?} is not in the code alphabet")]
    Alphabet {
        /// The offending character.
        character: char,
    },
}
