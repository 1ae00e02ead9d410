//! SHA-256 digest newtype for payload verification.
//!
//! Validates that the value is a 64-character hexadecimal string. Input is
//! accepted in either case and stored lowercase so that comparisons against
//! computed digests are exact string matches.

use crate::error::{FormulaError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Expected length of a hex-encoded SHA-256 digest.
const DIGEST_HEX_LEN: usize = 64;

/// A validated, lowercase, hex-encoded SHA-256 digest.
///
/// # Examples
///
/// ```
/// use keg::digest::Sha256Digest;
///
/// let hex = "A".repeat(64);
/// let digest = Sha256Digest::try_from(hex.as_str()).expect("valid digest");
/// assert_eq!(digest.as_str(), "a".repeat(64));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Sha256Digest(String);

impl Sha256Digest {
    /// Hex-encode a raw 32-byte digest.
    ///
    /// # Examples
    ///
    /// ```
    /// use keg::digest::Sha256Digest;
    ///
    /// let digest = Sha256Digest::from_bytes([0xab; 32]);
    /// assert_eq!(digest.as_str(), "ab".repeat(32));
    /// ```
    #[must_use]
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        let hex = bytes.iter().fold(String::with_capacity(DIGEST_HEX_LEN), |mut acc, byte| {
            acc.push_str(&format!("{byte:02x}"));
            acc
        });
        Self(hex)
    }

    /// Return the digest as a hex string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Return the first `len` hex characters, for compact log lines.
    #[must_use]
    pub fn short(&self, len: usize) -> &str {
        self.0.get(..len).unwrap_or(&self.0)
    }
}

impl TryFrom<&str> for Sha256Digest {
    type Error = FormulaError;

    fn try_from(value: &str) -> Result<Self> {
        validate_sha256(value)?;
        Ok(Self(value.to_ascii_lowercase()))
    }
}

impl TryFrom<String> for Sha256Digest {
    type Error = FormulaError;

    fn try_from(value: String) -> Result<Self> {
        Self::try_from(value.as_str())
    }
}

impl From<Sha256Digest> for String {
    fn from(value: Sha256Digest) -> Self {
        value.0
    }
}

impl AsRef<str> for Sha256Digest {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Sha256Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validate that `value` is a well-formed hex-encoded SHA-256 digest.
fn validate_sha256(value: &str) -> Result<()> {
    if value.len() != DIGEST_HEX_LEN {
        return Err(FormulaError::InvalidSha256Digest {
            reason: format!(
                "expected {DIGEST_HEX_LEN} hex characters, got {}",
                value.len()
            ),
        });
    }
    if let Some(bad) = value.chars().find(|c| !c.is_ascii_hexdigit()) {
        return Err(FormulaError::InvalidSha256Digest {
            reason: format!("non-hex character '{bad}'"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const UNITY3D_SHA: &str = "a36765c619a986671da6d8cde08a341d74d64e7989b4ed36a9d24845a73b6950";

    #[test]
    fn accepts_release_digest() {
        let digest = Sha256Digest::try_from(UNITY3D_SHA).expect("valid digest");
        assert_eq!(digest.as_str(), UNITY3D_SHA);
    }

    #[test]
    fn normalises_uppercase_input() {
        let digest =
            Sha256Digest::try_from(UNITY3D_SHA.to_ascii_uppercase()).expect("valid digest");
        assert_eq!(digest.as_str(), UNITY3D_SHA);
    }

    #[rstest]
    #[case::too_short("abcdef")]
    #[case::too_long(&"a".repeat(65))]
    #[case::empty("")]
    fn rejects_wrong_length(#[case] value: &str) {
        let err = Sha256Digest::try_from(value).expect_err("length must be checked");
        assert!(err.to_string().contains("expected 64 hex characters"));
    }

    #[test]
    fn rejects_non_hex_characters() {
        let mut bad = "a".repeat(63);
        bad.push('g');
        let err = Sha256Digest::try_from(bad.as_str()).expect_err("non-hex must fail");
        assert!(err.to_string().contains("'g'"));
    }

    #[test]
    fn short_prefix_is_bounded() {
        let digest = Sha256Digest::try_from(UNITY3D_SHA).expect("valid digest");
        assert_eq!(digest.short(8), "a36765c6");
        assert_eq!(digest.short(200), UNITY3D_SHA);
    }

    #[test]
    fn deserialises_through_validation() {
        #[derive(Deserialize)]
        struct Doc {
            sha256: Sha256Digest,
        }
        let ok: Doc = toml::from_str(&format!("sha256 = \"{UNITY3D_SHA}\"")).expect("valid");
        assert_eq!(ok.sha256.as_str(), UNITY3D_SHA);

        let bad: std::result::Result<Doc, _> = toml::from_str("sha256 = \"53a166b8\"");
        assert!(bad.is_err());
    }
}
