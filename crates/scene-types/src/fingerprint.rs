use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Domain separator mixed into every element content hash.
const DOMAIN: &[u8] = b"scene-element-content-v1:";

/// BLAKE3 hash of an element's mutable content.
///
/// Two elements with equal fingerprints carry the same type, name, geometry
/// and properties. Identity fields (ids, branch, version, timestamps) and the
/// branch-local parent reference are not part of the content.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Hash canonical content bytes.
    pub fn of_content(canonical: &[u8]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(DOMAIN);
        hasher.update(canonical);
        Self(*hasher.finalize().as_bytes())
    }

    /// Create from a pre-computed hash.
    pub fn from_hash(hash: [u8; 32]) -> Self {
        Self(hash)
    }

    /// The raw 32-byte hash.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hex-encoded string representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Parse from a hex string.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(TypeError::InvalidLength {
                expected: 32,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.short_hex())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_content_same_fingerprint() {
        assert_eq!(
            Fingerprint::of_content(b"wall"),
            Fingerprint::of_content(b"wall")
        );
    }

    #[test]
    fn different_content_different_fingerprint() {
        assert_ne!(
            Fingerprint::of_content(b"wall"),
            Fingerprint::of_content(b"room")
        );
    }

    #[test]
    fn domain_separated_from_plain_blake3() {
        let plain = *blake3::hash(b"wall").as_bytes();
        assert_ne!(Fingerprint::of_content(b"wall").as_bytes(), &plain);
    }

    #[test]
    fn hex_roundtrip() {
        let fp = Fingerprint::of_content(b"door");
        let parsed = Fingerprint::from_hex(&fp.to_hex()).unwrap();
        assert_eq!(fp, parsed);
    }

    #[test]
    fn from_hex_rejects_wrong_length() {
        let err = Fingerprint::from_hex("abcd").unwrap_err();
        assert_eq!(
            err,
            TypeError::InvalidLength {
                expected: 32,
                actual: 2
            }
        );
    }

    #[test]
    fn from_hex_rejects_non_hex() {
        assert!(matches!(
            Fingerprint::from_hex("zz"),
            Err(TypeError::InvalidHex(_))
        ));
    }
}
