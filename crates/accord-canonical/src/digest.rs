use serde::{Deserialize, Serialize};
use sha2::{Digest as Sha2Digest, Sha256};
use std::fmt;

use crate::validation::{is_lower_hex, TextRule, ValidationError, LOWER_HEX};

const SHA256_HEX: TextRule = TextRule {
    kind: "digest",
    min: 64,
    max: 64,
    alphabet: LOWER_HEX,
    allowed: is_lower_hex,
};

/// Lowercase hex SHA-256 digest (64 characters).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HexDigest(String);

impl HexDigest {
    /// Hashes a single byte string.
    pub fn of(bytes: impl AsRef<[u8]>) -> Self {
        let mut builder = DigestBuilder::new();
        builder.update(bytes);
        builder.finish()
    }

    /// Parses a validated hex digest.
    pub fn parse(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        SHA256_HEX.check(&value)?;
        Ok(Self(value))
    }

    /// Borrowed hex text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the digest, returning the hex text.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for HexDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for HexDigest {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Incremental SHA-256 over concatenated parts.
///
/// Parts are fed without separators: `H(a || b || c)`.
#[derive(Default)]
pub struct DigestBuilder {
    hasher: Sha256,
}

impl DigestBuilder {
    /// Starts an empty digest.
    pub fn new() -> Self {
        Self {
            hasher: Sha256::new(),
        }
    }

    /// Appends bytes to the digest input.
    pub fn update(&mut self, bytes: impl AsRef<[u8]>) -> &mut Self {
        self.hasher.update(bytes.as_ref());
        self
    }

    /// Finalizes into a hex digest.
    pub fn finish(self) -> HexDigest {
        HexDigest(hex::encode(self.hasher.finalize()))
    }
}
