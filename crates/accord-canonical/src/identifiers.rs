use crate::digest::HexDigest;
use crate::validation::{
    is_base64url, is_lower_hex, is_name, TextRule, ValidationError, LOWER_HEX,
};
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! identifier {
    ($name:ident, $doc:expr, $rule:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps trusted text as-is.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Checks length and alphabet before wrapping.
            pub fn parse(value: impl Into<String>) -> Result<Self, ValidationError> {
                const RULE: TextRule = $rule;
                let text = value.into();
                RULE.check(&text)?;
                Ok(Self(text))
            }

            /// Identifier text.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

const fn name(kind: &'static str) -> TextRule {
    TextRule {
        kind,
        min: 1,
        max: 128,
        alphabet: "letters, digits, '-', '_', '.', ':'",
        allowed: is_name,
    }
}

const fn sha256_hex(kind: &'static str) -> TextRule {
    TextRule {
        kind,
        min: 64,
        max: 64,
        alphabet: LOWER_HEX,
        allowed: is_lower_hex,
    }
}

identifier!(
    ProfileId,
    "Canonicalization profile name, 16 to 128 base64url characters.",
    TextRule {
        kind: "profile id",
        min: 16,
        max: 128,
        alphabet: "base64url",
        allowed: is_base64url,
    }
);
identifier!(
    PeerId,
    "Peer identity, usually the hex key id of its signing key.",
    name("peer id")
);
identifier!(
    NegotiationId,
    "Random negotiation token (base64url, no padding).",
    TextRule {
        kind: "negotiation id",
        min: 8,
        max: 128,
        alphabet: "base64url",
        allowed: is_base64url,
    }
);
identifier!(EndpointId, "Message-exchange endpoint name.", name("endpoint id"));
identifier!(
    ConsensusId,
    "Hash that seals a negotiation.",
    sha256_hex("consensus id")
);
identifier!(
    MessageHash,
    "Content hash of one endpoint message.",
    sha256_hex("message hash")
);

impl From<HexDigest> for ConsensusId {
    fn from(digest: HexDigest) -> Self {
        Self(digest.into_string())
    }
}

impl From<HexDigest> for MessageHash {
    fn from(digest: HexDigest) -> Self {
        Self(digest.into_string())
    }
}
