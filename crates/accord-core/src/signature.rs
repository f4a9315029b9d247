//! Ed25519 signature verification and key registry.
//!
//! Key material is the 32-byte public key, base64url without padding. A key id
//! is the lowercase hex SHA-256 of those bytes and doubles as the signer's
//! [`PeerId`]. Signatures are 64 bytes, base64url without padding.

use accord_canonical::{HexDigest, PeerId};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;
use std::collections::BTreeMap;
use std::sync::RwLock;
use thiserror::Error;

/// Key material problems. Invalid signatures are not errors; they verify as invalid.
#[derive(Error, Debug)]
pub enum SignatureError {
    /// Public or secret key could not be decoded.
    #[error("malformed key material: {0}")]
    MalformedKey(String),
}

/// Outcome of a verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    /// Whether the signature checks out.
    pub valid: bool,
    /// Identity that produced the signature, when valid.
    pub signer: Option<PeerId>,
}

impl Verification {
    fn invalid() -> Self {
        Self {
            valid: false,
            signer: None,
        }
    }
}

/// Opaque signature scheme used by the negotiation engine.
pub trait SignatureVerifier: Send + Sync {
    /// Verifies `signature` over `payload`. With `key_material` the signature is
    /// checked against that key; otherwise the signer is recovered among the
    /// registered keys.
    fn verify(
        &self,
        payload: &[u8],
        signature: &str,
        key_material: Option<&str>,
    ) -> Result<Verification, SignatureError>;

    /// Associates key material with its identity for later verification.
    fn register_key(&self, key_material: &str) -> Result<PeerId, SignatureError>;
}

/// Computes the key id of a public key.
pub fn key_id(key: &VerifyingKey) -> PeerId {
    PeerId::new(HexDigest::of(key.as_bytes()).into_string())
}

fn decode_public(key_material: &str) -> Result<VerifyingKey, SignatureError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(key_material)
        .map_err(|e| SignatureError::MalformedKey(e.to_string()))?;
    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|_| SignatureError::MalformedKey("public key must be 32 bytes".into()))?;
    VerifyingKey::from_bytes(&bytes).map_err(|e| SignatureError::MalformedKey(e.to_string()))
}

fn decode_signature(signature: &str) -> Option<Signature> {
    let bytes = URL_SAFE_NO_PAD.decode(signature).ok()?;
    Signature::from_slice(&bytes).ok()
}

/// Ed25519 verifier backed by an in-process key registry.
#[derive(Debug, Default)]
pub struct Ed25519Verifier {
    keys: RwLock<BTreeMap<PeerId, VerifyingKey>>,
}

impl Ed25519Verifier {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered keys.
    pub fn len(&self) -> usize {
        self.keys.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether no keys are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SignatureVerifier for Ed25519Verifier {
    fn verify(
        &self,
        payload: &[u8],
        signature: &str,
        key_material: Option<&str>,
    ) -> Result<Verification, SignatureError> {
        let Some(signature) = decode_signature(signature) else {
            return Ok(Verification::invalid());
        };

        if let Some(material) = key_material {
            let key = decode_public(material)?;
            if key.verify_strict(payload, &signature).is_ok() {
                return Ok(Verification {
                    valid: true,
                    signer: Some(key_id(&key)),
                });
            }
            return Ok(Verification::invalid());
        }

        let keys = self.keys.read().unwrap_or_else(|e| e.into_inner());
        let recovered = keys
            .iter()
            .find(|(_, key)| key.verify_strict(payload, &signature).is_ok())
            .map(|(id, _)| id.clone());
        Ok(match recovered {
            Some(signer) => Verification {
                valid: true,
                signer: Some(signer),
            },
            None => Verification::invalid(),
        })
    }

    fn register_key(&self, key_material: &str) -> Result<PeerId, SignatureError> {
        let key = decode_public(key_material)?;
        let id = key_id(&key);
        self.keys
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id.clone(), key);
        Ok(id)
    }
}

/// Signing side of the scheme, used by tooling and tests.
pub struct Ed25519Signer {
    key: SigningKey,
}

impl Ed25519Signer {
    /// Fresh random key.
    pub fn generate() -> Self {
        let mut seed = [0u8; 32];
        OsRng.fill_bytes(&mut seed);
        Self::from_seed(seed)
    }

    /// Deterministic key from a 32-byte seed.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            key: SigningKey::from_bytes(&seed),
        }
    }

    /// Key from base64url secret seed.
    pub fn from_secret(secret: &str) -> Result<Self, SignatureError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(secret)
            .map_err(|e| SignatureError::MalformedKey(e.to_string()))?;
        let seed: [u8; 32] = bytes
            .try_into()
            .map_err(|_| SignatureError::MalformedKey("secret must be 32 bytes".into()))?;
        Ok(Self::from_seed(seed))
    }

    /// Base64url secret seed.
    pub fn secret(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.key.to_bytes())
    }

    /// Base64url public key material.
    pub fn key_data(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.key.verifying_key().as_bytes())
    }

    /// Identity of this key.
    pub fn key_id(&self) -> PeerId {
        key_id(&self.key.verifying_key())
    }

    /// Base64url signature over `payload`.
    pub fn sign(&self, payload: &[u8]) -> String {
        URL_SAFE_NO_PAD.encode(self.key.sign(payload).to_bytes())
    }
}
