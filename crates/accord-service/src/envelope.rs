//! Request envelope shared by every mutating operation.
//!
//! ```json
//! {
//!   "data": { ... },
//!   "info": {"operation": "create", "resource": "peer"},
//!   "by_consensus": {"consensus_id": "<hex>", "consensus_type": "structural"}
//! }
//! ```
//!
//! A structural consensus approves the `{data, info}` pair exactly as the
//! caller sent it, so the expected body is kept in its raw form alongside the
//! typed payload.

use accord_canonical::{ConsensusId, NegotiationId, PeerId};
use accord_core::CoreError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Only consensus type understood by the handlers.
pub const STRUCTURAL: &str = "structural";

/// Operation and resource tags, plus update preconditions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Info {
    /// `create` or `partial_update`.
    #[serde(default)]
    pub operation: String,
    /// Resource name, e.g. `endpoint`.
    #[serde(default)]
    pub resource: String,
    /// Target id for updates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Consensus the caller believes authorized the target's last change.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_last_consensus_id: Option<ConsensusId>,
}

/// Reference to the consensus authorizing a mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByConsensus {
    /// Sealed consensus hash.
    #[serde(default)]
    pub consensus_id: Option<ConsensusId>,
    /// How the expected body is derived; see [`STRUCTURAL`].
    #[serde(default)]
    pub consensus_type: Option<String>,
}

#[derive(Deserialize)]
struct RawRequest {
    #[serde(default)]
    data: Value,
    #[serde(default)]
    info: Value,
    #[serde(default)]
    by_consensus: Option<ByConsensus>,
}

/// Typed request over payload `T`.
#[derive(Debug, Clone)]
pub struct Request<T> {
    /// Resource payload.
    pub data: T,
    /// Envelope tags.
    pub info: Info,
    /// Authorizing consensus, for consensus-gated operations.
    pub by_consensus: Option<ByConsensus>,
    body: Value,
}

fn malformed(err: serde_json::Error) -> CoreError {
    CoreError::Validation(format!("malformed request: {err}"))
}

impl<T: DeserializeOwned> Request<T> {
    /// Parses a request document.
    pub fn from_value(value: Value) -> Result<Self, CoreError> {
        let raw: RawRequest = serde_json::from_value(value).map_err(malformed)?;
        let info = if raw.info.is_null() {
            Info::default()
        } else {
            serde_json::from_value(raw.info.clone()).map_err(malformed)?
        };
        let data = serde_json::from_value(raw.data.clone()).map_err(malformed)?;
        Ok(Self {
            data,
            info,
            by_consensus: raw.by_consensus,
            body: json!({"data": raw.data, "info": raw.info}),
        })
    }
}

impl<T> Request<T> {
    /// Fails with `Conflict` unless the tags name this operation and resource.
    pub fn expect(&self, operation: &str, resource: &str) -> Result<(), CoreError> {
        if self.info.operation != operation {
            return Err(CoreError::Conflict(format!("operation is not {operation}")));
        }
        if self.info.resource != resource {
            return Err(CoreError::Conflict(format!("resource is not {resource}")));
        }
        Ok(())
    }

    /// The `{data, info}` pair as received; what a structural consensus must seal.
    pub fn structural_body(&self) -> &Value {
        &self.body
    }

    /// The authorizing consensus id of a structural request.
    pub fn require_consensus(&self) -> Result<&ConsensusId, CoreError> {
        let by_consensus = match &self.by_consensus {
            Some(b) if b.consensus_id.is_some() || b.consensus_type.is_some() => b,
            _ => {
                return Err(CoreError::Unauthorized(format!(
                    "{} {} requires a consensus",
                    self.info.operation, self.info.resource
                )))
            }
        };
        let consensus_id = by_consensus
            .consensus_id
            .as_ref()
            .ok_or_else(|| CoreError::Validation("consensus is missing".into()))?;
        match by_consensus.consensus_type.as_deref() {
            Some(STRUCTURAL) => Ok(consensus_id),
            other => Err(CoreError::Validation(format!(
                "unsupported consensus type {other:?}"
            ))),
        }
    }
}

/// Authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    /// Caller identity.
    pub peer_id: PeerId,
    /// Public key material presented with the request, if any.
    pub key_data: Option<String>,
}

impl Caller {
    /// Caller known only by identity.
    pub fn new(peer_id: impl Into<PeerId>) -> Self {
        Self {
            peer_id: peer_id.into(),
            key_data: None,
        }
    }

    /// Caller presenting its key material.
    pub fn with_key(peer_id: impl Into<PeerId>, key_data: impl Into<String>) -> Self {
        Self {
            peer_id: peer_id.into(),
            key_data: Some(key_data.into()),
        }
    }
}

/// Resolves a negotiation given by id or href (last non-empty path segment).
pub fn negotiation_ref(reference: &str) -> Result<NegotiationId, CoreError> {
    let segment = reference
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();
    Ok(NegotiationId::parse(segment)?)
}
