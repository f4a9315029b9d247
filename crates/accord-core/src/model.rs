use accord_canonical::{ConsensusId, EndpointId, HexDigest, MessageHash, NegotiationId, PeerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Negotiation status. OPEN→DONE only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NegotiationStatus {
    /// Accepting contributions.
    Open,
    /// Sealed; text and consensus are frozen.
    Done,
}

/// A round of proposal exchange converging toward one sealed text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Negotiation {
    /// Opaque random token.
    pub id: NegotiationId,
    /// Current status.
    pub status: NegotiationStatus,
    /// Sealed text, set only at closure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Consensus hash, set only at closure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consensus: Option<ConsensusId>,
    /// Sealing instant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Negotiation {
    /// New open negotiation.
    pub fn open(id: NegotiationId) -> Self {
        Self {
            id,
            status: NegotiationStatus::Open,
            text: None,
            consensus: None,
            timestamp: None,
        }
    }

    /// Whether contributions are still accepted.
    pub fn is_open(&self) -> bool {
        self.status == NegotiationStatus::Open
    }
}

/// One signer's proposed text within a negotiation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contribution {
    /// Store-assigned id.
    pub id: u64,
    /// Owning negotiation.
    pub negotiation: NegotiationId,
    /// Signer key id.
    pub signer_key_id: PeerId,
    /// Proposed canonical text.
    pub text: String,
    /// Signature over `text`.
    pub signature: String,
    /// Whether this is the signer's current proposal.
    pub latest: bool,
}

/// Contribution before the store assigns an id. Always inserted as `latest`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewContribution {
    /// Owning negotiation.
    pub negotiation: NegotiationId,
    /// Signer key id.
    pub signer_key_id: PeerId,
    /// Proposed canonical text.
    pub text: String,
    /// Signature over `text`.
    pub signature: String,
}

/// Signature evidence frozen onto a sealed negotiation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signing {
    /// Sealed negotiation.
    pub negotiation: NegotiationId,
    /// Signer key id.
    pub signer_key_id: PeerId,
    /// Signature over the sealed text.
    pub signature: String,
}

/// Peer status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PeerStatus {
    /// Active; endpoints may be created.
    Ready,
    /// Retired; no further endpoint activity.
    Deleted,
}

/// A registered party and its owners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    /// Peer identity.
    pub peer_id: PeerId,
    /// Public key material (base64url).
    pub key_data: String,
    /// Current status.
    pub status: PeerStatus,
    /// Identities that must co-sign changes; empty means self-governed.
    pub owners: Vec<PeerId>,
    /// Consensus that authorized the last change.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_consensus_id: Option<ConsensusId>,
}

/// Endpoint cycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CycleStatus {
    /// Accepting inbox messages.
    Open,
    /// Inbox reached `size_max`; waiting to be closed.
    Full,
    /// Inbox frozen; accepting process-box messages.
    Closed,
    /// Terminal.
    Processed,
}

/// Bounded message-exchange cycle belonging to a peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Endpoint identity.
    pub endpoint_id: EndpointId,
    /// Owning peer.
    pub peer_id: PeerId,
    /// Cycle status.
    pub status: CycleStatus,
    /// Minimum accepted message count at close.
    pub size_min: u32,
    /// Maximum accepted message count at close.
    pub size_max: u32,
    /// Commitment over the accepted inbox hashes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inbox_hash: Option<HexDigest>,
    /// Commitment over the outbox hashes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outbox_hash: Option<HexDigest>,
    /// Opaque processing proof.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process_proof: Option<Value>,
    /// Consensus that authorized the last transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_consensus_id: Option<ConsensusId>,
}

/// Stage of a message within its endpoint cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageBox {
    /// Submitted while the cycle is open.
    Inbox,
    /// Submitted by the peer after close.
    Processbox,
    /// Inbox message frozen at close.
    Accepted,
    /// Process-box message published at processing.
    Outbox,
}

impl MessageBox {
    /// Whether a message may move from `self` to `next`.
    pub fn can_advance_to(self, next: MessageBox) -> bool {
        matches!(
            (self, next),
            (MessageBox::Inbox, MessageBox::Accepted) | (MessageBox::Processbox, MessageBox::Outbox)
        )
    }
}

/// A message stored in an endpoint box.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Store-assigned id.
    pub id: u64,
    /// Owning endpoint.
    pub endpoint_id: EndpointId,
    /// Sender identity.
    pub sender: String,
    /// Recipient identity.
    pub recipient: String,
    /// Message body.
    pub text: String,
    /// `sha256(text || sender || recipient)`.
    pub message_hash: MessageHash,
    /// Current box.
    #[serde(rename = "box")]
    pub message_box: MessageBox,
}

/// Message before the store assigns an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    /// Owning endpoint.
    pub endpoint_id: EndpointId,
    /// Sender identity.
    pub sender: String,
    /// Recipient identity.
    pub recipient: String,
    /// Message body.
    pub text: String,
    /// Computed content hash.
    pub message_hash: MessageHash,
    /// Target box.
    pub message_box: MessageBox,
}

/// Public view of a sealed negotiation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusRecord {
    /// Sealed negotiation.
    pub negotiation_id: NegotiationId,
    /// Consensus hash.
    pub consensus: ConsensusId,
    /// Sealed text.
    pub text: String,
    /// Sealing instant in the hashed representation.
    pub timestamp: String,
    /// Signer key id → signature.
    pub signings: BTreeMap<PeerId, String>,
}
