//! Endpoint message-exchange cycle.
//!
//! ```text
//! OPEN --(inbox reaches size_max)--> FULL
//! OPEN | FULL --close--> CLOSED --process--> PROCESSED
//! ```
//!
//! Closing freezes the selected INBOX messages into ACCEPTED and commits to
//! their hashes; processing publishes PROCESSBOX messages into OUTBOX.

use accord_canonical::{ConsensusId, DigestBuilder, HexDigest, MessageHash, PeerId};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::errors::CoreError;
use crate::model::{CycleStatus, Endpoint, Message, MessageBox, NewMessage};
use crate::store::Transaction;

/// Content hash: `sha256(text || sender || recipient)`.
pub fn hash_message(text: &str, sender: &str, recipient: &str) -> MessageHash {
    let mut builder = DigestBuilder::new();
    builder.update(text).update(sender).update(recipient);
    builder.finish().into()
}

/// Commitment over a set of message hashes, independent of order and duplicates.
pub fn compute_messages_hash(hashes: &[MessageHash]) -> HexDigest {
    let distinct: BTreeSet<&str> = hashes.iter().map(MessageHash::as_str).collect();
    let mut builder = DigestBuilder::new();
    for hash in distinct {
        builder.update(hash);
    }
    builder.finish()
}

/// Requested endpoint transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Freeze the listed inbox messages.
    Close {
        /// Inbox message hashes to accept.
        hashes: Vec<MessageHash>,
    },
    /// Publish the listed process-box messages.
    Process {
        /// Process-box message hashes to publish.
        hashes: Vec<MessageHash>,
        /// Opaque proof of processing.
        proof: Option<Value>,
    },
}

/// Message as submitted for admission.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MessageSubmission {
    /// Target box; only INBOX and PROCESSBOX accept submissions.
    #[serde(rename = "box")]
    pub message_box: MessageBox,
    /// Sender identity.
    pub sender: String,
    /// Recipient identity.
    pub recipient: String,
    /// Message body.
    pub text: String,
    /// Hash the submitter pre-committed to, verified against the computed one.
    #[serde(default)]
    pub message_hash: Option<MessageHash>,
}

/// Endpoint cycle operations over a transactional context.
///
/// Every operation expects `endpoint` to have been loaded with
/// [`Transaction::lock_endpoint`].
pub struct EndpointCycle;

impl EndpointCycle {
    /// Applies an authorized transition and records the authorizing consensus.
    pub fn apply<T: Transaction + ?Sized>(
        tx: &mut T,
        endpoint: &mut Endpoint,
        transition: Transition,
        consensus: &ConsensusId,
    ) -> Result<(), CoreError> {
        match transition {
            Transition::Close { hashes } => Self::close(tx, endpoint, &hashes, consensus),
            Transition::Process { hashes, proof } => {
                Self::process(tx, endpoint, &hashes, proof, consensus)
            }
        }
    }

    /// Closes intake, accepting exactly the listed inbox messages.
    pub fn close<T: Transaction + ?Sized>(
        tx: &mut T,
        endpoint: &mut Endpoint,
        hashes: &[MessageHash],
        consensus: &ConsensusId,
    ) -> Result<(), CoreError> {
        if !matches!(endpoint.status, CycleStatus::Open | CycleStatus::Full) {
            return Err(CoreError::InvalidState(format!(
                "endpoint {} cannot close from {:?}",
                endpoint.endpoint_id, endpoint.status
            )));
        }

        let selected = Self::resolve(tx, endpoint, MessageBox::Inbox, hashes)?;
        let count = selected.len();
        if count < endpoint.size_min as usize || count > endpoint.size_max as usize {
            return Err(CoreError::OutOfBounds {
                count,
                min: endpoint.size_min,
                max: endpoint.size_max,
            });
        }

        let ids: Vec<u64> = selected.iter().map(|m| m.id).collect();
        tx.move_messages(&ids, MessageBox::Accepted)?;

        endpoint.inbox_hash = Some(compute_messages_hash(hashes));
        endpoint.status = CycleStatus::Closed;
        endpoint.last_consensus_id = Some(consensus.clone());
        tx.update_endpoint(endpoint)?;
        info!(endpoint = %endpoint.endpoint_id, accepted = count, "endpoint closed");
        Ok(())
    }

    /// Records processing, publishing exactly the listed process-box messages.
    pub fn process<T: Transaction + ?Sized>(
        tx: &mut T,
        endpoint: &mut Endpoint,
        hashes: &[MessageHash],
        proof: Option<Value>,
        consensus: &ConsensusId,
    ) -> Result<(), CoreError> {
        if endpoint.status != CycleStatus::Closed {
            return Err(CoreError::InvalidState(format!(
                "endpoint {} cannot be processed from {:?}",
                endpoint.endpoint_id, endpoint.status
            )));
        }

        let selected = Self::resolve(tx, endpoint, MessageBox::Processbox, hashes)?;
        let ids: Vec<u64> = selected.iter().map(|m| m.id).collect();
        tx.move_messages(&ids, MessageBox::Outbox)?;

        endpoint.outbox_hash = Some(compute_messages_hash(hashes));
        endpoint.process_proof = proof;
        endpoint.status = CycleStatus::Processed;
        endpoint.last_consensus_id = Some(consensus.clone());
        tx.update_endpoint(endpoint)?;
        info!(endpoint = %endpoint.endpoint_id, published = ids.len(), "endpoint processed");
        Ok(())
    }

    /// Admits a message into its requested box.
    ///
    /// `submitter` and `owners` gate PROCESSBOX admission to the endpoint's
    /// peer or one of its owners.
    pub fn admit<T: Transaction + ?Sized>(
        tx: &mut T,
        endpoint: &mut Endpoint,
        submission: MessageSubmission,
        submitter: &PeerId,
        owners: &[PeerId],
    ) -> Result<Message, CoreError> {
        match submission.message_box {
            MessageBox::Inbox => {
                if endpoint.status != CycleStatus::Open {
                    return Err(CoreError::Unauthorized(format!(
                        "cycle {} is not open",
                        endpoint.endpoint_id
                    )));
                }
            }
            MessageBox::Processbox => {
                if endpoint.status != CycleStatus::Closed {
                    return Err(CoreError::Unauthorized(format!(
                        "cycle {} is not closed",
                        endpoint.endpoint_id
                    )));
                }
                if submitter != &endpoint.peer_id && !owners.contains(submitter) {
                    return Err(CoreError::Unauthorized(format!(
                        "{submitter} is not the endpoint peer or an owner"
                    )));
                }
            }
            other => {
                return Err(CoreError::Unauthorized(format!(
                    "can't post to box {other:?}"
                )))
            }
        }

        let computed = hash_message(
            &submission.text,
            &submission.sender,
            &submission.recipient,
        );
        if let Some(requested) = &submission.message_hash {
            if requested != &computed {
                return Err(CoreError::Conflict("hash mismatch".into()));
            }
        }

        let message = tx.insert_message(NewMessage {
            endpoint_id: endpoint.endpoint_id.clone(),
            sender: submission.sender,
            recipient: submission.recipient,
            text: submission.text,
            message_hash: computed,
            message_box: submission.message_box,
        })?;
        debug!(endpoint = %endpoint.endpoint_id, hash = %message.message_hash, "message admitted");

        if message.message_box == MessageBox::Inbox {
            let inbox = tx.count_in_box(&endpoint.endpoint_id, MessageBox::Inbox)?;
            if inbox >= endpoint.size_max as usize {
                endpoint.status = CycleStatus::Full;
                tx.update_endpoint(endpoint)?;
                info!(endpoint = %endpoint.endpoint_id, inbox, "endpoint full");
            }
        }
        Ok(message)
    }

    /// Resolves `hashes` against one box, rejecting stale or unknown hashes.
    fn resolve<T: Transaction + ?Sized>(
        tx: &mut T,
        endpoint: &Endpoint,
        message_box: MessageBox,
        hashes: &[MessageHash],
    ) -> Result<Vec<Message>, CoreError> {
        let selected = tx.messages_in_box(&endpoint.endpoint_id, message_box, hashes)?;
        if selected.len() != hashes.len() {
            return Err(CoreError::Conflict(format!(
                "message count mismatch: requested {}, found {} in {:?}",
                hashes.len(),
                selected.len(),
                message_box
            )));
        }
        Ok(selected)
    }
}
