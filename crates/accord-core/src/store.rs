//! Transactional storage contract.
//!
//! A [`Transaction`] is a unit of work: `lock_*` reads take an exclusive row
//! lock held until the transaction ends, writes are invisible to other
//! transactions until [`Transaction::commit`], and dropping an uncommitted
//! transaction discards every write.

use accord_canonical::{ConsensusId, EndpointId, MessageHash, NegotiationId, PeerId};
use thiserror::Error;

use crate::model::{
    Contribution, Endpoint, Message, MessageBox, Negotiation, NewContribution, NewMessage, Peer,
    Signing,
};

/// Errors raised by storage backends.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Row does not exist.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Entity kind.
        entity: &'static str,
        /// Requested id.
        id: String,
    },
    /// Unique key already taken.
    #[error("{entity} {id} already exists")]
    Duplicate {
        /// Entity kind.
        entity: &'static str,
        /// Conflicting id.
        id: String,
    },
    /// Attempted to move a message backward or across cycles.
    #[error("message {id} cannot move from {from:?} to {to:?}")]
    IllegalMove {
        /// Message id.
        id: u64,
        /// Current box.
        from: MessageBox,
        /// Requested box.
        to: MessageBox,
    },
    /// A lock was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    Poisoned,
    /// Other backend failure.
    #[error("{0}")]
    Other(String),
}

/// Unit of work over negotiation, peer and endpoint rows.
pub trait Transaction {
    /// Loads a negotiation without locking.
    fn negotiation(&mut self, id: &NegotiationId) -> Result<Negotiation, StoreError>;
    /// Loads a negotiation with an exclusive lock.
    fn lock_negotiation(&mut self, id: &NegotiationId) -> Result<Negotiation, StoreError>;
    /// Inserts a new negotiation.
    fn insert_negotiation(&mut self, negotiation: Negotiation) -> Result<(), StoreError>;
    /// Writes back a negotiation previously loaded with a lock.
    fn update_negotiation(&mut self, negotiation: &Negotiation) -> Result<(), StoreError>;
    /// Finds the negotiation sealed with `consensus`.
    fn negotiation_by_consensus(
        &mut self,
        consensus: &ConsensusId,
    ) -> Result<Option<Negotiation>, StoreError>;

    /// All contributions of a negotiation, in insertion order.
    fn contributions(&mut self, negotiation: &NegotiationId)
        -> Result<Vec<Contribution>, StoreError>;
    /// Contributions flagged `latest`, one per signer.
    fn latest_contributions(
        &mut self,
        negotiation: &NegotiationId,
    ) -> Result<Vec<Contribution>, StoreError>;
    /// Clears the `latest` flag of a signer's contributions; returns how many changed.
    fn supersede_contributions(
        &mut self,
        negotiation: &NegotiationId,
        signer: &PeerId,
    ) -> Result<usize, StoreError>;
    /// Inserts a `latest` contribution.
    fn insert_contribution(
        &mut self,
        contribution: NewContribution,
    ) -> Result<Contribution, StoreError>;

    /// Signings frozen on a negotiation.
    fn signings(&mut self, negotiation: &NegotiationId) -> Result<Vec<Signing>, StoreError>;
    /// Bulk-inserts signings.
    fn insert_signings(&mut self, signings: Vec<Signing>) -> Result<(), StoreError>;

    /// Loads a peer without locking.
    fn peer(&mut self, id: &PeerId) -> Result<Peer, StoreError>;
    /// Loads a peer with an exclusive lock.
    fn lock_peer(&mut self, id: &PeerId) -> Result<Peer, StoreError>;
    /// Inserts a new peer; the id must be unused.
    fn insert_peer(&mut self, peer: Peer) -> Result<(), StoreError>;

    /// Loads an endpoint without locking.
    fn endpoint(&mut self, id: &EndpointId) -> Result<Endpoint, StoreError>;
    /// Loads an endpoint with an exclusive lock.
    fn lock_endpoint(&mut self, id: &EndpointId) -> Result<Endpoint, StoreError>;
    /// Inserts a new endpoint; the id must be unused.
    fn insert_endpoint(&mut self, endpoint: Endpoint) -> Result<(), StoreError>;
    /// Writes back an endpoint previously loaded with a lock.
    fn update_endpoint(&mut self, endpoint: &Endpoint) -> Result<(), StoreError>;

    /// Messages of an endpoint in `message_box` whose hash is in `hashes`.
    fn messages_in_box(
        &mut self,
        endpoint: &EndpointId,
        message_box: MessageBox,
        hashes: &[MessageHash],
    ) -> Result<Vec<Message>, StoreError>;
    /// Number of messages of an endpoint in `message_box`.
    fn count_in_box(
        &mut self,
        endpoint: &EndpointId,
        message_box: MessageBox,
    ) -> Result<usize, StoreError>;
    /// Moves messages forward; fails on any backward move.
    fn move_messages(&mut self, ids: &[u64], to: MessageBox) -> Result<usize, StoreError>;
    /// Inserts a message.
    fn insert_message(&mut self, message: NewMessage) -> Result<Message, StoreError>;

    /// Publishes every staged write atomically and releases the row locks.
    fn commit(self) -> Result<(), StoreError>
    where
        Self: Sized;
}

/// Source of transactions.
pub trait Store: Send + Sync {
    /// Transaction type handed out by this store.
    type Tx<'a>: Transaction
    where
        Self: 'a;

    /// Starts a unit of work.
    fn begin(&self) -> Result<Self::Tx<'_>, StoreError>;
}
