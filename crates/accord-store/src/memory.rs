//! In-memory store.
//!
//! Committed rows live in `Tables` behind one mutex that is only held for
//! the duration of a single read or of a commit. Each transaction stages its
//! writes in its own `Tables` overlay, which reads consult first.

use accord_canonical::{ConsensusId, EndpointId, MessageHash, NegotiationId, PeerId};
use accord_core::{
    Contribution, Endpoint, Message, MessageBox, Negotiation, NewContribution, NewMessage, Peer,
    Signing, Store, StoreError, Transaction,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use tracing::trace;

use crate::locks::{RowKey, RowLocks};

#[derive(Debug, Default, Clone)]
struct Tables {
    negotiations: BTreeMap<NegotiationId, Negotiation>,
    contributions: BTreeMap<u64, Contribution>,
    signings: Vec<Signing>,
    peers: BTreeMap<PeerId, Peer>,
    endpoints: BTreeMap<EndpointId, Endpoint>,
    messages: BTreeMap<u64, Message>,
}

/// Rows of `base` not shadowed by `staged`, followed by `staged`.
fn scan<'a, K: Ord, V>(
    base: &'a BTreeMap<K, V>,
    staged: &'a BTreeMap<K, V>,
) -> impl Iterator<Item = &'a V> + 'a {
    base.iter()
        .filter(move |(key, _)| !staged.contains_key(*key))
        .map(|(_, value)| value)
        .chain(staged.values())
}

fn lookup<'a, K: Ord, V>(
    base: &'a BTreeMap<K, V>,
    staged: &'a BTreeMap<K, V>,
    key: &K,
) -> Option<&'a V> {
    staged.get(key).or_else(|| base.get(key))
}

/// Reference store keeping every row in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    locks: RowLocks,
    next_id: AtomicU64,
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn committed(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables.lock().map_err(|_| StoreError::Poisoned)
    }

    fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Number of committed messages in `message_box`, across all endpoints.
    pub fn message_count(&self, message_box: MessageBox) -> Result<usize, StoreError> {
        Ok(self
            .committed()?
            .messages
            .values()
            .filter(|m| m.message_box == message_box)
            .count())
    }
}

impl Store for MemoryStore {
    type Tx<'a> = MemoryTransaction<'a>
    where
        Self: 'a;

    fn begin(&self) -> Result<MemoryTransaction<'_>, StoreError> {
        Ok(MemoryTransaction {
            store: self,
            staged: Tables::default(),
            locked: Vec::new(),
        })
    }
}

/// Unit of work over a [`MemoryStore`].
///
/// Row locks are released when the transaction is committed or dropped.
pub struct MemoryTransaction<'a> {
    store: &'a MemoryStore,
    staged: Tables,
    locked: Vec<RowKey>,
}

impl MemoryTransaction<'_> {
    fn lock(&mut self, key: RowKey) -> Result<(), StoreError> {
        if self.locked.contains(&key) {
            return Ok(());
        }
        self.store.locks.acquire(&key)?;
        trace!(?key, "row locked");
        self.locked.push(key);
        Ok(())
    }

    fn require_lock(&self, key: &RowKey) -> Result<(), StoreError> {
        if self.locked.contains(key) {
            Ok(())
        } else {
            Err(StoreError::Other(format!("{key:?} updated without lock")))
        }
    }
}

impl Drop for MemoryTransaction<'_> {
    fn drop(&mut self) {
        self.store.locks.release(&self.locked);
    }
}

impl Transaction for MemoryTransaction<'_> {
    fn negotiation(&mut self, id: &NegotiationId) -> Result<Negotiation, StoreError> {
        let base = self.store.committed()?;
        lookup(&base.negotiations, &self.staged.negotiations, id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                entity: "negotiation",
                id: id.to_string(),
            })
    }

    fn lock_negotiation(&mut self, id: &NegotiationId) -> Result<Negotiation, StoreError> {
        self.lock(RowKey::Negotiation(id.clone()))?;
        self.negotiation(id)
    }

    fn insert_negotiation(&mut self, negotiation: Negotiation) -> Result<(), StoreError> {
        self.lock(RowKey::Negotiation(negotiation.id.clone()))?;
        let base = self.store.committed()?;
        if lookup(&base.negotiations, &self.staged.negotiations, &negotiation.id).is_some() {
            return Err(StoreError::Duplicate {
                entity: "negotiation",
                id: negotiation.id.to_string(),
            });
        }
        drop(base);
        self.staged
            .negotiations
            .insert(negotiation.id.clone(), negotiation);
        Ok(())
    }

    fn update_negotiation(&mut self, negotiation: &Negotiation) -> Result<(), StoreError> {
        self.require_lock(&RowKey::Negotiation(negotiation.id.clone()))?;
        self.staged
            .negotiations
            .insert(negotiation.id.clone(), negotiation.clone());
        Ok(())
    }

    fn negotiation_by_consensus(
        &mut self,
        consensus: &ConsensusId,
    ) -> Result<Option<Negotiation>, StoreError> {
        let base = self.store.committed()?;
        let sealed = scan(&base.negotiations, &self.staged.negotiations)
            .find(|n| n.consensus.as_ref() == Some(consensus))
            .cloned();
        Ok(sealed)
    }

    fn contributions(
        &mut self,
        negotiation: &NegotiationId,
    ) -> Result<Vec<Contribution>, StoreError> {
        let base = self.store.committed()?;
        let mut found: Vec<Contribution> = scan(&base.contributions, &self.staged.contributions)
            .filter(|c| &c.negotiation == negotiation)
            .cloned()
            .collect();
        found.sort_by_key(|c| c.id);
        Ok(found)
    }

    fn latest_contributions(
        &mut self,
        negotiation: &NegotiationId,
    ) -> Result<Vec<Contribution>, StoreError> {
        Ok(self
            .contributions(negotiation)?
            .into_iter()
            .filter(|c| c.latest)
            .collect())
    }

    fn supersede_contributions(
        &mut self,
        negotiation: &NegotiationId,
        signer: &PeerId,
    ) -> Result<usize, StoreError> {
        let superseded: Vec<Contribution> = self
            .latest_contributions(negotiation)?
            .into_iter()
            .filter(|c| &c.signer_key_id == signer)
            .collect();
        let count = superseded.len();
        for mut contribution in superseded {
            contribution.latest = false;
            self.staged.contributions.insert(contribution.id, contribution);
        }
        Ok(count)
    }

    fn insert_contribution(
        &mut self,
        contribution: NewContribution,
    ) -> Result<Contribution, StoreError> {
        let stored = Contribution {
            id: self.store.allocate_id(),
            negotiation: contribution.negotiation,
            signer_key_id: contribution.signer_key_id,
            text: contribution.text,
            signature: contribution.signature,
            latest: true,
        };
        self.staged.contributions.insert(stored.id, stored.clone());
        Ok(stored)
    }

    fn signings(&mut self, negotiation: &NegotiationId) -> Result<Vec<Signing>, StoreError> {
        let base = self.store.committed()?;
        Ok(base
            .signings
            .iter()
            .chain(self.staged.signings.iter())
            .filter(|s| &s.negotiation == negotiation)
            .cloned()
            .collect())
    }

    fn insert_signings(&mut self, signings: Vec<Signing>) -> Result<(), StoreError> {
        self.staged.signings.extend(signings);
        Ok(())
    }

    fn peer(&mut self, id: &PeerId) -> Result<Peer, StoreError> {
        let base = self.store.committed()?;
        lookup(&base.peers, &self.staged.peers, id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                entity: "peer",
                id: id.to_string(),
            })
    }

    fn lock_peer(&mut self, id: &PeerId) -> Result<Peer, StoreError> {
        self.lock(RowKey::Peer(id.clone()))?;
        self.peer(id)
    }

    fn insert_peer(&mut self, peer: Peer) -> Result<(), StoreError> {
        self.lock(RowKey::Peer(peer.peer_id.clone()))?;
        let base = self.store.committed()?;
        if lookup(&base.peers, &self.staged.peers, &peer.peer_id).is_some() {
            return Err(StoreError::Duplicate {
                entity: "peer",
                id: peer.peer_id.to_string(),
            });
        }
        drop(base);
        self.staged.peers.insert(peer.peer_id.clone(), peer);
        Ok(())
    }

    fn endpoint(&mut self, id: &EndpointId) -> Result<Endpoint, StoreError> {
        let base = self.store.committed()?;
        lookup(&base.endpoints, &self.staged.endpoints, id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                entity: "endpoint",
                id: id.to_string(),
            })
    }

    fn lock_endpoint(&mut self, id: &EndpointId) -> Result<Endpoint, StoreError> {
        self.lock(RowKey::Endpoint(id.clone()))?;
        self.endpoint(id)
    }

    fn insert_endpoint(&mut self, endpoint: Endpoint) -> Result<(), StoreError> {
        self.lock(RowKey::Endpoint(endpoint.endpoint_id.clone()))?;
        let base = self.store.committed()?;
        if lookup(&base.endpoints, &self.staged.endpoints, &endpoint.endpoint_id).is_some() {
            return Err(StoreError::Duplicate {
                entity: "endpoint",
                id: endpoint.endpoint_id.to_string(),
            });
        }
        drop(base);
        self.staged
            .endpoints
            .insert(endpoint.endpoint_id.clone(), endpoint);
        Ok(())
    }

    fn update_endpoint(&mut self, endpoint: &Endpoint) -> Result<(), StoreError> {
        self.require_lock(&RowKey::Endpoint(endpoint.endpoint_id.clone()))?;
        self.staged
            .endpoints
            .insert(endpoint.endpoint_id.clone(), endpoint.clone());
        Ok(())
    }

    fn messages_in_box(
        &mut self,
        endpoint: &EndpointId,
        message_box: MessageBox,
        hashes: &[MessageHash],
    ) -> Result<Vec<Message>, StoreError> {
        let wanted: BTreeSet<&MessageHash> = hashes.iter().collect();
        let base = self.store.committed()?;
        Ok(scan(&base.messages, &self.staged.messages)
            .filter(|m| {
                &m.endpoint_id == endpoint
                    && m.message_box == message_box
                    && wanted.contains(&m.message_hash)
            })
            .cloned()
            .collect())
    }

    fn count_in_box(
        &mut self,
        endpoint: &EndpointId,
        message_box: MessageBox,
    ) -> Result<usize, StoreError> {
        let base = self.store.committed()?;
        Ok(scan(&base.messages, &self.staged.messages)
            .filter(|m| &m.endpoint_id == endpoint && m.message_box == message_box)
            .count())
    }

    fn move_messages(&mut self, ids: &[u64], to: MessageBox) -> Result<usize, StoreError> {
        let mut moved = Vec::with_capacity(ids.len());
        {
            let base = self.store.committed()?;
            for id in ids {
                let message = lookup(&base.messages, &self.staged.messages, id).ok_or_else(|| {
                    StoreError::NotFound {
                        entity: "message",
                        id: id.to_string(),
                    }
                })?;
                if !message.message_box.can_advance_to(to) {
                    return Err(StoreError::IllegalMove {
                        id: *id,
                        from: message.message_box,
                        to,
                    });
                }
                let mut message = message.clone();
                message.message_box = to;
                moved.push(message);
            }
        }
        let count = moved.len();
        for message in moved {
            self.staged.messages.insert(message.id, message);
        }
        Ok(count)
    }

    fn insert_message(&mut self, message: NewMessage) -> Result<Message, StoreError> {
        let stored = Message {
            id: self.store.allocate_id(),
            endpoint_id: message.endpoint_id,
            sender: message.sender,
            recipient: message.recipient,
            text: message.text,
            message_hash: message.message_hash,
            message_box: message.message_box,
        };
        self.staged.messages.insert(stored.id, stored.clone());
        Ok(stored)
    }

    fn commit(mut self) -> Result<(), StoreError> {
        let staged = std::mem::take(&mut self.staged);
        let mut base = self.store.committed()?;
        base.negotiations.extend(staged.negotiations);
        base.contributions.extend(staged.contributions);
        base.signings.extend(staged.signings);
        base.peers.extend(staged.peers);
        base.endpoints.extend(staged.endpoints);
        base.messages.extend(staged.messages);
        trace!(locks = self.locked.len(), "transaction committed");
        Ok(())
    }
}
