use accord_canonical::{EndpointId, NegotiationId, PeerId};
use accord_core::StoreError;
use std::collections::HashSet;
use std::sync::{Condvar, Mutex};

/// Lockable row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RowKey {
    /// Negotiation row.
    Negotiation(NegotiationId),
    /// Peer row (also guards peer-id uniqueness on insert).
    Peer(PeerId),
    /// Endpoint row (also guards endpoint-id uniqueness on insert).
    Endpoint(EndpointId),
}

/// Exclusive locks keyed by row. Writers to the same row serialize; different
/// rows proceed concurrently.
#[derive(Debug, Default)]
pub(crate) struct RowLocks {
    held: Mutex<HashSet<RowKey>>,
    released: Condvar,
}

impl RowLocks {
    /// Blocks until `key` is free, then takes it.
    pub(crate) fn acquire(&self, key: &RowKey) -> Result<(), StoreError> {
        let mut held = self.held.lock().map_err(|_| StoreError::Poisoned)?;
        while held.contains(key) {
            held = self.released.wait(held).map_err(|_| StoreError::Poisoned)?;
        }
        held.insert(key.clone());
        Ok(())
    }

    /// Frees every key in `keys` and wakes waiters.
    pub(crate) fn release(&self, keys: &[RowKey]) {
        if keys.is_empty() {
            return;
        }
        let mut held = self.held.lock().unwrap_or_else(|e| e.into_inner());
        for key in keys {
            held.remove(key);
        }
        self.released.notify_all();
    }

    #[cfg(test)]
    pub(crate) fn is_held(&self, key: &RowKey) -> bool {
        self.held
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(key)
    }
}
