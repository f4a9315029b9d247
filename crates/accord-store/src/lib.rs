//! Storage backend for Accord entities.
//!
//! This crate provides:
//! - `MemoryStore`, the reference implementation of the core `Store` contract
//! - Row-level exclusive locks held for the lifetime of a transaction
//! - Staged writes published atomically on commit, discarded on drop
//! - Contribution filters for selective listing

#![deny(missing_docs)]

/// Contribution filtering API.
pub mod filter;
/// Row lock table.
pub mod locks;
/// In-memory store and transaction.
pub mod memory;

pub use filter::{AndFilter, ContributionFilter, LatestFilter, SignerFilter};
pub use locks::RowKey;
pub use memory::{MemoryStore, MemoryTransaction};
