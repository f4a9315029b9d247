//! Negotiation engine, consensus authorization and endpoint cycles for Accord.
//!
//! This crate provides:
//! - Entity types for negotiations, contributions, signings, peers, endpoints and messages
//! - The transactional [`Store`]/[`Transaction`] contract every handler runs inside
//! - Contribution intake, convergence detection and consensus sealing
//! - Verification that a sealed consensus approves a specific requested change
//! - Owner/self permission rules and the endpoint message-exchange cycle
//!
//! Core invariants:
//! - A negotiation is sealed at most once; its consensus hash is
//!   `sha256(canonical({timestamp, negotiation_id, text, signings}))`
//! - At most one `latest` contribution exists per (negotiation, signer)
//! - Messages only move forward: INBOX→ACCEPTED, PROCESSBOX→OUTBOX
//!
#![deny(missing_docs)]

/// Time source for sealing timestamps.
pub mod clock;
/// Consensus authorization against an expected body.
pub mod consensus;
/// Endpoint cycle state machine and message commitments.
pub mod cycle;
/// Error types for core operations.
pub mod errors;
/// Entity types.
pub mod model;
/// Contribution intake and consensus sealing.
pub mod negotiation;
/// Owner/self permission rules.
pub mod permission;
/// Signature verification and key registry.
pub mod signature;
/// Transactional storage contract.
pub mod store;

pub use clock::{Clock, FixedClock, SystemClock};
pub use consensus::{ConsensusAuthorizer, Signings};
pub use cycle::{compute_messages_hash, hash_message, EndpointCycle, MessageSubmission, Transition};
pub use errors::{CoreError, ErrorKind};
pub use model::{
    ConsensusRecord, Contribution, CycleStatus, Endpoint, Message, MessageBox, Negotiation,
    NegotiationStatus, NewContribution, NewMessage, Peer, PeerStatus, Signing,
};
pub use negotiation::{compute_consensus_hash, format_timestamp, ContributionSubmission, NegotiationEngine};
pub use permission::check_permission;
pub use signature::{
    key_id, Ed25519Signer, Ed25519Verifier, SignatureError, SignatureVerifier, Verification,
};
pub use store::{Store, StoreError, Transaction};
