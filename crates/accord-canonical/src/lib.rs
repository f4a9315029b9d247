//! Canonical encoding primitives for Accord negotiations and endpoint cycles.
//!
//! Every document that feeds a hash (proposal texts, consensus records,
//! structural request bodies) passes through [`Canonicalizer`] first, so equal
//! documents always produce byte-identical input. Digests are lowercase hex
//! SHA-256.
//!
#![deny(missing_docs)]

/// Canonical JSON encoding and decoding.
pub mod canonicalizer;
/// SHA-256 hex digests.
pub mod digest;
/// Validated identifier newtypes.
pub mod identifiers;
/// Validation helpers used by canonical types.
pub mod validation;

pub use canonicalizer::{CanonicalizationError, Canonicalizer};
pub use digest::{DigestBuilder, HexDigest};
pub use identifiers::{ConsensusId, EndpointId, MessageHash, NegotiationId, PeerId, ProfileId};
pub use validation::ValidationError;
