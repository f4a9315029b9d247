use accord_canonical::{CanonicalizationError, ValidationError};
use thiserror::Error;

use crate::signature::SignatureError;
use crate::store::StoreError;

/// Core error types.
///
/// Every variant is detected before a transaction commits, so a returned error
/// never leaves partial writes behind.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Malformed request or payload.
    #[error("validation failed: {0}")]
    Validation(String),
    /// Entity is in the wrong state for the requested operation.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Bad signature, missing signer, or caller not allowed to act.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Referenced entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// Request disagrees with current state (stale hashes, stale consensus, body mismatch).
    #[error("conflict: {0}")]
    Conflict(String),
    /// Message count outside the endpoint bounds.
    #[error("{count} messages outside bounds [{min}, {max}]")]
    OutOfBounds {
        /// Number of resolved messages.
        count: usize,
        /// Endpoint minimum.
        min: u32,
        /// Endpoint maximum.
        max: u32,
    },
    /// Identifier failed validation.
    #[error("invalid identifier: {0}")]
    Identifier(#[from] ValidationError),
    /// Canonical encoding or decoding failed.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),
    /// Key material could not be decoded.
    #[error("signature error: {0}")]
    Signature(#[from] SignatureError),
    /// Storage failure unrelated to caller input.
    #[error("store error: {0}")]
    Store(StoreError),
}

/// Caller-facing error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed request, wrong tag, wrong state value, text mismatch.
    Validation,
    /// Signature or permission failure.
    Unauthorized,
    /// Missing entity.
    NotFound,
    /// Resubmit with corrected data.
    Conflict,
    /// Not caused by the request.
    Internal,
}

impl CoreError {
    /// Classifies the error for callers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Validation(_)
            | CoreError::InvalidState(_)
            | CoreError::Identifier(_)
            | CoreError::Canonicalization(_)
            | CoreError::Signature(_) => ErrorKind::Validation,
            CoreError::Unauthorized(_) => ErrorKind::Unauthorized,
            CoreError::NotFound(_) => ErrorKind::NotFound,
            CoreError::Conflict(_) | CoreError::OutOfBounds { .. } => ErrorKind::Conflict,
            CoreError::Store(_) => ErrorKind::Internal,
        }
    }
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => CoreError::NotFound(format!("{entity} {id}")),
            StoreError::Duplicate { entity, id } => {
                CoreError::Conflict(format!("{entity} {id} already exists"))
            }
            StoreError::IllegalMove { id, from, to } => CoreError::InvalidState(format!(
                "message {id} cannot move from {from:?} to {to:?}"
            )),
            other => CoreError::Store(other),
        }
    }
}
