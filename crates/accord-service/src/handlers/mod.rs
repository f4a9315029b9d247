//! Per-resource request handlers.
//!
//! Every handler runs in three steps inside one transaction: `validate`
//! checks the payload alone, `authorize` loads and locks what the request
//! touches and proves the caller may act, `apply` performs the mutation.
//! Any failure drops the transaction, so nothing is written.

use accord_canonical::{Canonicalizer, ConsensusId};
use accord_core::{Clock, ConsensusAuthorizer, CoreError, SignatureVerifier, Signings, Transaction};
use serde::de::DeserializeOwned;

use crate::config::ServiceConfig;
use crate::envelope::{Caller, Request};

mod contribution;
mod endpoint;
mod message;
mod negotiation;
mod peer;

pub use contribution::{ContributionData, CreateContribution};
pub use endpoint::{CreateEndpoint, EndpointData, EndpointUpdateData, HashRef, UpdateEndpoint};
pub use message::{CreateMessage, MessageData};
pub use negotiation::CreateNegotiation;
pub use peer::{CreatePeer, OwnerRef, PeerData};

/// `info.operation` of creations.
pub const CREATE: &str = "create";
/// `info.operation` of partial updates.
pub const PARTIAL_UPDATE: &str = "partial_update";

/// Collaborators shared by every handler.
pub struct Context<'a> {
    /// Canonical codec.
    pub canonicalizer: &'a Canonicalizer,
    /// Signature scheme and key registry.
    pub verifier: &'a dyn SignatureVerifier,
    /// Sealing clock.
    pub clock: &'a dyn Clock,
    /// Service settings.
    pub config: &'a ServiceConfig,
}

impl Context<'_> {
    /// Checks that the request's structural consensus approves it; returns the
    /// consensus id and its signings.
    pub fn authorize_structural<T>(
        &self,
        tx: &mut dyn Transaction,
        request: &Request<T>,
    ) -> Result<(ConsensusId, Signings), CoreError> {
        let consensus = request.require_consensus()?;
        let signings = ConsensusAuthorizer::new(self.canonicalizer).authorize(
            tx,
            request.structural_body(),
            consensus,
        )?;
        Ok((consensus.clone(), signings))
    }
}

/// One resource operation.
pub trait Handler {
    /// Payload under `data`.
    type Data: DeserializeOwned;
    /// What `authorize` hands to `apply` (locked rows, consensus id).
    type Grant;
    /// Result of the mutation.
    type Output;

    /// Expected `info.operation`.
    const OPERATION: &'static str;
    /// Expected `info.resource`.
    const RESOURCE: &'static str;

    /// Checks the payload without touching storage.
    fn validate(&self, _ctx: &Context<'_>, _request: &Request<Self::Data>) -> Result<(), CoreError> {
        Ok(())
    }

    /// Locks the affected rows and checks the caller's authority.
    fn authorize(
        &self,
        ctx: &Context<'_>,
        tx: &mut dyn Transaction,
        caller: &Caller,
        request: &Request<Self::Data>,
    ) -> Result<Self::Grant, CoreError>;

    /// Performs the authorized mutation.
    fn apply(
        &self,
        ctx: &Context<'_>,
        tx: &mut dyn Transaction,
        caller: &Caller,
        request: Request<Self::Data>,
        grant: Self::Grant,
    ) -> Result<Self::Output, CoreError>;
}
