use accord_canonical::{Canonicalizer, ConsensusId, EndpointId, NegotiationId, PeerId};
use accord_core::{
    Clock, ConsensusAuthorizer, ConsensusRecord, Contribution, CoreError, Ed25519Verifier,
    Endpoint, Message, Negotiation, Peer, SignatureVerifier, Store, SystemClock, Transaction,
};
use accord_store::ContributionFilter;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::config::ServiceConfig;
use crate::envelope::{negotiation_ref, Caller, Request};
use crate::handlers::{
    Context, CreateContribution, CreateEndpoint, CreateMessage, CreateNegotiation, CreatePeer,
    Handler, UpdateEndpoint,
};

/// Runs handlers against a store, one transaction per request.
pub struct Service<S: Store> {
    store: S,
    canonicalizer: Canonicalizer,
    verifier: Arc<dyn SignatureVerifier>,
    clock: Arc<dyn Clock>,
    config: ServiceConfig,
}

impl<S: Store> Service<S> {
    /// Service with an ed25519 verifier and the wall clock.
    pub fn new(store: S, config: ServiceConfig) -> Result<Self, CoreError> {
        Ok(Self {
            store,
            canonicalizer: config.canonicalizer()?,
            verifier: Arc::new(Ed25519Verifier::new()),
            clock: Arc::new(SystemClock),
            config,
        })
    }

    /// Replaces the sealing clock.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Replaces the signature verifier.
    pub fn with_verifier(mut self, verifier: Arc<dyn SignatureVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    /// Underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Canonical codec in use.
    pub fn canonicalizer(&self) -> &Canonicalizer {
        &self.canonicalizer
    }

    /// Key registry in use.
    pub fn verifier(&self) -> &dyn SignatureVerifier {
        self.verifier.as_ref()
    }

    fn context(&self) -> Context<'_> {
        Context {
            canonicalizer: &self.canonicalizer,
            verifier: self.verifier.as_ref(),
            clock: self.clock.as_ref(),
            config: &self.config,
        }
    }

    /// Parses `request` and runs `handler` inside one transaction.
    ///
    /// The transaction commits only when every step succeeds.
    pub fn execute<H: Handler>(
        &self,
        handler: &H,
        caller: &Caller,
        request: Value,
    ) -> Result<H::Output, CoreError> {
        let request = Request::<H::Data>::from_value(request)?;
        request.expect(H::OPERATION, H::RESOURCE)?;
        let ctx = self.context();
        handler.validate(&ctx, &request)?;

        let mut tx = self.store.begin()?;
        let outcome = handler
            .authorize(&ctx, &mut tx, caller, &request)
            .and_then(|grant| handler.apply(&ctx, &mut tx, caller, request, grant));
        match outcome {
            Ok(output) => {
                tx.commit()?;
                debug!(
                    operation = H::OPERATION,
                    resource = H::RESOURCE,
                    caller = %caller.peer_id,
                    "request applied"
                );
                Ok(output)
            }
            Err(err) => {
                debug!(
                    operation = H::OPERATION,
                    resource = H::RESOURCE,
                    caller = %caller.peer_id,
                    error = %err,
                    "request rejected"
                );
                Err(err)
            }
        }
    }

    /// Registers a peer.
    pub fn create_peer(&self, caller: &Caller, request: Value) -> Result<Peer, CoreError> {
        self.execute(&CreatePeer, caller, request)
    }

    /// Opens a negotiation.
    pub fn create_negotiation(
        &self,
        caller: &Caller,
        request: Value,
    ) -> Result<Negotiation, CoreError> {
        self.execute(&CreateNegotiation, caller, request)
    }

    /// Submits a contribution.
    pub fn create_contribution(
        &self,
        caller: &Caller,
        request: Value,
    ) -> Result<Contribution, CoreError> {
        self.execute(&CreateContribution, caller, request)
    }

    /// Creates an endpoint.
    pub fn create_endpoint(&self, caller: &Caller, request: Value) -> Result<Endpoint, CoreError> {
        self.execute(&CreateEndpoint, caller, request)
    }

    /// Closes or processes `endpoint_id`.
    pub fn update_endpoint(
        &self,
        caller: &Caller,
        endpoint_id: &EndpointId,
        request: Value,
    ) -> Result<Endpoint, CoreError> {
        let handler = UpdateEndpoint {
            endpoint_id: endpoint_id.clone(),
        };
        self.execute(&handler, caller, request)
    }

    /// Submits a message.
    pub fn create_message(&self, caller: &Caller, request: Value) -> Result<Message, CoreError> {
        self.execute(&CreateMessage, caller, request)
    }

    /// Negotiations sealed with `consensus`. The filter is mandatory.
    pub fn list_negotiations(
        &self,
        consensus: Option<&ConsensusId>,
    ) -> Result<Vec<Negotiation>, CoreError> {
        let consensus =
            consensus.ok_or_else(|| CoreError::Unauthorized("must filter by consensus".into()))?;
        let mut tx = self.store.begin()?;
        Ok(tx.negotiation_by_consensus(consensus)?.into_iter().collect())
    }

    /// One negotiation.
    pub fn retrieve_negotiation(&self, id: &NegotiationId) -> Result<Negotiation, CoreError> {
        let mut tx = self.store.begin()?;
        Ok(tx.negotiation(id)?)
    }

    /// Public record of a sealed consensus.
    pub fn retrieve_consensus(&self, consensus: &ConsensusId) -> Result<ConsensusRecord, CoreError> {
        let mut tx = self.store.begin()?;
        ConsensusAuthorizer::new(&self.canonicalizer).retrieve(&mut tx, consensus)
    }

    /// Contributions of a negotiation (id or href) that pass `filter`.
    /// The negotiation filter is mandatory.
    pub fn list_contributions(
        &self,
        negotiation: Option<&str>,
        filter: &dyn ContributionFilter,
    ) -> Result<Vec<Contribution>, CoreError> {
        let negotiation = require_negotiation(negotiation)?;
        let mut tx = self.store.begin()?;
        tx.negotiation(&negotiation)?;
        Ok(filter.apply(tx.contributions(&negotiation)?))
    }

    /// One contribution, which must belong to the filtered negotiation.
    pub fn retrieve_contribution(
        &self,
        id: u64,
        negotiation: Option<&str>,
    ) -> Result<Contribution, CoreError> {
        let negotiation = require_negotiation(negotiation)?;
        let mut tx = self.store.begin()?;
        tx.contributions(&negotiation)?
            .into_iter()
            .find(|c| c.id == id)
            .ok_or_else(|| CoreError::NotFound(format!("contribution {id} in {negotiation}")))
    }

    /// One peer.
    pub fn retrieve_peer(&self, id: &PeerId) -> Result<Peer, CoreError> {
        let mut tx = self.store.begin()?;
        Ok(tx.peer(id)?)
    }

    /// One endpoint.
    pub fn retrieve_endpoint(&self, id: &EndpointId) -> Result<Endpoint, CoreError> {
        let mut tx = self.store.begin()?;
        Ok(tx.endpoint(id)?)
    }
}

fn require_negotiation(negotiation: Option<&str>) -> Result<NegotiationId, CoreError> {
    match negotiation {
        Some(reference) if !reference.is_empty() => negotiation_ref(reference),
        _ => Err(CoreError::Unauthorized("must filter by negotiation".into())),
    }
}
