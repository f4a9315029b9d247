use accord_canonical::{ConsensusId, EndpointId, MessageHash, PeerId};
use accord_core::{
    check_permission, CoreError, CycleStatus, Endpoint, EndpointCycle, Peer, PeerStatus,
    Signings, Transaction, Transition,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::{Context, Handler, CREATE, PARTIAL_UPDATE};
use crate::envelope::{Caller, Request};

const ENDPOINT: &str = "endpoint";

/// Endpoint creation payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointData {
    /// New endpoint identity.
    pub endpoint_id: EndpointId,
    /// Owning peer.
    pub peer_id: PeerId,
    /// Must be `OPEN`.
    pub status: CycleStatus,
    /// Minimum accepted message count.
    pub size_min: u32,
    /// Maximum accepted message count.
    pub size_max: u32,
}

/// Message hash entry of an update payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashRef {
    /// Message content hash.
    pub hash: MessageHash,
}

/// Endpoint transition payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointUpdateData {
    /// `CLOSED` or `PROCESSED`.
    pub status: CycleStatus,
    /// Messages the transition covers.
    #[serde(default)]
    pub message_hashes: Vec<HashRef>,
    /// Opaque proof recorded on processing.
    #[serde(default)]
    pub process_proof: Option<Value>,
}

impl EndpointUpdateData {
    fn into_transition(self) -> Result<Transition, CoreError> {
        let hashes = self.message_hashes.into_iter().map(|h| h.hash).collect();
        match self.status {
            CycleStatus::Closed => Ok(Transition::Close { hashes }),
            CycleStatus::Processed => Ok(Transition::Process {
                hashes,
                proof: self.process_proof,
            }),
            other => Err(CoreError::Validation(format!("invalid status {other:?}"))),
        }
    }
}

/// The peer must be READY; then the owner/self rule applies to the signings.
fn check_peer(peer: &Peer, signings: &Signings, caller: &Caller) -> Result<(), CoreError> {
    if peer.status != PeerStatus::Ready {
        return Err(CoreError::Unauthorized(format!(
            "peer {} is not in state READY",
            peer.peer_id
        )));
    }
    check_permission(&peer.peer_id, &peer.owners, signings, &caller.peer_id)
}

/// Creates an endpoint for a READY peer under a structural consensus.
pub struct CreateEndpoint;

impl Handler for CreateEndpoint {
    type Data = EndpointData;
    type Grant = ConsensusId;
    type Output = Endpoint;

    const OPERATION: &'static str = CREATE;
    const RESOURCE: &'static str = ENDPOINT;

    fn validate(&self, _ctx: &Context<'_>, request: &Request<EndpointData>) -> Result<(), CoreError> {
        let data = &request.data;
        if data.status != CycleStatus::Open {
            return Err(CoreError::Validation("unexpected status".into()));
        }
        if data.size_min > data.size_max {
            return Err(CoreError::Validation(format!(
                "size_min {} exceeds size_max {}",
                data.size_min, data.size_max
            )));
        }
        Ok(())
    }

    fn authorize(
        &self,
        ctx: &Context<'_>,
        tx: &mut dyn Transaction,
        caller: &Caller,
        request: &Request<EndpointData>,
    ) -> Result<ConsensusId, CoreError> {
        let (consensus, signings) = ctx.authorize_structural(tx, request)?;
        let peer = tx.lock_peer(&request.data.peer_id)?;
        check_peer(&peer, &signings, caller)?;
        Ok(consensus)
    }

    fn apply(
        &self,
        _ctx: &Context<'_>,
        tx: &mut dyn Transaction,
        _caller: &Caller,
        request: Request<EndpointData>,
        consensus: ConsensusId,
    ) -> Result<Endpoint, CoreError> {
        let data = request.data;
        let endpoint = Endpoint {
            endpoint_id: data.endpoint_id,
            peer_id: data.peer_id,
            status: data.status,
            size_min: data.size_min,
            size_max: data.size_max,
            inbox_hash: None,
            outbox_hash: None,
            process_proof: None,
            last_consensus_id: Some(consensus),
        };
        tx.insert_endpoint(endpoint.clone())?;
        info!(
            endpoint = %endpoint.endpoint_id,
            peer = %endpoint.peer_id,
            size_min = endpoint.size_min,
            size_max = endpoint.size_max,
            "endpoint created"
        );
        Ok(endpoint)
    }
}

/// Closes or processes an endpoint under a structural consensus.
///
/// `info.on_last_consensus_id` must name the consensus behind the endpoint's
/// previous change, so a transition decided on stale state is refused.
pub struct UpdateEndpoint {
    /// Endpoint addressed by the call.
    pub endpoint_id: EndpointId,
}

impl Handler for UpdateEndpoint {
    type Data = EndpointUpdateData;
    type Grant = (Endpoint, ConsensusId);
    type Output = Endpoint;

    const OPERATION: &'static str = PARTIAL_UPDATE;
    const RESOURCE: &'static str = ENDPOINT;

    fn validate(
        &self,
        _ctx: &Context<'_>,
        request: &Request<EndpointUpdateData>,
    ) -> Result<(), CoreError> {
        match request.data.status {
            CycleStatus::Closed | CycleStatus::Processed => Ok(()),
            other => Err(CoreError::Validation(format!("invalid status {other:?}"))),
        }
    }

    fn authorize(
        &self,
        ctx: &Context<'_>,
        tx: &mut dyn Transaction,
        caller: &Caller,
        request: &Request<EndpointUpdateData>,
    ) -> Result<(Endpoint, ConsensusId), CoreError> {
        request.require_consensus()?;
        let expected_last = request.info.on_last_consensus_id.as_ref().ok_or_else(|| {
            CoreError::Unauthorized(
                "cannot update endpoint without reference to last consensus id".into(),
            )
        })?;
        if request.info.id.as_deref() != Some(self.endpoint_id.as_str()) {
            return Err(CoreError::Conflict("endpoint_id mismatch".into()));
        }

        let endpoint = tx.lock_endpoint(&self.endpoint_id)?;
        if endpoint.last_consensus_id.as_ref() != Some(expected_last) {
            return Err(CoreError::Conflict("condition on consensus_id failed".into()));
        }

        let (consensus, signings) = ctx.authorize_structural(tx, request)?;
        let peer = tx.peer(&endpoint.peer_id)?;
        check_peer(&peer, &signings, caller)?;
        Ok((endpoint, consensus))
    }

    fn apply(
        &self,
        _ctx: &Context<'_>,
        tx: &mut dyn Transaction,
        _caller: &Caller,
        request: Request<EndpointUpdateData>,
        (mut endpoint, consensus): (Endpoint, ConsensusId),
    ) -> Result<Endpoint, CoreError> {
        let transition = request.data.into_transition()?;
        EndpointCycle::apply(tx, &mut endpoint, transition, &consensus)?;
        Ok(endpoint)
    }
}
