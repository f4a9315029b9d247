use accord_canonical::{ConsensusId, PeerId};
use accord_core::{check_permission, CoreError, Peer, PeerStatus, Transaction};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{Context, Handler, CREATE};
use crate::envelope::{Caller, Request};

/// Owner entry of a peer payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerRef {
    /// Owner identity.
    pub owner_key_id: PeerId,
}

/// Peer creation payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerData {
    /// New peer identity.
    pub peer_id: PeerId,
    /// Public key material to register.
    pub key_data: String,
    /// Must be `READY`.
    pub status: PeerStatus,
    /// Co-signers of future changes.
    #[serde(default)]
    pub owners: Vec<OwnerRef>,
}

impl PeerData {
    fn owner_ids(&self) -> Vec<PeerId> {
        self.owners.iter().map(|o| o.owner_key_id.clone()).collect()
    }
}

/// Registers a peer under a structural consensus.
pub struct CreatePeer;

impl Handler for CreatePeer {
    type Data = PeerData;
    type Grant = ConsensusId;
    type Output = Peer;

    const OPERATION: &'static str = CREATE;
    const RESOURCE: &'static str = "peer";

    fn validate(&self, _ctx: &Context<'_>, request: &Request<PeerData>) -> Result<(), CoreError> {
        if request.data.status != PeerStatus::Ready {
            return Err(CoreError::Validation("unexpected status".into()));
        }
        Ok(())
    }

    fn authorize(
        &self,
        ctx: &Context<'_>,
        tx: &mut dyn Transaction,
        caller: &Caller,
        request: &Request<PeerData>,
    ) -> Result<ConsensusId, CoreError> {
        let (consensus, signings) = ctx.authorize_structural(tx, request)?;
        check_permission(
            &request.data.peer_id,
            &request.data.owner_ids(),
            &signings,
            &caller.peer_id,
        )?;
        Ok(consensus)
    }

    fn apply(
        &self,
        ctx: &Context<'_>,
        tx: &mut dyn Transaction,
        _caller: &Caller,
        request: Request<PeerData>,
        consensus: ConsensusId,
    ) -> Result<Peer, CoreError> {
        let owners = request.data.owner_ids();
        let peer = Peer {
            peer_id: request.data.peer_id,
            key_data: request.data.key_data,
            status: request.data.status,
            owners,
            last_consensus_id: Some(consensus),
        };
        tx.insert_peer(peer.clone())?;
        let key_id = ctx.verifier.register_key(&peer.key_data)?;
        info!(peer = %peer.peer_id, key_id = %key_id, owners = peer.owners.len(), "peer created");
        Ok(peer)
    }
}
