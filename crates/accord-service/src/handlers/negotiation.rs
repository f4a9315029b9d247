use accord_canonical::NegotiationId;
use accord_core::{CoreError, Negotiation, Transaction};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use serde_json::Value;
use tracing::debug;

use super::{Context, Handler, CREATE};
use crate::envelope::{Caller, Request};

/// Fresh negotiation id: `len` random bytes, base64url without padding.
pub(crate) fn random_negotiation_id(len: usize) -> NegotiationId {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    NegotiationId::new(URL_SAFE_NO_PAD.encode(bytes))
}

/// Opens a negotiation under a random id. Needs no consensus.
pub struct CreateNegotiation;

impl Handler for CreateNegotiation {
    type Data = Value;
    type Grant = ();
    type Output = Negotiation;

    const OPERATION: &'static str = CREATE;
    const RESOURCE: &'static str = "negotiation";

    fn authorize(
        &self,
        _ctx: &Context<'_>,
        _tx: &mut dyn Transaction,
        _caller: &Caller,
        _request: &Request<Value>,
    ) -> Result<(), CoreError> {
        Ok(())
    }

    fn apply(
        &self,
        ctx: &Context<'_>,
        tx: &mut dyn Transaction,
        caller: &Caller,
        _request: Request<Value>,
        _grant: (),
    ) -> Result<Negotiation, CoreError> {
        let negotiation = Negotiation::open(random_negotiation_id(ctx.config.negotiation_id_bytes));
        tx.insert_negotiation(negotiation.clone())?;
        debug!(negotiation = %negotiation.id, caller = %caller.peer_id, "negotiation opened");
        Ok(negotiation)
    }
}
