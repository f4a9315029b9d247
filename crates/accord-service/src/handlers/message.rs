use accord_canonical::{EndpointId, PeerId};
use accord_core::{CoreError, Endpoint, EndpointCycle, Message, MessageSubmission, Transaction};
use serde::Deserialize;

use super::{Context, Handler, CREATE};
use crate::envelope::{Caller, Request};

/// Message payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MessageData {
    /// Target endpoint.
    pub endpoint_id: EndpointId,
    /// Box, routing and body.
    #[serde(flatten)]
    pub submission: MessageSubmission,
}

/// Admits a message into an endpoint's INBOX or PROCESSBOX.
pub struct CreateMessage;

impl Handler for CreateMessage {
    type Data = MessageData;
    type Grant = (Endpoint, Vec<PeerId>);
    type Output = Message;

    const OPERATION: &'static str = CREATE;
    const RESOURCE: &'static str = "message";

    fn authorize(
        &self,
        _ctx: &Context<'_>,
        tx: &mut dyn Transaction,
        _caller: &Caller,
        request: &Request<MessageData>,
    ) -> Result<(Endpoint, Vec<PeerId>), CoreError> {
        let endpoint = tx.lock_endpoint(&request.data.endpoint_id)?;
        let owners = tx.peer(&endpoint.peer_id)?.owners;
        Ok((endpoint, owners))
    }

    fn apply(
        &self,
        _ctx: &Context<'_>,
        tx: &mut dyn Transaction,
        caller: &Caller,
        request: Request<MessageData>,
        (mut endpoint, owners): (Endpoint, Vec<PeerId>),
    ) -> Result<Message, CoreError> {
        EndpointCycle::admit(
            tx,
            &mut endpoint,
            request.data.submission,
            &caller.peer_id,
            &owners,
        )
    }
}
