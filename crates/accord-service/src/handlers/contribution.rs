use accord_core::{
    Contribution, ContributionSubmission, CoreError, Negotiation, NegotiationEngine, Transaction,
};
use serde::Deserialize;

use super::{Context, Handler, CREATE};
use crate::envelope::{negotiation_ref, Caller, Request};

/// Contribution payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ContributionData {
    /// Target negotiation, by id or href.
    pub negotiation: String,
    /// Signed proposal.
    #[serde(flatten)]
    pub submission: ContributionSubmission,
}

/// Adds a signed proposal to an open negotiation, sealing it on convergence.
///
/// The caller's presented key material, when any, is used to verify the
/// signature; otherwise the signer is recovered from registered keys.
pub struct CreateContribution;

impl Handler for CreateContribution {
    type Data = ContributionData;
    type Grant = Negotiation;
    type Output = Contribution;

    const OPERATION: &'static str = CREATE;
    const RESOURCE: &'static str = "contribution";

    fn validate(
        &self,
        ctx: &Context<'_>,
        request: &Request<ContributionData>,
    ) -> Result<(), CoreError> {
        negotiation_ref(&request.data.negotiation)?;
        ctx.canonicalizer
            .decode_object(&request.data.submission.text)
            .map_err(|e| CoreError::Validation(format!("contribution text: {e}")))?;
        Ok(())
    }

    fn authorize(
        &self,
        _ctx: &Context<'_>,
        tx: &mut dyn Transaction,
        _caller: &Caller,
        request: &Request<ContributionData>,
    ) -> Result<Negotiation, CoreError> {
        let id = negotiation_ref(&request.data.negotiation)?;
        Ok(tx.lock_negotiation(&id)?)
    }

    fn apply(
        &self,
        ctx: &Context<'_>,
        tx: &mut dyn Transaction,
        caller: &Caller,
        request: Request<ContributionData>,
        mut negotiation: Negotiation,
    ) -> Result<Contribution, CoreError> {
        NegotiationEngine::new(ctx.canonicalizer, ctx.verifier, ctx.clock).contribute(
            tx,
            &mut negotiation,
            request.data.submission,
            caller.key_data.as_deref(),
        )
    }
}
