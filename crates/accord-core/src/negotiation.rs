//! Contribution intake, convergence detection and consensus sealing.
//!
//! A negotiation closes when every signer's latest contribution carries the
//! same text and that text's `meta.accept` is `true`. Closing freezes one
//! [`Signing`] per contributor and computes
//! `sha256(canonical({timestamp, negotiation_id, text, signings}))`.

use accord_canonical::{Canonicalizer, ConsensusId, HexDigest, NegotiationId, PeerId};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

use crate::clock::Clock;
use crate::errors::CoreError;
use crate::model::{
    ConsensusRecord, Contribution, Negotiation, NegotiationStatus, NewContribution, Signing,
};
use crate::signature::SignatureVerifier;
use crate::store::Transaction;

/// Signed proposal as submitted by a signer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ContributionSubmission {
    /// Proposed canonical text.
    pub text: String,
    /// Signature over `text`.
    pub signature: String,
    /// Identity the submitter claims to sign as.
    pub signer_key_id: PeerId,
}

/// Renders the sealing instant the way it enters the consensus hash.
pub fn format_timestamp(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Computes the consensus hash of a sealed negotiation.
pub fn compute_consensus_hash(
    canonicalizer: &Canonicalizer,
    timestamp: &str,
    negotiation_id: &NegotiationId,
    text: &str,
    signings: &BTreeMap<PeerId, String>,
) -> Result<ConsensusId, CoreError> {
    let hashable = json!({
        "timestamp": timestamp,
        "negotiation_id": negotiation_id,
        "text": text,
        "signings": signings,
    });
    let bytes = canonicalizer.canonicalize(&hashable)?;
    Ok(HexDigest::of(bytes).into())
}

fn accepted(document: &Map<String, Value>) -> bool {
    document
        .get("meta")
        .and_then(|meta| meta.get("accept"))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// The single text every contribution agrees on, if any.
fn unanimous_text(contributions: &[Contribution]) -> Option<&str> {
    let texts: BTreeSet<&str> = contributions.iter().map(|c| c.text.as_str()).collect();
    if texts.len() == 1 {
        texts.into_iter().next()
    } else {
        None
    }
}

/// Negotiation lifecycle over a transactional context.
pub struct NegotiationEngine<'a> {
    canonicalizer: &'a Canonicalizer,
    verifier: &'a dyn SignatureVerifier,
    clock: &'a dyn Clock,
}

impl<'a> NegotiationEngine<'a> {
    /// Builds an engine from its collaborators.
    pub fn new(
        canonicalizer: &'a Canonicalizer,
        verifier: &'a dyn SignatureVerifier,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            canonicalizer,
            verifier,
            clock,
        }
    }

    /// Accepts a signed contribution and seals the negotiation if it converged.
    ///
    /// `negotiation` must have been loaded with [`Transaction::lock_negotiation`].
    /// `key_material` is the submitter's public key when known; otherwise the
    /// signer is recovered from the verifier's registry.
    pub fn contribute<T: Transaction + ?Sized>(
        &self,
        tx: &mut T,
        negotiation: &mut Negotiation,
        submission: ContributionSubmission,
        key_material: Option<&str>,
    ) -> Result<Contribution, CoreError> {
        if !negotiation.is_open() {
            return Err(CoreError::InvalidState(format!(
                "negotiation {} is not open",
                negotiation.id
            )));
        }

        let verification = self.verifier.verify(
            submission.text.as_bytes(),
            &submission.signature,
            key_material,
        )?;
        if !verification.valid {
            return Err(CoreError::Unauthorized(
                "contribution's signature is not valid".into(),
            ));
        }
        if verification.signer.as_ref() != Some(&submission.signer_key_id) {
            return Err(CoreError::Unauthorized("signer_key_id mismatch".into()));
        }

        // Closure decodes the text; reject undecodable proposals before writing.
        self.canonicalizer.decode_object(&submission.text)?;

        let superseded = tx.supersede_contributions(&negotiation.id, &submission.signer_key_id)?;
        let contribution = tx.insert_contribution(NewContribution {
            negotiation: negotiation.id.clone(),
            signer_key_id: submission.signer_key_id,
            text: submission.text,
            signature: submission.signature,
        })?;
        debug!(
            negotiation = %negotiation.id,
            signer = %contribution.signer_key_id,
            superseded,
            "contribution accepted"
        );

        self.check_close(tx, negotiation)?;
        Ok(contribution)
    }

    /// Seals the negotiation when all latest contributions agree on an accepted text.
    ///
    /// Returns the consensus id when sealing happened.
    pub fn check_close<T: Transaction + ?Sized>(
        &self,
        tx: &mut T,
        negotiation: &mut Negotiation,
    ) -> Result<Option<ConsensusId>, CoreError> {
        let latest = tx.latest_contributions(&negotiation.id)?;
        let Some(text) = unanimous_text(&latest) else {
            return Ok(None);
        };
        let document = self.canonicalizer.decode_object(text)?;
        if !accepted(&document) {
            return Ok(None);
        }
        self.seal(tx, negotiation, &latest).map(Some)
    }

    /// Freezes the unanimous text and signings and computes the consensus hash.
    ///
    /// One-shot: an already sealed negotiation is rejected.
    pub fn seal<T: Transaction + ?Sized>(
        &self,
        tx: &mut T,
        negotiation: &mut Negotiation,
        contributions: &[Contribution],
    ) -> Result<ConsensusId, CoreError> {
        if negotiation.status == NegotiationStatus::Done || negotiation.consensus.is_some() {
            return Err(CoreError::InvalidState(format!(
                "negotiation {} is already sealed",
                negotiation.id
            )));
        }
        let text = unanimous_text(contributions)
            .ok_or_else(|| CoreError::InvalidState("contributions do not agree".into()))?
            .to_string();

        let signings: BTreeMap<PeerId, String> = contributions
            .iter()
            .map(|c| (c.signer_key_id.clone(), c.signature.clone()))
            .collect();
        tx.insert_signings(
            signings
                .iter()
                .map(|(signer, signature)| Signing {
                    negotiation: negotiation.id.clone(),
                    signer_key_id: signer.clone(),
                    signature: signature.clone(),
                })
                .collect(),
        )?;

        let now = self.clock.now();
        let consensus = compute_consensus_hash(
            self.canonicalizer,
            &format_timestamp(&now),
            &negotiation.id,
            &text,
            &signings,
        )?;

        negotiation.text = Some(text);
        negotiation.timestamp = Some(now);
        negotiation.consensus = Some(consensus.clone());
        negotiation.status = NegotiationStatus::Done;
        tx.update_negotiation(negotiation)?;

        info!(
            negotiation = %negotiation.id,
            consensus = %consensus,
            signers = signings.len(),
            "negotiation sealed"
        );
        Ok(consensus)
    }
}

impl ConsensusRecord {
    /// Builds the public view of a sealed negotiation.
    pub fn from_sealed(negotiation: &Negotiation, signings: &[Signing]) -> Result<Self, CoreError> {
        let (Some(consensus), Some(text), Some(timestamp)) = (
            negotiation.consensus.clone(),
            negotiation.text.clone(),
            negotiation.timestamp.as_ref(),
        ) else {
            return Err(CoreError::InvalidState(format!(
                "negotiation {} is not sealed",
                negotiation.id
            )));
        };
        Ok(Self {
            negotiation_id: negotiation.id.clone(),
            consensus,
            text,
            timestamp: format_timestamp(timestamp),
            signings: signings
                .iter()
                .map(|s| (s.signer_key_id.clone(), s.signature.clone()))
                .collect(),
        })
    }

    /// Recomputes the hash from the record's fields.
    pub fn recompute_hash(&self, canonicalizer: &Canonicalizer) -> Result<ConsensusId, CoreError> {
        compute_consensus_hash(
            canonicalizer,
            &self.timestamp,
            &self.negotiation_id,
            &self.text,
            &self.signings,
        )
    }
}
