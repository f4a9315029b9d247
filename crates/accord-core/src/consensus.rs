use accord_canonical::{Canonicalizer, ConsensusId, PeerId};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

use crate::errors::CoreError;
use crate::model::ConsensusRecord;
use crate::store::Transaction;

/// Signer key id → signature over the sealed text.
pub type Signings = BTreeMap<PeerId, String>;

/// Checks that a sealed consensus approves one specific requested change.
pub struct ConsensusAuthorizer<'a> {
    canonicalizer: &'a Canonicalizer,
}

impl<'a> ConsensusAuthorizer<'a> {
    /// Builds an authorizer.
    pub fn new(canonicalizer: &'a Canonicalizer) -> Self {
        Self { canonicalizer }
    }

    /// Loads the public record of a sealed consensus.
    pub fn retrieve<T: Transaction + ?Sized>(
        &self,
        tx: &mut T,
        consensus_id: &ConsensusId,
    ) -> Result<ConsensusRecord, CoreError> {
        let negotiation = tx
            .negotiation_by_consensus(consensus_id)?
            .ok_or_else(|| CoreError::NotFound(format!("consensus {consensus_id}")))?;
        let signings = tx.signings(&negotiation.id)?;
        ConsensusRecord::from_sealed(&negotiation, &signings)
    }

    /// Verifies that `consensus_id` seals exactly `expected_body`, was accepted,
    /// and carries the signers its `meta.signers` demands.
    ///
    /// Returns the signings for downstream permission checks.
    pub fn authorize<T: Transaction + ?Sized>(
        &self,
        tx: &mut T,
        expected_body: &Value,
        consensus_id: &ConsensusId,
    ) -> Result<Signings, CoreError> {
        let record = self.retrieve(tx, consensus_id)?;
        let document = self.canonicalizer.decode_object(&record.text)?;

        let body = document
            .get("body")
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()));
        if !self.canonicalizer.equivalent(expected_body, &body)? {
            warn!(consensus = %consensus_id, "consensus body does not match request");
            return Err(CoreError::Conflict("different consensus texts".into()));
        }

        let empty = Map::new();
        let meta = document
            .get("meta")
            .and_then(Value::as_object)
            .unwrap_or(&empty);
        if meta.get("accept").and_then(Value::as_bool) != Some(true) {
            return Err(CoreError::InvalidState("not an accepted text".into()));
        }

        check_all_signed(&record.signings, meta)?;
        Ok(record.signings)
    }
}

fn check_all_signed(signings: &Signings, meta: &Map<String, Value>) -> Result<(), CoreError> {
    let required = match meta.get("signers") {
        None | Some(Value::Null) => return Ok(()),
        Some(Value::Array(items)) if items.is_empty() => return Ok(()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(PeerId::new)
                    .ok_or_else(|| CoreError::Validation("meta.signers must hold strings".into()))
            })
            .collect::<Result<BTreeSet<_>, _>>()?,
        Some(_) => return Err(CoreError::Validation("meta.signers must be a list".into())),
    };
    let actual: BTreeSet<PeerId> = signings.keys().cloned().collect();
    if required != actual {
        return Err(CoreError::Unauthorized("no proper set of signatures".into()));
    }
    Ok(())
}
