//! Consensus-hash command implementation.

use accord_core::ConsensusRecord;
use serde_json::json;
use tracing::info;

use super::{canonicalizer, read_input, CmdResult};
use crate::output::format_json;

pub fn run(profile: &str, input: Option<String>) -> CmdResult {
    let canonicalizer = canonicalizer(profile)?;
    let record: ConsensusRecord = serde_json::from_str(&read_input(input)?)
        .map_err(|e| format!("Invalid consensus record: {}", e))?;

    let computed = record.recompute_hash(&canonicalizer)?;
    let matches = computed == record.consensus;
    info!(negotiation = %record.negotiation_id, matches, "consensus recomputed");

    let report = json!({
        "negotiation_id": record.negotiation_id,
        "computed": computed,
        "recorded": record.consensus,
        "matches": matches,
    });
    println!("{}", format_json(&report));

    if !matches {
        return Err("consensus hash mismatch".into());
    }
    Ok(())
}
