//! Sign command implementation.
//!
//! Prints a contribution ready to submit: the canonical text of the proposal,
//! its signature, and the signer's key id.

use accord_core::Ed25519Signer;
use serde_json::json;
use tracing::{debug, warn};

use super::{canonicalizer, read_input, CmdResult};
use crate::output::format_json;

pub fn run(profile: &str, secret: &str, input: Option<String>) -> CmdResult {
    let canonicalizer = canonicalizer(profile)?;
    let signer = Ed25519Signer::from_secret(secret)?;

    let document = canonicalizer
        .decode_object(&read_input(input)?)
        .map_err(|e| format!("Invalid proposal: {}", e))?;
    if document.get("body").is_none() {
        warn!("proposal has no body; it cannot authorize a request");
    }

    let text = canonicalizer.canonical_text(&document.into())?;
    let contribution = json!({
        "text": text,
        "signature": signer.sign(text.as_bytes()),
        "signer_key_id": signer.key_id(),
    });
    debug!(signer = %signer.key_id(), "proposal signed");

    println!("{}", format_json(&contribution));
    Ok(())
}
