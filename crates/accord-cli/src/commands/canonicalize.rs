//! Canonicalize command implementation.

use serde_json::Value;
use tracing::debug;

use super::{canonicalizer, read_input, CmdResult};

pub fn run(profile: &str, input: Option<String>) -> CmdResult {
    let canonicalizer = canonicalizer(profile)?;
    let json_str = read_input(input)?;

    let value: Value =
        serde_json::from_str(&json_str).map_err(|e| format!("Invalid JSON: {}", e))?;

    let text = canonicalizer
        .canonical_text(&value)
        .map_err(|e| format!("Canonicalization failed: {}", e))?;
    debug!(bytes = text.len(), "canonicalized");

    println!("{}", text);
    Ok(())
}
