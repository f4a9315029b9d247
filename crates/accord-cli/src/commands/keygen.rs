//! Keygen command implementation.

use accord_core::Ed25519Signer;
use serde_json::json;

use super::CmdResult;
use crate::output::format_json;

pub fn run(seed: Option<String>) -> CmdResult {
    let signer = match seed {
        Some(seed) => {
            let bytes = hex::decode(&seed).map_err(|e| format!("Invalid seed: {}", e))?;
            let seed: [u8; 32] = bytes
                .try_into()
                .map_err(|_| "Invalid seed: expected 32 bytes")?;
            Ed25519Signer::from_seed(seed)
        }
        None => Ed25519Signer::generate(),
    };

    let key = json!({
        "key_id": signer.key_id(),
        "key_data": signer.key_data(),
        "secret": signer.secret(),
    });
    println!("{}", format_json(&key));
    Ok(())
}
