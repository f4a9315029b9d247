//! Commit command implementation.

use accord_canonical::MessageHash;
use accord_core::compute_messages_hash;

use super::CmdResult;

pub fn run(hashes: Vec<String>) -> CmdResult {
    let hashes = hashes
        .into_iter()
        .map(|h| MessageHash::parse(h).map_err(|e| format!("Invalid message hash: {}", e)))
        .collect::<Result<Vec<_>, _>>()?;
    println!("{}", compute_messages_hash(&hashes));
    Ok(())
}
