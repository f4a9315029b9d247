//! Command implementations.

use accord_canonical::{Canonicalizer, ProfileId};
use std::io::{self, Read};

pub mod canonicalize;
pub mod commit;
pub mod consensus_hash;
pub mod hash_message;
pub mod keygen;
pub mod sign;

/// Command result; errors are printed by `main`.
pub type CmdResult = Result<(), Box<dyn std::error::Error>>;

fn canonicalizer(profile: &str) -> Result<Canonicalizer, Box<dyn std::error::Error>> {
    let profile = ProfileId::parse(profile).map_err(|e| format!("Invalid profile ID: {}", e))?;
    Ok(Canonicalizer::new(profile))
}

/// Reads a file, or stdin when no path is given.
fn read_input(input: Option<String>) -> Result<String, Box<dyn std::error::Error>> {
    if let Some(path) = input {
        Ok(std::fs::read_to_string(&path)
            .map_err(|e| format!("Failed to read file {}: {}", path, e))?)
    } else {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    }
}
