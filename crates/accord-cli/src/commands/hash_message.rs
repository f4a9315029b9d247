//! Hash-message command implementation.

use accord_core::hash_message;

use super::CmdResult;

pub fn run(text: &str, sender: &str, recipient: &str) -> CmdResult {
    println!("{}", hash_message(text, sender, recipient));
    Ok(())
}
