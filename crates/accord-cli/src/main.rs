//! Accord CLI - offline tooling for proposals, signatures and commitments.

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{canonicalize, commit, consensus_hash, hash_message, keygen, sign};

#[derive(Parser)]
#[command(name = "accord")]
#[command(about = "Accord negotiation and endpoint tooling")]
struct Cli {
    /// Log filter when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
    /// Canonicalization profile
    #[arg(long, global = true, default_value = "accord-canonical-v1")]
    profile: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show canonical bytes for input JSON
    Canonicalize {
        /// Input JSON file (or stdin if not provided)
        input: Option<String>,
    },
    /// Generate an ed25519 key
    Keygen {
        /// 32-byte seed as hex, for reproducible keys
        #[arg(long)]
        seed: Option<String>,
    },
    /// Canonicalize a proposal and sign it as a contribution
    Sign {
        /// Base64url secret from `keygen`
        #[arg(long)]
        secret: String,
        /// Proposal JSON file (or stdin if not provided)
        input: Option<String>,
    },
    /// Compute a message content hash
    HashMessage {
        /// Message body
        #[arg(long)]
        text: String,
        /// Sender identity
        #[arg(long)]
        sender: String,
        /// Recipient identity
        #[arg(long)]
        recipient: String,
    },
    /// Compute the commitment over a set of message hashes
    Commit {
        /// Message hashes (order and duplicates do not matter)
        #[arg(required = true)]
        hashes: Vec<String>,
    },
    /// Recompute the hash of a consensus record
    ConsensusHash {
        /// Consensus record JSON file (or stdin if not provided)
        input: Option<String>,
    },
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let profile = cli.profile;
    let result = match cli.command {
        Commands::Canonicalize { input } => canonicalize::run(&profile, input),
        Commands::Keygen { seed } => keygen::run(seed),
        Commands::Sign { secret, input } => sign::run(&profile, &secret, input),
        Commands::HashMessage {
            text,
            sender,
            recipient,
        } => hash_message::run(&text, &sender, &recipient),
        Commands::Commit { hashes } => commit::run(hashes),
        Commands::ConsensusHash { input } => consensus_hash::run(&profile, input),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
