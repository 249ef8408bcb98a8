//! Command-line configuration.

use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::aggregator::{OwnershipPolicy, DEFAULT_MAX_BATCH_ROWS};

#[derive(Parser, Debug)]
#[command(name = "ehr-sync-server")]
#[command(about = "Central aggregator for offline-first EHR sync", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP server
    Serve(ServeArgs),
    /// Print a signed bearer token for a worker
    MintToken(MintTokenArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Port to listen on
    #[arg(short, long, default_value_t = 3000)]
    pub port: u16,

    /// Central database path
    #[arg(long, default_value = "./central.db")]
    pub database: String,

    /// How ownership of a patient uploaded by several workers is settled
    #[arg(long, value_enum, default_value_t = OwnershipPolicy::LastWriterWins)]
    pub ownership_policy: OwnershipPolicy,

    /// Largest batch accepted in one upload, in rows
    #[arg(long, default_value_t = DEFAULT_MAX_BATCH_ROWS)]
    pub max_batch_rows: usize,
}

#[derive(Args, Debug, Clone)]
pub struct MintTokenArgs {
    /// Worker id the token authenticates
    #[arg(long)]
    pub worker: String,

    #[arg(long, default_value = "asha")]
    pub role: String,

    /// Token lifetime in hours
    #[arg(long, default_value_t = 24)]
    pub ttl_hours: u64,
}

impl MintTokenArgs {
    /// Token lifetime; absurd hour counts saturate instead of overflowing.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_hours.saturating_mul(3600))
    }
}
