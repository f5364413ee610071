// CLI module for wiredcache
// Author: wiredFRONT contributors

use clap::{Parser, Subcommand};

/// wiredcache - inspect and maintain the wiredFRONT local message cache
#[derive(Parser, Debug)]
#[command(name = "wiredcache", version, about, long_about = None)]
pub struct Args {
    /// Config file (defaults to ~/.wiredcache/config.toml)
    #[arg(long, env = "WIREDCACHE_CONFIG")]
    pub config: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Show the cached record of a session
    Show {
        session_id: String,
    },
    /// Mark a session's record stale without deleting it
    Invalidate {
        session_id: String,
    },
    /// Deduplicate, reorder and trim a session's record
    Optimize {
        session_id: String,
    },
    /// Delete one session's record, or every record with --all
    Clear {
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        session_id: Option<String>,
        #[arg(long)]
        all: bool,
    },
    /// Delete records older than the TTL
    Prune,
    /// Print the persisted cache counters
    Stats {
        /// Reset the counters after printing
        #[arg(long)]
        reset: bool,
    },
    /// Print Prometheus metrics
    Metrics,
    /// Load a session through the cache, fetching from the remote store on a miss
    Sync {
        session_id: String,
        /// Invalidate first so the remote store is always consulted
        #[arg(long)]
        refresh: bool,
    },
}
