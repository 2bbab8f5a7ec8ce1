//! CLI argument definitions using clap
//!
//! Commands:
//! - kvlookup serve [--config <path>] [--port <port>]
//! - kvlookup create-instance [--config <path>] --instance <id> [--cluster <id>] [--zone <zone>]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// kvlookup - REST lookups over Cloud Bigtable
#[derive(Parser, Debug)]
#[command(name = "kvlookup")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP server
    Serve {
        /// Path to JSON configuration file; KVLOOKUP_* variables override it
        #[arg(long)]
        config: Option<PathBuf>,

        /// Port to listen on, overriding configuration
        #[arg(long)]
        port: Option<u16>,
    },

    /// Create a Bigtable instance if it does not exist
    CreateInstance {
        /// Path to JSON configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Instance id to create
        #[arg(long)]
        instance: String,

        /// Cluster id (default: "<instance>-c1")
        #[arg(long)]
        cluster: Option<String>,

        /// Zone for the cluster
        #[arg(long, default_value = "us-east4-a")]
        zone: String,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
