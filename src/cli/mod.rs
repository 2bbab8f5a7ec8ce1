//! CLI module for kvlookup
//!
//! Provides command-line interface for:
//! - serve: load configuration and run the HTTP server
//! - create-instance: provision a Bigtable instance

mod args;
mod commands;
mod errors;

pub use args::{Cli, Command};
pub use commands::{build_service, create_instance, run, run_command, serve};
pub use errors::{CliError, CliErrorCode, CliResult};
