//! kvlookup entry point
//!
//! Parses arguments, runs the selected command and exits non-zero on failure.
//! All logic lives in the CLI module.

use kvlookup::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
