//! kvlookup - a REST facade for key/value lookups over Cloud Bigtable
//!
//! One process serves several Bigtable instances of a single project. Each
//! instance gets its admin and data clients at startup; requests name the
//! instance in their path.

pub mod bigtable;
pub mod cli;
pub mod config;
pub mod errors;
pub mod http_server;
pub mod model;
pub mod observability;
pub mod operations;
pub mod registry;
pub mod service;
