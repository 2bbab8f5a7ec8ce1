//! # Bigtable Clients
//!
//! Admin and data handles over a Bigtable deployment, plus the connectors
//! that build them:
//! - [`MemoryConnector`]: in-process deployment for local runs and tests
//! - [`RestConnector`]: the Bigtable v2 REST/JSON API

pub mod auth;
pub mod chunks;
pub mod client;
pub mod errors;
pub mod memory;
pub mod rest;

pub use auth::TokenSource;
pub use client::{
    BigtableConnector, CreateInstanceRequest, DataClient, InstanceAdmin, Row, RowCell,
    RowMutation, SetCell, TableAdmin,
};
pub use errors::{BigtableError, BigtableResult};
pub use memory::{MemoryBigtable, MemoryConnector};
pub use rest::{RestConnector, RestSettings};
