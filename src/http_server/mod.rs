//! # HTTP Server Module
//!
//! axum server exposing the lookup API.
//!
//! # Endpoints
//!
//! - `/health` - Health check
//! - `/v1/{instanceID}/readCellData` - Read the configured cell of a row
//! - `/v1/{instanceID}/createTable` - Create a table
//! - `/v1/{instanceID}/deleteTable` - Delete tables
//! - `/v1/{instanceID}/insertData` - Write cells to a row
//! - `/v1/{instanceID}/countRows` - Count rows up to a limit

pub mod config;
pub mod errors;
pub mod lookup_routes;
pub mod observability_routes;
pub mod server;

pub use config::{HttpConfigError, HttpServerConfig};
pub use errors::{ApiError, ApiResult};
pub use server::{build_router, HttpServer};
