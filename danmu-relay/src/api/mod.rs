//! Consumer-facing HTTP API.
//!
//! Read access to the retention buffer and intake statistics, plus
//! health and logging endpoints.

pub mod error;
pub mod routes;
pub mod server;

pub use server::{ApiServer, ApiServerConfig, AppState};
