//! HTTP API for the provenance service.
//!
//! A thin adapter: every route delegates to one
//! [`ProvenanceService`](prov_anchor::ProvenanceService) operation. No
//! authentication, rate limiting, or TLS; bind to loopback or front it with
//! a proxy that provides them.

pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use handler::AppState;
pub use server::ProvServer;
