//! Provenance anchoring service.
//!
//! [`ProvenanceService`] is the composition root: it owns one [`KeyManager`]
//! shared by the signer and verifier, the hash log, and the ledger client,
//! and exposes the logical operations (sign, verify, publish the public key,
//! ingest, record, anchor, prove inclusion).
//!
//! [`AnchorCoordinator`] runs one anchoring cycle (load log, compute root,
//! submit) and [`AnchorScheduler`] repeats it on an interval.
//!
//! [`KeyManager`]: prov_crypto::KeyManager

pub mod config;
pub mod coordinator;
pub mod error;
pub mod scheduler;
pub mod service;

pub use config::ServiceConfig;
pub use coordinator::{AnchorCoordinator, AnchorReport, BatchSummary};
pub use error::{AnchorError, AnchorResult};
pub use scheduler::{AnchorScheduler, SchedulerSummary};
pub use service::{ProvenanceRecord, ProvenanceService, PublishReport, RootSummary, SignedDigest};
