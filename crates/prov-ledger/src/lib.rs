//! Ledger write path for provenance anchoring.
//!
//! The external ledger is addressed through one narrow operation: submit
//! method `M` with text arguments to ledger object `C`, get back a raw result
//! or an error. This crate provides:
//! - [`LedgerSettings`] and the [`ConfigSource`] trait, resolved on every call
//! - [`LedgerCall`] wire encoding
//! - the [`LedgerTransport`] boundary and its reqwest-backed [`HttpTransport`]
//! - [`LedgerClient`], which degrades to dry-run when unconfigured and
//!   otherwise retries with exponential backoff, interruptible by a
//!   [`CancellationToken`]
//!
//! Delivery is at-least-once: a retried attempt may repeat a ledger-side
//! effect unless the ledger dedupes by batch id.

pub mod client;
pub mod config;
pub mod encoding;
pub mod error;
pub mod http;
pub mod result;
pub mod traits;

pub use client::LedgerClient;
pub use config::{
    ConfigSource, EnvConfig, LedgerConfigState, LedgerSettings, LedgerTarget, RetryPolicy,
    StaticConfig, TomlFileConfig,
};
pub use encoding::{EncodedCall, LedgerCall, MAX_ARG_BYTES};
pub use error::{LedgerError, LedgerResult};
pub use http::HttpTransport;
pub use result::{FailureKind, LedgerWriteResult, Outcome, SubmissionState};
pub use traits::LedgerTransport;

pub use tokio_util::sync::CancellationToken;
