//! Foundation types for provenance anchoring.
//!
//! Every other `prov-*` crate depends on `prov-types`.
//!
//! # Key Types
//!
//! - [`Digest`] — 32-byte SHA-256 value, canonically rendered as lowercase hex
//! - [`BatchId`] — Identifier attached to one anchoring cycle
//! - [`AnchorBatch`] — Ordered snapshot of logged digests plus their Merkle root

pub mod batch;
pub mod digest;
pub mod error;

pub use batch::{AnchorBatch, BatchId};
pub use digest::{Digest, DIGEST_LEN};
pub use error::TypeError;
