//! Append-only content-hash log.
//!
//! The log is an ordered, deduplicated sequence of [`Digest`]s. Order is
//! significant: the anchored Merkle root is computed over it as-is.
//!
//! Two backends are provided:
//! - [`FileHashLog`] — JSON array of hex digests, replaced atomically on write
//! - [`InMemoryHashLog`] — for tests and embedding
//!
//! Both assume a single writer. [`FileHashLog`] serializes writers inside one
//! process; separate processes sharing a log file must coordinate externally.

pub mod error;
pub mod file;
pub mod memory;
pub mod traits;

pub use error::{LogError, LogResult};
pub use file::FileHashLog;
pub use memory::InMemoryHashLog;
pub use traits::HashLog;

pub use prov_types::Digest;
