use std::fmt;

use serde::{Deserialize, Serialize};

use crate::digest::Digest;
use crate::error::TypeError;

/// Maximum length of a batch identifier in bytes.
pub const MAX_BATCH_ID_LEN: usize = 128;

/// Identifier attached to one anchoring cycle.
///
/// Either supplied by the caller or generated as `batch-<uuid v7>`, which
/// keeps generated ids time-ordered.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BatchId(String);

impl BatchId {
    /// Generate a fresh, time-ordered batch id.
    pub fn generate() -> Self {
        Self(format!("batch-{}", uuid::Uuid::now_v7()))
    }

    /// Validate a caller-supplied batch id.
    ///
    /// Must be non-empty, at most [`MAX_BATCH_ID_LEN`] bytes, and free of
    /// whitespace and control characters.
    pub fn new(id: impl Into<String>) -> Result<Self, TypeError> {
        let id = id.into();
        if id.is_empty() {
            return Err(TypeError::InvalidBatchId("empty".into()));
        }
        if id.len() > MAX_BATCH_ID_LEN {
            return Err(TypeError::InvalidBatchId(format!(
                "longer than {MAX_BATCH_ID_LEN} bytes"
            )));
        }
        if id.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(TypeError::InvalidBatchId(
                "contains whitespace or control characters".into(),
            ));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::generate()
    }
}

impl fmt::Debug for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BatchId({})", self.0)
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for BatchId {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<BatchId> for String {
    fn from(id: BatchId) -> Self {
        id.0
    }
}

/// Ordered snapshot of the hash log at the moment of anchoring.
///
/// Built once per anchoring cycle and never mutated afterwards; a later cycle
/// over a grown log produces a new batch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorBatch {
    pub batch_id: BatchId,
    pub root: Digest,
    pub leaves: Vec<Digest>,
}

impl AnchorBatch {
    pub fn new(batch_id: BatchId, root: Digest, leaves: Vec<Digest>) -> Self {
        Self {
            batch_id,
            root,
            leaves,
        }
    }

    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
    }

    pub fn contains(&self, digest: &Digest) -> bool {
        self.leaves.contains(digest)
    }
}
