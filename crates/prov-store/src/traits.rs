use std::collections::HashSet;

use prov_types::Digest;

use crate::error::{LogError, LogResult};

/// Append-only, deduplicated, ordered log of content digests.
///
/// All implementations must satisfy these invariants:
/// - Entries are never reordered or removed; every persisted state is a
///   prefix of every later one.
/// - A digest appears at most once.
/// - A log that has never been written loads as empty.
/// - I/O errors are propagated, never silently turned into an empty log.
pub trait HashLog: Send + Sync {
    /// The full ordered sequence.
    fn load(&self) -> LogResult<Vec<Digest>>;

    /// Append `digest` unless it is already present.
    ///
    /// Returns `true` if an append occurred. The containment check is linear;
    /// a set-backed index would be needed for very large logs.
    fn append_if_absent(&self, digest: Digest) -> LogResult<bool>;

    /// Persist the full ordered sequence, replacing prior contents.
    ///
    /// Rejected unless `entries` extends the persisted sequence and is free
    /// of duplicates.
    fn save(&self, entries: &[Digest]) -> LogResult<()>;

    /// Number of logged digests.
    fn len(&self) -> LogResult<usize> {
        Ok(self.load()?.len())
    }

    fn is_empty(&self) -> LogResult<bool> {
        Ok(self.len()? == 0)
    }

    fn contains(&self, digest: &Digest) -> LogResult<bool> {
        Ok(self.load()?.contains(digest))
    }
}

/// Check that `next` is a duplicate-free extension of `current`.
pub(crate) fn check_extends(current: &[Digest], next: &[Digest]) -> LogResult<()> {
    if next.len() < current.len() {
        return Err(LogError::NotAppendOnly {
            reason: format!(
                "{} entries offered but {} already persisted",
                next.len(),
                current.len()
            ),
        });
    }
    if let Some(index) = current.iter().zip(next).position(|(a, b)| a != b) {
        return Err(LogError::NotAppendOnly {
            reason: format!("entry {index} differs from the persisted log"),
        });
    }
    let mut seen = HashSet::with_capacity(next.len());
    for digest in next {
        if !seen.insert(digest) {
            return Err(LogError::Duplicate(*digest));
        }
    }
    Ok(())
}
