use std::sync::{Mutex, PoisonError};

use prov_types::Digest;

use crate::error::LogResult;
use crate::traits::{check_extends, HashLog};

/// In-process hash log. Contents are lost on drop.
#[derive(Debug, Default)]
pub struct InMemoryHashLog {
    entries: Mutex<Vec<Digest>>,
}

impl InMemoryHashLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the log. Duplicates after the first occurrence are dropped.
    pub fn with_entries(entries: impl IntoIterator<Item = Digest>) -> Self {
        let log = Self::new();
        {
            let mut guard = log.entries.lock().unwrap_or_else(PoisonError::into_inner);
            for digest in entries {
                if !guard.contains(&digest) {
                    guard.push(digest);
                }
            }
        }
        log
    }
}

impl HashLog for InMemoryHashLog {
    fn load(&self) -> LogResult<Vec<Digest>> {
        Ok(self.entries.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn append_if_absent(&self, digest: Digest) -> LogResult<bool> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.contains(&digest) {
            return Ok(false);
        }
        entries.push(digest);
        Ok(true)
    }

    fn save(&self, next: &[Digest]) -> LogResult<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        check_extends(&entries, next)?;
        *entries = next.to_vec();
        Ok(())
    }

    fn len(&self) -> LogResult<usize> {
        Ok(self.entries.lock().unwrap_or_else(PoisonError::into_inner).len())
    }
}
