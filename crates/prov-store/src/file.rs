use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use prov_types::Digest;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{LogError, LogResult};
use crate::traits::{check_extends, HashLog};

/// Hash log persisted as a JSON array of lowercase hex digests.
///
/// Every write replaces the file atomically: the new contents go to a
/// temporary file in the same directory, are fsynced, and renamed over the
/// old file, so a crash never leaves a truncated log behind.
pub struct FileHashLog {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl FileHashLog {
    /// Bind to `path`. Nothing is created until the first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> LogResult<Vec<Digest>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&text).map_err(|e| LogError::Corrupt {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    fn write_atomic(&self, entries: &[Digest]) -> LogResult<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let tmp = NamedTempFile::new_in(dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file());
            serde_json::to_writer_pretty(&mut writer, entries)
                .map_err(|e| LogError::Serialization(e.to_string()))?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| LogError::Io(e.error))?;
        Ok(())
    }
}

impl HashLog for FileHashLog {
    fn load(&self) -> LogResult<Vec<Digest>> {
        self.read()
    }

    fn append_if_absent(&self, digest: Digest) -> LogResult<bool> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.read()?;
        if entries.contains(&digest) {
            debug!(digest = %digest, "digest already logged");
            return Ok(false);
        }
        entries.push(digest);
        self.write_atomic(&entries)?;
        debug!(digest = %digest, len = entries.len(), "digest appended");
        Ok(true)
    }

    fn save(&self, entries: &[Digest]) -> LogResult<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.read()?;
        check_extends(&current, entries)?;
        self.write_atomic(entries)?;
        debug!(path = %self.path.display(), len = entries.len(), "hash log saved");
        Ok(())
    }
}

impl std::fmt::Debug for FileHashLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileHashLog").field("path", &self.path).finish()
    }
}
