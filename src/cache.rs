//! File-tree cache of dependency records.
//!
//! Layout: `<root>/<source_type>/<sanitized name>.dep.json`, one pretty-printed
//! JSON document per dependency so the state diffs cleanly in version control.
//!
//! Writes go to a temporary file in the destination directory which is then
//! renamed over the target, so a crash leaves either the old or the new record.
//! Callers must not save the same key from two threads at once; different keys
//! are independent.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::CacheError;
use crate::models::CachedRecord;

const EXTENSION: &str = ".dep.json";

#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Location of the record for `(source_type, name)`.
    pub fn record_path(&self, source_type: &str, name: &str) -> PathBuf {
        self.root
            .join(sanitize(source_type))
            .join(format!("{}{}", sanitize(name), EXTENSION))
    }

    /// Load one record. A missing file is `Ok(None)`; an unparsable one is
    /// [`CacheError::Corrupt`].
    pub fn load(&self, source_type: &str, name: &str) -> Result<Option<CachedRecord>, CacheError> {
        let path = self.record_path(source_type, name);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::Io(e)),
        };
        let record = parse_record(&path, &content)?;
        if record.source_type != source_type || record.name != name {
            return Err(CacheError::Corrupt {
                path,
                reason: format!(
                    "file holds {}/{}, expected {}/{}",
                    record.source_type, record.name, source_type, name
                ),
            });
        }
        Ok(Some(record))
    }

    /// Persist a record, replacing any previous version atomically.
    pub fn save(&self, record: &CachedRecord) -> Result<(), CacheError> {
        let path = self.record_path(&record.source_type, &record.name);
        let write_failed = |source| CacheError::WriteFailed {
            path: path.clone(),
            source,
        };

        let dir = path.parent().unwrap_or(&self.root);
        std::fs::create_dir_all(dir).map_err(write_failed)?;

        let mut json = serde_json::to_string_pretty(record)
            .map_err(|e| write_failed(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
        json.push('\n');

        let mut tmp = NamedTempFile::new_in(dir).map_err(write_failed)?;
        tmp.write_all(json.as_bytes()).map_err(write_failed)?;
        tmp.as_file().sync_all().map_err(write_failed)?;
        tmp.persist(&path).map_err(|e| write_failed(e.error))?;

        debug!(path = %path.display(), "saved cache record");
        Ok(())
    }

    /// Remove a record. Removing a record that does not exist is not an error.
    pub fn delete(&self, source_type: &str, name: &str) -> Result<(), CacheError> {
        let path = self.record_path(source_type, name);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::WriteFailed { path, source: e }),
        }
    }

    /// Every readable record for one source type, sorted by name.
    ///
    /// Corrupt files are skipped with a warning.
    pub fn list_all(&self, source_type: &str) -> Result<Vec<CachedRecord>, CacheError> {
        let dir = self.root.join(sanitize(source_type));
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CacheError::Io(e)),
        };

        let mut records = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let is_record = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(EXTENSION));
            if !is_record {
                continue;
            }
            let content = std::fs::read_to_string(&path)?;
            match parse_record(&path, &content) {
                Ok(record) if record.source_type == source_type => records.push(record),
                Ok(record) => warn!(
                    path = %path.display(),
                    found = %record.source_type,
                    "cache record filed under the wrong source type, skipping"
                ),
                Err(e) => warn!("{}", e),
            }
        }

        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(records)
    }
}

fn parse_record(path: &Path, content: &str) -> Result<CachedRecord, CacheError> {
    serde_json::from_str(content).map_err(|e| CacheError::Corrupt {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Make a name safe to use as a single path component.
///
/// Every byte outside `[A-Za-z0-9_.-]`, and a leading `.`, is written as `%XX`,
/// so two different names never map to the same file.
pub fn sanitize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for (i, byte) in name.bytes().enumerate() {
        let safe = byte.is_ascii_alphanumeric()
            || byte == b'_'
            || byte == b'-'
            || (byte == b'.' && i > 0);
        if safe {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}
