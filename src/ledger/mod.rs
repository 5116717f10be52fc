//! Posted-id ledger for idempotent submission.
//!
//! Epistemic foundation:
//! - K_i: The ledger tracks which questions have been submitted
//! - K_i: State is persisted to disk atomically (write-then-rename)
//! - B_i: Store file may not exist → first run, empty set
//! - K_i violated: Store exists but is malformed → the set cannot be
//!   trusted, so the run must stop rather than risk double-posting

use crate::models::{DoxaError, Result};
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Process-wide, file-persisted set of submitted question ids.
///
/// Single-writer: the sequential pipeline is the only mutator. The whole
/// set is rewritten through a temp file and an atomic rename on every
/// mutation, so a crash mid-write leaves the previous valid store intact.
#[derive(Debug)]
pub struct PostedLedger {
    /// Path to the persisted store
    path: PathBuf,
    /// In-memory id set (ordered, duplicate-free)
    ids: BTreeSet<u64>,
}

impl PostedLedger {
    /// Load the ledger from disk.
    ///
    /// An absent store is a first run and yields an empty set. A present
    /// but unparseable store is fatal: `LedgerCorrupt`.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "No posted-id store, starting empty");
            return Ok(Self {
                path: path.to_path_buf(),
                ids: BTreeSet::new(),
            });
        }

        let file = File::open(path).map_err(|e| DoxaError::io("opening posted-id store", e))?;
        let reader = BufReader::new(file);
        let ids: Vec<u64> =
            serde_json::from_reader(reader).map_err(|e| DoxaError::LedgerCorrupt {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let ids: BTreeSet<u64> = ids.into_iter().collect();
        info!(path = %path.display(), posted = ids.len(), "Loaded posted-id store");

        Ok(Self {
            path: path.to_path_buf(),
            ids,
        })
    }

    /// Pure membership check against the in-memory set.
    pub fn contains(&self, id: u64) -> bool {
        self.ids.contains(&id)
    }

    /// Number of recorded ids.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Record a successfully submitted id and persist the whole set.
    ///
    /// No-op if the id is already present. Persistence writes the full
    /// sorted set to a temp file and renames it over the store, so the
    /// store is never observable in a truncated state.
    pub fn record(&mut self, id: u64) -> Result<()> {
        if !self.ids.insert(id) {
            debug!(question_id = id, "Id already recorded");
            return Ok(());
        }
        self.persist()?;
        debug!(question_id = id, posted = self.ids.len(), "Recorded posted id");
        Ok(())
    }

    fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| DoxaError::io("creating ledger dir", e))?;
            }
        }

        let temp_path = self.temp_path();
        {
            let file = File::create(&temp_path)
                .map_err(|e| DoxaError::io("creating temp ledger file", e))?;
            let mut writer = BufWriter::new(file);
            let ids: Vec<u64> = self.ids.iter().copied().collect();
            serde_json::to_writer_pretty(&mut writer, &ids)
                .map_err(|e| DoxaError::Internal(format!("Serializing ledger: {e}")))?;
            writer
                .flush()
                .map_err(|e| DoxaError::io("flushing temp ledger file", e))?;
        }

        fs::rename(&temp_path, &self.path).map_err(|e| DoxaError::io("renaming ledger file", e))
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "posted.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Path to the persisted store.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_absent_store_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("posted.json");

        let ledger = PostedLedger::load(&path).unwrap();
        assert!(ledger.is_empty());
        assert!(!ledger.contains(101));
    }

    #[test]
    fn test_record_then_reload() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("posted.json");

        let mut ledger = PostedLedger::load(&path).unwrap();
        ledger.record(101).unwrap();
        ledger.record(102).unwrap();

        let reloaded = PostedLedger::load(&path).unwrap();
        assert!(reloaded.contains(101));
        assert!(reloaded.contains(102));
        assert!(!reloaded.contains(103));
        assert_eq!(reloaded.len(), 2);
    }

    #[test]
    fn test_record_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("posted.json");

        let mut ledger = PostedLedger::load(&path).unwrap();
        ledger.record(101).unwrap();
        ledger.record(101).unwrap();

        let reloaded = PostedLedger::load(&path).unwrap();
        assert_eq!(reloaded.len(), 1);
    }

    #[test]
    fn test_store_is_sorted_json_array() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("posted.json");

        let mut ledger = PostedLedger::load(&path).unwrap();
        ledger.record(300).unwrap();
        ledger.record(100).unwrap();
        ledger.record(200).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let ids: Vec<u64> = serde_json::from_str(&content).unwrap();
        assert_eq!(ids, vec![100, 200, 300]);
    }

    #[test]
    fn test_malformed_store_is_corrupt() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("posted.json");
        fs::write(&path, "{not json").unwrap();

        let err = PostedLedger::load(&path).unwrap_err();
        assert!(matches!(err, DoxaError::LedgerCorrupt { .. }));
    }

    #[test]
    fn test_crash_between_temp_write_and_rename() {
        // A stray temp file from a crashed run must not affect the
        // previously-committed store.
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("posted.json");

        let mut ledger = PostedLedger::load(&path).unwrap();
        ledger.record(101).unwrap();

        // Simulate a crash mid-write: temp file exists with garbage.
        fs::write(temp_dir.path().join("posted.json.tmp"), "garbage").unwrap();

        let reloaded = PostedLedger::load(&path).unwrap();
        assert!(reloaded.contains(101));
        assert_eq!(reloaded.len(), 1);
    }

    #[test]
    fn test_recording_after_force_rerun() {
        // Force mode bypasses the contains() filter upstream; record()
        // still keeps the set duplicate-free.
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("posted.json");

        let mut ledger = PostedLedger::load(&path).unwrap();
        ledger.record(555).unwrap();
        assert!(ledger.contains(555));

        // Re-forecast of 555 submits again, then records again.
        ledger.record(555).unwrap();
        let reloaded = PostedLedger::load(&path).unwrap();
        assert_eq!(reloaded.len(), 1);
    }
}
