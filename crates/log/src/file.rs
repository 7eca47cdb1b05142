//! Filesystem-based decision log implementation
//!
//! Records are JSON lines in a single append-only file. The file handle
//! lives behind a mutex: holding the guard is the scoped acquisition of
//! the log, and the guard unwinds even when a write fails partway, so the
//! log is never left held. `sync_all` is the durability barrier: once
//! `append_decision` returns, the decision is on disk.

use crate::{DecisionLog, DecisionRecord, Result};
use lockstep_common::{Decision, Timestamp, TxnId};
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Filesystem-based decision log
pub struct FileDecisionLog {
    /// Path of the log file (kept for read-back)
    path: PathBuf,
    /// Append handle; the mutex scope is the acquire/release window
    file: Mutex<File>,
}

impl FileDecisionLog {
    /// Open (or create) the decision log at `path`.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Path of the underlying log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DecisionLog for FileDecisionLog {
    fn append_decision(&self, txn_id: TxnId, decision: Decision) -> Result<()> {
        let record = DecisionRecord {
            txn_id,
            decision,
            recorded_at: Timestamp::now(),
        };
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');

        let mut file = self.file.lock();
        file.write_all(&line)?;
        file.sync_all()?;
        Ok(())
    }

    fn decisions(&self) -> Result<Vec<DecisionRecord>> {
        let contents = fs::read_to_string(&self.path)?;

        let mut records = Vec::new();
        for line in contents.lines() {
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str(line)?);
        }
        Ok(records)
    }
}
