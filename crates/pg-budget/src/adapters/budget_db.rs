//! File-backed store for `budget.dat`.

use crate::domain::persistence::{decode_snapshot, encode_snapshot, BUDGET_FILE_NAME};
use crate::domain::{LedgerSnapshot, PersistenceError};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Reads and writes ledger snapshots for one network.
#[derive(Debug, Clone)]
pub struct BudgetDb {
    path: PathBuf,
    message_start: [u8; 4],
}

impl BudgetDb {
    pub fn new<P: AsRef<Path>>(path: P, message_start: [u8; 4]) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            message_start,
        }
    }

    /// `budget.dat` inside `data_dir`.
    pub fn in_dir<P: AsRef<Path>>(data_dir: P, message_start: [u8; 4]) -> Self {
        Self::new(data_dir.as_ref().join(BUDGET_FILE_NAME), message_start)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and verify the file.
    ///
    /// With `dry_run` the snapshot is decoded only to prove the file is
    /// readable; an empty snapshot is returned.
    pub fn read(&self, dry_run: bool) -> Result<LedgerSnapshot, PersistenceError> {
        let started = std::time::Instant::now();
        let bytes = std::fs::read(&self.path).map_err(|e| PersistenceError::FileError {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })?;
        let snapshot = decode_snapshot(&bytes, self.message_start)?;

        tracing::debug!(
            path = %self.path.display(),
            proposals = snapshot.proposals.len(),
            seen_votes = snapshot.seen_votes.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "loaded budget file"
        );
        if dry_run {
            return Ok(LedgerSnapshot::default());
        }
        Ok(snapshot)
    }

    /// Atomically replace the file with `snapshot`.
    ///
    /// The previous file stays intact if any step fails.
    pub fn write(&self, snapshot: &LedgerSnapshot) -> Result<(), PersistenceError> {
        let started = std::time::Instant::now();
        let bytes = encode_snapshot(snapshot, self.message_start)?;
        let write_failed = |e: std::io::Error| PersistenceError::WriteFailed {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(write_failed)?;
        }

        let temp_path = self.path.with_extension("tmp");
        let mut file = std::fs::File::create(&temp_path).map_err(write_failed)?;
        file.write_all(&bytes).map_err(write_failed)?;
        file.sync_all().map_err(write_failed)?;
        std::fs::rename(&temp_path, &self.path).map_err(write_failed)?;

        tracing::debug!(
            path = %self.path.display(),
            bytes = bytes.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "wrote budget file"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BudgetProposal, Hash256, ProposalBroadcast};

    const MAGIC: [u8; 4] = [0x45, 0x76, 0x65, 0xba];

    fn snapshot() -> LedgerSnapshot {
        let broadcast = ProposalBroadcast::new(
            "road-map",
            "https://example.org/rm",
            1_000,
            2_000,
            Hash256::from_low_u64(3),
        );
        let mut snapshot = LedgerSnapshot::default();
        snapshot
            .proposals
            .insert(broadcast.hash(), BudgetProposal::from(broadcast.clone()));
        snapshot.seen_broadcasts.insert(broadcast.hash(), broadcast);
        snapshot
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let db = BudgetDb::in_dir(dir.path(), MAGIC);
        db.write(&snapshot()).unwrap();

        assert_eq!(db.read(false).unwrap(), snapshot());
        assert!(db.read(true).unwrap().is_empty());
        assert!(!db.path().with_extension("tmp").exists());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let db = BudgetDb::in_dir(dir.path(), MAGIC);
        assert!(matches!(db.read(true), Err(PersistenceError::FileError { .. })));
    }

    #[test]
    fn test_wrong_network() {
        let dir = tempfile::tempdir().unwrap();
        BudgetDb::in_dir(dir.path(), MAGIC).write(&snapshot()).unwrap();
        let other = BudgetDb::in_dir(dir.path(), [1, 2, 3, 4]);
        assert_eq!(other.read(false), Err(PersistenceError::IncorrectMagicNumber));
    }

    #[test]
    fn test_creates_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let db = BudgetDb::in_dir(dir.path().join("nested").join("node"), MAGIC);
        db.write(&LedgerSnapshot::default()).unwrap();
        assert!(db.path().exists());
    }
}
