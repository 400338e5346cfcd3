use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::debug;

use super::{LedgerSnapshot, LedgerStore, StorageError};
use crate::blockchain::block::Block;
use crate::blockchain::chain::Chain;
use crate::blockchain::hashing::canonical_json;
use crate::blockchain::transaction::Transaction;

/// Two-line JSON file: the chain on the first line, the pending pool on the second
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    /// Creates a store writing to `path`, creating its parent directory
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn malformed(&self, line: usize, reason: impl ToString) -> StorageError {
        StorageError::Malformed {
            location: format!("{} line {}", self.path.display(), line),
            reason: reason.to_string(),
        }
    }
}

impl LedgerStore for SnapshotStore {
    fn load(&self) -> Result<Option<LedgerSnapshot>, StorageError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let lines: Vec<&str> = content.lines().collect();
        if lines.len() != 2 {
            return Err(StorageError::Malformed {
                location: self.path.display().to_string(),
                reason: format!("expected 2 lines, found {}", lines.len()),
            });
        }

        let blocks: Vec<Block> =
            serde_json::from_str(lines[0]).map_err(|err| self.malformed(1, err))?;
        let pending: Vec<Transaction> =
            serde_json::from_str(lines[1]).map_err(|err| self.malformed(2, err))?;

        debug!(
            "Read {} blocks and {} pending transactions from {}",
            blocks.len(),
            pending.len(),
            self.path.display()
        );
        Ok(Some(LedgerSnapshot { blocks, pending }))
    }

    fn save(&self, chain: &Chain, pending: &[Transaction]) -> Result<(), StorageError> {
        let mut data = canonical_json(chain)?;
        data.push(b'\n');
        data.extend(canonical_json(pending)?);
        data.push(b'\n');

        let tmp_path = self.path.with_extension("tmp");
        fs::write(&tmp_path, data)?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}
