use std::sync::Mutex;

use super::{LedgerSnapshot, LedgerStore, StorageError};
use crate::blockchain::chain::Chain;
use crate::blockchain::transaction::Transaction;

/// Keeps the last saved snapshot in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Mutex<Option<LedgerSnapshot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already holds `snapshot`
    pub fn with_snapshot(snapshot: LedgerSnapshot) -> Self {
        MemoryStore {
            data: Mutex::new(Some(snapshot)),
        }
    }

    /// The most recently saved snapshot
    pub fn snapshot(&self) -> Option<LedgerSnapshot> {
        self.data.lock().ok().and_then(|data| data.clone())
    }
}

impl LedgerStore for MemoryStore {
    fn load(&self) -> Result<Option<LedgerSnapshot>, StorageError> {
        let data = self
            .data
            .lock()
            .map_err(|e| StorageError::SystemError(e.to_string()))?;
        Ok(data.clone())
    }

    fn save(&self, chain: &Chain, pending: &[Transaction]) -> Result<(), StorageError> {
        let mut data = self
            .data
            .lock()
            .map_err(|e| StorageError::SystemError(e.to_string()))?;
        *data = Some(LedgerSnapshot {
            blocks: chain.blocks().to_vec(),
            pending: pending.to_vec(),
        });
        Ok(())
    }
}
