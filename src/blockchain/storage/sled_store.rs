use std::path::Path;
#[cfg(test)]
use std::sync::atomic::{AtomicBool, Ordering};

use log::debug;
#[cfg(test)]
use sled::transaction::ConflictableTransactionError;
use sled::transaction::{TransactionError, TransactionResult};
use sled::{Batch, Db, Transactional, Tree};

use super::{LedgerSnapshot, LedgerStore, StorageError};
use crate::blockchain::block::Block;
use crate::blockchain::chain::Chain;
use crate::blockchain::transaction::Transaction;

const PENDING_KEY: &str = "pending";
const HEIGHT_KEY: &str = "block_height";

/// Storage for ledger data backed by sled
pub struct SledStore {
    /// The database instance
    db: Db,

    /// Tree for blocks, keyed by big-endian chain position
    blocks: Tree,

    /// Tree for the pending pool and chain height
    metadata: Tree,

    /// Aborts the next saves after the block writes, before the metadata
    #[cfg(test)]
    fail_before_metadata: AtomicBool,
}

impl std::fmt::Debug for SledStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledStore").finish()
    }
}

fn block_key(position: usize) -> [u8; 8] {
    (position as u64).to_be_bytes()
}

impl SledStore {
    /// Opens a sled database at `path`
    ///
    /// # Arguments
    ///
    /// * `path` - The path to the database directory
    ///
    /// # Returns
    ///
    /// A new SledStore instance
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = sled::open(path)?;

        let blocks = db.open_tree("blocks")?;
        let metadata = db.open_tree("metadata")?;

        Ok(Self {
            db,
            blocks,
            metadata,
            #[cfg(test)]
            fail_before_metadata: AtomicBool::new(false),
        })
    }

    /// Gets the number of blocks stored
    pub fn get_block_height(&self) -> Result<u64, StorageError> {
        match self.metadata.get(HEIGHT_KEY)? {
            Some(value) => bincode::deserialize(&value).map_err(|e| StorageError::Malformed {
                location: HEIGHT_KEY.to_string(),
                reason: e.to_string(),
            }),
            None => Ok(0),
        }
    }

    /// Flushes all pending writes to disk
    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }
}

impl LedgerStore for SledStore {
    fn load(&self) -> Result<Option<LedgerSnapshot>, StorageError> {
        if self.blocks.is_empty() {
            return Ok(None);
        }

        let mut blocks = Vec::new();
        for (position, entry) in self.blocks.iter().enumerate() {
            let (_, value) = entry?;
            let block: Block = bincode::deserialize(&value).map_err(|e| StorageError::Malformed {
                location: format!("block {}", position),
                reason: e.to_string(),
            })?;
            blocks.push(block);
        }

        let pending: Vec<Transaction> = match self.metadata.get(PENDING_KEY)? {
            Some(value) => bincode::deserialize(&value).map_err(|e| StorageError::Malformed {
                location: PENDING_KEY.to_string(),
                reason: e.to_string(),
            })?,
            None => Vec::new(),
        };

        debug!("Loaded {} blocks from sled", blocks.len());
        Ok(Some(LedgerSnapshot { blocks, pending }))
    }

    /// Writes blocks, pending pool and height in one sled transaction, so a
    /// failed save leaves the previous state intact
    fn save(&self, chain: &Chain, pending: &[Transaction]) -> Result<(), StorageError> {
        let stored = self.blocks.len();
        let mut batch = Batch::default();

        // The tail is rewritten too, so a save that shortens the chain leaves
        // its last block current.
        let first_dirty = stored.min(chain.len()).saturating_sub(1);
        for (position, block) in chain.blocks().iter().enumerate().skip(first_dirty) {
            let value = bincode::serialize(block)
                .map_err(|e| StorageError::SerializationError(e.to_string()))?;
            batch.insert(&block_key(position)[..], value);
        }
        for position in chain.len()..stored {
            batch.remove(&block_key(position)[..]);
        }

        let pending_bytes = bincode::serialize(pending)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;
        let height_bytes = bincode::serialize(&(chain.len() as u64))
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;

        let result: TransactionResult<(), ()> =
            (&self.blocks, &self.metadata).transaction(|(blocks, metadata)| {
                blocks.apply_batch(&batch)?;

                #[cfg(test)]
                if self.fail_before_metadata.load(Ordering::SeqCst) {
                    return Err(ConflictableTransactionError::Abort(()));
                }

                metadata.insert(PENDING_KEY, pending_bytes.as_slice())?;
                metadata.insert(HEIGHT_KEY, height_bytes.as_slice())?;
                Ok(())
            });

        match result {
            Ok(()) => self.flush(),
            Err(TransactionError::Storage(err)) => Err(err.into()),
            Err(TransactionError::Abort(())) => {
                Err(StorageError::SystemError("sled transaction aborted".to_string()))
            }
        }
    }
}
