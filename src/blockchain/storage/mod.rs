// Storage module
//
// Persistence collaborators for the ledger. Every backend stores the same
// snapshot: the committed chain and the pending pool.

pub mod memory;
pub mod sled_store;
pub mod snapshot;

use std::fmt;
use std::sync::Arc;

use log::info;
use thiserror::Error;

use super::block::Block;
use super::chain::Chain;
use super::hashing::HashingError;
use super::transaction::Transaction;
use crate::config::{StorageBackend, StorageConfig};

pub use memory::MemoryStore;
pub use sled_store::SledStore;
pub use snapshot::SnapshotStore;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sled::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Malformed persisted state ({location}): {reason}")]
    Malformed { location: String, reason: String },

    #[error("System error: {0}")]
    SystemError(String),
}

impl From<HashingError> for StorageError {
    fn from(err: HashingError) -> Self {
        StorageError::SerializationError(err.to_string())
    }
}

/// Ledger state as read back from a store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub blocks: Vec<Block>,
    pub pending: Vec<Transaction>,
}

/// A place the ledger loads its state from and saves it to
pub trait LedgerStore: fmt::Debug + Send + Sync {
    /// Loads the persisted state
    ///
    /// # Returns
    ///
    /// Ok(None) if nothing was ever saved; an error if something was saved but
    /// cannot be read back
    fn load(&self) -> Result<Option<LedgerSnapshot>, StorageError>;

    /// Saves the full ledger state, called after every committing mutation
    fn save(&self, chain: &Chain, pending: &[Transaction]) -> Result<(), StorageError>;
}

/// Opens the store selected by `config`
pub fn open_store(config: &StorageConfig) -> Result<Arc<dyn LedgerStore>, StorageError> {
    let store: Arc<dyn LedgerStore> = match config.backend {
        StorageBackend::Snapshot => Arc::new(SnapshotStore::new(&config.path)?),
        StorageBackend::Sled => Arc::new(SledStore::new(&config.path)?),
        StorageBackend::Memory => Arc::new(MemoryStore::new()),
    };
    info!("Using {:?} storage at {}", config.backend, config.path.display());
    Ok(store)
}
