// Blockchain module
//
// This module contains the core ledger implementation including:
// - Amounts in minor units
// - Transaction and block structures
// - Canonical hashing
// - Proof of work algorithm
// - The chain and the pending pool
// - Persistence backends

pub mod amount;
pub mod block;
pub mod chain;
pub mod hashing;
pub mod ledger;
pub mod node;
pub mod pow;
pub mod storage;
pub mod transaction;

// Re-export main components for easier access
pub use amount::{Amount, AmountError};
pub use block::Block;
pub use chain::{Chain, ChainError, IntegrityViolation, ViolationKind};
pub use hashing::{Hash, HashingError};
pub use ledger::{total_volume, RejectedPending, TransactionLedger};
pub use node::{Blockchain, BlockchainError};
pub use pow::{CancelToken, MiningError, ProofOfWork};
pub use storage::{LedgerStore, StorageError};
pub use transaction::{Transaction, TransactionError, MINING_SENDER};
