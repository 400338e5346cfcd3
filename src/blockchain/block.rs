use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::hashing::{hash_block, Hash, HashingError};
use super::transaction::Transaction;

/// Proof recorded in the genesis block
///
/// Genesis is never re-verified, so this only has to be agreed upon.
pub const GENESIS_PROOF: u64 = 100;

/// Represents a block in the blockchain
///
/// Field order is part of the hash input and must not change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Block {
    /// Hash of the previous block, empty for genesis
    #[schema(value_type = String)]
    pub previous_hash: Hash,

    /// Index of the block in the chain
    pub index: u64,

    /// Transactions included in this block, mining reward last
    pub transactions: Vec<Transaction>,

    /// Proof of work (nonce)
    pub proof: u64,
}

impl Block {
    /// Creates a new block
    ///
    /// # Arguments
    ///
    /// * `previous_hash` - The hash of the previous block
    /// * `index` - The index of the block in the chain
    /// * `transactions` - The list of transactions to include in the block
    /// * `proof` - The proof of work (nonce)
    ///
    /// # Returns
    ///
    /// A new Block instance
    pub fn new(previous_hash: Hash, index: u64, transactions: Vec<Transaction>, proof: u64) -> Self {
        Block {
            previous_hash,
            index,
            transactions,
            proof,
        }
    }

    /// Creates the genesis block (first block in the chain)
    pub fn genesis() -> Self {
        Block::new(String::new(), 0, Vec::new(), GENESIS_PROOF)
    }

    pub fn is_genesis(&self) -> bool {
        *self == Block::genesis()
    }

    /// Calculates the hash of the block
    pub fn calculate_hash(&self) -> Result<Hash, HashingError> {
        hash_block(self)
    }

    /// Transactions covered by the proof of work
    ///
    /// The mining reward is appended after the proof is found, so it is
    /// excluded here. Exactly one trailing entry is dropped.
    pub fn proof_transactions(&self) -> &[Transaction] {
        match self.transactions.split_last() {
            Some((_, rest)) => rest,
            None => &[],
        }
    }
}
