use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::block::Block;
use super::hashing::Hash;
use super::pow::ProofOfWork;
use super::transaction::Transaction;

/// Errors raised when building a chain from existing blocks
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("Chain has no blocks")]
    Empty,

    #[error("First block is not the genesis block")]
    InvalidGenesis,
}

/// What went wrong at a failing block
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViolationKind {
    /// `previous_hash` does not match the hash of the preceding block
    BrokenLink { expected: Hash, found: Hash },

    /// The recorded proof does not solve the puzzle
    InvalidProof,

    /// A block could not be encoded for hashing
    Unhashable(String),

    /// The chain has no genesis block
    MissingGenesis,
}

/// First integrity failure found while replaying the chain
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Chain integrity violation at block {index}: {kind:?}")]
pub struct IntegrityViolation {
    pub index: usize,
    pub kind: ViolationKind,
}

/// The ordered, append-only sequence of blocks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Chain {
    blocks: Vec<Block>,
}

impl Default for Chain {
    fn default() -> Self {
        Chain::new()
    }
}

impl Chain {
    /// Creates a chain holding only the genesis block
    pub fn new() -> Self {
        Chain {
            blocks: vec![Block::genesis()],
        }
    }

    /// Builds a chain from previously committed blocks
    ///
    /// Only the shape is checked here. Linkage and proofs are left to
    /// [`Chain::check`].
    pub fn from_blocks(blocks: Vec<Block>) -> Result<Self, ChainError> {
        match blocks.first() {
            None => Err(ChainError::Empty),
            Some(first) if !first.is_genesis() => Err(ChainError::InvalidGenesis),
            Some(_) => Ok(Chain { blocks }),
        }
    }

    /// Pushes a block onto the chain without validating it
    pub fn append(&mut self, block: Block) {
        self.blocks.push(block);
    }

    /// Removes the tail block. Used to undo an append whose persistence failed.
    pub(crate) fn pop(&mut self) -> Option<Block> {
        if self.blocks.len() > 1 {
            self.blocks.pop()
        } else {
            None
        }
    }

    /// Gets the last block in the chain
    pub fn tail(&self) -> &Block {
        // `new` and `from_blocks` never produce an empty chain and `pop` keeps genesis
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn into_blocks(self) -> Vec<Block> {
        self.blocks
    }

    /// All committed transactions in chain order
    pub fn transactions(&self) -> impl Iterator<Item = &Transaction> + '_ {
        self.blocks.iter().flat_map(|block| block.transactions.iter())
    }

    /// Validates the chain
    ///
    /// # Returns
    ///
    /// true if the blockchain is valid, false otherwise
    pub fn verify(&self, pow: &ProofOfWork) -> bool {
        self.check(pow).is_ok()
    }

    /// Replays the chain and reports the first failing block
    ///
    /// For every block after genesis, checks that it links to the hash of its
    /// predecessor and that its proof solves the puzzle over its
    /// transactions minus the trailing reward.
    pub fn check(&self, pow: &ProofOfWork) -> Result<(), IntegrityViolation> {
        if self.blocks.is_empty() {
            return Err(IntegrityViolation {
                index: 0,
                kind: ViolationKind::MissingGenesis,
            });
        }

        for (index, pair) in self.blocks.windows(2).enumerate() {
            let (previous, current) = (&pair[0], &pair[1]);
            let index = index + 1;
            let unhashable = |reason: String| IntegrityViolation {
                index,
                kind: ViolationKind::Unhashable(reason),
            };

            let expected = previous
                .calculate_hash()
                .map_err(|err| unhashable(err.to_string()))?;
            if current.previous_hash != expected {
                return Err(IntegrityViolation {
                    index,
                    kind: ViolationKind::BrokenLink {
                        expected,
                        found: current.previous_hash.clone(),
                    },
                });
            }

            if !pow
                .verify_block(current)
                .map_err(|err| unhashable(err.to_string()))?
            {
                return Err(IntegrityViolation {
                    index,
                    kind: ViolationKind::InvalidProof,
                });
            }
        }

        Ok(())
    }
}
