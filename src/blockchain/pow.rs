use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

use log::debug;
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::block::Block;
use super::hashing::{canonical_json, Hash, HashingError};
use super::transaction::Transaction;

/// Default number of leading zero hex characters a guess hash must have
pub const DEFAULT_DIFFICULTY: usize = 2;

/// Longest prefix a hex SHA-256 digest can carry
pub const MAX_DIFFICULTY: usize = 64;

/// Errors that can occur while searching for a proof
#[derive(Debug, Error)]
pub enum MiningError {
    #[error("Mining was cancelled")]
    Cancelled,

    #[error("Mining deadline exceeded")]
    DeadlineExceeded,

    #[error("Proof search exhausted the nonce space")]
    Exhausted,

    #[error("Hashing error: {0}")]
    HashingError(#[from] HashingError),
}

/// Cancellation point for a proof search
///
/// Clones share the same flag, so a token handed to the search can be
/// tripped from another thread.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a token that also expires `timeout` from now
    pub fn with_timeout(timeout: Duration) -> Self {
        CancelToken {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: Instant::now().checked_add(timeout),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Fails if the token was cancelled or its deadline has passed
    pub fn check(&self) -> Result<(), MiningError> {
        if self.is_cancelled() {
            return Err(MiningError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(MiningError::DeadlineExceeded),
            _ => Ok(()),
        }
    }
}

/// The fixed part of a puzzle: everything but the proof
struct Puzzle {
    base: Sha256,
}

impl Puzzle {
    fn new(transactions: &[Transaction], last_hash: &str) -> Result<Self, HashingError> {
        let mut base = Sha256::new();
        base.update(canonical_json(transactions)?);
        base.update(canonical_json(last_hash)?);
        Ok(Puzzle { base })
    }

    fn guess(&self, proof: u64) -> Result<Hash, HashingError> {
        let mut hasher = self.base.clone();
        hasher.update(canonical_json(&proof)?);
        Ok(hex::encode(hasher.finalize()))
    }
}

/// Proof of work puzzle with an injectable difficulty
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProofOfWork {
    /// Number of leading zeros required in the guess hash
    difficulty: usize,

    /// Number of workers sharing the nonce space
    threads: usize,
}

impl Default for ProofOfWork {
    fn default() -> Self {
        ProofOfWork::new(DEFAULT_DIFFICULTY)
    }
}

impl ProofOfWork {
    pub fn new(difficulty: usize) -> Self {
        ProofOfWork {
            difficulty: difficulty.min(MAX_DIFFICULTY),
            threads: 1,
        }
    }

    /// Shards the search across `threads` workers
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    pub fn difficulty(&self) -> usize {
        self.difficulty
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Computes the guess hash for a candidate proof
    ///
    /// # Arguments
    ///
    /// * `transactions` - The transactions covered by the proof
    /// * `last_hash` - The hash of the block the proof builds on
    /// * `proof` - The candidate proof
    ///
    /// # Returns
    ///
    /// The SHA-256 hash of the concatenated canonical encodings
    pub fn guess_hash(
        transactions: &[Transaction],
        last_hash: &str,
        proof: u64,
    ) -> Result<Hash, HashingError> {
        Puzzle::new(transactions, last_hash)?.guess(proof)
    }

    /// Checks whether `proof` solves the puzzle for the given inputs
    pub fn is_valid_proof(
        &self,
        transactions: &[Transaction],
        last_hash: &str,
        proof: u64,
    ) -> Result<bool, HashingError> {
        let guess = Self::guess_hash(transactions, last_hash, proof)?;
        Ok(self.meets_target(&guess))
    }

    /// Re-derives the proof check for a committed block
    ///
    /// The trailing reward transaction is stripped first since it was
    /// appended after the proof was found.
    pub fn verify_block(&self, block: &Block) -> Result<bool, HashingError> {
        self.is_valid_proof(block.proof_transactions(), &block.previous_hash, block.proof)
    }

    /// Searches for the smallest proof that solves the puzzle
    ///
    /// # Arguments
    ///
    /// * `transactions` - The pending transactions, without the reward
    /// * `last_hash` - The hash of the current tail block
    /// * `cancel` - Checked before every candidate
    ///
    /// # Returns
    ///
    /// The proof, or the reason the search stopped
    pub fn find_proof(
        &self,
        transactions: &[Transaction],
        last_hash: &str,
        cancel: &CancelToken,
    ) -> Result<u64, MiningError> {
        let puzzle = Puzzle::new(transactions, last_hash)?;
        let started = Instant::now();

        let proof = if self.threads <= 1 {
            self.search(&puzzle, cancel)?
        } else {
            self.search_sharded(&puzzle, cancel)?
        };

        debug!(
            "Found proof {} at difficulty {} in {:?}",
            proof,
            self.difficulty,
            started.elapsed()
        );
        Ok(proof)
    }

    fn meets_target(&self, guess: &str) -> bool {
        guess.len() >= self.difficulty && guess.bytes().take(self.difficulty).all(|b| b == b'0')
    }

    fn search(&self, puzzle: &Puzzle, cancel: &CancelToken) -> Result<u64, MiningError> {
        let mut proof = 0u64;

        loop {
            cancel.check()?;
            if self.meets_target(&puzzle.guess(proof)?) {
                return Ok(proof);
            }
            proof = proof.checked_add(1).ok_or(MiningError::Exhausted)?;
        }
    }

    /// Worker `w` tries `w, w + n, w + 2n, ...` and stops once its next
    /// candidate is above the best proof found so far. Every candidate below
    /// the final best is therefore tried, which makes the result the same
    /// smallest proof the sequential search returns.
    fn search_sharded(&self, puzzle: &Puzzle, cancel: &CancelToken) -> Result<u64, MiningError> {
        let stride = self.threads as u64;
        let best = AtomicU64::new(u64::MAX);
        let stop = AtomicBool::new(false);
        let failure: OnceLock<MiningError> = OnceLock::new();

        thread::scope(|scope| {
            for worker in 0..stride {
                let (best, stop, failure) = (&best, &stop, &failure);

                scope.spawn(move || {
                    let mut proof = worker;
                    while !stop.load(Ordering::Relaxed) && proof < best.load(Ordering::Acquire) {
                        let guess = cancel
                            .check()
                            .and_then(|_| puzzle.guess(proof).map_err(MiningError::from));

                        match guess {
                            Ok(hash) if self.meets_target(&hash) => {
                                best.fetch_min(proof, Ordering::AcqRel);
                                return;
                            }
                            Ok(_) => {}
                            Err(err) => {
                                let _ = failure.set(err);
                                stop.store(true, Ordering::Relaxed);
                                return;
                            }
                        }

                        match proof.checked_add(stride) {
                            Some(next) => proof = next,
                            None => return,
                        }
                    }
                });
            }
        });

        if let Some(err) = failure.into_inner() {
            return Err(err);
        }
        match best.into_inner() {
            u64::MAX => Err(MiningError::Exhausted),
            proof => Ok(proof),
        }
    }
}
