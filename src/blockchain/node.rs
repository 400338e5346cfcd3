use std::collections::BTreeSet;
use std::iter;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use log::{error, info, warn};
use thiserror::Error;

use super::amount::{Amount, AmountError};
use super::block::Block;
use super::chain::{Chain, ChainError, IntegrityViolation};
use super::hashing::HashingError;
use super::ledger::{total_volume, RejectedPending, TransactionLedger};
use super::pow::{CancelToken, MiningError, ProofOfWork};
use super::storage::{LedgerStore, StorageError};
use super::transaction::{Transaction, TransactionError};
use crate::config::LedgerConfig;

/// Errors that can occur during blockchain operations
#[derive(Debug, Error)]
pub enum BlockchainError {
    #[error("Transaction error: {0}")]
    TransactionError(#[from] TransactionError),

    #[error("Mining error: {0}")]
    MiningError(#[from] MiningError),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("Hashing error: {0}")]
    HashingError(#[from] HashingError),

    #[error("Invalid chain: {0}")]
    InvalidChain(#[from] ChainError),

    #[error("{0}")]
    IntegrityViolation(#[from] IntegrityViolation),

    #[error("Invalid persisted pending pool: {0}")]
    RejectedPending(#[from] RejectedPending),

    #[error("Amount error: {0}")]
    AmountError(#[from] AmountError),

    #[error("Ledger halted after a failed integrity check")]
    Halted,
}

/// Chain and pending pool, always read and written together
#[derive(Debug)]
struct LedgerState {
    chain: Chain,
    ledger: TransactionLedger,
}

/// Represents the blockchain
///
/// Owns the chain and the pending pool. Proposals and block commits take the
/// state write lock; mining is additionally serialized so only one proof
/// search runs at a time.
#[derive(Debug)]
pub struct Blockchain {
    state: RwLock<LedgerState>,

    /// Held for the whole of a mine
    mining: Mutex<()>,

    /// Token of the proof search in progress, if any
    active_search: Mutex<Option<CancelToken>>,

    pow: ProofOfWork,

    /// Identifier credited with mining rewards
    owner: String,

    /// Mining reward
    mining_reward: Amount,

    mining_timeout: Option<Duration>,

    /// Set once an integrity check fails; blocks further mutation
    halted: AtomicBool,

    /// Storage for blockchain data
    storage: Option<Arc<dyn LedgerStore>>,
}

impl Blockchain {
    /// Creates a new in-memory blockchain with a genesis block
    ///
    /// # Arguments
    ///
    /// * `config` - Owner, difficulty and reward settings
    ///
    /// # Returns
    ///
    /// A new Blockchain instance
    pub fn new(config: &LedgerConfig) -> Self {
        Self::from_state(
            config,
            LedgerState {
                chain: Chain::new(),
                ledger: TransactionLedger::new(),
            },
            None,
        )
    }

    /// Creates a blockchain backed by `storage`
    ///
    /// Loads the persisted chain and pending pool if there are any, otherwise
    /// starts from genesis and saves it. A persisted chain that is malformed
    /// or fails verification is an error, never replaced by a fresh one, and
    /// so is a pending pool that does not pass admission again.
    pub fn with_storage(
        config: &LedgerConfig,
        storage: Arc<dyn LedgerStore>,
    ) -> Result<Self, BlockchainError> {
        let pow = Self::proof_of_work(config);

        let state = match storage.load()? {
            Some(snapshot) => {
                let chain = Chain::from_blocks(snapshot.blocks)?;
                if let Err(violation) = chain.check(&pow) {
                    error!("Persisted chain failed verification: {}", violation);
                    return Err(violation.into());
                }

                if let Err(err) = total_volume(chain.transactions()) {
                    error!("Persisted chain amounts are out of range: {}", err);
                    return Err(err.into());
                }

                let ledger = TransactionLedger::restore(&chain, snapshot.pending).map_err(|err| {
                    error!("Persisted pending pool refused: {}", err);
                    err
                })?;

                info!(
                    "Loaded blockchain with {} blocks and {} pending transactions",
                    chain.len(),
                    ledger.pending().len()
                );
                LedgerState { chain, ledger }
            }
            None => {
                info!("No existing blockchain found in storage, creating genesis block");
                let chain = Chain::new();
                storage.save(&chain, &[])?;
                LedgerState {
                    chain,
                    ledger: TransactionLedger::new(),
                }
            }
        };

        Ok(Self::from_state(config, state, Some(storage)))
    }

    fn from_state(
        config: &LedgerConfig,
        state: LedgerState,
        storage: Option<Arc<dyn LedgerStore>>,
    ) -> Self {
        Blockchain {
            state: RwLock::new(state),
            mining: Mutex::new(()),
            active_search: Mutex::new(None),
            pow: Self::proof_of_work(config),
            owner: config.owner.clone(),
            mining_reward: config.mining_reward,
            mining_timeout: config.mining_timeout(),
            halted: AtomicBool::new(false),
            storage,
        }
    }

    fn proof_of_work(config: &LedgerConfig) -> ProofOfWork {
        ProofOfWork::new(config.difficulty).with_threads(config.mining_threads)
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn difficulty(&self) -> usize {
        self.pow.difficulty()
    }

    /// Returns true once an integrity check has failed
    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    /// Proposes a transfer into the pending pool
    ///
    /// # Arguments
    ///
    /// * `recipient` - The identifier of the recipient
    /// * `sender` - The identifier of the sender
    /// * `amount` - The amount to transfer
    ///
    /// # Returns
    ///
    /// The accepted transaction; on rejection nothing is changed
    pub fn propose_transaction(
        &self,
        recipient: &str,
        sender: &str,
        amount: Amount,
    ) -> Result<Transaction, BlockchainError> {
        self.submit_transaction(recipient, sender, amount)
            .map(|(transaction, _)| transaction)
    }

    /// Like [`Blockchain::propose_transaction`], also returning the index of
    /// the next block as of admission
    pub fn submit_transaction(
        &self,
        recipient: &str,
        sender: &str,
        amount: Amount,
    ) -> Result<(Transaction, u64), BlockchainError> {
        let transaction = Transaction::new(sender, recipient, amount);

        let mut guard = self.write_state();
        self.ensure_running()?;
        let state = &mut *guard;

        if let Err(err) = state.ledger.propose(&state.chain, transaction.clone()) {
            warn!(
                "Rejected transaction {} -> {} ({}): {}",
                sender, recipient, amount, err
            );
            return Err(err.into());
        }

        if let Err(err) = self.persist(state) {
            state.ledger.undo_propose(&state.chain);
            return Err(err);
        }

        Ok((transaction, state.chain.len() as u64))
    }

    /// Mines a new block with the pending transactions
    ///
    /// Uses the configured mining timeout, if any. The search can be aborted
    /// with [`Blockchain::cancel_mining`].
    pub fn mine_block(&self) -> Result<Block, BlockchainError> {
        let token = match self.mining_timeout {
            Some(timeout) => CancelToken::with_timeout(timeout),
            None => CancelToken::new(),
        };
        self.mine_block_with(token)
    }

    /// Mines a new block, stopping early if `cancel` trips
    ///
    /// # Returns
    ///
    /// Result with the newly mined block
    pub fn mine_block_with(&self, cancel: CancelToken) -> Result<Block, BlockchainError> {
        self.ensure_running()?;
        let _mining = self.mining.lock().unwrap_or_else(PoisonError::into_inner);

        *self.search_slot() = Some(cancel.clone());
        let result = self.mine_locked(&cancel);
        *self.search_slot() = None;

        result
    }

    /// Aborts the proof search in progress, if any
    pub fn cancel_mining(&self) {
        if let Some(token) = self.search_slot().as_ref() {
            warn!("Cancelling proof search in progress");
            token.cancel();
        }
    }

    fn mine_locked(&self, cancel: &CancelToken) -> Result<Block, BlockchainError> {
        let (last_hash, index, mut transactions) = {
            let state = self.read_state();
            (
                state.chain.tail().calculate_hash()?,
                state.chain.len() as u64,
                state.ledger.pending().to_vec(),
            )
        };
        let snapshot_len = transactions.len();

        let proof = self
            .pow
            .find_proof(&transactions, &last_hash, cancel)
            .map_err(|err| {
                warn!("Mining block {} stopped: {}", index, err);
                err
            })?;

        let reward = Transaction::reward(&self.owner, self.mining_reward);

        let mut guard = self.write_state();
        self.ensure_running()?;
        let state = &mut *guard;

        if let Err(err) = total_volume(
            state
                .chain
                .transactions()
                .chain(state.ledger.pending())
                .chain(iter::once(&reward)),
        ) {
            warn!("Refusing to mint the reward for block {}: {}", index, err);
            return Err(err.into());
        }

        transactions.push(reward);
        let block = Block::new(last_hash, index, transactions, proof);

        state.chain.append(block.clone());
        let committed = state.ledger.commit(snapshot_len, &block);

        if let Err(err) = self.persist(state) {
            state.chain.pop();
            state.ledger.uncommit(&state.chain, committed);
            return Err(err);
        }

        info!(
            "Mined block {} with {} transactions (proof {})",
            block.index,
            block.transactions.len(),
            block.proof
        );
        Ok(block)
    }

    /// Validates the blockchain
    ///
    /// A failure halts the ledger: later proposals and mines are refused.
    ///
    /// # Returns
    ///
    /// true if the blockchain is valid, false otherwise
    pub fn verify_chain(&self) -> bool {
        self.integrity_report().is_ok()
    }

    /// Checks the chain without halting the ledger on failure
    pub fn is_chain_valid(&self) -> bool {
        self.read_state().chain.verify(&self.pow)
    }

    /// Like [`Blockchain::verify_chain`], but reports where the chain broke
    pub fn integrity_report(&self) -> Result<(), IntegrityViolation> {
        let result = self.read_state().chain.check(&self.pow);
        if let Err(violation) = &result {
            error!("{}; halting further mutations", violation);
            self.halted.store(true, Ordering::SeqCst);
        }
        result
    }

    /// Checks every pending transaction against current balances
    pub fn verify_all_pending_transactions(&self) -> bool {
        let state = self.read_state();
        state.ledger.verify_all_pending(&state.chain)
    }

    /// Derives a participant's balance from committed and pending transactions
    pub fn balance_of(&self, participant: &str) -> Result<Amount, BlockchainError> {
        let state = self.read_state();
        Ok(state.ledger.balance_of(&state.chain, participant)?)
    }

    /// Gets every identifier seen as sender or recipient
    pub fn participants(&self) -> BTreeSet<String> {
        self.read_state().ledger.participants().clone()
    }

    /// Gets the entire blockchain
    pub fn get_chain(&self) -> Vec<Block> {
        self.read_state().chain.blocks().to_vec()
    }

    /// Gets all pending transactions
    pub fn get_pending_transactions(&self) -> Vec<Transaction> {
        self.read_state().ledger.pending().to_vec()
    }

    fn ensure_running(&self) -> Result<(), BlockchainError> {
        if self.is_halted() {
            return Err(BlockchainError::Halted);
        }
        Ok(())
    }

    fn persist(&self, state: &LedgerState) -> Result<(), BlockchainError> {
        if let Some(storage) = &self.storage {
            storage
                .save(&state.chain, state.ledger.pending())
                .map_err(|err| {
                    error!("Failed to save ledger state: {}", err);
                    err
                })?;
        }
        Ok(())
    }

    // Mutations roll back before releasing the lock, so a poisoned lock
    // still guards consistent state.
    fn read_state(&self) -> RwLockReadGuard<'_, LedgerState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, LedgerState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn search_slot(&self) -> MutexGuard<'_, Option<CancelToken>> {
        self.active_search
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
impl Blockchain {
    /// Rewrites committed blocks in place, skipping every check
    pub(crate) fn tamper(&self, edit: impl FnOnce(&mut Vec<Block>)) {
        let mut state = self.write_state();
        let mut blocks = state.chain.clone().into_blocks();
        edit(&mut blocks);
        state.chain = Chain::from_blocks(blocks).unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::storage::{LedgerSnapshot, MemoryStore};
    use std::thread;

    fn test_config() -> LedgerConfig {
        LedgerConfig {
            difficulty: 1,
            ..LedgerConfig::default()
        }
    }

    fn coins(value: i64) -> Amount {
        Amount::from_coins(value)
    }

    /// Store whose saves start failing once `fail` is set
    #[derive(Debug, Default)]
    struct FlakyStore {
        inner: MemoryStore,
        fail: AtomicBool,
    }

    impl LedgerStore for FlakyStore {
        fn load(&self) -> Result<Option<LedgerSnapshot>, StorageError> {
            self.inner.load()
        }

        fn save(&self, chain: &Chain, pending: &[Transaction]) -> Result<(), StorageError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(StorageError::SystemError("disk full".to_string()));
            }
            self.inner.save(chain, pending)
        }
    }

    #[test]
    fn test_new_blockchain() {
        let blockchain = Blockchain::new(&test_config());
        let chain = blockchain.get_chain();

        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].index, 0);
        assert_eq!(chain[0].previous_hash, "");
        assert!(blockchain.verify_chain());
        assert!(blockchain.participants().is_empty());
    }

    #[test]
    fn test_concrete_scenario() {
        let blockchain = Blockchain::new(&test_config());

        let rejected = blockchain.propose_transaction("Alice", "Max", coins(5));
        assert!(matches!(
            rejected,
            Err(BlockchainError::TransactionError(
                TransactionError::InsufficientFunds { .. }
            ))
        ));

        blockchain.mine_block().unwrap();
        assert_eq!(blockchain.balance_of("Max").unwrap(), coins(10));

        blockchain
            .propose_transaction("Alice", "Max", coins(5))
            .unwrap();
        assert_eq!(blockchain.get_pending_transactions().len(), 1);

        let block = blockchain.mine_block().unwrap();
        assert_eq!(block.index, 2);
        assert_eq!(block.transactions.len(), 2);
        assert!(block.transactions[1].is_reward());

        assert_eq!(blockchain.balance_of("Max").unwrap(), coins(15));
        assert_eq!(blockchain.balance_of("Alice").unwrap(), coins(5));
        assert!(blockchain.get_pending_transactions().is_empty());
        assert!(blockchain.verify_chain());
    }

    #[test]
    fn test_rejection_leaves_state_unchanged() {
        let blockchain = Blockchain::new(&test_config());
        blockchain.mine_block().unwrap();

        let chain_before = blockchain.get_chain();
        let result = blockchain.propose_transaction("Alice", "Max", coins(11));

        assert!(result.is_err());
        assert_eq!(blockchain.get_chain(), chain_before);
        assert!(blockchain.get_pending_transactions().is_empty());
        assert_eq!(blockchain.balance_of("Max").unwrap(), coins(10));
        assert_eq!(blockchain.balance_of("Alice").unwrap(), Amount::ZERO);
        assert!(!blockchain.participants().contains("Alice"));
    }

    #[test]
    fn test_balances_sum_to_rewards_issued() {
        let blockchain = Blockchain::new(&test_config());
        blockchain.mine_block().unwrap();
        blockchain.mine_block().unwrap();
        blockchain
            .propose_transaction("Alice", "Max", coins(7))
            .unwrap();
        blockchain
            .propose_transaction("Bob", "Alice", coins(3))
            .unwrap();
        blockchain.mine_block().unwrap();
        blockchain
            .propose_transaction("Max", "Bob", coins(1))
            .unwrap();

        let total = Amount::checked_sum(
            blockchain
                .participants()
                .iter()
                .map(|p| blockchain.balance_of(p).unwrap()),
        )
        .unwrap();

        assert_eq!(total, coins(30));
        assert!(blockchain.verify_all_pending_transactions());
    }

    #[test]
    fn test_tampering_halts_the_ledger() {
        let blockchain = Blockchain::new(&test_config());
        blockchain.mine_block().unwrap();
        blockchain
            .propose_transaction("Alice", "Max", coins(5))
            .unwrap();
        blockchain.mine_block().unwrap();
        blockchain.mine_block().unwrap();

        // The reward is outside the proof, so only the next link breaks
        blockchain.tamper(|blocks| {
            blocks[2].transactions[1].recipient = "Mallory".to_string();
        });

        assert!(!blockchain.verify_chain());
        assert!(blockchain.is_halted());
        assert_eq!(blockchain.integrity_report().unwrap_err().index, 3);

        assert!(matches!(
            blockchain.propose_transaction("Bob", "Max", coins(1)),
            Err(BlockchainError::Halted)
        ));
        assert!(matches!(blockchain.mine_block(), Err(BlockchainError::Halted)));
    }

    #[test]
    fn test_every_mutation_is_saved() {
        let store = Arc::new(MemoryStore::new());
        let blockchain = Blockchain::with_storage(&test_config(), store.clone()).unwrap();
        assert_eq!(store.snapshot().unwrap().blocks.len(), 1);

        blockchain.mine_block().unwrap();
        assert_eq!(store.snapshot().unwrap().blocks.len(), 2);

        blockchain
            .propose_transaction("Alice", "Max", coins(2))
            .unwrap();
        assert_eq!(store.snapshot().unwrap().pending.len(), 1);
    }

    #[test]
    fn test_reload_from_storage() {
        let store = Arc::new(MemoryStore::new());
        {
            let blockchain = Blockchain::with_storage(&test_config(), store.clone()).unwrap();
            blockchain.mine_block().unwrap();
            blockchain
                .propose_transaction("Alice", "Max", coins(4))
                .unwrap();
        }

        let reloaded = Blockchain::with_storage(&test_config(), store).unwrap();

        assert_eq!(reloaded.get_chain().len(), 2);
        assert_eq!(reloaded.get_pending_transactions().len(), 1);
        assert_eq!(reloaded.balance_of("Max").unwrap(), coins(6));
        assert!(reloaded.participants().contains("Alice"));
        assert!(reloaded.verify_chain());
    }

    #[test]
    fn test_failed_save_rolls_back() {
        let store = Arc::new(FlakyStore::default());
        let blockchain = Blockchain::with_storage(&test_config(), store.clone()).unwrap();
        blockchain.mine_block().unwrap();
        blockchain
            .propose_transaction("Alice", "Max", coins(4))
            .unwrap();

        store.fail.store(true, Ordering::SeqCst);

        let proposal = blockchain.propose_transaction("Bob", "Max", coins(1));
        assert!(matches!(proposal, Err(BlockchainError::StorageError(_))));
        assert_eq!(blockchain.get_pending_transactions().len(), 1);
        assert!(!blockchain.participants().contains("Bob"));

        let mined = blockchain.mine_block();
        assert!(matches!(mined, Err(BlockchainError::StorageError(_))));
        assert_eq!(blockchain.get_chain().len(), 2);
        assert_eq!(blockchain.get_pending_transactions().len(), 1);
        assert_eq!(blockchain.balance_of("Max").unwrap(), coins(6));

        store.fail.store(false, Ordering::SeqCst);
        blockchain.mine_block().unwrap();
        assert!(blockchain.verify_chain());
    }

    #[test]
    fn test_corrupt_storage_is_not_replaced() {
        let mut blocks = vec![Block::genesis()];
        blocks.push(Block::new("bogus".to_string(), 1, Vec::new(), 0));
        let store = Arc::new(MemoryStore::with_snapshot(LedgerSnapshot {
            blocks,
            pending: Vec::new(),
        }));

        let result = Blockchain::with_storage(&test_config(), store.clone());

        assert!(matches!(result, Err(BlockchainError::IntegrityViolation(_))));
        assert_eq!(store.snapshot().unwrap().blocks.len(), 2);
    }

    #[test]
    fn test_missing_genesis_is_an_error() {
        let store = Arc::new(MemoryStore::with_snapshot(LedgerSnapshot {
            blocks: Vec::new(),
            pending: Vec::new(),
        }));

        let result = Blockchain::with_storage(&test_config(), store);
        assert!(matches!(
            result,
            Err(BlockchainError::InvalidChain(ChainError::Empty))
        ));
    }

    #[test]
    fn test_cancel_mining_keeps_pending() {
        let blockchain = Blockchain::new(&test_config());
        blockchain.mine_block().unwrap();
        blockchain
            .propose_transaction("Alice", "Max", coins(3))
            .unwrap();

        let token = CancelToken::new();
        token.cancel();
        let result = blockchain.mine_block_with(token);

        assert!(matches!(
            result,
            Err(BlockchainError::MiningError(MiningError::Cancelled))
        ));
        assert_eq!(blockchain.get_chain().len(), 2);
        assert_eq!(blockchain.get_pending_transactions().len(), 1);
    }

    #[test]
    fn test_cancel_mining_from_another_thread() {
        let config = LedgerConfig {
            difficulty: crate::blockchain::pow::MAX_DIFFICULTY,
            ..LedgerConfig::default()
        };
        let blockchain = Arc::new(Blockchain::new(&config));

        let miner = {
            let blockchain = Arc::clone(&blockchain);
            thread::spawn(move || blockchain.mine_block())
        };

        // Proposals are accepted and balances readable while the search runs
        while blockchain.search_slot().is_none() {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(blockchain.balance_of("Max").unwrap(), Amount::ZERO);
        blockchain.cancel_mining();

        let result = miner.join().unwrap();
        assert!(matches!(
            result,
            Err(BlockchainError::MiningError(MiningError::Cancelled))
        ));
        assert_eq!(blockchain.get_chain().len(), 1);
    }

    #[test]
    fn test_mining_timeout() {
        let config = LedgerConfig {
            difficulty: crate::blockchain::pow::MAX_DIFFICULTY,
            mining_timeout_secs: Some(0),
            ..LedgerConfig::default()
        };
        let blockchain = Blockchain::new(&config);

        assert!(matches!(
            blockchain.mine_block(),
            Err(BlockchainError::MiningError(MiningError::DeadlineExceeded))
        ));
    }

    #[test]
    fn test_unfunded_persisted_pending_is_refused() {
        let mut chain = Chain::new();
        let last_hash = chain.tail().calculate_hash().unwrap();
        let pow = ProofOfWork::new(1);
        let proof = pow.find_proof(&[], &last_hash, &CancelToken::new()).unwrap();
        chain.append(Block::new(
            last_hash,
            1,
            vec![Transaction::reward("Max", coins(10))],
            proof,
        ));

        for pending in [
            vec![Transaction::new("Alice", "Bob", coins(1000))],
            vec![Transaction::new("Max", "Eve", Amount::from_minor(-50))],
        ] {
            let store = Arc::new(MemoryStore::with_snapshot(LedgerSnapshot {
                blocks: chain.blocks().to_vec(),
                pending,
            }));

            let result = Blockchain::with_storage(&test_config(), store);
            assert!(matches!(
                result,
                Err(BlockchainError::RejectedPending(RejectedPending { position: 0, .. }))
            ));
        }
    }

    #[test]
    fn test_out_of_range_tail_reward_is_refused() {
        let store = Arc::new(MemoryStore::new());
        {
            let blockchain = Blockchain::with_storage(&test_config(), store.clone()).unwrap();
            blockchain.mine_block().unwrap();
            blockchain.mine_block().unwrap();
        }

        // The tail reward is covered by neither the proof nor a later link
        let mut snapshot = store.snapshot().unwrap();
        let tail = snapshot.blocks.last_mut().unwrap();
        tail.transactions.last_mut().unwrap().amount = Amount::from_minor(i64::MAX);
        let tampered = Arc::new(MemoryStore::with_snapshot(snapshot));

        let result = Blockchain::with_storage(&test_config(), tampered);
        assert!(matches!(
            result,
            Err(BlockchainError::AmountError(AmountError::Overflow))
        ));
    }

    #[test]
    fn test_reward_that_would_overflow_is_not_minted() {
        let config = LedgerConfig {
            difficulty: 1,
            mining_reward: Amount::from_minor(i64::MAX / 2 + 1),
            ..LedgerConfig::default()
        };
        let blockchain = Blockchain::new(&config);
        blockchain.mine_block().unwrap();

        let result = blockchain.mine_block();

        assert!(matches!(
            result,
            Err(BlockchainError::AmountError(AmountError::Overflow))
        ));
        assert_eq!(blockchain.get_chain().len(), 2);
        assert_eq!(blockchain.balance_of("Max").unwrap(), config.mining_reward);
    }

    #[test]
    fn test_is_chain_valid_does_not_halt() {
        let blockchain = Blockchain::new(&test_config());
        blockchain.mine_block().unwrap();
        blockchain.mine_block().unwrap();

        blockchain.tamper(|blocks| {
            blocks[1].transactions[0].recipient = "Mallory".to_string();
        });

        assert!(!blockchain.is_chain_valid());
        assert!(!blockchain.is_halted());
        assert!(!blockchain.verify_chain());
        assert!(blockchain.is_halted());
    }

    #[test]
    fn test_submit_reports_next_block_index() {
        let blockchain = Blockchain::new(&test_config());
        blockchain.mine_block().unwrap();

        let (transaction, block_index) = blockchain
            .submit_transaction("Alice", "Max", coins(2))
            .unwrap();

        assert_eq!(transaction.amount, coins(2));
        assert_eq!(block_index, 2);
        assert_eq!(blockchain.mine_block().unwrap().index, block_index);
    }
}
