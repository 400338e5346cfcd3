use std::collections::BTreeSet;
use std::iter;

use log::debug;
use thiserror::Error;

use super::amount::{Amount, AmountError};
use super::block::Block;
use super::chain::Chain;
use super::transaction::{Transaction, TransactionError, MINING_SENDER};

/// A persisted pending transaction that no longer passes admission
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Pending transaction {position} rejected: {source}")]
pub struct RejectedPending {
    pub position: usize,
    pub source: TransactionError,
}

/// Sum of absolute amounts over `transactions`
///
/// Every balance is a signed partial sum of the same amounts, so while this
/// fits in an `Amount` no balance derivation can overflow.
pub fn total_volume<'a, I>(transactions: I) -> Result<Amount, AmountError>
where
    I: IntoIterator<Item = &'a Transaction>,
{
    transactions
        .into_iter()
        .try_fold(Amount::ZERO, |total, tx| total.checked_add(tx.amount.checked_abs()?))
}

/// Pending transactions plus the participants seen so far
///
/// Balances are never stored. They are replayed from the committed chain and
/// the pending pool every time they are asked for.
#[derive(Debug, Clone, Default)]
pub struct TransactionLedger {
    /// Transactions accepted but not yet committed into a block
    pending: Vec<Transaction>,

    /// Identifiers seen as sender or recipient, minus the reward sentinel
    participants: BTreeSet<String>,
}

impl TransactionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores a ledger from a chain and a persisted pending pool
    ///
    /// Each pending entry is readmitted in order through [`propose`], so a
    /// pool that could not have been built by proposals is refused.
    ///
    /// [`propose`]: TransactionLedger::propose
    pub fn restore(chain: &Chain, pending: Vec<Transaction>) -> Result<Self, RejectedPending> {
        let mut ledger = TransactionLedger::new();
        ledger.rebuild_participants(chain);

        for (position, transaction) in pending.into_iter().enumerate() {
            ledger
                .propose(chain, transaction)
                .map_err(|source| RejectedPending { position, source })?;
        }
        Ok(ledger)
    }

    pub fn pending(&self) -> &[Transaction] {
        &self.pending
    }

    pub fn participants(&self) -> &BTreeSet<String> {
        &self.participants
    }

    /// Derives a participant's balance from history
    ///
    /// # Arguments
    ///
    /// * `chain` - The committed chain
    /// * `participant` - The identifier to compute the balance for
    ///
    /// # Returns
    ///
    /// Everything received minus everything sent, over committed and pending
    /// transactions. Nothing structurally keeps this non-negative.
    pub fn balance_of(&self, chain: &Chain, participant: &str) -> Result<Amount, AmountError> {
        chain
            .transactions()
            .chain(self.pending.iter())
            .try_fold(Amount::ZERO, |balance, tx| {
                balance.checked_add(tx.delta_for(participant)?)
            })
    }

    /// Checks whether the sender can cover the amount
    pub fn verify_transaction(&self, chain: &Chain, transaction: &Transaction) -> bool {
        matches!(
            self.balance_of(chain, &transaction.sender),
            Ok(balance) if balance >= transaction.amount
        )
    }

    /// Checks every pending transaction against the current balances
    pub fn verify_all_pending(&self, chain: &Chain) -> bool {
        self.pending
            .iter()
            .all(|tx| self.verify_transaction(chain, tx))
    }

    /// Admits a transaction into the pending pool
    ///
    /// # Arguments
    ///
    /// * `chain` - The committed chain
    /// * `transaction` - The transaction to add
    ///
    /// # Returns
    ///
    /// Ok(()) if the transaction was added; nothing changes on rejection
    pub fn propose(
        &mut self,
        chain: &Chain,
        transaction: Transaction,
    ) -> Result<(), TransactionError> {
        if !transaction.amount.is_positive() {
            return Err(TransactionError::InvalidAmount(transaction.amount));
        }

        let available = self.balance_of(chain, &transaction.sender)?;
        if available < transaction.amount {
            return Err(TransactionError::InsufficientFunds {
                required: transaction.amount,
                available,
            });
        }

        total_volume(
            chain
                .transactions()
                .chain(self.pending.iter())
                .chain(iter::once(&transaction)),
        )?;

        debug!(
            "Accepted transaction {} -> {} ({})",
            transaction.sender, transaction.recipient, transaction.amount
        );
        self.register(&transaction);
        self.pending.push(transaction);
        Ok(())
    }

    /// Removes the most recently proposed transaction
    pub(crate) fn undo_propose(&mut self, chain: &Chain) -> Option<Transaction> {
        let removed = self.pending.pop();
        self.rebuild_participants(chain);
        removed
    }

    /// Drops the first `count` pending transactions after they were committed
    ///
    /// Proposals that arrived after the snapshot was taken stay pending.
    pub(crate) fn commit(&mut self, count: usize, block: &Block) -> Vec<Transaction> {
        let end = count.min(self.pending.len());
        let committed: Vec<Transaction> = self.pending.drain(..end).collect();
        for transaction in &block.transactions {
            self.register(transaction);
        }
        committed
    }

    /// Puts committed transactions back at the front of the pool
    pub(crate) fn uncommit(&mut self, chain: &Chain, mut committed: Vec<Transaction>) {
        committed.append(&mut self.pending);
        self.pending = committed;
        self.rebuild_participants(chain);
    }

    fn register(&mut self, transaction: &Transaction) {
        for party in [&transaction.sender, &transaction.recipient] {
            if party != MINING_SENDER && !self.participants.contains(party) {
                self.participants.insert(party.clone());
            }
        }
    }

    fn rebuild_participants(&mut self, chain: &Chain) {
        self.participants = chain
            .transactions()
            .chain(self.pending.iter())
            .flat_map(|tx| [&tx.sender, &tx.recipient])
            .filter(|party| party.as_str() != MINING_SENDER)
            .cloned()
            .collect();
    }
}
