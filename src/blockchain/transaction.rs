use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use super::amount::{Amount, AmountError};

/// Sender identifier used for mining rewards
pub const MINING_SENDER: &str = "MINING";

/// Errors that can occur when admitting a transaction
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransactionError {
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: Amount, available: Amount },

    #[error("Invalid amount: {0} (must be positive)")]
    InvalidAmount(Amount),

    #[error("{0}")]
    AmountError(#[from] AmountError),
}

/// Represents a transfer of coins between two participants
///
/// Field order is part of the hash input and must not change.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct Transaction {
    /// Sender's identifier
    pub sender: String,

    /// Recipient's identifier
    pub recipient: String,

    /// Amount being transferred, in minor units
    #[schema(value_type = i64, example = 500)]
    pub amount: Amount,
}

impl Transaction {
    /// Creates a new transaction
    ///
    /// # Arguments
    ///
    /// * `sender` - The identifier of the sender
    /// * `recipient` - The identifier of the recipient
    /// * `amount` - The amount to transfer
    ///
    /// # Returns
    ///
    /// A new Transaction instance
    pub fn new(sender: impl Into<String>, recipient: impl Into<String>, amount: Amount) -> Self {
        Transaction {
            sender: sender.into(),
            recipient: recipient.into(),
            amount,
        }
    }

    /// Creates a mining reward transaction
    ///
    /// Rewards are minted, not transferred, so they never pass the funds check.
    pub fn reward(recipient: impl Into<String>, amount: Amount) -> Self {
        Transaction::new(MINING_SENDER, recipient, amount)
    }

    /// Checks if the transaction is a mining reward
    pub fn is_reward(&self) -> bool {
        self.sender == MINING_SENDER
    }

    /// Returns true if `participant` is the sender or the recipient
    pub fn involves(&self, participant: &str) -> bool {
        self.sender == participant || self.recipient == participant
    }

    /// Net effect of this transaction on `participant`'s balance
    pub fn delta_for(&self, participant: &str) -> Result<Amount, AmountError> {
        let credit = if self.recipient == participant {
            self.amount
        } else {
            Amount::ZERO
        };
        let debit = if self.sender == participant {
            self.amount
        } else {
            Amount::ZERO
        };
        credit.checked_sub(debit)
    }
}
