use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::block::Block;

/// Hex encoded SHA-256 digest
pub type Hash = String;

/// Errors that can occur while encoding values for hashing or persistence
#[derive(Debug, Error)]
pub enum HashingError {
    #[error("Encoding error: {0}")]
    EncodingError(#[from] serde_json::Error),
}

/// Encodes a value into its canonical byte form
///
/// Compact JSON with struct fields in declaration order. Ledger types hold no
/// unordered maps, so nothing iteration-order dependent reaches the output;
/// any map that needs to be hashed must be a `BTreeMap`.
///
/// # Arguments
///
/// * `value` - The value to encode
///
/// # Returns
///
/// The canonical JSON bytes
pub fn canonical_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, HashingError> {
    Ok(serde_json::to_vec(value)?)
}

/// Hashes any serializable value through its canonical encoding
pub fn hash_value<T: Serialize + ?Sized>(value: &T) -> Result<Hash, HashingError> {
    let bytes = canonical_json(value)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// Hashes a block
///
/// # Arguments
///
/// * `block` - The block to hash
///
/// # Returns
///
/// The SHA-256 hash of the block as a hexadecimal string
pub fn hash_block(block: &Block) -> Result<Hash, HashingError> {
    hash_value(block)
}
