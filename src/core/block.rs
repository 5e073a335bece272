//! Block implementation for the ledger
//!
//! A block carries its position, a link to its parent, the transactions it
//! confirms and the proof of work that seals them.

use crate::core::transaction::Transaction;
use crate::crypto::{hex_meets_difficulty, sha256_hex};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Block Constants
// =============================================================================

/// Allowed drift (seconds) of a block timestamp against its parent and the clock
pub const TIMESTAMP_TOLERANCE: i64 = 60;

/// Timestamp of the genesis block
pub const GENESIS_TIMESTAMP: i64 = 1_530_709_157;

/// Address credited by the genesis coinbase (the secp256k1 generator point)
pub const GENESIS_ADDRESS: &str = "0479be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798483ada7726a3c4655da4fbfc0e1108a8fd17b448a68554199c47d08ffb10d4b8";

// =============================================================================
// Block Errors
// =============================================================================

/// Block validation errors
#[derive(Error, Debug)]
pub enum BlockError {
    #[error("Malformed block: {0}")]
    Structure(String),
    #[error("Block does not extend its parent: {0}")]
    ChainLinkage(String),
    #[error("Invalid proof of work: hash does not have {0} leading zero bits")]
    ProofOfWork(u32),
    #[error("Invalid block hash")]
    InvalidHash,
    #[error("Timestamp {timestamp} outside the tolerated window")]
    Timestamp { timestamp: i64 },
    #[error("Invalid block transactions: {0}")]
    Transactions(#[from] crate::core::TransactionError),
}

/// Canonical string form of a transaction list (JSON, fields in declaration order)
pub fn serialize_transactions(data: &[Transaction]) -> String {
    serde_json::to_string(data).expect("transaction lists always serialize to JSON")
}

/// SHA-256 over `index ‖ previousHash ‖ timestamp ‖ data ‖ difficulty ‖ nonce`
pub fn calculate_hash(
    index: u64,
    previous_hash: Option<&str>,
    timestamp: i64,
    data: &[Transaction],
    difficulty: u32,
    nonce: u64,
) -> String {
    let preimage = format!(
        "{}{}{}{}{}{}",
        index,
        previous_hash.unwrap_or(""),
        timestamp,
        serialize_transactions(data),
        difficulty,
        nonce
    );
    sha256_hex(preimage.as_bytes())
}

/// A block in the chain
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    /// Block index/height
    pub index: u64,
    /// Block hash
    pub hash: String,
    /// Hash of the parent block (absent only for genesis)
    pub previous_hash: Option<String>,
    /// Creation time in seconds since the epoch
    pub timestamp: i64,
    /// Transactions, coinbase first
    pub data: Vec<Transaction>,
    /// Required number of leading zero bits
    pub difficulty: u32,
    /// Nonce used for proof of work
    pub nonce: u64,
}

impl Block {
    /// The fixed genesis block shared by every node
    pub fn genesis() -> Self {
        let data = vec![Transaction::coinbase(GENESIS_ADDRESS, 0)];
        let hash = calculate_hash(0, None, GENESIS_TIMESTAMP, &data, 0, 0);
        Self {
            index: 0,
            hash,
            previous_hash: None,
            timestamp: GENESIS_TIMESTAMP,
            data,
            difficulty: 0,
            nonce: 0,
        }
    }

    /// Recompute the hash from the block's fields
    pub fn compute_hash(&self) -> String {
        calculate_hash(
            self.index,
            self.previous_hash.as_deref(),
            self.timestamp,
            &self.data,
            self.difficulty,
            self.nonce,
        )
    }

    /// Verify the stored hash
    pub fn verify_hash(&self) -> bool {
        self.hash == self.compute_hash()
    }

    /// Check if the proof of work is valid
    pub fn is_valid_pow(&self) -> bool {
        hex_meets_difficulty(&self.hash, self.difficulty)
    }

    /// Proof-of-work weight of this block: `2^difficulty`, saturating
    pub fn work(&self) -> u128 {
        1u128.checked_shl(self.difficulty).unwrap_or(u128::MAX)
    }

    /// Shape checks that don't need the parent
    pub fn validate_structure(&self) -> Result<(), BlockError> {
        if self.hash.len() != 64 || !self.hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(BlockError::Structure("hash is not 64 hex characters".to_string()));
        }
        match &self.previous_hash {
            Some(prev) if prev.len() == 64 && prev.chars().all(|c| c.is_ascii_hexdigit()) => {}
            Some(_) => {
                return Err(BlockError::Structure(
                    "previous hash is not 64 hex characters".to_string(),
                ))
            }
            None => {
                return Err(BlockError::Structure(
                    "only genesis may omit the previous hash".to_string(),
                ))
            }
        }
        if self.data.is_empty() {
            return Err(BlockError::Structure("block has no transactions".to_string()));
        }
        Ok(())
    }
}

/// Validate `candidate` as the direct successor of `previous` at wall-clock `now`.
///
/// Only header-level rules are checked here; transaction validity is settled
/// when the block is applied to the UTXO set.
pub fn validate_block(candidate: &Block, previous: &Block, now: i64) -> Result<(), BlockError> {
    candidate.validate_structure()?;

    if candidate.index != previous.index + 1 {
        return Err(BlockError::ChainLinkage(format!(
            "expected index {}, got {}",
            previous.index + 1,
            candidate.index
        )));
    }

    if candidate.previous_hash.as_deref() != Some(previous.hash.as_str()) {
        return Err(BlockError::ChainLinkage(
            "previous hash does not match the parent".to_string(),
        ));
    }

    if !candidate.verify_hash() {
        return Err(BlockError::InvalidHash);
    }

    if !candidate.is_valid_pow() {
        return Err(BlockError::ProofOfWork(candidate.difficulty));
    }

    // only trusted values appear in the arithmetic
    let after_parent =
        previous.timestamp.saturating_sub(TIMESTAMP_TOLERANCE) < candidate.timestamp;
    let not_in_future = candidate.timestamp < now.saturating_add(TIMESTAMP_TOLERANCE);
    if !after_parent || !not_in_future {
        return Err(BlockError::Timestamp {
            timestamp: candidate.timestamp,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;

    /// Brute-force a child of `previous` at the given difficulty
    fn child(previous: &Block, timestamp: i64, difficulty: u32) -> Block {
        let miner = KeyPair::generate().public_key_hex();
        let data = vec![Transaction::coinbase(&miner, previous.index + 1)];
        let mut block = Block {
            index: previous.index + 1,
            hash: String::new(),
            previous_hash: Some(previous.hash.clone()),
            timestamp,
            data,
            difficulty,
            nonce: 0,
        };
        loop {
            block.hash = block.compute_hash();
            if block.is_valid_pow() {
                return block;
            }
            block.nonce += 1;
        }
    }

    fn now() -> i64 {
        chrono::Utc::now().timestamp()
    }

    #[test]
    fn test_genesis_block() {
        let genesis = Block::genesis();
        assert_eq!(genesis.index, 0);
        assert_eq!(genesis.previous_hash, None);
        assert!(genesis.verify_hash());
        assert_eq!(genesis, Block::genesis());
        assert!(genesis.data[0].validate_coinbase(0).is_ok());
    }

    #[test]
    fn test_valid_child_accepted() {
        let genesis = Block::genesis();
        let block = child(&genesis, now(), 4);
        assert!(validate_block(&block, &genesis, now()).is_ok());
    }

    #[test]
    fn test_block_hash_verification() {
        let genesis = Block::genesis();
        let mut block = child(&genesis, now(), 0);
        assert!(block.verify_hash());

        // Tamper with nonce
        block.nonce += 1;
        assert!(!block.verify_hash());
        assert!(matches!(
            validate_block(&block, &genesis, now()),
            Err(BlockError::InvalidHash)
        ));
    }

    #[test]
    fn test_linkage_checks() {
        let genesis = Block::genesis();
        let block = child(&genesis, now(), 0);

        let mut wrong_index = block.clone();
        wrong_index.index = 5;
        wrong_index.hash = wrong_index.compute_hash();
        assert!(matches!(
            validate_block(&wrong_index, &genesis, now()),
            Err(BlockError::ChainLinkage(_))
        ));

        let mut wrong_parent = block.clone();
        wrong_parent.previous_hash = Some("0".repeat(64));
        wrong_parent.hash = wrong_parent.compute_hash();
        assert!(matches!(
            validate_block(&wrong_parent, &genesis, now()),
            Err(BlockError::ChainLinkage(_))
        ));
    }

    #[test]
    fn test_insufficient_work_rejected() {
        let genesis = Block::genesis();
        let mut block = child(&genesis, now(), 0);
        // claim a difficulty the hash almost surely does not meet
        block.difficulty = 64;
        block.hash = block.compute_hash();
        assert!(matches!(
            validate_block(&block, &genesis, now()),
            Err(BlockError::ProofOfWork(64))
        ));
    }

    #[test]
    fn test_timestamp_window() {
        let genesis = Block::genesis();
        let t = now();

        let too_old = child(&genesis, GENESIS_TIMESTAMP - TIMESTAMP_TOLERANCE, 0);
        assert!(matches!(
            validate_block(&too_old, &genesis, t),
            Err(BlockError::Timestamp { .. })
        ));

        let too_new = child(&genesis, t + TIMESTAMP_TOLERANCE, 0);
        assert!(matches!(
            validate_block(&too_new, &genesis, t),
            Err(BlockError::Timestamp { .. })
        ));

        let slightly_ahead = child(&genesis, t + TIMESTAMP_TOLERANCE - 1, 0);
        assert!(validate_block(&slightly_ahead, &genesis, t).is_ok());
    }

    #[test]
    fn test_extreme_timestamps_rejected() {
        let genesis = Block::genesis();
        for timestamp in [i64::MIN, i64::MAX] {
            let block = child(&genesis, timestamp, 0);
            assert!(matches!(
                validate_block(&block, &genesis, now()),
                Err(BlockError::Timestamp { .. })
            ));
        }
    }

    #[test]
    fn test_work_is_exponential_in_difficulty() {
        let mut block = Block::genesis();
        block.difficulty = 3;
        assert_eq!(block.work(), 8);
        block.difficulty = 200;
        assert_eq!(block.work(), u128::MAX);
    }
}
