//! Mining engine for the ledger
//!
//! The nonce search runs without touching the chain. It works from a
//! snapshot of the tip and can be abandoned through a cancellation token
//! when the chain moves underneath it.

use crate::core::{calculate_hash, Block, Blockchain, BlockchainError, Transaction};
use crate::crypto::hex_meets_difficulty;
use log::info;
use std::time::Instant;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Nonces tried between two looks at the cancellation token
const CANCEL_CHECK_INTERVAL: u64 = 1024;

/// Mining statistics
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MiningStats {
    /// Number of hash attempts
    pub hash_attempts: u64,
    /// Time taken in milliseconds
    pub time_ms: u128,
    /// Hash rate (hashes per second)
    pub hash_rate: f64,
}

impl MiningStats {
    fn new(hash_attempts: u64, started: Instant) -> Self {
        let time_ms = started.elapsed().as_millis();
        let hash_rate = if time_ms > 0 {
            (hash_attempts as f64) / (time_ms as f64 / 1000.0)
        } else {
            hash_attempts as f64
        };
        Self {
            hash_attempts,
            time_ms,
            hash_rate,
        }
    }
}

/// Result of a nonce search
#[derive(Debug, Clone)]
pub enum MineOutcome {
    /// A block satisfying its difficulty was found
    Found { block: Block, stats: MiningStats },
    /// The search was abandoned before a solution was found
    Cancelled { attempts: u64 },
}

/// Mining errors
#[derive(Error, Debug)]
pub enum MiningError {
    #[error("Mining cancelled after {attempts} attempts")]
    Cancelled { attempts: u64 },
    #[error("Mined block rejected: {0}")]
    Rejected(#[from] BlockchainError),
}

/// Search nonces from 0 until the block hash meets `difficulty`.
///
/// The timestamp is fixed when the search starts.
pub fn mine(
    index: u64,
    previous_hash: &str,
    data: Vec<Transaction>,
    difficulty: u32,
    cancel: &CancellationToken,
) -> MineOutcome {
    let started = Instant::now();
    let timestamp = chrono::Utc::now().timestamp();
    let mut nonce: u64 = 0;

    loop {
        if nonce % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
            return MineOutcome::Cancelled { attempts: nonce };
        }

        let hash = calculate_hash(
            index,
            Some(previous_hash),
            timestamp,
            &data,
            difficulty,
            nonce,
        );
        if hex_meets_difficulty(&hash, difficulty) {
            let stats = MiningStats::new(nonce + 1, started);
            let block = Block {
                index,
                hash,
                previous_hash: Some(previous_hash.to_string()),
                timestamp,
                data,
                difficulty,
                nonce,
            };
            return MineOutcome::Found { block, stats };
        }

        nonce = nonce.wrapping_add(1);
    }
}

/// Miner for creating new blocks
#[derive(Debug, Clone)]
pub struct Miner {
    /// Miner's address for receiving rewards
    pub address: String,
}

impl Miner {
    /// Create a new miner
    pub fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
        }
    }

    /// Mine a block on top of `previous` without holding any chain lock.
    ///
    /// The coinbase paying this miner is placed in front of `transactions`.
    /// The caller appends the result under its own write lock.
    pub fn mine_block_detached(
        &self,
        previous: &Block,
        difficulty: u32,
        transactions: Vec<Transaction>,
        cancel: &CancellationToken,
    ) -> MineOutcome {
        let index = previous.index + 1;

        let mut data = Vec::with_capacity(transactions.len() + 1);
        data.push(Transaction::coinbase(&self.address, index));
        data.extend(transactions);

        info!(
            "Mining block {} with difficulty {} ({} txs)...",
            index,
            difficulty,
            data.len()
        );

        let outcome = mine(index, &previous.hash, data, difficulty, cancel);
        match &outcome {
            MineOutcome::Found { block, stats } => info!(
                "Block {} mined in {}ms ({} attempts, {:.2} H/s)",
                block.index, stats.time_ms, stats.hash_attempts, stats.hash_rate
            ),
            MineOutcome::Cancelled { attempts } => info!(
                "Mining of block {} cancelled after {} attempts",
                index, attempts
            ),
        }
        outcome
    }

    /// Mine and append a block directly to an owned chain
    pub fn mine_block(
        &self,
        blockchain: &mut Blockchain,
        transactions: Vec<Transaction>,
    ) -> Result<(Block, MiningStats), MiningError> {
        let outcome = self.mine_block_detached(
            blockchain.latest_block(),
            blockchain.next_difficulty(),
            transactions,
            &CancellationToken::new(),
        );

        match outcome {
            MineOutcome::Found { block, stats } => {
                blockchain.add_block(block.clone())?;
                Ok((block, stats))
            }
            MineOutcome::Cancelled { attempts } => Err(MiningError::Cancelled { attempts }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::BLOCK_REWARD;
    use crate::crypto::KeyPair;

    #[test]
    fn test_miner() {
        let mut blockchain = Blockchain::new();
        let address = KeyPair::generate().public_key_hex();
        let miner = Miner::new(&address);

        let (block, stats) = miner.mine_block(&mut blockchain, vec![]).unwrap();

        assert_eq!(block.index, 1);
        assert!(block.is_valid_pow());
        assert!(stats.hash_attempts > 0);
        assert_eq!(blockchain.get_balance(&address), BLOCK_REWARD);
    }

    #[test]
    fn test_mine_multiple_blocks() {
        let mut blockchain = Blockchain::new();
        let miner = Miner::new(&KeyPair::generate().public_key_hex());

        for _ in 0..3 {
            miner.mine_block(&mut blockchain, vec![]).unwrap();
        }

        assert_eq!(blockchain.height(), 3);
        assert_eq!(
            blockchain.utxo_set().total_amount(),
            BLOCK_REWARD * blockchain.blocks().len() as u64
        );
    }

    #[test]
    fn test_mined_block_meets_difficulty() {
        let genesis = Block::genesis();
        let miner = Miner::new(&KeyPair::generate().public_key_hex());

        let outcome = miner.mine_block_detached(&genesis, 8, vec![], &CancellationToken::new());
        let MineOutcome::Found { block, .. } = outcome else {
            panic!("search was not cancelled");
        };
        assert!(block.verify_hash());
        assert!(block.is_valid_pow());
        assert_eq!(block.previous_hash.as_deref(), Some(genesis.hash.as_str()));
        assert!(block.data[0].validate_coinbase(1).is_ok());
    }

    #[test]
    fn test_cancelled_search() {
        let genesis = Block::genesis();
        let cancel = CancellationToken::new();
        cancel.cancel();

        // unreachable difficulty, only cancellation can end this
        let outcome = mine(1, &genesis.hash, vec![], 256, &cancel);
        assert!(matches!(outcome, MineOutcome::Cancelled { attempts: 0 }));
    }
}
