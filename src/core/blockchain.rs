//! Blockchain implementation
//!
//! The chain aggregate owns the ordered blocks and the UTXO set derived from
//! them. Blocks are appended only after full validation, and a competing
//! chain replaces the local one only when it carries more cumulative work.

use crate::core::block::{validate_block, Block, BlockError};
use crate::core::transaction::{process_transactions, COINBASE_AMOUNT};
use crate::core::utxo::UtxoSet;
use thiserror::Error;

/// Block reward in coins
pub const BLOCK_REWARD: u64 = COINBASE_AMOUNT;

/// Target seconds between blocks
pub const BLOCK_GENERATION_INTERVAL: i64 = 10;

/// Number of blocks between difficulty adjustments
pub const DIFFICULTY_ADJUSTMENT_INTERVAL: u64 = 10;

/// Blockchain-related errors
#[derive(Error, Debug)]
pub enum BlockchainError {
    #[error("Chain is empty")]
    EmptyChain,
    #[error("Chain does not start with the genesis block")]
    InvalidGenesis,
    #[error("Invalid block {index}: {source}")]
    InvalidBlock { index: u64, source: BlockError },
    #[error("Candidate chain work {candidate} does not exceed local work {local}")]
    NotHeavier { candidate: u128, local: u128 },
}

/// Current wall-clock time in seconds
pub fn current_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Difficulty required for the block that follows `chain`'s tip
pub fn difficulty_for(chain: &[Block]) -> u32 {
    let Some(latest) = chain.last() else {
        return 0;
    };

    if latest.index != 0 && latest.index % DIFFICULTY_ADJUSTMENT_INTERVAL == 0 {
        adjusted_difficulty(chain, latest)
    } else {
        latest.difficulty
    }
}

/// Retarget from the block that opened the window ending at `latest`.
/// Moves by at most one step per window; a window taken in exactly half
/// (or double) the expected time already counts as fast (or slow).
fn adjusted_difficulty(chain: &[Block], latest: &Block) -> u32 {
    let Some(start) = chain
        .len()
        .checked_sub(1 + DIFFICULTY_ADJUSTMENT_INTERVAL as usize)
    else {
        return latest.difficulty;
    };
    let window_start = &chain[start];

    let expected = BLOCK_GENERATION_INTERVAL * DIFFICULTY_ADJUSTMENT_INTERVAL as i64;
    let taken = latest.timestamp - window_start.timestamp;

    let difficulty = if taken <= expected / 2 {
        window_start.difficulty.saturating_add(1)
    } else if taken >= expected * 2 {
        window_start.difficulty.saturating_sub(1)
    } else {
        window_start.difficulty
    };

    if difficulty != window_start.difficulty {
        log::info!(
            "Difficulty adjusted from {} to {} at block {} (time taken: {}s, expected: {}s)",
            window_start.difficulty,
            difficulty,
            latest.index,
            taken,
            expected
        );
    }

    difficulty
}

/// Sum of `2^difficulty` over every block
pub fn cumulative_work(chain: &[Block]) -> u128 {
    chain
        .iter()
        .fold(0u128, |acc, block| acc.saturating_add(block.work()))
}

/// Check a whole chain: exact genesis, then every consecutive pair
pub fn validate_chain(chain: &[Block], now: i64) -> Result<(), BlockchainError> {
    let first = chain.first().ok_or(BlockchainError::EmptyChain)?;
    if *first != Block::genesis() {
        return Err(BlockchainError::InvalidGenesis);
    }

    for pair in chain.windows(2) {
        validate_block(&pair[1], &pair[0], now).map_err(|source| {
            BlockchainError::InvalidBlock {
                index: pair[1].index,
                source,
            }
        })?;
    }

    Ok(())
}

/// Fork choice: accept `candidate` only if it is valid and strictly heavier
pub fn should_replace(candidate: &[Block], local: &[Block], now: i64) -> Result<(), BlockchainError> {
    validate_chain(candidate, now)?;

    let candidate_work = cumulative_work(candidate);
    let local_work = cumulative_work(local);
    if candidate_work > local_work {
        Ok(())
    } else {
        Err(BlockchainError::NotHeavier {
            candidate: candidate_work,
            local: local_work,
        })
    }
}

/// Derive the UTXO set by replaying every block from genesis
pub fn rebuild_utxo_set(chain: &[Block]) -> Result<UtxoSet, BlockchainError> {
    chain.iter().try_fold(UtxoSet::new(), |utxos, block| {
        process_transactions(&block.data, &utxos, block.index).map_err(|e| {
            BlockchainError::InvalidBlock {
                index: block.index,
                source: BlockError::Transactions(e),
            }
        })
    })
}

/// The main blockchain structure
#[derive(Debug, Clone)]
pub struct Blockchain {
    /// The chain of blocks
    blocks: Vec<Block>,
    /// Unspent transaction outputs at the tip
    utxo_set: UtxoSet,
}

impl Blockchain {
    /// Create a new blockchain holding only the genesis block
    pub fn new() -> Self {
        let genesis = Block::genesis();
        let utxo_set = UtxoSet::new().apply(&genesis.data);
        Self {
            blocks: vec![genesis],
            utxo_set,
        }
    }

    /// Get the latest block
    pub fn latest_block(&self) -> &Block {
        self.blocks
            .last()
            .expect("Blockchain should have at least genesis block")
    }

    /// Get a block by index
    pub fn get_block(&self, index: u64) -> Option<&Block> {
        self.blocks.get(index as usize)
    }

    /// Get blockchain height
    pub fn height(&self) -> u64 {
        self.latest_block().index
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn utxo_set(&self) -> &UtxoSet {
        &self.utxo_set
    }

    /// Difficulty the next block must be mined at
    pub fn next_difficulty(&self) -> u32 {
        difficulty_for(&self.blocks)
    }

    pub fn cumulative_work(&self) -> u128 {
        cumulative_work(&self.blocks)
    }

    /// Get balance for an address
    pub fn get_balance(&self, address: &str) -> u64 {
        self.utxo_set.balance(address)
    }

    /// Append `block` on top of the current tip.
    ///
    /// A block with a valid header is still rejected when its transactions
    /// do not apply to the current UTXO set. Nothing changes on rejection.
    pub fn add_block(&mut self, block: Block) -> Result<(), BlockchainError> {
        let index = block.index;
        let invalid = |source| BlockchainError::InvalidBlock { index, source };

        validate_block(&block, self.latest_block(), current_timestamp()).map_err(invalid)?;
        let utxo_set = process_transactions(&block.data, &self.utxo_set, block.index)
            .map_err(|e| invalid(BlockError::Transactions(e)))?;

        log::info!(
            "Accepted block {} ({} txs, difficulty {})",
            block.index,
            block.data.len(),
            block.difficulty
        );

        self.utxo_set = utxo_set;
        self.blocks.push(block);
        Ok(())
    }

    /// Swap in `candidate` if fork choice prefers it. The UTXO set is rebuilt
    /// from genesis before anything is committed.
    pub fn replace_chain(&mut self, candidate: Vec<Block>) -> Result<(), BlockchainError> {
        should_replace(&candidate, &self.blocks, current_timestamp())?;
        let utxo_set = rebuild_utxo_set(&candidate)?;

        log::info!(
            "Replacing chain: height {} -> {}, work {} -> {}",
            self.height(),
            candidate.len().saturating_sub(1),
            self.cumulative_work(),
            cumulative_work(&candidate)
        );

        self.blocks = candidate;
        self.utxo_set = utxo_set;
        Ok(())
    }

    /// Get chain statistics
    pub fn stats(&self) -> ChainStats {
        ChainStats {
            height: self.height(),
            total_blocks: self.blocks.len() as u64,
            total_transactions: self.blocks.iter().map(|b| b.data.len() as u64).sum(),
            total_coins: self.utxo_set.total_amount(),
            next_difficulty: self.next_difficulty(),
            cumulative_work: self.cumulative_work(),
            latest_hash: self.latest_block().hash.clone(),
        }
    }
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::new()
    }
}

/// Chain statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct ChainStats {
    pub height: u64,
    pub total_blocks: u64,
    pub total_transactions: u64,
    pub total_coins: u64,
    pub next_difficulty: u32,
    pub cumulative_work: u128,
    pub latest_hash: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transaction::Transaction;
    use crate::crypto::KeyPair;

    fn mine_on(previous: &Block, difficulty: u32, miner: &str) -> Block {
        let mut block = Block {
            index: previous.index + 1,
            hash: String::new(),
            previous_hash: Some(previous.hash.clone()),
            timestamp: current_timestamp(),
            data: vec![Transaction::coinbase(miner, previous.index + 1)],
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

    fn fork(length: usize, difficulty: u32) -> Vec<Block> {
        let miner = KeyPair::generate().public_key_hex();
        let mut chain = vec![Block::genesis()];
        for _ in 0..length {
            let next = mine_on(chain.last().unwrap(), difficulty, &miner);
            chain.push(next);
        }
        chain
    }

    fn synthetic(spacing: i64, difficulty: u32, blocks: u64) -> Vec<Block> {
        (0..blocks)
            .map(|i| Block {
                index: i,
                hash: String::new(),
                previous_hash: None,
                timestamp: 1_000_000 + spacing * i as i64,
                data: vec![],
                difficulty,
                nonce: 0,
            })
            .collect()
    }

    #[test]
    fn test_new_blockchain() {
        let blockchain = Blockchain::new();
        assert_eq!(blockchain.blocks().len(), 1);
        assert_eq!(blockchain.height(), 0);
        assert!(validate_chain(blockchain.blocks(), current_timestamp()).is_ok());
        assert_eq!(blockchain.utxo_set().total_amount(), BLOCK_REWARD);
    }

    #[test]
    fn test_add_block_updates_utxos() {
        let mut blockchain = Blockchain::new();
        let miner = KeyPair::generate().public_key_hex();

        let block = mine_on(blockchain.latest_block(), 2, &miner);
        blockchain.add_block(block).unwrap();

        assert_eq!(blockchain.height(), 1);
        assert_eq!(blockchain.get_balance(&miner), BLOCK_REWARD);
        assert_eq!(
            blockchain.utxo_set().total_amount(),
            BLOCK_REWARD * blockchain.blocks().len() as u64
        );
    }

    #[test]
    fn test_economically_invalid_block_rejected() {
        let mut blockchain = Blockchain::new();
        let miner = KeyPair::generate().public_key_hex();

        let mut block = mine_on(blockchain.latest_block(), 0, &miner);
        block.data[0].tx_outs[0].amount = BLOCK_REWARD + 1;
        block.data[0].id = block.data[0].compute_id();
        block.hash = block.compute_hash();

        let err = blockchain.add_block(block).unwrap_err();
        assert!(matches!(
            err,
            BlockchainError::InvalidBlock {
                index: 1,
                source: BlockError::Transactions(_)
            }
        ));
        assert_eq!(blockchain.height(), 0);
        assert_eq!(blockchain.get_balance(&miner), 0);
    }

    #[test]
    fn test_chain_must_start_at_genesis() {
        let mut chain = fork(2, 0);
        chain[0].timestamp += 1;
        chain[0].hash = chain[0].compute_hash();
        assert!(matches!(
            validate_chain(&chain, current_timestamp()),
            Err(BlockchainError::InvalidGenesis)
        ));
        assert!(matches!(
            validate_chain(&[], current_timestamp()),
            Err(BlockchainError::EmptyChain)
        ));
    }

    #[test]
    fn test_hash_chain_integrity() {
        let chain = fork(4, 1);
        for block in &chain {
            assert_eq!(block.hash, block.compute_hash());
        }
        assert!(validate_chain(&chain, current_timestamp()).is_ok());
    }

    #[test]
    fn test_retarget_fast_window_increases_difficulty() {
        let chain = synthetic(BLOCK_GENERATION_INTERVAL / 2, 3, 11);
        assert_eq!(difficulty_for(&chain), 4);
        assert_eq!(difficulty_for(&synthetic(4, 3, 11)), 4);
    }

    #[test]
    fn test_retarget_slow_window_decreases_difficulty() {
        let chain = synthetic(BLOCK_GENERATION_INTERVAL * 2, 3, 11);
        assert_eq!(difficulty_for(&chain), 2);
        assert_eq!(difficulty_for(&synthetic(21, 3, 11)), 2);
    }

    #[test]
    fn test_retarget_on_schedule_keeps_difficulty() {
        let chain = synthetic(BLOCK_GENERATION_INTERVAL, 3, 11);
        assert_eq!(difficulty_for(&chain), 3);
        assert_eq!(difficulty_for(&synthetic(6, 3, 11)), 3);
        assert_eq!(difficulty_for(&synthetic(19, 3, 11)), 3);
    }

    #[test]
    fn test_no_retarget_between_boundaries() {
        let chain = synthetic(1, 3, 10);
        assert_eq!(difficulty_for(&chain), 3);
        assert_eq!(difficulty_for(&synthetic(1, 5, 1)), 5);
    }

    #[test]
    fn test_retarget_never_goes_negative() {
        let chain = synthetic(100, 0, 11);
        assert_eq!(difficulty_for(&chain), 0);
    }

    #[test]
    fn test_fork_choice_prefers_cumulative_work() {
        let light = fork(3, 2);
        let heavy = fork(3, 3);
        assert!(cumulative_work(&heavy) > cumulative_work(&light));

        // light first, then heavy
        let mut a = Blockchain::new();
        a.replace_chain(light.clone()).unwrap();
        a.replace_chain(heavy.clone()).unwrap();

        // heavy first, then light
        let mut b = Blockchain::new();
        b.replace_chain(heavy.clone()).unwrap();
        assert!(matches!(
            b.replace_chain(light),
            Err(BlockchainError::NotHeavier { .. })
        ));

        assert_eq!(a.blocks(), heavy.as_slice());
        assert_eq!(b.blocks(), heavy.as_slice());
        assert_eq!(a.utxo_set(), b.utxo_set());
    }

    #[test]
    fn test_longer_but_lighter_chain_loses() {
        let mut blockchain = Blockchain::new();
        blockchain.replace_chain(fork(2, 4)).unwrap(); // 1 + 16 + 16

        let longer = fork(4, 2); // 1 + 4 * 4
        assert!(blockchain.replace_chain(longer).is_err());
        assert_eq!(blockchain.height(), 2);
    }

    #[test]
    fn test_replay_matches_incremental_utxos() {
        let mut blockchain = Blockchain::new();
        let miner = KeyPair::generate().public_key_hex();
        for _ in 0..3 {
            let block = mine_on(blockchain.latest_block(), 1, &miner);
            blockchain.add_block(block).unwrap();
        }

        let replayed = rebuild_utxo_set(blockchain.blocks()).unwrap();
        assert_eq!(&replayed, blockchain.utxo_set());
    }
}
