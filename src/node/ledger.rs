//! The ledger aggregate
//!
//! Owns the chain, its UTXO set and the mempool together, so a UTXO update
//! and the prune that depends on it always happen in one critical section.

use crate::core::{Block, Blockchain, BlockchainError, Transaction, UtxoSet};
use crate::mining::{Mempool, MempoolError};
use crate::wallet::{self, WalletError};

/// Inputs for one round of mining, copied out of the ledger
#[derive(Debug, Clone)]
pub struct MiningTemplate {
    pub previous: Block,
    pub difficulty: u32,
    pub transactions: Vec<Transaction>,
}

/// Chain and mempool under a single owner
#[derive(Debug, Default)]
pub struct Ledger {
    blockchain: Blockchain,
    mempool: Mempool,
}

impl Ledger {
    /// A ledger holding only the genesis block and an empty pool
    pub fn new() -> Self {
        Self::default()
    }

    pub fn blockchain(&self) -> &Blockchain {
        &self.blockchain
    }

    pub fn mempool(&self) -> &Mempool {
        &self.mempool
    }

    pub fn utxo_set(&self) -> &UtxoSet {
        self.blockchain.utxo_set()
    }

    /// Tip, next difficulty and pending transactions for a miner
    pub fn mining_template(&self) -> MiningTemplate {
        MiningTemplate {
            previous: self.blockchain.latest_block().clone(),
            difficulty: self.blockchain.next_difficulty(),
            transactions: self.mempool.snapshot(),
        }
    }

    /// Append a block, then prune the pool. Returns how many pooled
    /// transactions were dropped.
    pub fn append_block(&mut self, block: Block) -> Result<usize, BlockchainError> {
        self.blockchain.add_block(block)?;
        Ok(self.mempool.prune(self.blockchain.utxo_set()))
    }

    /// Adopt `candidate` if it is heavier, then prune the pool
    pub fn replace_chain(&mut self, candidate: Vec<Block>) -> Result<usize, BlockchainError> {
        self.blockchain.replace_chain(candidate)?;
        Ok(self.mempool.prune(self.blockchain.utxo_set()))
    }

    /// Admit a transaction against the current UTXO set
    pub fn admit_transaction(&mut self, tx: Transaction) -> Result<(), MempoolError> {
        self.mempool.admit(tx, self.blockchain.utxo_set())
    }

    /// Build a signed transfer that avoids outputs already pooled
    pub fn build_transaction(
        &self,
        to: &str,
        amount: u64,
        private_key: &str,
    ) -> Result<Transaction, WalletError> {
        wallet::create_transaction(
            to,
            amount,
            private_key,
            self.blockchain.utxo_set(),
            &self.mempool.snapshot(),
        )
    }

    pub fn balance(&self, address: &str) -> u64 {
        wallet::balance(address, self.blockchain.utxo_set())
    }
}
