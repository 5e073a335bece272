//! Transaction pool (mempool) for pending transactions
//!
//! Holds valid, unconfirmed transactions waiting to be included in blocks.
//! No two pooled transactions may spend the same output.

use crate::core::{OutPoint, Transaction, TransactionError, UtxoSet};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

/// Mempool errors
#[derive(Error, Debug)]
pub enum MempoolError {
    #[error("Transaction already exists")]
    Duplicate,
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(#[from] TransactionError),
    #[error("Output {tx_out_id}:{tx_out_index} is already spent by a pooled transaction")]
    DoubleSpend { tx_out_id: String, tx_out_index: u32 },
}

// =============================================================================
// Mempool Entry
// =============================================================================

/// Entry in the mempool with metadata
#[derive(Debug, Clone)]
pub struct MempoolEntry {
    /// The transaction
    pub tx: Transaction,
    /// When the transaction was added (Unix timestamp)
    pub added_time: i64,
}

impl MempoolEntry {
    pub fn new(tx: Transaction, added_time: i64) -> Self {
        Self { tx, added_time }
    }
}

// =============================================================================
// Mempool
// =============================================================================

/// Memory pool for pending transactions
#[derive(Debug, Default)]
pub struct Mempool {
    /// Transactions indexed by ID
    entries: HashMap<String, MempoolEntry>,
    /// Transaction IDs in order of arrival
    by_time: Vec<String>,
    /// Outputs consumed by pooled transactions
    spent: HashSet<OutPoint>,
}

impl Mempool {
    /// Create a new mempool
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit `tx` if it validates against `utxos` and spends nothing another
    /// pooled transaction already spends.
    pub fn admit(&mut self, tx: Transaction, utxos: &UtxoSet) -> Result<(), MempoolError> {
        if self.entries.contains_key(&tx.id) {
            return Err(MempoolError::Duplicate);
        }

        tx.validate(utxos)?;

        if let Some(conflict) = tx
            .tx_ins
            .iter()
            .find(|tx_in| self.spent.contains(&tx_in.outpoint()))
        {
            return Err(MempoolError::DoubleSpend {
                tx_out_id: conflict.tx_out_id.clone(),
                tx_out_index: conflict.tx_out_index,
            });
        }

        log::info!("Admitted transaction {} to mempool", tx.id);

        self.spent.extend(tx.tx_ins.iter().map(|tx_in| tx_in.outpoint()));
        self.by_time.push(tx.id.clone());
        let added_time = chrono::Utc::now().timestamp();
        self.entries
            .insert(tx.id.clone(), MempoolEntry::new(tx, added_time));

        Ok(())
    }

    /// Drop every transaction with an input that is no longer unspent in `utxos`.
    /// Returns the number of transactions removed.
    pub fn prune(&mut self, utxos: &UtxoSet) -> usize {
        let stale: Vec<String> = self
            .entries
            .values()
            .filter(|entry| {
                entry
                    .tx
                    .tx_ins
                    .iter()
                    .any(|tx_in| !utxos.contains(&tx_in.tx_out_id, tx_in.tx_out_index))
            })
            .map(|entry| entry.tx.id.clone())
            .collect();

        for id in &stale {
            self.remove_transaction(id);
        }

        if !stale.is_empty() {
            log::debug!("Pruned {} transactions from mempool", stale.len());
        }
        stale.len()
    }

    /// Remove a transaction from the pool
    pub fn remove_transaction(&mut self, tx_id: &str) -> Option<Transaction> {
        let entry = self.entries.remove(tx_id)?;
        self.by_time.retain(|id| id != tx_id);
        for tx_in in &entry.tx.tx_ins {
            self.spent.remove(&tx_in.outpoint());
        }
        Some(entry.tx)
    }

    /// Independent copy of the pool in arrival order
    pub fn snapshot(&self) -> Vec<Transaction> {
        self.by_time
            .iter()
            .filter_map(|id| self.entries.get(id).map(|e| e.tx.clone()))
            .collect()
    }

    /// Check if transaction is in pool
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Whether a pooled transaction already spends `(tx_out_id, tx_out_index)`
    pub fn is_spent(&self, tx_out_id: &str, tx_out_index: u32) -> bool {
        self.spent.contains(&OutPoint::new(tx_out_id, tx_out_index))
    }

    /// Get pool size
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if pool is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get mempool statistics
    pub fn stats(&self) -> MempoolStats {
        let oldest = self
            .by_time
            .first()
            .and_then(|id| self.entries.get(id))
            .map(|e| e.added_time);

        MempoolStats {
            tx_count: self.entries.len(),
            spent_outputs: self.spent.len(),
            total_amount: self
                .entries
                .values()
                .filter_map(|e| e.tx.total_output())
                .sum(),
            oldest_added: oldest,
        }
    }
}

/// Mempool statistics
#[derive(Debug, Clone, Serialize)]
pub struct MempoolStats {
    pub tx_count: usize,
    pub spent_outputs: usize,
    pub total_amount: u64,
    pub oldest_added: Option<i64>,
}

// =============================================================================
// Tests
// =============================================================================
