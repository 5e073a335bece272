//! Unspent transaction output set
//!
//! The set is a pure function of the confirmed history. It is only ever
//! changed by [`UtxoSet::apply`], which builds a fresh set from an old one.

use crate::core::transaction::Transaction;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identifies a specific transaction output by its transaction id and index
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutPoint {
    pub tx_out_id: String,
    pub tx_out_index: u32,
}

impl OutPoint {
    pub fn new(tx_out_id: &str, tx_out_index: u32) -> Self {
        Self {
            tx_out_id: tx_out_id.to_string(),
            tx_out_index,
        }
    }
}

/// Unspent Transaction Output (UTXO)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Utxo {
    pub tx_out_id: String,
    pub tx_out_index: u32,
    pub address: String,
    pub amount: u64,
}

impl Utxo {
    pub fn outpoint(&self) -> OutPoint {
        OutPoint::new(&self.tx_out_id, self.tx_out_index)
    }
}

/// Spendable outputs keyed by outpoint, ordered for deterministic iteration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UtxoSet {
    entries: BTreeMap<OutPoint, Utxo>,
}

impl UtxoSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find the unspent output referenced by `(tx_out_id, tx_out_index)`
    pub fn find(&self, tx_out_id: &str, tx_out_index: u32) -> Option<&Utxo> {
        self.entries.get(&OutPoint::new(tx_out_id, tx_out_index))
    }

    pub fn contains(&self, tx_out_id: &str, tx_out_index: u32) -> bool {
        self.find(tx_out_id, tx_out_index).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Utxo> {
        self.entries.values()
    }

    /// All unspent outputs locked to `address`
    pub fn for_address(&self, address: &str) -> Vec<Utxo> {
        self.entries
            .values()
            .filter(|utxo| utxo.address == address)
            .cloned()
            .collect()
    }

    /// Sum of the unspent outputs locked to `address`
    pub fn balance(&self, address: &str) -> u64 {
        self.entries
            .values()
            .filter(|utxo| utxo.address == address)
            .map(|utxo| utxo.amount)
            .sum()
    }

    /// Sum of every unspent output
    pub fn total_amount(&self) -> u64 {
        self.entries.values().map(|utxo| utxo.amount).sum()
    }

    /// Copy of the set as a plain list
    pub fn to_vec(&self) -> Vec<Utxo> {
        self.entries.values().cloned().collect()
    }

    /// Project `txs` onto this set: every consumed output is removed, then one
    /// output per `(tx.id, index)` is added. `self` is left untouched.
    pub fn apply(&self, txs: &[Transaction]) -> UtxoSet {
        let mut entries = self.entries.clone();

        for tx in txs {
            for tx_in in &tx.tx_ins {
                entries.remove(&OutPoint::new(&tx_in.tx_out_id, tx_in.tx_out_index));
            }
        }

        for tx in txs {
            for (index, tx_out) in tx.tx_outs.iter().enumerate() {
                let utxo = Utxo {
                    tx_out_id: tx.id.clone(),
                    tx_out_index: index as u32,
                    address: tx_out.address.clone(),
                    amount: tx_out.amount,
                };
                entries.insert(utxo.outpoint(), utxo);
            }
        }

        UtxoSet { entries }
    }
}

impl FromIterator<Utxo> for UtxoSet {
    fn from_iter<I: IntoIterator<Item = Utxo>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|u| (u.outpoint(), u)).collect(),
        }
    }
}
