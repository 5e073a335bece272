//! Transaction handling for the ledger
//!
//! Implements the UTXO transaction model: id computation, input signing and
//! verification, structural and economic validation, coinbase issuance and
//! the projection of a block's transactions onto the UTXO set.

use crate::core::utxo::{OutPoint, UtxoSet};
use crate::crypto::{public_key_from_hex, sha256_hex, verify_digest, KeyError, KeyPair};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Amount issued by every coinbase transaction
pub const COINBASE_AMOUNT: u64 = 50;

/// Length of an address (uncompressed secp256k1 public key in hex)
pub const ADDRESS_LENGTH: usize = 130;

/// Prefix of every uncompressed public key
pub const ADDRESS_PREFIX: &str = "04";

// =============================================================================
// Error Types
// =============================================================================

/// Transaction-related errors
#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("Malformed transaction: {0}")]
    Structure(String),
    #[error("Transaction id mismatch: expected {expected}, found {found}")]
    IdMismatch { expected: String, found: String },
    #[error("Referenced output {tx_out_id}:{tx_out_index} is not unspent")]
    ReferenceMissing { tx_out_id: String, tx_out_index: u32 },
    #[error("Private key does not own the referenced output")]
    KeyMismatch,
    #[error("Invalid signature on input {input}")]
    InvalidSignature { input: usize },
    #[error("Economically invalid: {0}")]
    Economic(String),
    #[error("Output {tx_out_id}:{tx_out_index} is spent twice")]
    DoubleSpend { tx_out_id: String, tx_out_index: u32 },
    #[error("Crypto error: {0}")]
    Crypto(#[from] KeyError),
}

// =============================================================================
// Transaction Input
// =============================================================================

/// Transaction input (reference to a previous output)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TxIn {
    /// Id of the transaction holding the spent output
    pub tx_out_id: String,
    /// Index of the output in that transaction
    pub tx_out_index: u32,
    /// DER signature (hex) over the spending transaction's id
    pub signature: String,
}

impl TxIn {
    /// Input referencing an output, not yet signed
    pub fn unsigned(tx_out_id: &str, tx_out_index: u32) -> Self {
        Self {
            tx_out_id: tx_out_id.to_string(),
            tx_out_index,
            signature: String::new(),
        }
    }

    pub fn outpoint(&self) -> OutPoint {
        OutPoint::new(&self.tx_out_id, self.tx_out_index)
    }
}

// =============================================================================
// Transaction Output
// =============================================================================

/// Transaction output
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TxOut {
    /// Recipient's address (uncompressed public key hex)
    pub address: String,
    /// Amount of coins
    pub amount: u64,
}

impl TxOut {
    pub fn new(address: &str, amount: u64) -> Self {
        Self {
            address: address.to_string(),
            amount,
        }
    }
}

/// Check the address format: 130 hex characters starting with `04`
pub fn is_valid_address(address: &str) -> bool {
    address.len() == ADDRESS_LENGTH
        && address.starts_with(ADDRESS_PREFIX)
        && address.chars().all(|c| c.is_ascii_hexdigit())
}

fn is_hex(value: &str) -> bool {
    value.chars().all(|c| c.is_ascii_hexdigit())
}

// =============================================================================
// Transaction
// =============================================================================

/// A ledger transaction. Field order is part of the canonical serialization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub tx_ins: Vec<TxIn>,
    pub tx_outs: Vec<TxOut>,
}

impl Transaction {
    /// Create a transaction with its id computed from the inputs and outputs
    pub fn new(tx_ins: Vec<TxIn>, tx_outs: Vec<TxOut>) -> Self {
        let mut tx = Self {
            id: String::new(),
            tx_ins,
            tx_outs,
        };
        tx.id = tx.compute_id();
        tx
    }

    /// Create a coinbase (mining reward) transaction for the block at `block_index`
    pub fn coinbase(address: &str, block_index: u64) -> Self {
        let tx_out_index = u32::try_from(block_index).unwrap_or(u32::MAX);
        Self::new(
            vec![TxIn::unsigned("", tx_out_index)],
            vec![TxOut::new(address, COINBASE_AMOUNT)],
        )
    }

    /// SHA-256 over every `txOutId ‖ txOutIndex` followed by every `address ‖ amount`.
    /// Signatures are not part of the id.
    pub fn compute_id(&self) -> String {
        let mut content = String::new();
        for tx_in in &self.tx_ins {
            content.push_str(&tx_in.tx_out_id);
            content.push_str(&tx_in.tx_out_index.to_string());
        }
        for tx_out in &self.tx_outs {
            content.push_str(&tx_out.address);
            content.push_str(&tx_out.amount.to_string());
        }
        sha256_hex(content.as_bytes())
    }

    /// Get total output amount
    pub fn total_output(&self) -> Option<u64> {
        self.tx_outs
            .iter()
            .try_fold(0u64, |acc, out| acc.checked_add(out.amount))
    }

    /// Sign the input at `input_index` with `key_pair`.
    ///
    /// The referenced output must be unspent in `utxos` and locked to the
    /// key pair's public key. Returns the hex DER signature over `self.id`.
    pub fn sign_input(
        &self,
        input_index: usize,
        key_pair: &KeyPair,
        utxos: &UtxoSet,
    ) -> Result<String, TransactionError> {
        let tx_in = self.tx_ins.get(input_index).ok_or_else(|| {
            TransactionError::Structure(format!("no input at index {}", input_index))
        })?;

        let referenced = utxos
            .find(&tx_in.tx_out_id, tx_in.tx_out_index)
            .ok_or_else(|| TransactionError::ReferenceMissing {
                tx_out_id: tx_in.tx_out_id.clone(),
                tx_out_index: tx_in.tx_out_index,
            })?;

        if referenced.address != key_pair.public_key_hex() {
            return Err(TransactionError::KeyMismatch);
        }

        let digest = hex::decode(&self.id)
            .map_err(|_| TransactionError::Structure("id is not hex".to_string()))?;
        Ok(key_pair.sign_digest(&digest)?)
    }

    /// Verify one input's signature against the address of the output it spends.
    /// Fails closed: an absent reference or any decoding problem yields `false`.
    pub fn verify_input(&self, tx_in: &TxIn, utxos: &UtxoSet) -> bool {
        let Some(referenced) = utxos.find(&tx_in.tx_out_id, tx_in.tx_out_index) else {
            return false;
        };
        let Ok(public_key) = public_key_from_hex(&referenced.address) else {
            return false;
        };
        let Ok(digest) = hex::decode(&self.id) else {
            return false;
        };
        verify_digest(&public_key, &digest, &tx_in.signature).unwrap_or(false)
    }

    /// Shape checks: hex ids and signatures, at least one input and one
    /// output, well-formed addresses.
    pub fn validate_structure(&self) -> Result<(), TransactionError> {
        if self.id.len() != 64 || !is_hex(&self.id) {
            return Err(TransactionError::Structure(
                "id must be a 64 character hex string".to_string(),
            ));
        }
        if self.tx_ins.is_empty() {
            return Err(TransactionError::Structure("no inputs".to_string()));
        }
        if self.tx_outs.is_empty() {
            return Err(TransactionError::Structure("no outputs".to_string()));
        }
        for (i, tx_in) in self.tx_ins.iter().enumerate() {
            if !is_hex(&tx_in.tx_out_id) || !is_hex(&tx_in.signature) {
                return Err(TransactionError::Structure(format!(
                    "input {} is not hex encoded",
                    i
                )));
            }
        }
        for (i, tx_out) in self.tx_outs.iter().enumerate() {
            if !is_valid_address(&tx_out.address) {
                return Err(TransactionError::Structure(format!(
                    "output {} has an invalid address",
                    i
                )));
            }
        }
        Ok(())
    }

    fn check_id(&self) -> Result<(), TransactionError> {
        let expected = self.compute_id();
        if expected != self.id {
            return Err(TransactionError::IdMismatch {
                expected,
                found: self.id.clone(),
            });
        }
        Ok(())
    }

    /// Full validation of a regular transaction against `utxos`
    pub fn validate(&self, utxos: &UtxoSet) -> Result<(), TransactionError> {
        self.validate_structure()?;
        self.check_id()?;

        let mut seen = HashSet::new();
        let mut input_total = 0u64;

        for (i, tx_in) in self.tx_ins.iter().enumerate() {
            if !seen.insert(tx_in.outpoint()) {
                return Err(TransactionError::DoubleSpend {
                    tx_out_id: tx_in.tx_out_id.clone(),
                    tx_out_index: tx_in.tx_out_index,
                });
            }

            let referenced = utxos
                .find(&tx_in.tx_out_id, tx_in.tx_out_index)
                .ok_or_else(|| TransactionError::ReferenceMissing {
                    tx_out_id: tx_in.tx_out_id.clone(),
                    tx_out_index: tx_in.tx_out_index,
                })?;

            if !self.verify_input(tx_in, utxos) {
                return Err(TransactionError::InvalidSignature { input: i });
            }

            input_total = input_total
                .checked_add(referenced.amount)
                .ok_or_else(|| TransactionError::Economic("input sum overflows".to_string()))?;
        }

        let output_total = self
            .total_output()
            .ok_or_else(|| TransactionError::Economic("output sum overflows".to_string()))?;

        if input_total != output_total {
            return Err(TransactionError::Economic(format!(
                "inputs sum to {} but outputs sum to {}",
                input_total, output_total
            )));
        }

        Ok(())
    }

    /// Validate a coinbase transaction for the block at `block_index`
    pub fn validate_coinbase(&self, block_index: u64) -> Result<(), TransactionError> {
        self.validate_structure()?;
        self.check_id()?;

        let [tx_in] = self.tx_ins.as_slice() else {
            return Err(TransactionError::Economic(
                "coinbase must have exactly one input".to_string(),
            ));
        };
        if !tx_in.tx_out_id.is_empty() || !tx_in.signature.is_empty() {
            return Err(TransactionError::Economic(
                "coinbase input must not reference an output".to_string(),
            ));
        }
        if u64::from(tx_in.tx_out_index) != block_index {
            return Err(TransactionError::Economic(format!(
                "coinbase input index {} does not match block index {}",
                tx_in.tx_out_index, block_index
            )));
        }

        let [tx_out] = self.tx_outs.as_slice() else {
            return Err(TransactionError::Economic(
                "coinbase must have exactly one output".to_string(),
            ));
        };
        if tx_out.amount != COINBASE_AMOUNT {
            return Err(TransactionError::Economic(format!(
                "coinbase pays {} instead of {}",
                tx_out.amount, COINBASE_AMOUNT
            )));
        }

        Ok(())
    }
}

// =============================================================================
// Block-level processing
// =============================================================================

/// Validate the transaction list of the block at `block_index`.
///
/// The first transaction must be the coinbase, no outpoint may be spent twice
/// anywhere in the list, and every other transaction must validate against
/// `utxos` (the set as it was before this block).
pub fn validate_block_transactions(
    txs: &[Transaction],
    utxos: &UtxoSet,
    block_index: u64,
) -> Result<(), TransactionError> {
    let (coinbase, rest) = txs
        .split_first()
        .ok_or_else(|| TransactionError::Structure("block has no coinbase".to_string()))?;
    coinbase.validate_coinbase(block_index)?;

    let mut seen = HashSet::new();
    for tx_in in txs.iter().flat_map(|tx| &tx.tx_ins) {
        if !seen.insert(tx_in.outpoint()) {
            return Err(TransactionError::DoubleSpend {
                tx_out_id: tx_in.tx_out_id.clone(),
                tx_out_index: tx_in.tx_out_index,
            });
        }
    }

    for tx in rest {
        tx.validate(utxos)?;
    }

    Ok(())
}

/// Validate then apply a block's transactions. On failure the caller's set
/// is untouched and no partial set is produced.
pub fn process_transactions(
    txs: &[Transaction],
    utxos: &UtxoSet,
    block_index: u64,
) -> Result<UtxoSet, TransactionError> {
    validate_block_transactions(txs, utxos, block_index)?;
    Ok(utxos.apply(txs))
}

// =============================================================================
// Tests
// =============================================================================
