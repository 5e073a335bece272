//! Wallet implementation for the ledger
//!
//! Provides key storage, balance lookup and signed transaction creation.

use crate::core::{is_valid_address, Transaction, TransactionError, TxIn, TxOut, Utxo, UtxoSet};
use crate::crypto::KeyPair;
use crate::node::KeyProvider;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Wallet-related errors
#[derive(Error, Debug)]
pub enum WalletError {
    #[error("Insufficient funds: have {have}, need {need}")]
    InsufficientFunds { have: u64, need: u64 },
    #[error("Amount must be greater than zero")]
    InvalidAmount,
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("Transaction error: {0}")]
    TransactionError(#[from] TransactionError),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Crypto error: {0}")]
    CryptoError(#[from] crate::crypto::KeyError),
}

/// Serializable wallet data for persistence
#[derive(Debug, Serialize, Deserialize)]
struct WalletData {
    private_key_hex: String,
    address: String,
}

/// A wallet holding the node's signing key
#[derive(Clone)]
pub struct Wallet {
    /// The key pair for signing transactions
    key_pair: KeyPair,
}

impl Wallet {
    /// Create a new wallet with a fresh key pair
    pub fn new() -> Self {
        Self {
            key_pair: KeyPair::generate(),
        }
    }

    /// Import a wallet from a private key
    pub fn from_private_key(private_key_hex: &str) -> Result<Self, WalletError> {
        let key_pair = KeyPair::from_private_key_hex(private_key_hex)?;
        Ok(Self { key_pair })
    }

    /// Get the wallet's address (its uncompressed public key)
    pub fn address(&self) -> String {
        self.key_pair.public_key_hex()
    }

    /// Get the wallet's private key (hex)
    /// WARNING: Keep this secret!
    pub fn private_key(&self) -> String {
        self.key_pair.private_key_hex()
    }

    /// Balance held by this wallet in `utxos`
    pub fn balance(&self, utxos: &UtxoSet) -> u64 {
        balance(&self.address(), utxos)
    }

    /// Create a transaction to send funds, skipping outputs `pool` already spends
    pub fn create_transaction(
        &self,
        recipient: &str,
        amount: u64,
        utxos: &UtxoSet,
        pool: &[Transaction],
    ) -> Result<Transaction, WalletError> {
        build_transaction(&self.key_pair, recipient, amount, utxos, pool)
    }

    /// Save wallet to file
    pub fn save(&self, path: &Path) -> Result<(), WalletError> {
        let data = WalletData {
            private_key_hex: self.private_key(),
            address: self.address(),
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&data)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Load wallet from file
    pub fn load(path: &Path) -> Result<Self, WalletError> {
        let json = fs::read_to_string(path)?;
        let data: WalletData = serde_json::from_str(&json)?;
        Self::from_private_key(&data.private_key_hex)
    }

    /// Load the key file at `path`, generating and saving a new key if it is absent
    pub fn load_or_create(path: &Path) -> Result<Self, WalletError> {
        if path.exists() {
            return Self::load(path);
        }

        let wallet = Self::new();
        wallet.save(path)?;
        log::info!("Created new wallet at {}", path.display());
        Ok(wallet)
    }

    /// Export wallet info (without private key)
    pub fn export_public_info(&self) -> WalletInfo {
        WalletInfo {
            address: self.address(),
        }
    }
}

impl Default for Wallet {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address())
            .finish()
    }
}

impl KeyProvider for Wallet {
    fn public_key(&self) -> String {
        self.address()
    }

    fn private_key(&self) -> String {
        self.key_pair.private_key_hex()
    }
}

/// Public wallet information (safe to share)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletInfo {
    pub address: String,
}

/// Sum of the unspent outputs locked to `address`
pub fn balance(address: &str, utxos: &UtxoSet) -> u64 {
    utxos.balance(address)
}

/// Build a signed transaction paying `amount` to `receiver` from the key
/// `private_key_hex`.
pub fn create_transaction(
    receiver: &str,
    amount: u64,
    private_key_hex: &str,
    utxos: &UtxoSet,
    pool: &[Transaction],
) -> Result<Transaction, WalletError> {
    let key_pair = KeyPair::from_private_key_hex(private_key_hex)?;
    build_transaction(&key_pair, receiver, amount, utxos, pool)
}

/// Coin selection: take the sender's outputs in order, skipping any a pooled
/// transaction already spends, until `amount` is covered. Leftover value
/// returns to the sender as a change output.
fn build_transaction(
    key_pair: &KeyPair,
    receiver: &str,
    amount: u64,
    utxos: &UtxoSet,
    pool: &[Transaction],
) -> Result<Transaction, WalletError> {
    if !is_valid_address(receiver) {
        return Err(WalletError::InvalidAddress(receiver.to_string()));
    }
    if amount == 0 {
        return Err(WalletError::InvalidAmount);
    }

    let sender = key_pair.public_key_hex();
    let pending: HashSet<_> = pool
        .iter()
        .flat_map(|tx| &tx.tx_ins)
        .map(|tx_in| tx_in.outpoint())
        .collect();

    let spendable: Vec<Utxo> = utxos
        .for_address(&sender)
        .into_iter()
        .filter(|utxo| !pending.contains(&utxo.outpoint()))
        .collect();

    let mut selected = Vec::new();
    let mut selected_amount = 0u64;
    for utxo in &spendable {
        if selected_amount >= amount {
            break;
        }
        selected.push(TxIn::unsigned(&utxo.tx_out_id, utxo.tx_out_index));
        selected_amount = selected_amount.saturating_add(utxo.amount);
    }

    if selected_amount < amount {
        return Err(WalletError::InsufficientFunds {
            have: selected_amount,
            need: amount,
        });
    }

    let mut tx_outs = vec![TxOut::new(receiver, amount)];
    let change = selected_amount - amount;
    if change > 0 {
        tx_outs.push(TxOut::new(&sender, change));
    }

    let mut tx = Transaction::new(selected, tx_outs);
    let signatures = (0..tx.tx_ins.len())
        .map(|i| tx.sign_input(i, key_pair, utxos))
        .collect::<Result<Vec<_>, _>>()?;
    for (tx_in, signature) in tx.tx_ins.iter_mut().zip(signatures) {
        tx_in.signature = signature;
    }

    Ok(tx)
}
