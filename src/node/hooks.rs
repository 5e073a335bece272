//! Extension points between the ledger and its collaborators

use crate::core::{Block, Transaction};

/// Notified after the local chain changes, either through a mined or
/// accepted block or through adoption of a heavier chain.
pub trait ChainObserver: Send + Sync {
    fn on_chain_changed(&self, chain: &[Block]);

    /// Called after a transaction enters the mempool
    fn on_transaction_admitted(&self, _tx: &Transaction) {}
}

/// Source of the node's signing key
pub trait KeyProvider: Send + Sync {
    /// Uncompressed public key in hex, which is also the address
    fn public_key(&self) -> String;

    /// Private key in hex
    fn private_key(&self) -> String;
}
