//! A minimal proof-of-work UTXO ledger
//!
//! This crate provides:
//! - Blocks sealed by SHA-256 proof of work with periodic difficulty retargeting
//! - ECDSA digital signatures (secp256k1) over UTXO-based transactions
//! - A mempool that rejects double spends before confirmation
//! - Fork choice by cumulative work
//! - An async ledger service with cancellable mining and an HTTP API
//!
//! # Example
//!
//! ```rust
//! use pow_ledger::core::Blockchain;
//! use pow_ledger::wallet::Wallet;
//! use pow_ledger::mining::Miner;
//!
//! // Create a new blockchain
//! let mut blockchain = Blockchain::new();
//!
//! // Create a wallet
//! let wallet = Wallet::new();
//! println!("Address: {}", wallet.address());
//!
//! // Mine a block
//! let miner = Miner::new(&wallet.address());
//! let (block, stats) = miner.mine_block(&mut blockchain, vec![]).unwrap();
//! println!("Mined block {} in {}ms", block.index, stats.time_ms);
//!
//! // Check balance
//! let balance = wallet.balance(blockchain.utxo_set());
//! assert_eq!(balance, 50);
//! ```

pub mod api;
pub mod cli;
pub mod core;
pub mod crypto;
pub mod mining;
pub mod node;
pub mod wallet;

// Re-export commonly used types
pub use api::{create_router, ApiState};
pub use core::{Block, Blockchain, Transaction, UtxoSet, BLOCK_REWARD};
pub use crypto::KeyPair;
pub use mining::{Mempool, Miner};
pub use node::{LedgerService, NodeConfig};
pub use wallet::Wallet;
