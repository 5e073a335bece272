//! Wallet module for key and transaction management

pub mod wallet;

pub use wallet::{balance, create_transaction, Wallet, WalletError, WalletInfo};
