//! Core ledger components
//!
//! This module contains the fundamental building blocks:
//! - Transactions (UTXO model, ECDSA-signed inputs)
//! - The UTXO set derived from confirmed history
//! - Blocks (with proof of work and timestamp rules)
//! - Blockchain (retargeting, cumulative work, fork choice)

pub mod block;
pub mod blockchain;
pub mod transaction;
pub mod utxo;

pub use block::{
    calculate_hash, validate_block, Block, BlockError, GENESIS_ADDRESS, GENESIS_TIMESTAMP,
    TIMESTAMP_TOLERANCE,
};
pub use blockchain::{
    cumulative_work, current_timestamp, difficulty_for, rebuild_utxo_set, should_replace,
    validate_chain, Blockchain, BlockchainError, ChainStats, BLOCK_GENERATION_INTERVAL,
    BLOCK_REWARD, DIFFICULTY_ADJUSTMENT_INTERVAL,
};
pub use transaction::{
    is_valid_address, process_transactions, validate_block_transactions, Transaction,
    TransactionError, TxIn, TxOut, ADDRESS_LENGTH, COINBASE_AMOUNT,
};
pub use utxo::{OutPoint, Utxo, UtxoSet};
