//! Mining module for block creation and transaction pooling

pub mod mempool;
pub mod miner;

pub use mempool::{Mempool, MempoolEntry, MempoolError, MempoolStats};
pub use miner::{mine, MineOutcome, Miner, MiningError, MiningStats};
