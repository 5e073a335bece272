//! Node layer: the ledger aggregate, its async service and the hooks used
//! by collaborators such as the HTTP API and the wallet.

pub mod config;
pub mod hooks;
pub mod ledger;
pub mod service;

pub use config::NodeConfig;
pub use hooks::{ChainObserver, KeyProvider};
pub use ledger::{Ledger, MiningTemplate};
pub use service::{LedgerService, MinedBlock, NodeError};
