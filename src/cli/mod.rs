//! Command-line handlers

pub mod commands;

pub use commands::{cmd_genesis, cmd_mine, cmd_wallet_new, cmd_wallet_show, CliResult};
