//! CLI commands for the ledger
//!
//! Implements the offline command handlers. The `start` command lives in
//! `main.rs` because it owns the async runtime.

use crate::core::{Block, Blockchain};
use crate::mining::Miner;
use crate::wallet::Wallet;
use std::path::Path;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Create a new key file
pub fn cmd_wallet_new(key_file: &Path, force: bool) -> CliResult<()> {
    if key_file.exists() && !force {
        println!("⚠️  A wallet already exists at {:?}", key_file);
        println!("   Use --force to overwrite it (the old key will be lost)");
        return Ok(());
    }

    let wallet = Wallet::new();
    wallet.save(key_file)?;

    println!("🔐 New wallet created!");
    println!("   📍 Address: {}", wallet.address());
    println!("   📁 Key file: {:?}", key_file);
    println!("\n   ⚠️  IMPORTANT: Back up the key file to avoid losing access to your funds!");

    Ok(())
}

/// Show the address stored in a key file
pub fn cmd_wallet_show(key_file: &Path) -> CliResult<()> {
    let wallet = Wallet::load(key_file)?;
    let info = wallet.export_public_info();

    println!("👛 Wallet");
    println!("   📍 Address: {}", info.address);
    println!("   📁 Key file: {:?}", key_file);

    Ok(())
}

/// Print the genesis block shared by every node
pub fn cmd_genesis() -> CliResult<()> {
    let genesis = Block::genesis();
    println!("{}", serde_json::to_string_pretty(&genesis)?);
    Ok(())
}

/// Mine `count` blocks on a throwaway in-memory chain
pub fn cmd_mine(key_file: &Path, count: u64) -> CliResult<()> {
    let wallet = Wallet::load_or_create(key_file)?;
    let address = wallet.address();
    let miner = Miner::new(&address);
    let mut blockchain = Blockchain::new();

    println!("⛏️  Mining {} block(s) on an in-memory chain", count);

    for _ in 0..count {
        let difficulty = blockchain.next_difficulty();
        let (block, stats) = miner.mine_block(&mut blockchain, vec![])?;

        println!("\n   Block {} mined!", block.index);
        println!("   ├─ Hash: {}", &block.hash[..16]);
        println!("   ├─ Difficulty: {}", difficulty);
        println!("   ├─ Time: {}ms", stats.time_ms);
        println!("   ├─ Attempts: {}", stats.hash_attempts);
        println!("   └─ Hash rate: {:.2} H/s", stats.hash_rate);
    }

    let chain_stats = blockchain.stats();
    println!("\n📊 Height {}, cumulative work {}", chain_stats.height, chain_stats.cumulative_work);
    println!("💰 Miner balance: {} coins", wallet.balance(blockchain.utxo_set()));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallet_new_does_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let key_file = dir.path().join("wallet.json");

        cmd_wallet_new(&key_file, false).unwrap();
        let first = Wallet::load(&key_file).unwrap().address();

        cmd_wallet_new(&key_file, false).unwrap();
        assert_eq!(Wallet::load(&key_file).unwrap().address(), first);

        cmd_wallet_new(&key_file, true).unwrap();
        assert_ne!(Wallet::load(&key_file).unwrap().address(), first);
    }

    #[test]
    fn test_mine_creates_missing_wallet() {
        let dir = tempfile::tempdir().unwrap();
        let key_file = dir.path().join("nested").join("wallet.json");

        cmd_mine(&key_file, 2).unwrap();
        assert!(cmd_wallet_show(&key_file).is_ok());
    }
}
