//! Ledger node CLI
//!
//! Runs an HTTP node or performs offline wallet and mining tasks.

use clap::{Parser, Subcommand};
use pow_ledger::api::{create_router, ApiState, WsBroadcaster};
use pow_ledger::cli;
use pow_ledger::node::{LedgerService, NodeConfig};
use pow_ledger::wallet::Wallet;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "ledger")]
#[command(version = "0.1.0")]
#[command(about = "A minimal proof-of-work UTXO ledger node", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a node serving the HTTP API
    Start {
        #[command(flatten)]
        config: NodeConfig,
    },

    /// Wallet operations
    Wallet {
        #[command(subcommand)]
        action: WalletCommands,
    },

    /// Print the genesis block
    Genesis,

    /// Mine blocks on an in-memory chain
    Mine {
        /// Number of blocks to mine
        #[arg(short, long, default_value = "1")]
        count: u64,

        /// Key file receiving the rewards
        #[arg(short, long, env = "LEDGER_KEY_FILE", default_value = pow_ledger::node::config::DEFAULT_KEY_FILE)]
        key_file: PathBuf,
    },
}

#[derive(Subcommand)]
enum WalletCommands {
    /// Create a new key file
    New {
        #[arg(short, long, env = "LEDGER_KEY_FILE", default_value = pow_ledger::node::config::DEFAULT_KEY_FILE)]
        key_file: PathBuf,

        /// Overwrite an existing key file
        #[arg(long)]
        force: bool,
    },

    /// Show the address in a key file
    Show {
        #[arg(short, long, env = "LEDGER_KEY_FILE", default_value = pow_ledger::node::config::DEFAULT_KEY_FILE)]
        key_file: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start { config } => run_start(config),
        Commands::Wallet { action } => match action {
            WalletCommands::New { key_file, force } => cli::cmd_wallet_new(&key_file, force),
            WalletCommands::Show { key_file } => cli::cmd_wallet_show(&key_file),
        },
        Commands::Genesis => cli::cmd_genesis(),
        Commands::Mine { count, key_file } => cli::cmd_mine(&key_file, count),
    }
}

fn run_start(config: NodeConfig) -> Result<(), Box<dyn std::error::Error>> {
    let rt = tokio::runtime::Runtime::new()?;

    rt.block_on(async {
        let wallet = Arc::new(Wallet::load_or_create(&config.key_file)?);
        log::info!("Node wallet address: {}", wallet.address());

        let ledger = LedgerService::new();
        let ws_broadcaster = Arc::new(WsBroadcaster::new());
        ledger.add_observer(ws_broadcaster.clone()).await;

        let state = ApiState {
            ledger,
            keys: wallet,
            ws_broadcaster,
        };
        let app = create_router(state);

        let addr = config.bind_address();
        println!("🚀 Ledger node listening on http://{}", addr);
        println!("   📡 WebSocket: ws://{}/ws", addr);

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                println!("\n📴 Shutting down...");
            })
            .await?;

        Ok::<(), Box<dyn std::error::Error>>(())
    })
}
