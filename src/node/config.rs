//! Node configuration

use clap::Args;
use std::path::PathBuf;

/// Default HTTP API port
pub const DEFAULT_HTTP_PORT: u16 = 3000;

/// Default location of the node's key file
pub const DEFAULT_KEY_FILE: &str = ".ledger/wallet.json";

/// Settings for a running node
#[derive(Debug, Clone, Args)]
pub struct NodeConfig {
    /// Port for the HTTP API
    #[arg(short = 'p', long = "port", env = "HTTP_PORT", default_value_t = DEFAULT_HTTP_PORT)]
    pub http_port: u16,

    /// Key file holding the node's private key (created if missing)
    #[arg(short, long, env = "LEDGER_KEY_FILE", default_value = DEFAULT_KEY_FILE)]
    pub key_file: PathBuf,
}

impl NodeConfig {
    /// Address the HTTP server binds to
    pub fn bind_address(&self) -> String {
        format!("0.0.0.0:{}", self.http_port)
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            http_port: DEFAULT_HTTP_PORT,
            key_file: PathBuf::from(DEFAULT_KEY_FILE),
        }
    }
}
