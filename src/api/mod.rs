//! REST API module
//!
//! Provides the HTTP surface of a node.
//!
//! # Endpoints
//!
//! ## Chain
//! - `GET /api/blocks` - Full chain
//! - `POST /api/blocks` - Mine a block paying this node
//! - `GET /api/blocks/{index}` - Block by index
//! - `POST /api/blocks/candidate` - Block from a peer
//! - `POST /api/chain` - Chain from a peer (adopted if heavier)
//! - `GET /api/stats` - Chain and mempool statistics
//!
//! ## Balances
//! - `GET /api/utxos` - Unspent outputs
//! - `GET /api/balance/{address}` - Balance of an address
//! - `GET /api/me/address`, `GET /api/me/balance` - This node's wallet
//!
//! ## Transactions
//! - `GET /api/transactions` - Mempool contents
//! - `POST /api/transactions` - Send `{address, amount}` from this node
//! - `POST /api/transactions/relay` - Transaction from a peer
//!
//! ## WebSocket
//! - `GET /ws` - Real-time updates (ChainUpdated, TransactionAdded)

pub mod handlers;
pub mod routes;
pub mod websocket;

pub use handlers::ApiState;
pub use routes::create_router;
pub use websocket::{WsBroadcaster, WsEvent};
