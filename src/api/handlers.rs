//! REST API handlers for ledger operations
//!
//! Handlers only translate HTTP to [`LedgerService`] calls. Peer input uses
//! the same entry points as local requests.

use crate::api::websocket::WsBroadcaster;
use crate::core::{Block, ChainStats, Transaction, Utxo, BLOCK_REWARD};
use crate::mining::MempoolStats;
use crate::node::{KeyProvider, LedgerService, NodeError};
use crate::wallet::WalletError;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Shared application state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub ledger: LedgerService,
    pub keys: Arc<dyn KeyProvider>,
    pub ws_broadcaster: Arc<WsBroadcaster>,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
pub struct StatsResponse {
    pub chain: ChainStats,
    pub mempool: MempoolStats,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MineResponse {
    pub block: Block,
    pub reward: u64,
    pub time_ms: u128,
    pub attempts: u64,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub address: String,
    pub balance: u64,
}

#[derive(Serialize)]
pub struct AddressResponse {
    pub address: String,
}

#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    pub accepted: bool,
    pub height: u64,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
}

// ============================================================================
// Request Types
// ============================================================================

#[derive(Deserialize)]
pub struct SendRequest {
    pub address: String,
    pub amount: u64,
}

fn error_response(status: StatusCode, error: String) -> (StatusCode, Json<ApiError>) {
    (status, Json(ApiError { error }))
}

fn node_error(e: NodeError) -> (StatusCode, Json<ApiError>) {
    let status = match &e {
        NodeError::Chain(_) | NodeError::Mempool(_) => StatusCode::BAD_REQUEST,
        NodeError::Wallet(
            WalletError::InsufficientFunds { .. }
            | WalletError::InvalidAmount
            | WalletError::InvalidAddress(_),
        ) => StatusCode::BAD_REQUEST,
        NodeError::Cancelled { .. } => StatusCode::CONFLICT,
        NodeError::Wallet(_) | NodeError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, e.to_string())
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/blocks - Full chain
pub async fn get_blocks(State(state): State<ApiState>) -> Json<Vec<Block>> {
    Json(state.ledger.get_chain().await)
}

/// GET /api/blocks/{index} - Block by index
pub async fn get_block_by_index(
    State(state): State<ApiState>,
    Path(index): Path<u64>,
) -> ApiResult<Block> {
    state.ledger.get_block(index).await.map(Json).ok_or_else(|| {
        error_response(
            StatusCode::NOT_FOUND,
            format!("Block at index {} not found", index),
        )
    })
}

/// GET /api/stats - Chain and mempool statistics
pub async fn get_stats(State(state): State<ApiState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        chain: state.ledger.stats().await,
        mempool: state.ledger.mempool_stats().await,
    })
}

/// POST /api/blocks - Mine a block paying this node's wallet
pub async fn mine_block(State(state): State<ApiState>) -> ApiResult<MineResponse> {
    let mined = state
        .ledger
        .mine_block(&state.keys.public_key())
        .await
        .map_err(node_error)?;

    Ok(Json(MineResponse {
        block: mined.block,
        reward: BLOCK_REWARD,
        time_ms: mined.stats.time_ms,
        attempts: mined.stats.hash_attempts,
    }))
}

/// POST /api/blocks/candidate - Block announced by a peer
pub async fn submit_block(
    State(state): State<ApiState>,
    Json(block): Json<Block>,
) -> ApiResult<AcceptedResponse> {
    let height = block.index;
    state.ledger.append_block(block).await.map_err(node_error)?;
    Ok(Json(AcceptedResponse {
        accepted: true,
        height,
    }))
}

/// POST /api/chain - Full chain offered by a peer
pub async fn submit_chain(
    State(state): State<ApiState>,
    Json(chain): Json<Vec<Block>>,
) -> ApiResult<AcceptedResponse> {
    let height = chain.last().map(|b| b.index).unwrap_or(0);
    state.ledger.replace_chain(chain).await.map_err(node_error)?;
    Ok(Json(AcceptedResponse {
        accepted: true,
        height,
    }))
}

/// GET /api/utxos - Current unspent outputs
pub async fn get_utxos(State(state): State<ApiState>) -> Json<Vec<Utxo>> {
    Json(state.ledger.get_utxo_snapshot().await)
}

/// GET /api/balance/{address}
pub async fn get_balance(
    State(state): State<ApiState>,
    Path(address): Path<String>,
) -> Json<BalanceResponse> {
    let balance = state.ledger.get_balance(&address).await;
    Json(BalanceResponse { address, balance })
}

/// GET /api/me/address - This node's wallet address
pub async fn get_my_address(State(state): State<ApiState>) -> Json<AddressResponse> {
    Json(AddressResponse {
        address: state.keys.public_key(),
    })
}

/// GET /api/me/balance - Balance of this node's wallet
pub async fn get_my_balance(State(state): State<ApiState>) -> Json<BalanceResponse> {
    let address = state.keys.public_key();
    let balance = state.ledger.get_balance(&address).await;
    Json(BalanceResponse { address, balance })
}

/// GET /api/transactions - Pending transactions
pub async fn get_mempool(State(state): State<ApiState>) -> Json<Vec<Transaction>> {
    Json(state.ledger.get_mempool_snapshot().await)
}

/// POST /api/transactions - Send from this node's wallet
pub async fn send_transaction(
    State(state): State<ApiState>,
    Json(req): Json<SendRequest>,
) -> ApiResult<Transaction> {
    state
        .ledger
        .build_and_admit_transaction(&req.address, req.amount, &state.keys.private_key())
        .await
        .map(Json)
        .map_err(node_error)
}

/// POST /api/transactions/relay - Transaction relayed by a peer
pub async fn relay_transaction(
    State(state): State<ApiState>,
    Json(tx): Json<Transaction>,
) -> ApiResult<Transaction> {
    state
        .ledger
        .admit_transaction(tx.clone())
        .await
        .map_err(node_error)?;
    Ok(Json(tx))
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "OK"
}
