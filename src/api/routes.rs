//! REST API routes configuration

use crate::api::handlers::{self, ApiState};
use crate::api::websocket::ws_handler;
use axum::{
    body::Body,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

/// JSON 404 for unknown routes
async fn fallback_handler() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        [(header::CONTENT_TYPE, "application/json")],
        Body::from(r#"{"error":"Not Found"}"#),
    )
        .into_response()
}

/// Create the API router with all routes
pub fn create_router(state: ApiState) -> Router {
    // Configure CORS for browser access
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // WebSocket for real-time updates
        .route("/ws", get(ws_handler))
        // Chain
        .route(
            "/api/blocks",
            get(handlers::get_blocks).post(handlers::mine_block),
        )
        .route("/api/blocks/candidate", post(handlers::submit_block))
        .route("/api/blocks/{index}", get(handlers::get_block_by_index))
        .route("/api/chain", post(handlers::submit_chain))
        .route("/api/stats", get(handlers::get_stats))
        // Balances
        .route("/api/utxos", get(handlers::get_utxos))
        .route("/api/balance/{address}", get(handlers::get_balance))
        .route("/api/me/address", get(handlers::get_my_address))
        .route("/api/me/balance", get(handlers::get_my_balance))
        // Transactions
        .route(
            "/api/transactions",
            get(handlers::get_mempool).post(handlers::send_transaction),
        )
        .route(
            "/api/transactions/relay",
            post(handlers::relay_transaction),
        )
        .fallback(fallback_handler)
        .with_state(state)
        .layer(cors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::WsBroadcaster;
    use crate::node::LedgerService;
    use crate::wallet::Wallet;
    use std::sync::Arc;

    #[test]
    fn test_router_builds() {
        let state = ApiState {
            ledger: LedgerService::new(),
            keys: Arc::new(Wallet::new()),
            ws_broadcaster: Arc::new(WsBroadcaster::new()),
        };
        let _router: Router = create_router(state);
    }

    #[tokio::test]
    async fn test_fallback_is_json_404() {
        let response = fallback_handler().await.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
