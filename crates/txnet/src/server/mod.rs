mod dates;
mod error;
mod network;
mod transactions;

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderValue, Method};
use axum::routing::get;
use axum::{Json, Router};
use tower_http::cors::{AllowOrigin, CorsLayer};

use txnet_core::store::TransactionStore;
use txnet_core::TransactionResolver;

use error::AppError;

// ==============================================================================
// Application State
// ==============================================================================

pub struct AppState {
    pub resolver: TransactionResolver,
}

type SharedState = Arc<AppState>;

// ==============================================================================
// Router
// ==============================================================================

pub fn build_router(state: AppState, origins: Vec<HeaderValue>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(banner))
        .route("/health", get(health))
        .route(
            "/transactions/{blockchain}/{address}",
            get(transactions::get_transactions),
        )
        .route("/network/{blockchain}/{address}", get(network::get_network))
        .fallback(not_found)
        .layer(cors)
        .with_state(Arc::new(state))
}

async fn banner(State(state): State<SharedState>) -> Json<serde_json::Value> {
    let chains: Vec<&str> = state
        .resolver
        .sources()
        .chains()
        .iter()
        .map(|chain| chain.as_str())
        .collect();
    Json(serde_json::json!({
        "service": "txnet",
        "version": env!("CARGO_PKG_VERSION"),
        "chains": chains,
    }))
}

async fn health(State(state): State<SharedState>) -> Result<Json<serde_json::Value>, AppError> {
    let transactions = state.resolver.store().count().await?;
    Ok(Json(serde_json::json!({
        "status": "ok",
        "transactions": transactions,
    })))
}

async fn not_found() -> AppError {
    AppError::NotFound("route not found".to_string())
}
