use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use txnet_core::network::expand;
use txnet_core::{Blockchain, NetworkGraph, NetworkRequest};

use super::dates::time_window;
use super::error::AppError;
use super::SharedState;

const DEFAULT_DEPTH: u32 = 1;

#[derive(Deserialize)]
pub(super) struct NetworkQuery {
    depth: Option<u32>,
    start_date: Option<String>,
    end_date: Option<String>,
    min_amount: Option<f64>,
    /// Collapses the result to the root and this address.
    second_address: Option<String>,
}

pub(super) async fn get_network(
    State(state): State<SharedState>,
    Path((blockchain, address)): Path<(String, String)>,
    query: Result<Query<NetworkQuery>, QueryRejection>,
) -> Result<Json<NetworkGraph>, AppError> {
    let Query(query) = query.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let blockchain: Blockchain = blockchain.parse()?;
    let window = time_window(query.start_date.as_deref(), query.end_date.as_deref())?;

    let request = NetworkRequest {
        blockchain,
        root_address: address,
        depth: query.depth.unwrap_or(DEFAULT_DEPTH),
        window,
        min_amount: query.min_amount,
        focus_address: query.second_address.filter(|s| !s.is_empty()),
    };

    let graph = expand(&state.resolver, &request).await?;
    Ok(Json(graph))
}
