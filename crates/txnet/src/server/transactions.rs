use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use txnet_core::resolver::transactions_between;
use txnet_core::{Blockchain, TransactionRecord};

use super::dates::time_window;
use super::error::AppError;
use super::SharedState;

/// Address lookups from this route are confirmed at depth 1.
const LOOKUP_DEPTH: u32 = 1;

#[derive(Deserialize)]
pub(super) struct TransactionsQuery {
    start_date: Option<String>,
    end_date: Option<String>,
    second_address: Option<String>,
}

pub(super) async fn get_transactions(
    State(state): State<SharedState>,
    Path((blockchain, address)): Path<(String, String)>,
    query: Result<Query<TransactionsQuery>, QueryRejection>,
) -> Result<Json<Vec<TransactionRecord>>, AppError> {
    let Query(query) = query.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let blockchain: Blockchain = blockchain.parse()?;
    let window = time_window(query.start_date.as_deref(), query.end_date.as_deref())?;

    let records = state
        .resolver
        .resolve(blockchain, &address, &window, LOOKUP_DEPTH)
        .await?;

    let records = match query.second_address.as_deref().filter(|s| !s.is_empty()) {
        Some(other) => transactions_between(records, &address, other),
        None => records,
    };

    Ok(Json(records))
}
