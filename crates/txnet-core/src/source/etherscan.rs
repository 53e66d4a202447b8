//! Etherscan-backed Ethereum data source (`module=account&action=txlist`).

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime};
use serde::Deserialize;
use tracing::{debug, trace};

use crate::address::same_address;
use crate::error::{ChainServiceError, CoreError};
use crate::types::{Blockchain, ContractCall, TimeWindow, TransactionRecord};

use super::http::{require_api_key, HttpClient, HttpConfig};
use super::ChainDataSource;

pub const DEFAULT_BASE_URL: &str = "https://api.etherscan.io/api";

const WEI_PER_ETH: f64 = 1e18;

/// Etherscan answers an address without history with `status = "0"` and
/// this message; it is not an error.
const NO_TRANSACTIONS: &str = "No transactions found";

pub struct EtherscanSource {
    http: HttpClient,
    api_key: String,
}

impl EtherscanSource {
    pub fn new(base_url: &str, api_key: Option<&str>, config: &HttpConfig) -> Result<Self, CoreError> {
        Ok(Self {
            http: HttpClient::new(base_url, config)?,
            api_key: require_api_key(api_key, "ETHERSCAN_API_KEY")?,
        })
    }
}

#[async_trait]
impl ChainDataSource for EtherscanSource {
    fn blockchain(&self) -> Blockchain {
        Blockchain::Ethereum
    }

    async fn fetch_transactions(
        &self,
        address: &str,
        window: &TimeWindow,
    ) -> Result<Vec<TransactionRecord>, ChainServiceError> {
        let query = [
            ("module", "account"),
            ("action", "txlist"),
            ("address", address),
            ("startblock", "0"),
            ("endblock", "99999999"),
            ("sort", "asc"),
            ("apikey", self.api_key.as_str()),
        ];
        let envelope: TxListEnvelope = self.http.get_json(self.http.url("")?, &query).await?;
        let records = normalize_txlist(address, window, envelope)?;
        debug!(address, records = records.len(), "etherscan transactions normalized");
        Ok(records)
    }
}

// ==============================================================================
// Wire Format
// ==============================================================================

#[derive(Debug, Deserialize)]
struct TxListEnvelope {
    status: String,
    #[serde(default)]
    message: String,
    /// An array of transactions on success, an error string otherwise.
    #[serde(default)]
    result: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EtherscanTx {
    hash: String,
    #[serde(default)]
    from: String,
    #[serde(default)]
    to: String,
    value: String,
    time_stamp: String,
    #[serde(default)]
    block_number: String,
    #[serde(default)]
    input: String,
    #[serde(default)]
    contract_address: String,
    #[serde(default)]
    function_name: String,
    #[serde(default)]
    method_id: String,
}

// ==============================================================================
// Normalization
// ==============================================================================

fn normalize_txlist(
    address: &str,
    window: &TimeWindow,
    envelope: TxListEnvelope,
) -> Result<Vec<TransactionRecord>, ChainServiceError> {
    if envelope.status != "1" {
        if envelope.message.starts_with(NO_TRANSACTIONS) {
            return Ok(Vec::new());
        }
        let detail = match &envelope.result {
            serde_json::Value::String(s) if !s.is_empty() => format!("{}: {s}", envelope.message),
            _ => envelope.message.clone(),
        };
        return Err(ChainServiceError::Remote(detail));
    }

    let txs: Vec<EtherscanTx> = serde_json::from_value(envelope.result)
        .map_err(|e| ChainServiceError::InvalidResponse(format!("decode txlist result: {e}")))?;

    let mut records = Vec::with_capacity(txs.len());
    for tx in txs {
        let timestamp = parse_unix(&tx.time_stamp)?;
        if !window.contains(timestamp) {
            trace!(txid = %tx.hash, %timestamp, "skip transaction outside window");
            continue;
        }

        // Contract creations have an empty `to`.
        let recipient = Blockchain::Ethereum.canonical_address(if tx.to.is_empty() {
            &tx.contract_address
        } else {
            &tx.to
        });
        if !same_address(&tx.from, address) && !same_address(&recipient, address) {
            continue;
        }

        let wei: f64 = tx
            .value
            .parse()
            .map_err(|e| ChainServiceError::InvalidResponse(format!("bad value {:?}: {e}", tx.value)))?;
        let block_number = tx.block_number.parse::<u64>().ok();

        records.push(TransactionRecord {
            blockchain: Blockchain::Ethereum,
            contract: contract_call(&tx, &recipient),
            txid: tx.hash,
            from_address: Blockchain::Ethereum.canonical_address(&tx.from),
            to_address: recipient,
            value: wei / WEI_PER_ETH,
            timestamp,
            block_number,
            fetch_depth: None,
        });
    }

    Ok(records)
}

fn contract_call(tx: &EtherscanTx, recipient: &str) -> Option<ContractCall> {
    if tx.input.is_empty() || tx.input == "0x" {
        return None;
    }
    let method = [&tx.function_name, &tx.method_id]
        .into_iter()
        .find(|s| !s.is_empty())
        .cloned();
    Some(ContractCall {
        contract_address: recipient.to_owned(),
        method,
        input_data: tx.input.clone(),
    })
}

fn parse_unix(raw: &str) -> Result<NaiveDateTime, ChainServiceError> {
    raw.parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|dt| dt.naive_utc())
        .ok_or_else(|| ChainServiceError::InvalidResponse(format!("bad timeStamp {raw:?}")))
}
