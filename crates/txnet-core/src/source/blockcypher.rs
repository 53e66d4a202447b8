//! BlockCypher-backed Bitcoin data source.
//!
//! Fetches `addrs/{address}/full` and expands each UTXO transaction into
//! per-counterparty records from the point of view of the queried address.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime};
use serde::Deserialize;
use tracing::{debug, trace};

use crate::address::{AddressCheck, BitcoinAddressCheck};
use crate::error::{ChainServiceError, CoreError};
use crate::types::{Blockchain, TimeWindow, TransactionRecord};

use super::http::{require_api_key, HttpClient, HttpConfig};
use super::ChainDataSource;

pub const DEFAULT_BASE_URL: &str = "https://api.blockcypher.com/v1/btc/main";

const SATS_PER_BTC: f64 = 100_000_000.0;

/// Sender placeholder when no input address other than the queried one is
/// known (coinbase or self-spend).
const UNKNOWN_SENDER: &str = "Unknown";

pub struct BlockCypherSource {
    http: HttpClient,
    token: String,
    check: BitcoinAddressCheck,
}

impl BlockCypherSource {
    /// Build a source against `base_url`. A missing or blank `token` is a
    /// configuration error.
    pub fn new(base_url: &str, token: Option<&str>, config: &HttpConfig) -> Result<Self, CoreError> {
        Ok(Self {
            http: HttpClient::new(base_url, config)?,
            token: require_api_key(token, "BLOCKCYPHER_API_KEY")?,
            check: BitcoinAddressCheck,
        })
    }
}

#[async_trait]
impl ChainDataSource for BlockCypherSource {
    fn blockchain(&self) -> Blockchain {
        Blockchain::Bitcoin
    }

    async fn fetch_transactions(
        &self,
        address: &str,
        window: &TimeWindow,
    ) -> Result<Vec<TransactionRecord>, ChainServiceError> {
        let url = self.http.url(&format!("addrs/{address}/full"))?;
        let payload: AddressFull = self
            .http
            .get_json(url, &[("token", self.token.as_str())])
            .await?;
        let records = normalize_address_full(address, window, payload)?;
        debug!(address, records = records.len(), "blockcypher transactions normalized");
        Ok(records)
    }

    fn address_check(&self) -> Option<&dyn AddressCheck> {
        Some(&self.check)
    }
}

// ==============================================================================
// Wire Format
// ==============================================================================

#[derive(Debug, Deserialize)]
struct AddressFull {
    #[serde(default)]
    txs: Vec<FullTx>,
}

#[derive(Debug, Deserialize)]
struct FullTx {
    hash: String,
    #[serde(default)]
    block_height: Option<i64>,
    received: String,
    #[serde(default)]
    addresses: Vec<String>,
    #[serde(default)]
    inputs: Vec<TxInput>,
    #[serde(default)]
    outputs: Vec<TxOutput>,
}

#[derive(Debug, Deserialize)]
struct TxInput {
    #[serde(default)]
    addresses: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct TxOutput {
    #[serde(default)]
    value: u64,
    #[serde(default)]
    addresses: Option<Vec<String>>,
}

fn addresses_of(list: &Option<Vec<String>>) -> &[String] {
    list.as_deref().unwrap_or(&[])
}

fn pays(list: &Option<Vec<String>>, address: &str) -> bool {
    addresses_of(list).iter().any(|a| a == address)
}

// ==============================================================================
// Normalization
// ==============================================================================

fn normalize_address_full(
    address: &str,
    window: &TimeWindow,
    payload: AddressFull,
) -> Result<Vec<TransactionRecord>, ChainServiceError> {
    let mut records = Vec::new();

    for tx in payload.txs {
        let timestamp = parse_received(&tx.received)?;
        if !window.contains(timestamp) {
            trace!(txid = %tx.hash, %timestamp, "skip transaction outside window");
            continue;
        }
        if !tx.addresses.iter().any(|a| a == address) {
            continue;
        }

        let block_number = tx.block_height.and_then(|h| u64::try_from(h).ok());
        let make = |from: &str, to: &str, sats: u64| TransactionRecord {
            blockchain: Blockchain::Bitcoin,
            txid: tx.hash.clone(),
            from_address: from.to_owned(),
            to_address: to.to_owned(),
            value: sats as f64 / SATS_PER_BTC,
            timestamp,
            block_number,
            fetch_depth: None,
            contract: None,
        };

        // Incoming: one record per output paying the address.
        let sender = tx
            .inputs
            .iter()
            .filter_map(|input| {
                let addrs = addresses_of(&input.addresses);
                match addrs.first() {
                    Some(first) if first != address => Some(first.as_str()),
                    _ => None,
                }
            })
            .next()
            .unwrap_or(UNKNOWN_SENDER);
        for output in tx.outputs.iter().filter(|o| pays(&o.addresses, address)) {
            records.push(make(sender, address, output.value));
        }

        // Outgoing: one record per output that does not pay the address.
        if tx.inputs.iter().any(|input| pays(&input.addresses, address)) {
            for output in tx.outputs.iter().filter(|o| !pays(&o.addresses, address)) {
                if let Some(recipient) = addresses_of(&output.addresses).first() {
                    records.push(make(address, recipient, output.value));
                }
            }
        }
    }

    Ok(records)
}

/// BlockCypher's `received` is RFC 3339 in UTC, with or without fractional
/// seconds.
fn parse_received(raw: &str) -> Result<NaiveDateTime, ChainServiceError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.naive_utc())
        .map_err(|e| ChainServiceError::InvalidResponse(format!("bad `received` timestamp {raw:?}: {e}")))
}
