//! Shared test helpers for `txnet-core` unit tests.
//!
//! Builders for `TransactionRecord` fixtures so that store, resolver and
//! network tests share a single source of truth for dummy data.

use chrono::{NaiveDate, NaiveDateTime};

use crate::types::{Blockchain, TransactionRecord};

/// Noon on the given day of January 2024.
pub fn at(day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, day)
        .and_then(|d| d.and_hms_opt(12, 0, 0))
        .expect("valid test date")
}

/// A Bitcoin record with no fetch depth yet, as a data source returns it.
pub fn record(txid: &str, from: &str, to: &str, value: f64) -> TransactionRecord {
    record_with_depth(txid, from, to, value, None)
}

pub fn record_with_depth(
    txid: &str,
    from: &str,
    to: &str,
    value: f64,
    fetch_depth: Option<u32>,
) -> TransactionRecord {
    TransactionRecord {
        blockchain: Blockchain::Bitcoin,
        txid: txid.to_owned(),
        from_address: from.to_owned(),
        to_address: to.to_owned(),
        value,
        timestamp: at(1),
        block_number: Some(800_000),
        fetch_depth,
        contract: None,
    }
}

/// An Ethereum record.
pub fn eth_record(txid: &str, from: &str, to: &str, value: f64) -> TransactionRecord {
    TransactionRecord {
        blockchain: Blockchain::Ethereum,
        block_number: Some(19_000_000),
        ..record(txid, from, to, value)
    }
}

/// One UTXO transaction spending from `input` into each of `outputs`,
/// already fanned out into per-output records.
pub fn utxo_fanout(txid: &str, input: &str, outputs: &[(&str, f64)]) -> Vec<TransactionRecord> {
    outputs
        .iter()
        .map(|(to, value)| record(txid, input, to, *value))
        .collect()
}

/// A store that never has anything cached and reports every upserted record
/// as touched. Lets traversal tests exercise the data source on every call.
pub struct NullStore;

#[async_trait::async_trait]
impl crate::store::TransactionStore for NullStore {
    async fn lookup(
        &self,
        _blockchain: Blockchain,
        _address: &str,
        _window: &crate::types::TimeWindow,
        _min_depth: Option<u32>,
    ) -> Result<Vec<TransactionRecord>, crate::error::CoreError> {
        Ok(Vec::new())
    }

    async fn upsert(
        &self,
        records: &[TransactionRecord],
        depth: u32,
    ) -> Result<Vec<TransactionRecord>, crate::error::CoreError> {
        Ok(records
            .iter()
            .map(|r| TransactionRecord {
                fetch_depth: Some(depth),
                ..r.clone()
            })
            .collect())
    }

    async fn count(&self) -> Result<u64, crate::error::CoreError> {
        Ok(0)
    }
}
