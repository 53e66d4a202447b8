//! Domain types for txnet's transaction and network model.
//!
//! Contains the normalized `TransactionRecord` shared by every chain data
//! source and the store, the `Blockchain` identifier, time windows, and the
//! node/link graph produced by network expansion.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ==============================================================================
// Blockchain Identifier
// ==============================================================================

/// The chain types txnet knows how to resolve. Bitcoin is modeled as a UTXO
/// chain, Ethereum as an account-model chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Blockchain {
    Bitcoin,
    Ethereum,
}

impl Blockchain {
    pub const ALL: [Blockchain; 2] = [Blockchain::Bitcoin, Blockchain::Ethereum];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bitcoin => "bitcoin",
            Self::Ethereum => "ethereum",
        }
    }

    /// The form an address is stored, looked up and fetched under.
    ///
    /// Ethereum hex addresses are case-insensitive (mixed case is only an
    /// EIP-55 checksum), so they are lowercased. Bitcoin addresses pass
    /// through unchanged.
    pub fn canonical_address(&self, address: &str) -> String {
        match self {
            Self::Bitcoin => address.to_owned(),
            Self::Ethereum => address.to_lowercase(),
        }
    }
}

impl fmt::Display for Blockchain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Blockchain {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bitcoin" => Ok(Self::Bitcoin),
            "ethereum" => Ok(Self::Ethereum),
            other => Err(CoreError::UnsupportedBlockchain(other.to_owned())),
        }
    }
}

// ==============================================================================
// Time Window
// ==============================================================================

/// An optional `[start, end]` range over naive UTC timestamps. Both bounds
/// are inclusive; a missing bound is open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
}

impl TimeWindow {
    pub fn new(start: Option<NaiveDateTime>, end: Option<NaiveDateTime>) -> Self {
        Self { start, end }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn contains(&self, timestamp: NaiveDateTime) -> bool {
        self.start.map_or(true, |start| timestamp >= start)
            && self.end.map_or(true, |end| timestamp <= end)
    }
}

// ==============================================================================
// Transaction Record
// ==============================================================================

/// Smart-contract call metadata attached to account-model transactions that
/// carry call data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractCall {
    pub contract_address: String,
    pub method: Option<String>,
    pub input_data: String,
}

/// One value transfer between two addresses, normalized across chains.
///
/// A UTXO transaction fans out into several records sharing `txid`; records
/// are unique by [`RecordKey`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub blockchain: Blockchain,
    pub txid: String,
    pub from_address: String,
    pub to_address: String,
    /// Amount in the chain's principal unit (BTC, ETH).
    pub value: f64,
    pub timestamp: NaiveDateTime,
    pub block_number: Option<u64>,
    /// Exploration depth under which this record was last confirmed.
    /// `None` satisfies every freshness threshold.
    pub fetch_depth: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract: Option<ContractCall>,
}

impl TransactionRecord {
    pub fn key(&self) -> RecordKey {
        RecordKey {
            txid: self.txid.clone(),
            value_bits: self.value.to_bits(),
            from_address: self.from_address.clone(),
            to_address: self.to_address.clone(),
        }
    }

    /// Exact (case-sensitive) endpoint match, as stored.
    pub fn involves(&self, address: &str) -> bool {
        self.from_address == address || self.to_address == address
    }
}

/// Uniqueness key of a stored record: `(txid, value, from, to)`.
///
/// The value is compared bit-for-bit, matching the store's REAL equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    pub txid: String,
    pub value_bits: u64,
    pub from_address: String,
    pub to_address: String,
}

// ==============================================================================
// Network Graph
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Source,
    Address,
    Focus,
}

/// An address in the expanded network. `id` is the case-normalized
/// address; `label` keeps the casing under which it was first seen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkNode {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
}

/// A directed transfer between two nodes, one per transaction record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkLink {
    pub id: String,
    pub source: String,
    pub target: String,
    pub value: f64,
    pub timestamp: NaiveDateTime,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkGraph {
    pub nodes: Vec<NetworkNode>,
    pub links: Vec<NetworkLink>,
}

impl NetworkGraph {
    pub fn node(&self, id: &str) -> Option<&NetworkNode> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

/// Parameters of one network expansion.
#[derive(Debug, Clone)]
pub struct NetworkRequest {
    pub blockchain: Blockchain,
    pub root_address: String,
    pub depth: u32,
    pub window: TimeWindow,
    pub min_amount: Option<f64>,
    pub focus_address: Option<String>,
}

impl NetworkRequest {
    pub fn new(blockchain: Blockchain, root_address: impl Into<String>, depth: u32) -> Self {
        Self {
            blockchain,
            root_address: root_address.into(),
            depth,
            window: TimeWindow::unbounded(),
            min_amount: None,
            focus_address: None,
        }
    }
}
