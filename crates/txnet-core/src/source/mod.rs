//! Chain data source abstraction layer.
//!
//! Defines the [`ChainDataSource`] trait, the [`ChainRegistry`] that maps a
//! [`Blockchain`] to its configured source, and two HTTP implementations:
//! [`BlockCypherSource`] (Bitcoin) and [`EtherscanSource`] (Ethereum). A test
//! mock lives in `mock::MockSource`.

mod blockcypher;
mod etherscan;
mod http;
#[cfg(test)]
pub mod mock;

pub use blockcypher::{BlockCypherSource, DEFAULT_BASE_URL as BLOCKCYPHER_DEFAULT_URL};
pub use etherscan::{EtherscanSource, DEFAULT_BASE_URL as ETHERSCAN_DEFAULT_URL};
pub use http::HttpConfig;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::address::AddressCheck;
use crate::error::{ChainServiceError, CoreError};
use crate::types::{Blockchain, TimeWindow, TransactionRecord};

/// Remote provider of normalized transaction records for one chain.
///
/// Implementations own their credentials (checked at construction) and
/// return records already fanned out per sender/recipient pair.
#[async_trait]
pub trait ChainDataSource: Send + Sync {
    fn blockchain(&self) -> Blockchain;

    /// Transactions touching `address` inside `window`. Order is not
    /// significant. The returned records carry no `fetch_depth`.
    async fn fetch_transactions(
        &self,
        address: &str,
        window: &TimeWindow,
    ) -> Result<Vec<TransactionRecord>, ChainServiceError>;

    /// Address format check, for chains that have one.
    fn address_check(&self) -> Option<&dyn AddressCheck> {
        None
    }
}

/// The set of chains this process can serve.
#[derive(Clone, Default)]
pub struct ChainRegistry {
    sources: HashMap<Blockchain, Arc<dyn ChainDataSource>>,
}

impl ChainRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `source` under its own chain, replacing any previous one.
    pub fn register(&mut self, source: Arc<dyn ChainDataSource>) {
        self.sources.insert(source.blockchain(), source);
    }

    pub fn with_source(mut self, source: Arc<dyn ChainDataSource>) -> Self {
        self.register(source);
        self
    }

    pub fn get(&self, blockchain: Blockchain) -> Result<&dyn ChainDataSource, CoreError> {
        self.sources
            .get(&blockchain)
            .map(|source| source.as_ref())
            .ok_or_else(|| CoreError::UnsupportedBlockchain(blockchain.to_string()))
    }

    /// Configured chains, in a stable order.
    pub fn chains(&self) -> Vec<Blockchain> {
        Blockchain::ALL
            .into_iter()
            .filter(|chain| self.sources.contains_key(chain))
            .collect()
    }
}
