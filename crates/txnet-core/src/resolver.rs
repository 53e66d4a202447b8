use std::sync::Arc;

use tracing::{debug, info};

use crate::address::same_address;
use crate::error::CoreError;
use crate::source::ChainRegistry;
use crate::store::TransactionStore;
use crate::types::{Blockchain, TimeWindow, TransactionRecord};

// ==============================================================================
// Transaction Resolver
// ==============================================================================

/// Cache-first transaction resolution for one address.
///
/// A store hit at or above the requested depth is returned as-is; a miss
/// goes to the chain's data source and returns what the merge touched.
pub struct TransactionResolver {
    store: Arc<dyn TransactionStore>,
    sources: ChainRegistry,
}

impl TransactionResolver {
    pub fn new(store: Arc<dyn TransactionStore>, sources: ChainRegistry) -> Self {
        Self { store, sources }
    }

    pub fn store(&self) -> &dyn TransactionStore {
        self.store.as_ref()
    }

    pub fn sources(&self) -> &ChainRegistry {
        &self.sources
    }

    /// Reject `address` if the chain has a format check and it fails.
    pub fn check_address(&self, blockchain: Blockchain, address: &str) -> Result<(), CoreError> {
        let source = self.sources.get(blockchain)?;
        match source.address_check() {
            Some(check) if !check.validate_address(address) => Err(CoreError::InvalidAddress {
                blockchain,
                address: address.to_owned(),
            }),
            _ => Ok(()),
        }
    }

    /// Transactions touching `address` within `window`, confirmed at
    /// `depth` or deeper.
    ///
    /// On a store miss the returned list holds only the records the merge
    /// inserted or upgraded, so records already stored at an equal or
    /// greater depth are not reported again.
    pub async fn resolve(
        &self,
        blockchain: Blockchain,
        address: &str,
        window: &TimeWindow,
        depth: u32,
    ) -> Result<Vec<TransactionRecord>, CoreError> {
        self.check_address(blockchain, address)?;
        let address = blockchain.canonical_address(address);
        let address = address.as_str();

        let cached = self
            .store
            .lookup(blockchain, address, window, Some(depth))
            .await?;
        if !cached.is_empty() {
            debug!(%blockchain, address, depth, records = cached.len(), "store hit");
            return Ok(cached);
        }

        let source = self.sources.get(blockchain)?;
        let fetched = source.fetch_transactions(address, window).await?;
        let touched = self.store.upsert(&fetched, depth).await?;
        info!(
            %blockchain,
            address,
            depth,
            fetched = fetched.len(),
            touched = touched.len(),
            "fetched transactions from data source"
        );
        Ok(touched)
    }
}

/// Keep only transfers directly between `a` and `b`, in either direction.
pub fn transactions_between(
    records: Vec<TransactionRecord>,
    a: &str,
    b: &str,
) -> Vec<TransactionRecord> {
    records
        .into_iter()
        .filter(|r| {
            (same_address(&r.from_address, a) && same_address(&r.to_address, b))
                || (same_address(&r.from_address, b) && same_address(&r.to_address, a))
        })
        .collect()
}
