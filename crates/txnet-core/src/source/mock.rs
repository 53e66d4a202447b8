use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::address::{AddressCheck, BitcoinAddressCheck};
use crate::error::ChainServiceError;
use crate::types::{Blockchain, TimeWindow, TransactionRecord};

use super::ChainDataSource;

/// A mock chain data source for testing. Serves a canned ledger: fetching an
/// address returns every ledger record it sends or receives. Counts calls
/// per address so tests can assert on fetch behavior.
pub struct MockSource {
    blockchain: Blockchain,
    ledger: Vec<TransactionRecord>,
    failing: HashSet<String>,
    check: Option<MockCheck>,
    calls: Mutex<HashMap<String, usize>>,
}

enum MockCheck {
    Bitcoin(BitcoinAddressCheck),
    Reject(HashSet<String>),
}

impl AddressCheck for MockCheck {
    fn validate_address(&self, address: &str) -> bool {
        match self {
            Self::Bitcoin(check) => check.validate_address(address),
            Self::Reject(invalid) => !invalid.contains(address),
        }
    }
}

impl MockSource {
    pub fn builder(blockchain: Blockchain) -> MockSourceBuilder {
        MockSourceBuilder {
            blockchain,
            ledger: Vec::new(),
            failing: HashSet::new(),
            check: None,
        }
    }

    /// How many times `address` was fetched.
    pub fn calls(&self, address: &str) -> usize {
        self.calls
            .lock()
            .expect("mock call log poisoned")
            .get(address)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().expect("mock call log poisoned").values().sum()
    }
}

pub struct MockSourceBuilder {
    blockchain: Blockchain,
    ledger: Vec<TransactionRecord>,
    failing: HashSet<String>,
    check: Option<MockCheck>,
}

impl MockSourceBuilder {
    pub fn with_tx(mut self, record: TransactionRecord) -> Self {
        self.ledger.push(record);
        self
    }

    pub fn with_txs(mut self, records: impl IntoIterator<Item = TransactionRecord>) -> Self {
        self.ledger.extend(records);
        self
    }

    /// Fetching `address` fails with an upstream 503.
    pub fn failing_for(mut self, address: &str) -> Self {
        self.failing.insert(address.to_owned());
        self
    }

    /// Validate addresses with the real Bitcoin format check.
    pub fn with_bitcoin_check(mut self) -> Self {
        self.check = Some(MockCheck::Bitcoin(BitcoinAddressCheck));
        self
    }

    /// Expose an address check that rejects exactly `invalid`.
    pub fn rejecting(mut self, invalid: &[&str]) -> Self {
        self.check = Some(MockCheck::Reject(
            invalid.iter().map(|a| (*a).to_owned()).collect(),
        ));
        self
    }

    pub fn build(self) -> MockSource {
        MockSource {
            blockchain: self.blockchain,
            ledger: self.ledger,
            failing: self.failing,
            check: self.check,
            calls: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl ChainDataSource for MockSource {
    fn blockchain(&self) -> Blockchain {
        self.blockchain
    }

    async fn fetch_transactions(
        &self,
        address: &str,
        window: &TimeWindow,
    ) -> Result<Vec<TransactionRecord>, ChainServiceError> {
        *self
            .calls
            .lock()
            .expect("mock call log poisoned")
            .entry(address.to_owned())
            .or_default() += 1;

        if self.failing.contains(address) {
            return Err(ChainServiceError::Http {
                status: 503,
                body: format!("mock outage for {address}"),
            });
        }

        Ok(self
            .ledger
            .iter()
            .filter(|r| r.involves(address) && window.contains(r.timestamp))
            .map(|r| TransactionRecord {
                fetch_depth: None,
                ..r.clone()
            })
            .collect())
    }

    fn address_check(&self) -> Option<&dyn AddressCheck> {
        self.check.as_ref().map(|c| c as &dyn AddressCheck)
    }
}
