use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::CoreError;
use crate::types::{Blockchain, RecordKey, TimeWindow, TransactionRecord};

use super::{is_fresh, needs_depth_upgrade, TransactionStore};

/// In-memory transaction store.
///
/// Records live in insertion order; `index` maps each uniqueness key to its
/// slot. Uses `tokio::sync::RwLock` so a whole upsert batch is applied under
/// one write guard.
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    records: Vec<TransactionRecord>,
    index: HashMap<RecordKey, usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Stored copy of the record with `key`, if any.
    pub async fn get(&self, key: &RecordKey) -> Option<TransactionRecord> {
        let inner = self.inner.read().await;
        inner.index.get(key).map(|&slot| inner.records[slot].clone())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TransactionStore for MemoryStore {
    async fn lookup(
        &self,
        blockchain: Blockchain,
        address: &str,
        window: &TimeWindow,
        min_depth: Option<u32>,
    ) -> Result<Vec<TransactionRecord>, CoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .records
            .iter()
            .filter(|r| r.blockchain == blockchain && r.involves(address))
            .filter(|r| window.contains(r.timestamp))
            .filter(|r| is_fresh(r.fetch_depth, min_depth))
            .cloned()
            .collect())
    }

    async fn upsert(
        &self,
        records: &[TransactionRecord],
        depth: u32,
    ) -> Result<Vec<TransactionRecord>, CoreError> {
        let mut inner = self.inner.write().await;
        let mut touched = Vec::new();

        for record in records {
            let key = record.key();
            match inner.index.get(&key).copied() {
                None => {
                    let mut stored = record.clone();
                    stored.fetch_depth = Some(depth);
                    let slot = inner.records.len();
                    inner.records.push(stored.clone());
                    inner.index.insert(key, slot);
                    touched.push(stored);
                }
                Some(slot) => {
                    let stored = &mut inner.records[slot];
                    if needs_depth_upgrade(stored.fetch_depth, depth) {
                        stored.fetch_depth = Some(depth);
                        touched.push(stored.clone());
                    } else {
                        tracing::trace!(txid = %record.txid, "skip duplicate transaction");
                    }
                }
            }
        }

        Ok(touched)
    }

    async fn count(&self) -> Result<u64, CoreError> {
        Ok(self.inner.read().await.records.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{record, record_with_depth, utxo_fanout};

    #[tokio::test]
    async fn upsert_is_idempotent() {
        let store = MemoryStore::new();
        let batch = vec![record("t1", "R", "A", 3.0), record("t2", "A", "R", 1.0)];

        let first = store.upsert(&batch, 1).await.expect("first upsert");
        let second = store.upsert(&batch, 1).await.expect("second upsert");

        assert_eq!(first.len(), 2);
        assert!(second.is_empty(), "same depth must not touch anything");
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn utxo_fanout_keeps_one_record_per_output() {
        let store = MemoryStore::new();
        let touched = store
            .upsert(&utxo_fanout("t1", "R", &[("A", 3.0), ("B", 2.0)]), 1)
            .await
            .expect("upsert");

        assert_eq!(touched.len(), 2);
        assert!(store.get(&record("t1", "R", "A", 3.0).key()).await.is_some());
        assert!(store.get(&record("t1", "R", "B", 2.0).key()).await.is_some());
    }

    #[tokio::test]
    async fn same_txid_with_different_value_is_a_distinct_record() {
        let store = MemoryStore::new();
        store
            .upsert(&[record("t1", "R", "A", 3.0), record("t1", "R", "A", 4.0)], 1)
            .await
            .expect("upsert");
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn fetch_depth_never_decreases() {
        let store = MemoryStore::new();
        let rec = record("t1", "R", "A", 3.0);
        let key = rec.key();

        store.upsert(std::slice::from_ref(&rec), 2).await.unwrap();
        let lower = store.upsert(std::slice::from_ref(&rec), 1).await.unwrap();
        assert!(lower.is_empty());
        assert_eq!(store.get(&key).await.unwrap().fetch_depth, Some(2));

        let higher = store.upsert(std::slice::from_ref(&rec), 3).await.unwrap();
        assert_eq!(higher.len(), 1);
        assert_eq!(higher[0].fetch_depth, Some(3));
        assert_eq!(store.get(&key).await.unwrap().fetch_depth, Some(3));
    }

    #[tokio::test]
    async fn duplicate_inside_one_batch_is_reported_once() {
        let store = MemoryStore::new();
        let rec = record("t1", "R", "A", 3.0);
        let touched = store.upsert(&[rec.clone(), rec], 1).await.unwrap();
        assert_eq!(touched.len(), 1);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn lookup_applies_depth_threshold_and_window() {
        let store = MemoryStore::new();
        store.upsert(&[record("t1", "R", "A", 1.0)], 1).await.unwrap();
        store.upsert(&[record("t2", "B", "R", 1.0)], 2).await.unwrap();

        let all = store
            .lookup(Blockchain::Bitcoin, "R", &TimeWindow::unbounded(), None)
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        let deep = store
            .lookup(Blockchain::Bitcoin, "R", &TimeWindow::unbounded(), Some(2))
            .await
            .unwrap();
        assert_eq!(deep.len(), 1);
        assert_eq!(deep[0].txid, "t2");

        let other_chain = store
            .lookup(Blockchain::Ethereum, "R", &TimeWindow::unbounded(), None)
            .await
            .unwrap();
        assert!(other_chain.is_empty());
    }

    #[tokio::test]
    async fn lookup_treats_null_depth_as_fresh() {
        let store = MemoryStore::new();
        {
            // Simulate a row written before depth tagging existed.
            let mut inner = store.inner.write().await;
            let legacy = record_with_depth("t0", "R", "A", 1.0, None);
            inner.index.insert(legacy.key(), 0);
            inner.records.push(legacy);
        }

        let hits = store
            .lookup(Blockchain::Bitcoin, "R", &TimeWindow::unbounded(), Some(3))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);

        let touched = store
            .upsert(&[record("t0", "R", "A", 1.0)], 1)
            .await
            .unwrap();
        assert_eq!(touched.len(), 1, "NULL depth is upgraded by any depth");
        assert_eq!(touched[0].fetch_depth, Some(1));
    }
}
