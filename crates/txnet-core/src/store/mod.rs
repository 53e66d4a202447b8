//! Depth-tagged transaction store.
//!
//! Defines the [`TransactionStore`] trait and two backends: a process-local
//! [`MemoryStore`] and a `sqlx`-backed [`SqliteStore`]. Both enforce the
//! same upsert contract:
//!
//! - unknown key: insert with `fetch_depth = depth`, report as touched;
//! - known key with `fetch_depth` NULL or below `depth`: raise it, report;
//! - otherwise: leave it alone and do not report it.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;

use crate::error::CoreError;
use crate::types::{Blockchain, TimeWindow, TransactionRecord};

#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Records on `blockchain` with `address` as sender or recipient,
    /// inside `window`. With `min_depth`, only records whose `fetch_depth`
    /// is NULL or at least `min_depth` are returned.
    async fn lookup(
        &self,
        blockchain: Blockchain,
        address: &str,
        window: &TimeWindow,
        min_depth: Option<u32>,
    ) -> Result<Vec<TransactionRecord>, CoreError>;

    /// Merge `records` under `depth` and return the inserted or
    /// depth-upgraded ones, in input order.
    async fn upsert(
        &self,
        records: &[TransactionRecord],
        depth: u32,
    ) -> Result<Vec<TransactionRecord>, CoreError>;

    /// Number of stored records.
    async fn count(&self) -> Result<u64, CoreError>;
}

/// Whether a stored record must be raised to `depth`.
pub(crate) fn needs_depth_upgrade(stored: Option<u32>, depth: u32) -> bool {
    stored.map_or(true, |current| current < depth)
}

/// Freshness predicate shared by both backends' lookups.
pub(crate) fn is_fresh(stored: Option<u32>, min_depth: Option<u32>) -> bool {
    match (stored, min_depth) {
        (_, None) | (None, Some(_)) => true,
        (Some(current), Some(min)) => current >= min,
    }
}
