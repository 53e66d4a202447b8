use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use tracing::{debug, info};

use crate::error::CoreError;
use crate::types::{Blockchain, ContractCall, TimeWindow, TransactionRecord};

use super::TransactionStore;

// ==============================================================================
// Schema
// ==============================================================================

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS transactions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    blockchain TEXT NOT NULL,
    txid TEXT NOT NULL,
    from_address TEXT NOT NULL,
    to_address TEXT NOT NULL,
    value REAL NOT NULL,
    timestamp INTEGER NOT NULL,
    block_number INTEGER,
    fetch_depth INTEGER,
    is_contract_interaction INTEGER NOT NULL DEFAULT 0,
    contract_address TEXT,
    contract_method TEXT,
    contract_input_data TEXT
)
"#;

/// Columns added after the first schema revision. Tables created before
/// them get the column appended; pre-existing rows read `fetch_depth` as
/// NULL, i.e. "fetched without depth context".
const ADDED_COLUMNS: &[(&str, &str)] = &[
    ("fetch_depth", "fetch_depth INTEGER"),
    (
        "is_contract_interaction",
        "is_contract_interaction INTEGER NOT NULL DEFAULT 0",
    ),
    ("contract_address", "contract_address TEXT"),
    ("contract_method", "contract_method TEXT"),
    ("contract_input_data", "contract_input_data TEXT"),
];

const CREATE_INDEXES: &[&str] = &[
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_transactions_key \
     ON transactions(txid, value, from_address, to_address)",
    "CREATE INDEX IF NOT EXISTS idx_transactions_blockchain ON transactions(blockchain)",
    "CREATE INDEX IF NOT EXISTS idx_transactions_from ON transactions(from_address)",
    "CREATE INDEX IF NOT EXISTS idx_transactions_to ON transactions(to_address)",
    "CREATE INDEX IF NOT EXISTS idx_transactions_timestamp ON transactions(timestamp)",
    "CREATE INDEX IF NOT EXISTS idx_transactions_contract ON transactions(contract_address)",
];

const COLUMNS: &str = "blockchain, txid, from_address, to_address, value, timestamp, \
     block_number, fetch_depth, is_contract_interaction, contract_address, contract_method, \
     contract_input_data";

/// Insert, or raise `fetch_depth` when the stored one is NULL or lower.
/// `RETURNING` yields a row only when something was inserted or updated,
/// which is exactly the "touched" set.
const UPSERT: &str = r#"
INSERT INTO transactions (blockchain, txid, from_address, to_address, value, timestamp,
    block_number, fetch_depth, is_contract_interaction, contract_address, contract_method,
    contract_input_data)
VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
ON CONFLICT (txid, value, from_address, to_address) DO UPDATE
    SET fetch_depth = excluded.fetch_depth
    WHERE transactions.fetch_depth IS NULL OR transactions.fetch_depth < excluded.fetch_depth
RETURNING blockchain, txid, from_address, to_address, value, timestamp, block_number,
    fetch_depth, is_contract_interaction, contract_address, contract_method, contract_input_data
"#;

pub(crate) async fn migrate(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(CREATE_TABLE).execute(pool).await?;

    let existing: Vec<String> = sqlx::query("PRAGMA table_info(transactions)")
        .fetch_all(pool)
        .await?
        .iter()
        .map(|row| row.try_get::<String, _>("name"))
        .collect::<Result<_, _>>()?;

    for (name, ddl) in ADDED_COLUMNS {
        if !existing.iter().any(|col| col == name) {
            info!(column = name, "adding missing transactions column");
            sqlx::query(&format!("ALTER TABLE transactions ADD COLUMN {ddl}"))
                .execute(pool)
                .await?;
        }
    }

    for statement in CREATE_INDEXES {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

// ==============================================================================
// Store
// ==============================================================================

/// SQLite-backed transaction store.
///
/// The pool hands out one connection per operation; an upsert batch runs in
/// a single SQL transaction that rolls back if dropped before commit.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `url`, e.g.
    /// `sqlite://txnet.db`, and bring its schema up to date.
    pub async fn connect(url: &str) -> Result<Self, CoreError> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        Self::from_pool(pool).await
    }

    /// A private in-memory database. Pinned to a single long-lived
    /// connection, since every SQLite memory connection is its own database.
    pub async fn in_memory() -> Result<Self, CoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self, CoreError> {
        migrate(&pool).await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl TransactionStore for SqliteStore {
    async fn lookup(
        &self,
        blockchain: Blockchain,
        address: &str,
        window: &TimeWindow,
        min_depth: Option<u32>,
    ) -> Result<Vec<TransactionRecord>, CoreError> {
        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {COLUMNS} FROM transactions WHERE blockchain = "));
        query
            .push_bind(blockchain.as_str())
            .push(" AND (from_address = ")
            .push_bind(address)
            .push(" OR to_address = ")
            .push_bind(address)
            .push(")");
        if let Some(start) = window.start {
            query
                .push(" AND timestamp >= ")
                .push_bind(start.and_utc().timestamp());
        }
        if let Some(end) = window.end {
            query
                .push(" AND timestamp <= ")
                .push_bind(end.and_utc().timestamp());
        }
        if let Some(min_depth) = min_depth {
            query
                .push(" AND (fetch_depth IS NULL OR fetch_depth >= ")
                .push_bind(i64::from(min_depth))
                .push(")");
        }
        query.push(" ORDER BY timestamp ASC, id ASC");

        let rows = query.build().fetch_all(&self.pool).await?;
        debug!(%blockchain, address, rows = rows.len(), "store lookup");
        rows.iter().map(record_from_row).collect()
    }

    async fn upsert(
        &self,
        records: &[TransactionRecord],
        depth: u32,
    ) -> Result<Vec<TransactionRecord>, CoreError> {
        let mut tx = self.pool.begin().await?;
        let mut touched = Vec::new();

        for record in records {
            let contract = record.contract.as_ref();
            let row = sqlx::query(UPSERT)
                .bind(record.blockchain.as_str())
                .bind(&record.txid)
                .bind(&record.from_address)
                .bind(&record.to_address)
                .bind(record.value)
                .bind(record.timestamp.and_utc().timestamp())
                .bind(record.block_number.and_then(|n| i64::try_from(n).ok()))
                .bind(i64::from(depth))
                .bind(contract.is_some())
                .bind(contract.map(|c| c.contract_address.as_str()))
                .bind(contract.and_then(|c| c.method.as_deref()))
                .bind(contract.map(|c| c.input_data.as_str()))
                .fetch_optional(&mut *tx)
                .await?;

            match row {
                Some(row) => touched.push(record_from_row(&row)?),
                None => debug!(txid = %record.txid, "skip duplicate transaction"),
            }
        }

        tx.commit().await?;
        Ok(touched)
    }

    async fn count(&self) -> Result<u64, CoreError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM transactions")
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

// ==============================================================================
// Row Decoding
// ==============================================================================

fn record_from_row(row: &SqliteRow) -> Result<TransactionRecord, CoreError> {
    let blockchain: String = row.try_get("blockchain")?;
    let blockchain = blockchain
        .parse::<Blockchain>()
        .map_err(|e| sqlx::Error::Decode(e.to_string().into()))?;

    let timestamp: i64 = row.try_get("timestamp")?;
    let timestamp = naive_from_unix(timestamp).ok_or_else(|| {
        sqlx::Error::Decode(format!("timestamp out of range: {timestamp}").into())
    })?;

    let block_number: Option<i64> = row.try_get("block_number")?;
    let fetch_depth: Option<i64> = row.try_get("fetch_depth")?;
    let is_contract: i64 = row.try_get("is_contract_interaction")?;

    let contract = if is_contract != 0 {
        Some(ContractCall {
            contract_address: row
                .try_get::<Option<String>, _>("contract_address")?
                .unwrap_or_default(),
            method: row.try_get("contract_method")?,
            input_data: row
                .try_get::<Option<String>, _>("contract_input_data")?
                .unwrap_or_default(),
        })
    } else {
        None
    };

    Ok(TransactionRecord {
        blockchain,
        txid: row.try_get("txid")?,
        from_address: row.try_get("from_address")?,
        to_address: row.try_get("to_address")?,
        value: row.try_get("value")?,
        timestamp,
        block_number: block_number.and_then(|n| u64::try_from(n).ok()),
        fetch_depth: fetch_depth.and_then(|d| u32::try_from(d).ok()),
        contract,
    })
}

fn naive_from_unix(secs: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp(secs, 0).map(|dt| dt.naive_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{at, eth_record, record, utxo_fanout};

    async fn store() -> SqliteStore {
        SqliteStore::in_memory().await.expect("open in-memory sqlite")
    }

    #[tokio::test]
    async fn upsert_twice_keeps_size() {
        let store = store().await;
        let batch = utxo_fanout("t1", "R", &[("A", 3.0), ("B", 2.0)]);

        assert_eq!(store.upsert(&batch, 1).await.unwrap().len(), 2);
        assert!(store.upsert(&batch, 1).await.unwrap().is_empty());
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn upsert_raises_depth_and_reports_it() {
        let store = store().await;
        let rec = record("t1", "R", "A", 3.0);

        store.upsert(std::slice::from_ref(&rec), 1).await.unwrap();
        let raised = store.upsert(std::slice::from_ref(&rec), 3).await.unwrap();
        assert_eq!(raised.len(), 1);
        assert_eq!(raised[0].fetch_depth, Some(3));

        let lowered = store.upsert(std::slice::from_ref(&rec), 2).await.unwrap();
        assert!(lowered.is_empty());

        let stored = store
            .lookup(Blockchain::Bitcoin, "A", &TimeWindow::unbounded(), None)
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].fetch_depth, Some(3));
    }

    #[tokio::test]
    async fn lookup_filters_by_window_depth_and_chain() {
        let store = store().await;
        let mut early = record("t1", "R", "A", 1.0);
        early.timestamp = at(1);
        let mut late = record("t2", "B", "R", 1.0);
        late.timestamp = at(10);
        store.upsert(&[early], 1).await.unwrap();
        store.upsert(&[late], 2).await.unwrap();
        store
            .upsert(&[eth_record("0xe1", "R", "C", 1.0)], 2)
            .await
            .unwrap();

        let window = TimeWindow::new(Some(at(5)), None);
        let windowed = store
            .lookup(Blockchain::Bitcoin, "R", &window, None)
            .await
            .unwrap();
        assert_eq!(windowed.len(), 1);
        assert_eq!(windowed[0].txid, "t2");

        let deep = store
            .lookup(Blockchain::Bitcoin, "R", &TimeWindow::unbounded(), Some(2))
            .await
            .unwrap();
        assert_eq!(deep.len(), 1);
        assert_eq!(deep[0].txid, "t2");

        let eth = store
            .lookup(Blockchain::Ethereum, "R", &TimeWindow::unbounded(), None)
            .await
            .unwrap();
        assert_eq!(eth.len(), 1);
        assert_eq!(eth[0].blockchain, Blockchain::Ethereum);
    }

    #[tokio::test]
    async fn contract_metadata_round_trips() {
        let store = store().await;
        let mut rec = eth_record("0xe1", "0xaa", "0xcc", 0.0);
        rec.contract = Some(ContractCall {
            contract_address: "0xcc".into(),
            method: Some("transfer(address,uint256)".into()),
            input_data: "0xa9059cbb".into(),
        });
        let touched = store.upsert(std::slice::from_ref(&rec), 1).await.unwrap();
        assert_eq!(touched[0].contract, rec.contract);
        assert_eq!(touched[0].block_number, rec.block_number);
        assert_eq!(touched[0].timestamp, rec.timestamp);
    }

    #[tokio::test]
    async fn migrate_adds_depth_column_to_legacy_table() {
        let options = SqliteConnectOptions::from_str("sqlite::memory:").unwrap();
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .unwrap();
        sqlx::query(
            "CREATE TABLE transactions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                blockchain TEXT NOT NULL,
                txid TEXT NOT NULL,
                from_address TEXT NOT NULL,
                to_address TEXT NOT NULL,
                value REAL NOT NULL,
                timestamp INTEGER NOT NULL,
                block_number INTEGER
            )",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO transactions (blockchain, txid, from_address, to_address, value, timestamp)
             VALUES ('bitcoin', 't0', 'R', 'A', 1.5, 1704067200)",
        )
        .execute(&pool)
        .await
        .unwrap();

        let store = SqliteStore::from_pool(pool).await.expect("migrate legacy table");

        let hits = store
            .lookup(Blockchain::Bitcoin, "R", &TimeWindow::unbounded(), Some(3))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1, "legacy rows have NULL depth and stay fresh");
        assert_eq!(hits[0].fetch_depth, None);

        let touched = store.upsert(&[hits[0].clone()], 1).await.unwrap();
        assert_eq!(touched.len(), 1);
        assert_eq!(touched[0].fetch_depth, Some(1));
        assert_eq!(store.count().await.unwrap(), 1);
    }
}
