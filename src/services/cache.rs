//! Read-through cache tier
//!
//! Entries are keyed by (symbol, period, provider id, date range) so cached
//! data is only ever served for a provider that is still in the current
//! priority candidate set. Payloads are stored standardized: a hit is
//! trusted as validated at write time and skips the completeness check.
//!
//! Rows written before provider tagging existed carry an empty provider id;
//! they are probed last as a legacy fallback.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{DataError, Result};
use crate::models::{BarSeries, DateRange, Period, StandardBar};

/// Provider id recorded on rows written before provider tagging existed
pub const LEGACY_PROVIDER_ID: &str = "";

/// One cached standardized dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub symbol: String,
    pub period: Period,
    /// Empty string for legacy untagged rows
    pub provider_id: String,
    pub range: DateRange,
    pub payload: BarSeries,
    pub stored_at: DateTime<Utc>,
}

/// Persistence behind the cache tier
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(
        &self,
        symbol: &str,
        period: Period,
        provider_id: &str,
        range: DateRange,
    ) -> Result<Option<CacheEntry>>;

    /// Upsert under the entry's compound key
    async fn put(&self, entry: &CacheEntry) -> Result<()>;
}

/// SQLite-backed cache store
#[derive(Debug)]
pub struct SqliteCacheStore {
    pool: SqlitePool,
}

impl SqliteCacheStore {
    /// Open (or create) a cache database file
    pub async fn new(database_path: &Path) -> Result<Self> {
        info!("Opening cache database at: {:?}", database_path);

        if let Some(parent) = database_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DataError::Cache(format!("cache dir: {}", e)))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(30));

        let pool = SqlitePool::connect_with(options).await?;
        let store = Self { pool };
        store.initialize_schema().await?;
        Ok(store)
    }

    /// Single-connection in-memory store (tests and ephemeral runs)
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| DataError::Cache(e.to_string()))?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.initialize_schema().await?;
        Ok(store)
    }

    async fn initialize_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cache_entries (
                symbol TEXT NOT NULL,
                period TEXT NOT NULL,
                provider_id TEXT NOT NULL DEFAULT '',
                range_start TEXT NOT NULL,
                range_end TEXT NOT NULL,
                payload TEXT NOT NULL,
                stored_at TEXT NOT NULL,
                PRIMARY KEY (symbol, period, provider_id, range_start, range_end)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Probe pattern: symbol + period + range, varying provider_id
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_cache_lookup \
             ON cache_entries(symbol, period, range_start, range_end)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl CacheStore for SqliteCacheStore {
    async fn get(
        &self,
        symbol: &str,
        period: Period,
        provider_id: &str,
        range: DateRange,
    ) -> Result<Option<CacheEntry>> {
        let row = sqlx::query(
            "SELECT payload, stored_at FROM cache_entries \
             WHERE symbol = ? AND period = ? AND provider_id = ? \
               AND range_start = ? AND range_end = ?",
        )
        .bind(symbol)
        .bind(period.as_str())
        .bind(provider_id)
        .bind(range.start.to_string())
        .bind(range.end.to_string())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let payload_json: String = row.get("payload");
        let stored_at_raw: String = row.get("stored_at");
        let payload: BarSeries = serde_json::from_str(&payload_json)?;
        let stored_at = DateTime::parse_from_rfc3339(&stored_at_raw)
            .map_err(|e| DataError::Cache(format!("bad stored_at: {}", e)))?
            .with_timezone(&Utc);

        Ok(Some(CacheEntry {
            symbol: symbol.to_string(),
            period,
            provider_id: provider_id.to_string(),
            range,
            payload,
            stored_at,
        }))
    }

    async fn put(&self, entry: &CacheEntry) -> Result<()> {
        let payload_json = serde_json::to_string(&entry.payload)?;

        sqlx::query(
            "INSERT INTO cache_entries \
             (symbol, period, provider_id, range_start, range_end, payload, stored_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(symbol, period, provider_id, range_start, range_end) \
             DO UPDATE SET payload = excluded.payload, stored_at = excluded.stored_at",
        )
        .bind(&entry.symbol)
        .bind(entry.period.as_str())
        .bind(&entry.provider_id)
        .bind(entry.range.start.to_string())
        .bind(entry.range.end.to_string())
        .bind(payload_json)
        .bind(entry.stored_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Read-through logic over a [`CacheStore`]
///
/// Probes provider ids in the caller-supplied priority order and returns
/// the first hit only; entries are never merged across providers. A final
/// probe under the legacy untagged id covers pre-tagging data.
pub struct CacheTier {
    store: Arc<dyn CacheStore>,
}

impl CacheTier {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// First hit across `provider_ids` (in order), then the legacy probe
    pub async fn get_first(
        &self,
        symbol: &str,
        period: Period,
        provider_ids: &[String],
        range: DateRange,
    ) -> Result<Option<CacheEntry>> {
        for provider_id in provider_ids {
            if let Some(entry) = self.store.get(symbol, period, provider_id, range).await? {
                debug!(symbol, provider = provider_id.as_str(), "Cache hit");
                return Ok(Some(entry));
            }
        }

        if let Some(entry) = self
            .store
            .get(symbol, period, LEGACY_PROVIDER_ID, range)
            .await?
        {
            debug!(symbol, "Legacy untagged cache hit");
            return Ok(Some(entry));
        }

        Ok(None)
    }

    /// Write-through after a validated live fetch
    pub async fn write_through(
        &self,
        symbol: &str,
        period: Period,
        provider_id: &str,
        range: DateRange,
        payload: &[StandardBar],
    ) -> Result<()> {
        let entry = CacheEntry {
            symbol: symbol.to_string(),
            period,
            provider_id: provider_id.to_string(),
            range,
            payload: payload.to_vec(),
            stored_at: Utc::now(),
        };
        self.store.put(&entry).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        )
    }

    fn bars(symbol: &str, close: f64) -> Vec<StandardBar> {
        vec![StandardBar::new(
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            symbol.to_string(),
            close,
            close,
            close,
            close,
            1000.0,
        )]
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let store = SqliteCacheStore::in_memory().await.unwrap();
        let tier = CacheTier::new(Arc::new(store));

        tier.write_through("600519", Period::Daily, "tushare", range(), &bars("600519", 1695.0))
            .await
            .unwrap();

        let hit = tier
            .get_first("600519", Period::Daily, &["tushare".to_string()], range())
            .await
            .unwrap()
            .expect("expected cache hit");
        assert_eq!(hit.provider_id, "tushare");
        assert_eq!(hit.payload.len(), 1);
        assert_eq!(hit.payload[0].close, 1695.0);
    }

    #[tokio::test]
    async fn test_probe_respects_priority_order() {
        let store = SqliteCacheStore::in_memory().await.unwrap();
        let tier = CacheTier::new(Arc::new(store));

        tier.write_through("600519", Period::Daily, "akshare", range(), &bars("600519", 1.0))
            .await
            .unwrap();
        tier.write_through("600519", Period::Daily, "tushare", range(), &bars("600519", 2.0))
            .await
            .unwrap();

        let order = vec!["tushare".to_string(), "akshare".to_string()];
        let hit = tier
            .get_first("600519", Period::Daily, &order, range())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.provider_id, "tushare");
        assert_eq!(hit.payload[0].close, 2.0);
    }

    #[tokio::test]
    async fn test_miss_for_providers_outside_candidate_set() {
        let store = SqliteCacheStore::in_memory().await.unwrap();
        let tier = CacheTier::new(Arc::new(store));

        tier.write_through("600519", Period::Daily, "baostock", range(), &bars("600519", 1.0))
            .await
            .unwrap();

        // baostock is cached but no longer a candidate, so no hit
        let hit = tier
            .get_first(
                "600519",
                Period::Daily,
                &["tushare".to_string(), "akshare".to_string()],
                range(),
            )
            .await
            .unwrap();
        assert!(hit.is_none());
    }

    #[tokio::test]
    async fn test_legacy_untagged_fallback() {
        let store = SqliteCacheStore::in_memory().await.unwrap();
        let tier = CacheTier::new(Arc::new(store));

        tier.write_through(
            "600519",
            Period::Daily,
            LEGACY_PROVIDER_ID,
            range(),
            &bars("600519", 3.0),
        )
        .await
        .unwrap();

        let hit = tier
            .get_first("600519", Period::Daily, &["tushare".to_string()], range())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.provider_id, LEGACY_PROVIDER_ID);
    }

    #[tokio::test]
    async fn test_upsert_replaces_payload() {
        let store = SqliteCacheStore::in_memory().await.unwrap();
        let tier = CacheTier::new(Arc::new(store));

        tier.write_through("600519", Period::Daily, "tushare", range(), &bars("600519", 1.0))
            .await
            .unwrap();
        tier.write_through("600519", Period::Daily, "tushare", range(), &bars("600519", 9.0))
            .await
            .unwrap();

        let hit = tier
            .get_first("600519", Period::Daily, &["tushare".to_string()], range())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.payload[0].close, 9.0);
    }

    #[tokio::test]
    async fn test_distinct_periods_do_not_collide() {
        let store = SqliteCacheStore::in_memory().await.unwrap();
        let tier = CacheTier::new(Arc::new(store));

        tier.write_through("600519", Period::Daily, "tushare", range(), &bars("600519", 1.0))
            .await
            .unwrap();

        let weekly = tier
            .get_first("600519", Period::Weekly, &["tushare".to_string()], range())
            .await
            .unwrap();
        assert!(weekly.is_none());
    }
}
