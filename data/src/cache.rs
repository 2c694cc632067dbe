//! [`CandleCache`] (§4.2 implementation note): a keyed candle store so an
//! instance rehydration does not re-fetch the same history from the
//! exchange schema.
//!
//! This crate sits beside `keel-execution` rather than depending on it (see
//! the crate map), so [`CandleRecord`] is a flat duplicate of
//! `keel_execution::candle::Candle` rather than a re-export.

use crate::error::PersistError;
use crate::store::PersistenceStore;
use chrono::{DateTime, Utc};
use keel_markets::{ExchangeName, Interval, Symbol};
use serde::{Deserialize, Serialize};

/// Namespace every [`CandleCache`] writes its entries under.
const NAMESPACE: &str = "candles";

/// Flat duplicate of `keel_execution::candle::Candle`'s shape.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CandleRecord {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub close_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// `{exchange, symbol, interval, bucket_start}` — `bucket_start` is the
/// candle's own close time truncated to its interval, which doubles as a
/// stable dedup key across overlapping fetch windows.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CandleKey {
    pub exchange: ExchangeName,
    pub symbol: Symbol,
    pub interval: Interval,
    pub bucket_start: DateTime<Utc>,
}

impl CandleKey {
    fn to_storage_key(&self) -> String {
        format!(
            "{}__{}__{}__{}",
            self.exchange,
            self.symbol,
            self.interval,
            self.bucket_start.timestamp()
        )
    }
}

/// Caches [`CandleRecord`]s over any [`PersistenceStore`], most naturally a
/// [`crate::store::FileSystemStore`].
#[derive(Debug, Clone)]
pub struct CandleCache<S> {
    store: S,
}

impl<S: PersistenceStore> CandleCache<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn init(&self) -> Result<(), PersistError> {
        self.store
            .wait_for_init(NAMESPACE, &|blob| serde_json::from_slice::<CandleRecord>(blob).is_ok())
            .await
    }

    pub async fn get(&self, key: &CandleKey) -> Result<Option<CandleRecord>, PersistError> {
        let Some(blob) = self.store.read(NAMESPACE, &key.to_storage_key()).await? else {
            return Ok(None);
        };
        match serde_json::from_slice(&blob) {
            Ok(record) => Ok(Some(record)),
            Err(_) => Ok(None),
        }
    }

    pub async fn put(&self, key: &CandleKey, record: CandleRecord) -> Result<(), PersistError> {
        let blob = serde_json::to_vec(&record).expect("CandleRecord is always serializable");
        self.store.write(NAMESPACE, &key.to_storage_key(), &blob).await
    }
}
