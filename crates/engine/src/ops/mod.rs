use std::{future::Future, time::Duration};

use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use tokio::sync::RwLock;

use crate::{EngineError, ResultEngine, Transaction};

mod archive;
mod commit;
mod query;

/// Default bound for a single call to the durable store.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

/// The stock transaction repository.
///
/// Owns the in-memory snapshot every view is derived from, and the durable
/// store handle. Writes are applied to the snapshot first and then persisted;
/// a store failure is logged and handed back as a warning, never as an error,
/// so a branch device keeps working while offline. [`Ledger::refresh`]
/// resynchronizes the snapshot from the store.
#[derive(Debug)]
pub struct Ledger {
    database: DatabaseConnection,
    store_timeout: Duration,
    state: RwLock<LedgerState>,
}

#[derive(Debug, Default)]
struct LedgerState {
    /// Newest commits first.
    records: Vec<Transaction>,
    last_timestamp_ms: i64,
}

impl LedgerState {
    /// Next commit instant: wall clock, but strictly after the previous one.
    fn next_timestamp(&mut self, now: DateTime<Utc>) -> DateTime<Utc> {
        let ms = now
            .timestamp_millis()
            .max(self.last_timestamp_ms.saturating_add(1));
        self.last_timestamp_ms = ms;
        DateTime::from_timestamp_millis(ms).unwrap_or(now)
    }

    fn prepend(&mut self, mut batch: Vec<Transaction>) {
        batch.append(&mut self.records);
        self.records = batch;
    }

    fn replace(&mut self, records: Vec<Transaction>) {
        let newest = records
            .iter()
            .map(|tx| tx.timestamp.timestamp_millis())
            .max()
            .unwrap_or_default();
        self.last_timestamp_ms = self.last_timestamp_ms.max(newest);
        self.records = records;
    }
}

impl Ledger {
    /// Return a builder for `Ledger`. Help to build the struct.
    pub fn builder() -> LedgerBuilder {
        LedgerBuilder::default()
    }

    pub fn store_timeout(&self) -> Duration {
        self.store_timeout
    }

    /// Bound a store call; elapsed calls become [`EngineError::Persistence`].
    async fn with_store_timeout<T, F>(&self, op: &str, fut: F) -> ResultEngine<T>
    where
        F: Future<Output = ResultEngine<T>>,
    {
        match tokio::time::timeout(self.store_timeout, fut).await {
            Ok(result) => result.map_err(into_persistence),
            Err(_) => Err(EngineError::Persistence(format!(
                "{op} timed out after {}ms",
                self.store_timeout.as_millis()
            ))),
        }
    }
}

fn into_persistence(err: EngineError) -> EngineError {
    match err {
        EngineError::Database(db_err) => EngineError::Persistence(db_err.to_string()),
        other => other,
    }
}

/// The builder for `Ledger`
#[derive(Default)]
pub struct LedgerBuilder {
    database: DatabaseConnection,
    store_timeout: Option<Duration>,
}

impl LedgerBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> LedgerBuilder {
        self.database = db;
        self
    }

    /// Bound for every call to the durable store (default 5s).
    pub fn store_timeout(mut self, timeout: Duration) -> LedgerBuilder {
        self.store_timeout = Some(timeout);
        self
    }

    /// Construct `Ledger` and load the initial snapshot.
    ///
    /// An unreachable store is not fatal: the ledger starts empty and the
    /// caller can [`Ledger::refresh`] later.
    pub async fn build(self) -> ResultEngine<Ledger> {
        let ledger = Ledger {
            database: self.database,
            store_timeout: self.store_timeout.unwrap_or(DEFAULT_STORE_TIMEOUT),
            state: RwLock::new(LedgerState::default()),
        };
        if let Err(err) = ledger.refresh().await {
            tracing::warn!("ledger starts with an empty snapshot: {err}");
        }
        Ok(ledger)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn timestamps_are_strictly_increasing() {
        let mut state = LedgerState::default();
        let now = Utc.timestamp_millis_opt(1_000).unwrap();
        let a = state.next_timestamp(now);
        let b = state.next_timestamp(now);
        let c = state.next_timestamp(now - chrono::Duration::seconds(10));
        assert_eq!(a.timestamp_millis(), 1_000);
        assert_eq!(b.timestamp_millis(), 1_001);
        assert_eq!(c.timestamp_millis(), 1_002);
    }

    #[tokio::test]
    async fn builder_sets_store_timeout() {
        let ledger = Ledger::builder().build().await.unwrap();
        assert_eq!(ledger.store_timeout(), DEFAULT_STORE_TIMEOUT);

        let ledger = Ledger::builder()
            .store_timeout(Duration::from_millis(250))
            .build()
            .await
            .unwrap();
        assert_eq!(ledger.store_timeout(), Duration::from_millis(250));
    }
}
