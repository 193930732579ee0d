use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::{PgPool, postgres::PgPoolOptions, types::Json};

use crate::errors::StoreError;
use crate::models::{PlayerId, RunId, TelemetrySample};

/// Append-only persistence of telemetry samples, grouped by run.
///
/// Readers may run while a run is still being appended to; they see a
/// consistent prefix of each player's sequence.
#[async_trait]
pub trait SampleStore: Send + Sync {
    async fn append(&self, run_id: &RunId, sample: &TelemetrySample) -> Result<(), StoreError>;

    /// Samples for one player in ascending `elapsed_time` order.
    async fn query(
        &self,
        run_id: &RunId,
        player_id: PlayerId,
    ) -> Result<Vec<TelemetrySample>, StoreError>;

    async fn list_runs(&self) -> Result<BTreeSet<RunId>, StoreError>;

    /// The lexicographically greatest run id, which is also the most recent.
    async fn latest_run(&self) -> Result<Option<RunId>, StoreError> {
        Ok(self.list_runs().await?.into_iter().next_back())
    }
}

#[async_trait]
impl<S: SampleStore + ?Sized> SampleStore for Arc<S> {
    async fn append(&self, run_id: &RunId, sample: &TelemetrySample) -> Result<(), StoreError> {
        (**self).append(run_id, sample).await
    }

    async fn query(
        &self,
        run_id: &RunId,
        player_id: PlayerId,
    ) -> Result<Vec<TelemetrySample>, StoreError> {
        (**self).query(run_id, player_id).await
    }

    async fn list_runs(&self) -> Result<BTreeSet<RunId>, StoreError> {
        (**self).list_runs().await
    }

    async fn latest_run(&self) -> Result<Option<RunId>, StoreError> {
        (**self).latest_run().await
    }
}

/// Upper bound on a single store round trip.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    timeout: Duration,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    /// Connects and applies pending migrations. Every later query, including
    /// waiting for a pooled connection, is bounded by `timeout`.
    pub async fn connect(database_url: &str, timeout: Duration) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(timeout)
            .connect(database_url)
            .await?;
        let store = Self { pool, timeout };
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

async fn bounded<T>(
    limit: Duration,
    operation: impl Future<Output = Result<T, sqlx::Error>>,
) -> Result<T, StoreError> {
    tokio::time::timeout(limit, operation)
        .await
        .map_err(|_| StoreError::Timeout(limit))?
        .map_err(StoreError::from)
}

#[async_trait]
impl SampleStore for PgStore {
    async fn append(&self, run_id: &RunId, sample: &TelemetrySample) -> Result<(), StoreError> {
        let insert = sqlx::query(
            r#"
            INSERT INTO telemetry_samples (run_id, player_id, elapsed_time, recorded_at, payload)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(run_id.as_str())
        .bind(i16::from(sample.player_id))
        .bind(sample.elapsed_time as i32)
        .bind(sample.timestamp)
        .bind(Json(sample))
        .execute(&self.pool);

        bounded(self.timeout, insert).await?;
        Ok(())
    }

    async fn query(
        &self,
        run_id: &RunId,
        player_id: PlayerId,
    ) -> Result<Vec<TelemetrySample>, StoreError> {
        let select = sqlx::query_as::<_, (Json<TelemetrySample>,)>(
            r#"
            SELECT payload
            FROM telemetry_samples
            WHERE run_id = $1 AND player_id = $2
            ORDER BY elapsed_time ASC, id ASC
            "#,
        )
        .bind(run_id.as_str())
        .bind(i16::from(player_id))
        .fetch_all(&self.pool);

        let rows = bounded(self.timeout, select).await?;
        Ok(rows.into_iter().map(|(Json(sample),)| sample).collect())
    }

    async fn list_runs(&self) -> Result<BTreeSet<RunId>, StoreError> {
        let select = sqlx::query_as::<_, (String,)>(
            r#"
            SELECT DISTINCT run_id
            FROM telemetry_samples
            "#,
        )
        .fetch_all(&self.pool);

        let rows = bounded(self.timeout, select).await?;
        Ok(rows.into_iter().map(|(id,)| RunId::new(id)).collect())
    }

    async fn latest_run(&self) -> Result<Option<RunId>, StoreError> {
        let select = sqlx::query_as::<_, (String,)>(
            r#"
            SELECT run_id
            FROM telemetry_samples
            ORDER BY run_id COLLATE "C" DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool);

        let row = bounded(self.timeout, select).await?;
        Ok(row.map(|(id,)| RunId::new(id)))
    }
}
