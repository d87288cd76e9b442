use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::db::{models::SensorReading, StoreError};

/// Upper bound applied to any caller-supplied page size.
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Optional narrowing of `SensorRecorder::list`. The default filter matches
/// every stored reading.
#[derive(Debug, Clone, Default)]
pub struct ReadingFilter {
    /// Inclusive lower bound on `recorded_at`.
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `recorded_at`.
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl ReadingFilter {
    fn sql_limit(&self) -> Option<i64> {
        self.limit.map(|l| i64::from(l.min(MAX_PAGE_SIZE)))
    }

    fn sql_offset(&self) -> i64 {
        self.offset.map(i64::from).unwrap_or(0)
    }
}

/// Appends sensor readings and lists them back.
#[derive(Debug, Clone)]
pub struct SensorRecorder {
    pool: PgPool,
}

impl SensorRecorder {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Stores a new reading stamped with a fresh id and the current server
    /// time. Never retried: a retry after an ambiguous failure could store
    /// the reading twice.
    pub async fn record(&self, temperature: f64, humidity: f64) -> Result<SensorReading, StoreError> {
        let reading = sqlx::query_as::<_, SensorReading>(
            r#"
            INSERT INTO sensor_readings (id, temperature, humidity, recorded_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, temperature, humidity, recorded_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(temperature)
        .bind(humidity)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        info!(id = %reading.id, temperature, humidity, "Sensor reading saved");
        Ok(reading)
    }

    /// Returns readings ordered by `recorded_at`, oldest first.
    ///
    /// Without a `limit` the whole table is returned.
    pub async fn list(&self, filter: &ReadingFilter) -> Result<Vec<SensorReading>, StoreError> {
        let rows = sqlx::query_as::<_, SensorReading>(
            r#"
            SELECT id, temperature, humidity, recorded_at
            FROM sensor_readings
            WHERE ($1::timestamptz IS NULL OR recorded_at >= $1)
              AND ($2::timestamptz IS NULL OR recorded_at <= $2)
            ORDER BY recorded_at ASC, id ASC
            LIMIT $3
            OFFSET $4
            "#,
        )
        .bind(filter.from)
        .bind(filter.to)
        .bind(filter.sql_limit())
        .bind(filter.sql_offset())
        .fetch_all(&self.pool)
        .await?;

        debug!(count = rows.len(), ?filter, "Listed sensor readings");
        Ok(rows)
    }
}
