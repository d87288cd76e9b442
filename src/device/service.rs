use std::sync::Arc;

use chrono::Utc;
use sqlx::PgPool;
use tracing::info;

use crate::db::{models::DeviceStatus, StoreError};

/// Reads and overwrites the status row of the one device this deployment
/// tracks.
///
/// The row key is fixed at construction time, so every `get`/`set` addresses
/// the same record. The row is created with defaults on first read.
#[derive(Debug, Clone)]
pub struct DeviceStatusStore {
    pool: PgPool,
    device_id: Arc<str>,
}

impl DeviceStatusStore {
    pub fn new(pool: PgPool, device_id: impl Into<Arc<str>>) -> Self {
        Self {
            pool,
            device_id: device_id.into(),
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Returns the stored status, creating `is_on = false`,
    /// `wifi_connected = false` on first access.
    pub async fn get(&self) -> Result<DeviceStatus, StoreError> {
        if let Some(status) = self.find().await? {
            return Ok(status);
        }

        let created = sqlx::query_as::<_, DeviceStatus>(
            r#"
            INSERT INTO device_status (id, is_on, wifi_connected, updated_at)
            VALUES ($1, false, false, $2)
            ON CONFLICT (id) DO NOTHING
            RETURNING id, is_on, wifi_connected, updated_at
            "#,
        )
        .bind(self.device_id())
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        match created {
            Some(status) => {
                info!(device_id = %self.device_id, "Created default device status");
                Ok(status)
            }
            // Another request created the row between our lookup and insert.
            None => self
                .find()
                .await?
                .ok_or(StoreError::Database(sqlx::Error::RowNotFound)),
        }
    }

    /// Replaces every mutable field of the status row, creating it if absent.
    /// This is a full overwrite: nothing from the previous row is kept.
    pub async fn set(&self, is_on: bool, wifi_connected: bool) -> Result<DeviceStatus, StoreError> {
        let status = sqlx::query_as::<_, DeviceStatus>(
            r#"
            INSERT INTO device_status (id, is_on, wifi_connected, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
                SET is_on          = EXCLUDED.is_on,
                    wifi_connected = EXCLUDED.wifi_connected,
                    updated_at     = EXCLUDED.updated_at
            RETURNING id, is_on, wifi_connected, updated_at
            "#,
        )
        .bind(self.device_id())
        .bind(is_on)
        .bind(wifi_connected)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        info!(
            device_id = %self.device_id,
            is_on,
            wifi_connected,
            "Device status saved"
        );
        Ok(status)
    }

    async fn find(&self) -> Result<Option<DeviceStatus>, StoreError> {
        let row = sqlx::query_as::<_, DeviceStatus>(
            r#"
            SELECT id, is_on, wifi_connected, updated_at
            FROM device_status
            WHERE id = $1
            "#,
        )
        .bind(self.device_id())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}
