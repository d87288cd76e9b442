use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Row of `sensor_readings`. Append-only.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct SensorReading {
    pub id: Uuid,
    /// Degrees Celsius
    pub temperature: f64,
    /// Relative humidity percentage
    pub humidity: f64,
    pub recorded_at: DateTime<Utc>,
}

/// Row of `device_status`.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct DeviceStatus {
    pub id: String,
    pub is_on: bool,
    pub wifi_connected: bool,
    pub updated_at: DateTime<Utc>,
}
