use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::models::{DeviceStatus, SensorReading};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

/// Request body for `POST /sensor-data`. Both fields are required; they are
/// optional here only so a missing field yields a readable 400.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SensorDataRequest {
    /// Degrees Celsius
    pub temperature: Option<f64>,
    /// Relative humidity percentage
    pub humidity: Option<f64>,
}

impl SensorDataRequest {
    /// Returns `(temperature, humidity)` or the message naming the first
    /// missing field.
    pub fn validate(&self) -> Result<(f64, f64), String> {
        let temperature = self.temperature.ok_or("temperature is required")?;
        let humidity = self.humidity.ok_or("humidity is required")?;
        Ok((temperature, humidity))
    }
}

/// Request body for `POST /device-status`. Omitted fields mean `false`.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct DeviceStatusRequest {
    #[serde(default)]
    pub is_on: bool,
    #[serde(default)]
    pub wifi_connected: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SensorReadingDto {
    pub id: Uuid,
    /// Degrees Celsius
    pub temperature: f64,
    /// Relative humidity percentage
    pub humidity: f64,
    /// Server time at which the reading was stored.
    pub updated_at: DateTime<Utc>,
}

impl From<SensorReading> for SensorReadingDto {
    fn from(r: SensorReading) -> Self {
        Self {
            id: r.id,
            temperature: r.temperature,
            humidity: r.humidity,
            updated_at: r.recorded_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeviceStatusDto {
    pub id: String,
    pub is_on: bool,
    pub wifi_connected: bool,
    pub updated_at: DateTime<Utc>,
}

impl From<DeviceStatus> for DeviceStatusDto {
    fn from(s: DeviceStatus) -> Self {
        Self {
            id: s.id,
            is_on: s.is_on,
            wifi_connected: s.wifi_connected,
            updated_at: s.updated_at,
        }
    }
}

/// Response for `POST /sensor-data`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SensorDataSaved {
    pub message: String,
    pub data: SensorReadingDto,
}

/// Response for `POST /device-status`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeviceStatusSaved {
    pub message: String,
    pub data: DeviceStatusDto,
}
