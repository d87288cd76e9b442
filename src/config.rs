use std::{
    num::{NonZeroU32, NonZeroU64},
    time::Duration,
};

use anyhow::{ensure, Context, Result};

/// Identifier of the device-status row when `DEVICE_STATUS_ID` is unset.
pub const DEFAULT_DEVICE_STATUS_ID: &str = "6557b0290fdad606e4a12adb";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    /// Key of the single device-status record this deployment tracks.
    pub device_status_id: String,
    pub db_max_connections: u32,
    pub db_acquire_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. Empty values count as
    /// missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let device_status_id = env.optional("DEVICE_STATUS_ID", DEFAULT_DEVICE_STATUS_ID);
        ensure!(
            !device_status_id.trim().is_empty(),
            "DEVICE_STATUS_ID must not be blank"
        );

        Ok(Self {
            database_url: env.required("DATABASE_URL")?,
            server_host: env.optional("SERVER_HOST", "0.0.0.0"),
            server_port: env
                .required("SERVER_PORT")?
                .parse()
                .context("SERVER_PORT must be a valid port number")?,
            device_status_id: device_status_id.trim().to_owned(),
            db_max_connections: env
                .optional("DB_MAX_CONNECTIONS", "10")
                .parse::<NonZeroU32>()
                .context("DB_MAX_CONNECTIONS must be a positive integer")?
                .get(),
            db_acquire_timeout: Duration::from_secs(
                env.optional("DB_ACQUIRE_TIMEOUT_SECS", "5")
                    .parse::<NonZeroU64>()
                    .context("DB_ACQUIRE_TIMEOUT_SECS must be a positive integer")?
                    .get(),
            ),
        })
    }
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.is_empty())
    }

    fn required(&self, key: &str) -> Result<String> {
        self.get(key)
            .with_context(|| format!("missing required env var: {key}"))
    }

    fn optional(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_owned())
    }
}
