//! Configuration loader for the `codemetal-airwatch` service.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). By consolidating configuration logic here, we
//! avoid scattering `env::var` calls throughout the codebase.
//!
use std::env;

use anyhow::{anyhow, bail, Result};

use crate::history::MAX_CAPACITY;

/// Parse an optional numeric environment variable with a default value.
macro_rules! parse_env {
    ($var_name:expr, $ty:ty, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.trim().parse::<$ty>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse a required string environment variable.
macro_rules! require_env {
    ($var_name:expr) => {
        env::var($var_name)
            .map_err(|_| anyhow!("{} must be set in .env or environment", $var_name))?
    };
}

/// First epoch-ms value treated as a real device timestamp (2025-01-01 local
/// deployment cutover). Anything older is replaced with the current time.
pub const DEFAULT_EPOCH_FLOOR_MS: i64 = 1_735_693_200_000;

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the application.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// Realtime database base URL.
    pub firebase_url: String,

    /// Sensor key under `/airQuality`.
    pub sensor_id: String,

    /// Timestamps below this (epoch ms) are replaced with "now".
    pub epoch_floor_ms: i64,

    /// Number of readings kept for charting and export.
    pub history_capacity: usize,

    /// Buffered notifications per subscriber before lagging ones are skipped.
    pub notification_buffer: usize,

    /// Delay before the feed re-opens a dropped stream.
    pub feed_reconnect_delay_ms: u64,

    /// HTTP listen port.
    pub port: u16,
}

/// Load configuration from environment variables with defaults.
///
/// Required:
/// - `FIREBASE_DATABASE_URL` – realtime database base URL
///
/// Optional:
/// - `SENSOR_ID` – sensor key (default: `ESP32_01`)
/// - `EPOCH_FLOOR_MS` – timestamp cutover (default: 1735693200000)
/// - `HISTORY_CAPACITY` – rolling window size (default: 20)
/// - `NOTIFICATION_BUFFER` – notification channel size (default: 64)
/// - `FEED_RECONNECT_DELAY_MS` – stream re-open delay (default: 2000)
/// - `PORT` – HTTP port (default: 8080)
///
/// Returns an error if any required variable is missing or invalid.
pub fn load_from_env() -> Result<Config> {
    // ---
    let firebase_url = require_env!("FIREBASE_DATABASE_URL");
    let sensor_id = env::var("SENSOR_ID").unwrap_or_else(|_| "ESP32_01".to_string());
    let epoch_floor_ms = parse_env!("EPOCH_FLOOR_MS", i64, DEFAULT_EPOCH_FLOOR_MS);
    let history_capacity = parse_env!("HISTORY_CAPACITY", usize, 20);
    let notification_buffer = parse_env!("NOTIFICATION_BUFFER", usize, 64);
    let feed_reconnect_delay_ms = parse_env!("FEED_RECONNECT_DELAY_MS", u64, 2000);
    let port = parse_env!("PORT", u16, 8080);

    let cfg = Config {
        firebase_url: firebase_url.trim_end_matches('/').to_string(),
        sensor_id,
        epoch_floor_ms,
        history_capacity,
        notification_buffer,
        feed_reconnect_delay_ms,
        port,
    };
    cfg.validate()?;
    Ok(cfg)
}

impl Config {
    // ---
    /// Realtime database path watched for this sensor.
    pub fn sensor_path(&self) -> String {
        format!("/airQuality/{}", self.sensor_id)
    }

    fn validate(&self) -> Result<()> {
        // ---
        if self.sensor_id.is_empty() || self.sensor_id.contains('/') {
            bail!("Invalid SENSOR_ID: {:?}", self.sensor_id);
        }
        if self.history_capacity == 0 || self.history_capacity > MAX_CAPACITY {
            bail!(
                "HISTORY_CAPACITY must be between 1 and {}, got {}",
                MAX_CAPACITY,
                self.history_capacity
            );
        }
        if self.notification_buffer == 0 {
            bail!("NOTIFICATION_BUFFER must be at least 1");
        }
        Ok(())
    }

    /// Log the loaded configuration for debugging purposes.
    ///
    /// Query strings are stripped from the database URL since they may carry
    /// credentials.
    pub fn log_config(&self) {
        // ---
        let masked_url = match self.firebase_url.split_once('?') {
            Some((base, _)) => format!("{base}?****"),
            None => self.firebase_url.clone(),
        };

        tracing::info!("Configuration loaded:");
        tracing::info!("  FIREBASE_DATABASE_URL   : {}", masked_url);
        tracing::info!("  SENSOR_ID               : {}", self.sensor_id);
        tracing::info!("  EPOCH_FLOOR_MS          : {}", self.epoch_floor_ms);
        tracing::info!("  HISTORY_CAPACITY        : {}", self.history_capacity);
        tracing::info!("  NOTIFICATION_BUFFER     : {}", self.notification_buffer);
        tracing::info!("  FEED_RECONNECT_DELAY_MS : {}", self.feed_reconnect_delay_ms);
        tracing::info!("  PORT                    : {}", self.port);
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            firebase_url: String::new(),
            sensor_id: "ESP32_01".to_string(),
            epoch_floor_ms: DEFAULT_EPOCH_FLOOR_MS,
            history_capacity: 20,
            notification_buffer: 64,
            feed_reconnect_delay_ms: 2000,
            port: 8080,
        }
    }
}
