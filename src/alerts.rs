//! Edge-triggered alerting over the reading stream.
//!
//! The engine owns an explicit [`AlertState`] and compares every cycle with
//! the previous one. Each alert fires once when its condition is entered and
//! is re-armed only after the condition clears. Notifications for one cycle
//! are produced in a fixed order: connectivity, AQI, temperature, humidity.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{aqi, Reading};

/// Temperature (°C) above which the high-temperature alert fires.
pub const TEMPERATURE_LIMIT_C: f64 = 35.0;

/// Relative humidity (%) above which the high-humidity alert fires.
pub const HUMIDITY_LIMIT_PCT: f64 = 80.0;

// ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Reconnected,
    Disconnected,
    HighAqi,
    HighTemperature,
    HighHumidity,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Reconnected => "reconnected",
            NotificationKind::Disconnected => "disconnected",
            NotificationKind::HighAqi => "high_aqi",
            NotificationKind::HighTemperature => "high_temperature",
            NotificationKind::HighHumidity => "high_humidity",
        }
    }
}

/// User-facing event handed to the view layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    // ---
    pub id: Uuid,
    pub kind: NotificationKind,
    pub severity: Severity,
    pub message: String,
    /// Metric that triggered the alert, if any.
    pub value: Option<f64>,
    pub raised_at: DateTime<Utc>,
}

impl Notification {
    fn new(kind: NotificationKind, severity: Severity, message: String, value: Option<f64>) -> Self {
        // ---
        Self {
            id: Uuid::new_v4(),
            kind,
            severity,
            message,
            value,
            raised_at: Utc::now(),
        }
    }
}

/// Connectivity as observed on the previous cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    Connected,
    Unavailable,
}

/// One delivery from the feed, as seen by the engine.
#[derive(Debug, Clone, Copy)]
pub enum Cycle<'a> {
    Reading(&'a Reading),
    Disconnected,
}

/// Memory carried between cycles.
#[derive(Debug, Clone)]
pub struct AlertState {
    // ---
    /// Last reading seen with live data. Survives disconnects.
    pub last_reading: Option<Reading>,
    pub connectivity: Connectivity,
    /// True until the first cycle of any kind has been observed.
    pub loading: bool,
}

impl Default for AlertState {
    fn default() -> Self {
        Self {
            last_reading: None,
            connectivity: Connectivity::Connected,
            loading: true,
        }
    }
}

#[derive(Debug, Default)]
pub struct AlertEngine {
    state: AlertState,
}

impl AlertEngine {
    // ---
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &AlertState {
        &self.state
    }

    /// Evaluate one cycle and advance the state.
    pub fn observe(&mut self, cycle: Cycle<'_>) -> Vec<Notification> {
        // ---
        let mut out = Vec::new();

        match cycle {
            Cycle::Disconnected => {
                if !self.state.loading && self.state.connectivity != Connectivity::Unavailable {
                    out.push(Notification::new(
                        NotificationKind::Disconnected,
                        Severity::Error,
                        "Sensor disconnected".to_string(),
                        None,
                    ));
                }
                self.state.connectivity = Connectivity::Unavailable;
            }
            Cycle::Reading(current) => {
                if self.state.connectivity == Connectivity::Unavailable {
                    out.push(Notification::new(
                        NotificationKind::Reconnected,
                        Severity::Info,
                        "Sensor reconnected".to_string(),
                        None,
                    ));
                    self.state.connectivity = Connectivity::Connected;
                }

                let previous = self.state.last_reading.as_ref();
                out.extend(
                    [
                        high_aqi(previous, current),
                        high_temperature(previous, current),
                        high_humidity(previous, current),
                    ]
                    .into_iter()
                    .flatten(),
                );

                self.state.last_reading = Some(current.clone());
            }
        }

        self.state.loading = false;
        out
    }

    /// A transport failure ends the loading phase without raising an alert.
    pub fn observe_feed_failure(&mut self) {
        self.state.loading = false;
    }
}

// ---

fn high_aqi(previous: Option<&Reading>, current: &Reading) -> Option<Notification> {
    // ---
    let was_poor = previous.is_some_and(|p| aqi::is_poor(p.aqi));
    if !aqi::is_poor(current.aqi) || was_poor {
        return None;
    }
    Some(Notification::new(
        NotificationKind::HighAqi,
        Severity::Warning,
        format!("High AQI detected: {}", current.aqi),
        Some(f64::from(current.aqi)),
    ))
}

fn high_temperature(previous: Option<&Reading>, current: &Reading) -> Option<Notification> {
    // ---
    let value = crossed_above(
        previous.and_then(|p| p.temperature),
        current.temperature,
        TEMPERATURE_LIMIT_C,
    )?;
    Some(Notification::new(
        NotificationKind::HighTemperature,
        Severity::Warning,
        format!("High temperature: {value}°C"),
        Some(value),
    ))
}

fn high_humidity(previous: Option<&Reading>, current: &Reading) -> Option<Notification> {
    // ---
    let value = crossed_above(
        previous.and_then(|p| p.humidity),
        current.humidity,
        HUMIDITY_LIMIT_PCT,
    )?;
    Some(Notification::new(
        NotificationKind::HighHumidity,
        Severity::Warning,
        format!("High humidity: {value}%"),
        Some(value),
    ))
}

/// Returns the current value when it is above `limit` and the previous one
/// was not (an unknown previous value counts as below).
fn crossed_above(previous: Option<f64>, current: Option<f64>, limit: f64) -> Option<f64> {
    // ---
    let current = current.filter(|v| *v > limit)?;
    match previous {
        Some(p) if p > limit => None,
        _ => Some(current),
    }
}
