//! Data models for the air-quality pipeline and the snapshot normalizer.
//!
//! A [`RawSnapshot`] is whatever the feed currently holds at the sensor path,
//! untrusted and possibly partial. [`normalize`] repairs it into a canonical
//! [`Reading`] or reports [`FeedError::Disconnected`] when there is nothing
//! to read.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::aqi;
use crate::FeedError;

// ---

/// Raw sensor values as pushed by the device. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSnapshot {
    // ---
    pub timestamp: Option<f64>,
    pub mq135: Option<f64>,
    pub mq2: Option<f64>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
}

/// Canonical reading, immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    // ---
    /// Epoch milliseconds.
    pub timestamp: i64,
    #[serde(rename = "mq135")]
    pub gas_primary: f64,
    #[serde(rename = "mq2")]
    pub gas_secondary: f64,
    /// `None` means unknown, which is not the same as 0.
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub aqi: u16,
}

impl RawSnapshot {
    // ---
    /// Extract a snapshot from the feed value at the sensor path.
    ///
    /// Returns `None` for `null`, non-object values and empty objects. Fields
    /// that are missing or not numeric come back as `None`; numeric strings
    /// are accepted since some firmware serializes floats that way.
    pub fn from_value(value: &Value) -> Option<RawSnapshot> {
        // ---
        let map = value.as_object().filter(|m| !m.is_empty())?;

        Some(RawSnapshot {
            timestamp: number_field(map, "timestamp"),
            mq135: number_field(map, "mq135"),
            mq2: number_field(map, "mq2"),
            temperature: number_field(map, "temperature"),
            humidity: number_field(map, "humidity"),
        })
    }
}

fn number_field(map: &Map<String, Value>, key: &str) -> Option<f64> {
    // ---
    let value = match map.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    value.filter(|v| v.is_finite())
}

impl Reading {
    /// Timestamp as a UTC date-time.
    pub fn recorded_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp)
    }
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Turn a raw snapshot into a [`Reading`].
///
/// `now` is only called when the timestamp has to be repaired, i.e. it is
/// missing, not a representable date, or older than `epoch_floor_ms`.
pub fn normalize(
    raw: Option<RawSnapshot>,
    epoch_floor_ms: i64,
    now: impl FnOnce() -> i64,
) -> Result<Reading, FeedError> {
    // ---
    let raw = raw.ok_or(FeedError::Disconnected)?;

    let timestamp = raw
        .timestamp
        .and_then(representable_millis)
        .filter(|t| *t >= epoch_floor_ms)
        .unwrap_or_else(now);

    let gas_primary = non_negative(raw.mq135);
    let gas_secondary = non_negative(raw.mq2);

    Ok(Reading {
        timestamp,
        gas_primary,
        gas_secondary,
        temperature: raw.temperature,
        humidity: raw.humidity,
        aqi: aqi::compute(gas_primary, gas_secondary),
    })
}

/// Epoch milliseconds that fit in `i64` and map to a calendar date.
fn representable_millis(raw: f64) -> Option<i64> {
    // ---
    if !raw.is_finite() || raw.abs() >= i64::MAX as f64 {
        return None;
    }
    let millis = raw as i64;
    DateTime::from_timestamp_millis(millis).map(|_| millis)
}

fn non_negative(value: Option<f64>) -> f64 {
    value.filter(|v| *v > 0.0).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use serde_json::json;

    const FLOOR: i64 = 1_735_693_200_000;
    const NOW: i64 = 1_760_000_000_000;

    fn create_test_raw(mq135: Option<f64>, mq2: Option<f64>, timestamp: Option<f64>) -> RawSnapshot {
        // ---
        RawSnapshot {
            timestamp,
            mq135,
            mq2,
            temperature: Some(24.5),
            humidity: Some(55.0),
        }
    }

    #[test]
    fn test_missing_snapshot_is_disconnected() {
        // ---
        let err = normalize(None, FLOOR, || NOW).unwrap_err();
        assert_eq!(err, FeedError::Disconnected);
    }

    #[test]
    fn test_null_and_empty_values_have_no_snapshot() {
        // ---
        assert_eq!(RawSnapshot::from_value(&Value::Null), None);
        assert_eq!(RawSnapshot::from_value(&json!({})), None);
        assert_eq!(RawSnapshot::from_value(&json!(42)), None);
    }

    #[test]
    fn test_stale_timestamp_and_null_gas_are_repaired() {
        // ---
        let raw = RawSnapshot::from_value(&json!({"mq135": null, "mq2": 500, "timestamp": 1000}));
        let reading = normalize(raw, FLOOR, || NOW).unwrap();

        assert_eq!(reading.gas_primary, 0.0);
        assert_eq!(reading.gas_secondary, 500.0);
        assert_eq!(reading.timestamp, NOW);
        assert_eq!(reading.aqi, 25);
    }

    #[test]
    fn test_valid_timestamp_is_kept_without_reading_clock() {
        // ---
        let ts = (FLOOR + 60_000) as f64;
        let raw = create_test_raw(Some(1200.0), Some(100.0), Some(ts));
        let reading = normalize(Some(raw), FLOOR, || panic!("clock should not be read")).unwrap();

        assert_eq!(reading.timestamp, FLOOR + 60_000);
        assert_eq!(reading.aqi, 120);
    }

    #[test]
    fn test_out_of_range_timestamp_uses_now() {
        // ---
        for ts in [1e300, 9.0e18, 8.7e15] {
            let raw = create_test_raw(Some(100.0), None, Some(ts));
            let reading = normalize(Some(raw), FLOOR, || NOW).unwrap();

            assert_eq!(reading.timestamp, NOW, "timestamp {ts}");
            assert!(reading.recorded_at().is_some());
        }
    }

    #[test]
    fn test_missing_timestamp_uses_now() {
        // ---
        let raw = create_test_raw(Some(10.0), None, None);
        let reading = normalize(Some(raw), FLOOR, || NOW).unwrap();
        assert_eq!(reading.timestamp, NOW);
        assert_eq!(reading.gas_secondary, 0.0);
    }

    #[test]
    fn test_absent_climate_values_stay_absent() {
        // ---
        let raw = RawSnapshot::from_value(&json!({"mq135": 300, "temperature": null}));
        let reading = normalize(raw, FLOOR, || NOW).unwrap();

        assert_eq!(reading.temperature, None);
        assert_eq!(reading.humidity, None);

        let raw = RawSnapshot::from_value(&json!({"temperature": 0, "humidity": 0}));
        let reading = normalize(raw, FLOOR, || NOW).unwrap();

        assert_eq!(reading.temperature, Some(0.0));
        assert_eq!(reading.humidity, Some(0.0));
    }

    #[test]
    fn test_malformed_fields_are_defaulted() {
        // ---
        let raw = RawSnapshot::from_value(&json!({
            "mq135": "850.5",
            "mq2": "n/a",
            "temperature": [1, 2],
            "humidity": -3
        }))
        .unwrap();

        assert_eq!(raw.mq135, Some(850.5));
        assert_eq!(raw.mq2, None);
        assert_eq!(raw.temperature, None);

        let reading = normalize(Some(raw), FLOOR, || NOW).unwrap();
        assert_eq!(reading.gas_primary, 850.5);
        assert_eq!(reading.gas_secondary, 0.0);
        assert_eq!(reading.humidity, Some(-3.0));
    }

    #[test]
    fn test_negative_gas_is_clamped() {
        // ---
        let raw = create_test_raw(Some(-40.0), Some(-1.0), None);
        let reading = normalize(Some(raw), FLOOR, || NOW).unwrap();
        assert_eq!(reading.gas_primary, 0.0);
        assert_eq!(reading.gas_secondary, 0.0);
        assert_eq!(reading.aqi, 0);
    }

    #[test]
    fn test_serializes_with_sensor_field_names() {
        // ---
        let raw = create_test_raw(Some(1200.0), Some(100.0), None);
        let reading = normalize(Some(raw), FLOOR, || NOW).unwrap();
        let value = serde_json::to_value(&reading).unwrap();

        assert_eq!(value["mq135"], json!(1200.0));
        assert_eq!(value["mq2"], json!(100.0));
        assert_eq!(value["aqi"], json!(120));
        assert_eq!(reading.recorded_at().unwrap().timestamp_millis(), NOW);
    }
}
