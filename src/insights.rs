//! Safety recommendations and short-term AQI trend for the dashboard.

use serde::Serialize;

use crate::alerts::TEMPERATURE_LIMIT_C;
use crate::aqi::{self, AqiLevel};
use crate::Reading;

// Splits the "Poor" band for advice only.
const SENSITIVE_MAX: u16 = 150;
const HUMID_PCT: f64 = 70.0;
const DRY_PCT: f64 = 30.0;

// ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Advisory {
    Success,
    Info,
    Warning,
    Danger,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recommendation {
    pub id: &'static str,
    pub advisory: Advisory,
    pub message: &'static str,
}

const fn rec(id: &'static str, advisory: Advisory, message: &'static str) -> Recommendation {
    Recommendation {
        id,
        advisory,
        message,
    }
}

/// Direction of the AQI between the two newest readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Stable,
}

pub fn trend(previous: &Reading, latest: &Reading) -> Trend {
    // ---
    match latest.aqi.cmp(&previous.aqi) {
        std::cmp::Ordering::Greater => Trend::Up,
        std::cmp::Ordering::Less => Trend::Down,
        std::cmp::Ordering::Equal => Trend::Stable,
    }
}

/// Advice for the current conditions, most important first. Always returns
/// at least one entry.
pub fn recommendations(
    aqi: Option<u16>,
    temperature: Option<f64>,
    humidity: Option<f64>,
) -> Vec<Recommendation> {
    // ---
    let mut recs = Vec::new();

    if let Some(aqi) = aqi {
        recs.push(match aqi::classify(aqi) {
            AqiLevel::Good => rec(
                "aqi-safe",
                Advisory::Success,
                "Air quality is excellent. Great time for outdoor activities!",
            ),
            AqiLevel::Moderate => rec(
                "aqi-moderate",
                Advisory::Warning,
                "Air quality is acceptable. Sensitive individuals should limit prolonged outdoor exertion.",
            ),
            AqiLevel::Poor if aqi <= SENSITIVE_MAX => rec(
                "aqi-unhealthy-sens",
                Advisory::Danger,
                "Unhealthy for sensitive groups. Wear a mask if you have respiratory issues.",
            ),
            AqiLevel::Poor => rec(
                "aqi-hazardous",
                Advisory::Critical,
                "Health Alert: Avoid outdoor activities. Keep windows closed and use an air purifier.",
            ),
        });
    }

    if temperature.is_some_and(|t| t > TEMPERATURE_LIMIT_C) {
        recs.push(rec(
            "temp-high",
            Advisory::Warning,
            "High temperature detected. Stay hydrated and avoid direct sunlight.",
        ));
    }

    match humidity {
        Some(h) if h > HUMID_PCT => recs.push(rec(
            "hum-high",
            Advisory::Info,
            "High humidity levels. Ensure good ventilation to prevent mold growth.",
        )),
        Some(h) if h < DRY_PCT => recs.push(rec(
            "hum-low",
            Advisory::Info,
            "Dry air detected. Consider using a humidifier for comfort.",
        )),
        _ => {}
    }

    if recs.is_empty() {
        recs.push(rec(
            "all-clear",
            Advisory::Success,
            "All environmental parameters are within optimal ranges.",
        ));
    }
    recs
}
