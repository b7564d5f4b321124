//! AQI estimation from the two gas channels.
//!
//! Each channel is scaled linearly onto 0..=500 and the worst sub-index is
//! reported, following the usual multi-pollutant convention. The same
//! [`classify`] function feeds both the badge level and the high-AQI alert
//! so the two can never disagree.

use serde::Serialize;

/// Upper bound of the index.
pub const AQI_MAX: u16 = 500;

/// Readings above this are "Poor" and trigger the high-AQI alert.
pub const POOR_THRESHOLD: u16 = 100;

const GOOD_MAX: u16 = 50;

// Raw units per 100 index points.
const PRIMARY_DIVISOR: f64 = 1000.0;
const SECONDARY_DIVISOR: f64 = 2000.0;

// ---

/// Badge classification of an AQI value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AqiLevel {
    Good,
    Moderate,
    Poor,
}

impl AqiLevel {
    pub fn label(&self) -> &'static str {
        match self {
            AqiLevel::Good => "Good",
            AqiLevel::Moderate => "Moderate",
            AqiLevel::Poor => "Poor",
        }
    }
}

/// Compute the composite index for a primary (MQ-135) and secondary (MQ-2)
/// gas reading. Total: negative and NaN inputs count as 0.
pub fn compute(gas_primary: f64, gas_secondary: f64) -> u16 {
    // ---
    let primary = sub_index(gas_primary, PRIMARY_DIVISOR);
    let secondary = sub_index(gas_secondary, SECONDARY_DIVISOR);

    primary.max(secondary).round() as u16
}

fn sub_index(raw: f64, divisor: f64) -> f64 {
    // ---
    if raw.is_nan() || raw <= 0.0 {
        return 0.0;
    }
    (raw / divisor * 100.0).min(f64::from(AQI_MAX))
}

pub fn classify(aqi: u16) -> AqiLevel {
    // ---
    if aqi <= GOOD_MAX {
        AqiLevel::Good
    } else if aqi <= POOR_THRESHOLD {
        AqiLevel::Moderate
    } else {
        AqiLevel::Poor
    }
}

/// Whether `aqi` sits above the alerting threshold.
pub fn is_poor(aqi: u16) -> bool {
    classify(aqi) == AqiLevel::Poor
}
