//! Error taxonomy for the air-quality pipeline.
//!
//! Only the feed boundary can fail. The AQI estimator, the history buffer
//! and the alert engine are total and never return errors.

use thiserror::Error;

// ---

/// Conditions reported by (or derived from) the sensor feed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    // ---
    /// The sensor path holds no data. Expected for an idle sensor and
    /// recoverable as soon as the next snapshot carries a value.
    #[error("Sensor unavailable / No Data")]
    Disconnected,

    /// Transport-level failure. Not retried by the pipeline.
    #[error("Failed to connect to feed: {0}")]
    ConnectionFailed(String),
}

impl FeedError {
    /// `true` for the idle-sensor case, `false` for transport failures.
    pub fn is_disconnected(&self) -> bool {
        matches!(self, FeedError::Disconnected)
    }
}

/// Reasons the history could not be exported.
#[derive(Debug, Error)]
pub enum ExportError {
    // ---
    #[error("No history to export")]
    Empty,

    #[error("CSV encoding failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("CSV output is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}
