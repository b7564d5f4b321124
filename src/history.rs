//! Rolling history of readings for charting and export.

use std::collections::VecDeque;

use crate::{ExportError, Reading};

/// Default window size.
pub const DEFAULT_CAPACITY: usize = 20;

/// Largest window accepted from configuration.
pub const MAX_CAPACITY: usize = 10_000;

/// File name offered for CSV downloads.
pub const EXPORT_FILE_NAME: &str = "air-quality-data.csv";

// ---

/// Fixed-capacity, insertion-ordered window. The oldest entries are evicted
/// first once the window is full. Duplicate timestamps are kept as-is.
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    // ---
    entries: VecDeque<Reading>,
    capacity: usize,
}

impl HistoryBuffer {
    // ---
    /// Capacity is clamped to `1..=MAX_CAPACITY`. Storage grows on demand.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, MAX_CAPACITY);
        Self {
            entries: VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY)),
            capacity,
        }
    }

    pub fn append(&mut self, reading: Reading) {
        // ---
        self.entries.push_back(reading);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    /// Copy of the window, oldest first.
    pub fn snapshot(&self) -> Vec<Reading> {
        self.entries.iter().cloned().collect()
    }

    pub fn latest(&self) -> Option<&Reading> {
        self.entries.back()
    }

    /// The two newest readings as `(previous, latest)`.
    pub fn last_pair(&self) -> Option<(&Reading, &Reading)> {
        // ---
        let len = self.entries.len();
        if len < 2 {
            return None;
        }
        Some((&self.entries[len - 2], &self.entries[len - 1]))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Serialize readings as CSV, one row per reading, with a header row named
/// after the [`Reading`] fields. Absent values are empty cells.
pub fn to_csv(readings: &[Reading]) -> Result<String, ExportError> {
    // ---
    if readings.is_empty() {
        return Err(ExportError::Empty);
    }

    let mut wtr = csv::Writer::from_writer(Vec::new());
    for reading in readings {
        wtr.serialize(reading)?;
    }
    let bytes = wtr.into_inner().map_err(|e| csv::Error::from(e.into_error()))?;

    Ok(String::from_utf8(bytes)?)
}
