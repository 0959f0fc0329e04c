//! Window — a labeled evaluation slice of price history.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::price::PriceSeries;

/// A contiguous slice of history plus its look-back prefix.
///
/// The first `prefix_len` rows only provide observation context; trading
/// starts on row `prefix_len`. `start`/`end` are the timestamps of the first
/// and last tradable rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Window {
    pub label: String,
    pub data: PriceSeries,
    pub prefix_len: usize,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Window {
    /// Rows that are traded in this window (everything after the prefix).
    pub fn tradable(&self) -> PriceSeries {
        self.data.slice(self.prefix_len..self.data.len())
    }

    pub fn tradable_len(&self) -> usize {
        self.data.len().saturating_sub(self.prefix_len)
    }

    /// Same window with a new label.
    pub fn relabel(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}
