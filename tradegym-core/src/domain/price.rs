//! Price series — the time-indexed OHLC data an environment trades on.
//!
//! Stored column-wise so that observation windows and dataset slices are
//! plain sub-slices. Auxiliary feature columns (indicators, returns, time
//! encodings) ride along with the OHLC columns and must have identical length.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Range;

use crate::error::DomainError;

/// One OHLC row for the tradable instrument.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl PricePoint {
    /// Flat bar at a single price. Handy for fixtures.
    pub fn flat(timestamp: NaiveDateTime, price: f64) -> Self {
        Self {
            timestamp,
            open: price,
            high: price,
            low: price,
            close: price,
        }
    }
}

/// Immutable, columnar price history with optional feature columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    timestamps: Vec<NaiveDateTime>,
    open: Vec<f64>,
    high: Vec<f64>,
    low: Vec<f64>,
    close: Vec<f64>,
    features: BTreeMap<String, Vec<f64>>,
}

const OHLC: [&str; 4] = ["open", "high", "low", "close"];

impl PriceSeries {
    /// Build a series from OHLC rows. Rows must be non-empty and strictly
    /// increasing in time.
    pub fn from_points(points: &[PricePoint]) -> Result<Self, DomainError> {
        if points.is_empty() {
            return Err(DomainError::EmptySeries);
        }
        for (row, pair) in points.windows(2).enumerate() {
            if pair[1].timestamp <= pair[0].timestamp {
                return Err(DomainError::UnorderedTimestamps { row: row + 1 });
            }
        }
        Ok(Self {
            timestamps: points.iter().map(|p| p.timestamp).collect(),
            open: points.iter().map(|p| p.open).collect(),
            high: points.iter().map(|p| p.high).collect(),
            low: points.iter().map(|p| p.low).collect(),
            close: points.iter().map(|p| p.close).collect(),
            features: BTreeMap::new(),
        })
    }

    /// Build a close-only series (open = high = low = close).
    pub fn from_closes(
        timestamps: Vec<NaiveDateTime>,
        closes: Vec<f64>,
    ) -> Result<Self, DomainError> {
        if timestamps.len() != closes.len() {
            return Err(DomainError::ColumnLength {
                name: "close".into(),
                expected: timestamps.len(),
                actual: closes.len(),
            });
        }
        let points: Vec<PricePoint> = timestamps
            .into_iter()
            .zip(closes)
            .map(|(ts, c)| PricePoint::flat(ts, c))
            .collect();
        Self::from_points(&points)
    }

    /// Attach an auxiliary feature column.
    pub fn with_feature(
        mut self,
        name: impl Into<String>,
        values: Vec<f64>,
    ) -> Result<Self, DomainError> {
        let name = name.into();
        if values.len() != self.len() {
            return Err(DomainError::ColumnLength {
                name,
                expected: self.len(),
                actual: values.len(),
            });
        }
        if OHLC.contains(&name.as_str()) || self.features.contains_key(&name) {
            return Err(DomainError::DuplicateColumn(name));
        }
        self.features.insert(name, values);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    pub fn closes(&self) -> &[f64] {
        &self.close
    }

    pub fn first_timestamp(&self) -> Option<NaiveDateTime> {
        self.timestamps.first().copied()
    }

    pub fn last_timestamp(&self) -> Option<NaiveDateTime> {
        self.timestamps.last().copied()
    }

    /// Resolve a column by name: `open`, `high`, `low`, `close`, or a feature.
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        match name {
            "open" => Some(&self.open),
            "high" => Some(&self.high),
            "low" => Some(&self.low),
            "close" => Some(&self.close),
            other => self.features.get(other).map(Vec::as_slice),
        }
    }

    /// Like [`column`](Self::column) but fails with `UnknownColumn`.
    pub fn require_column(&self, name: &str) -> Result<&[f64], DomainError> {
        self.column(name)
            .ok_or_else(|| DomainError::UnknownColumn(name.to_string()))
    }

    pub fn feature_names(&self) -> impl Iterator<Item = &str> {
        self.features.keys().map(String::as_str)
    }

    /// OHLC row at `index`.
    pub fn point(&self, index: usize) -> Option<PricePoint> {
        Some(PricePoint {
            timestamp: *self.timestamps.get(index)?,
            open: self.open[index],
            high: self.high[index],
            low: self.low[index],
            close: self.close[index],
        })
    }

    /// Owned copy of the rows in `range` (clamped to the series).
    pub fn slice(&self, range: Range<usize>) -> PriceSeries {
        let end = range.end.min(self.len());
        let start = range.start.min(end);
        Self {
            timestamps: self.timestamps[start..end].to_vec(),
            open: self.open[start..end].to_vec(),
            high: self.high[start..end].to_vec(),
            low: self.low[start..end].to_vec(),
            close: self.close[start..end].to_vec(),
            features: self
                .features
                .iter()
                .map(|(k, v)| (k.clone(), v[start..end].to_vec()))
                .collect(),
        }
    }

    /// Index of the first row whose timestamp is `>= ts`, or `len()`.
    pub fn lower_bound(&self, ts: NaiveDateTime) -> usize {
        self.timestamps.partition_point(|t| *t < ts)
    }
}
