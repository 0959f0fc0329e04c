//! Observation construction — look-back slices of configured feature columns.
//!
//! Each feature's transform is fitted on the look-back slice alone, so no
//! information from outside the window leaks into an observation.

use serde::{Deserialize, Serialize};

use crate::domain::Position;

/// Per-feature scaling applied inside the look-back window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transform {
    /// Raw values.
    #[default]
    Identity,
    /// `(x - mean) / std` with the sample standard deviation.
    Standardize,
    /// `(x - min) / (max - min)`.
    Normalize,
}

impl Transform {
    /// Apply the transform to one window. Zero-spread windows map to zeros.
    pub fn apply(self, values: &[f64]) -> Vec<f64> {
        match self {
            Transform::Identity => values.to_vec(),
            Transform::Standardize => {
                let n = values.len();
                if n < 2 {
                    return vec![0.0; n];
                }
                let mean = values.iter().sum::<f64>() / n as f64;
                let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
                let std = var.sqrt();
                if std == 0.0 || !std.is_finite() {
                    return vec![0.0; n];
                }
                values.iter().map(|v| (v - mean) / std).collect()
            }
            Transform::Normalize => {
                let min = values.iter().copied().fold(f64::INFINITY, f64::min);
                let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let range = max - min;
                if range == 0.0 || !range.is_finite() {
                    return vec![0.0; values.len()];
                }
                values.iter().map(|v| (v - min) / range).collect()
            }
        }
    }
}

/// A column to observe and how to scale it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSpec {
    pub column: String,
    #[serde(default)]
    pub transform: Transform,
}

impl FeatureSpec {
    pub fn new(column: impl Into<String>, transform: Transform) -> Self {
        Self {
            column: column.into(),
            transform,
        }
    }

    pub fn identity(column: impl Into<String>) -> Self {
        Self::new(column, Transform::Identity)
    }

    pub fn standardized(column: impl Into<String>) -> Self {
        Self::new(column, Transform::Standardize)
    }

    pub fn normalized(column: impl Into<String>) -> Self {
        Self::new(column, Transform::Normalize)
    }
}

/// Flat, ordered feature vector handed to a policy.
///
/// Layout is feature-major: all `look_back` values of the first feature,
/// then the second, and so on, optionally followed by the encoded position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    values: Vec<f64>,
}

impl Observation {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.values
    }
}

/// Build the observation for rows `[end - look_back, end)`.
///
/// Callers guarantee `look_back <= end <= column.len()` for every column.
pub(crate) fn build(
    columns: &[(&[f64], Transform)],
    end: usize,
    look_back: usize,
    position: Option<Position>,
) -> Observation {
    let start = end - look_back;
    let extra = usize::from(position.is_some());
    let mut values = Vec::with_capacity(columns.len() * look_back + extra);
    for (column, transform) in columns {
        values.extend(transform.apply(&column[start..end]));
    }
    if let Some(position) = position {
        values.push(position.as_f64());
    }
    Observation::new(values)
}
