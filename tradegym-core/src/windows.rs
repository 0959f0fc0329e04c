//! Rolling window generation — carve a long series into calendar-span buckets.
//!
//! Buckets are anchored at the first timestamp and advance by a fixed
//! calendar span (`1Y`, `6M`, `2W`, `30D`). Each window keeps `look_back`
//! leading rows of context taken from the tail of the previous bucket, so
//! the first tradable row always has a full observation. The very first
//! window has no predecessor and takes its context from its own head.
//!
//! Concatenating every window's tradable rows reproduces the series from row
//! `look_back` onwards with no gaps and no duplicates.

use chrono::{Duration, Months, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::domain::{PriceSeries, Window};
use crate::error::DomainError;

/// Calendar length of one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum WindowSpan {
    Years(u32),
    Months(u32),
    Weeks(u32),
    Days(u32),
}

impl WindowSpan {
    /// `ts` moved forward by one span, or `None` on calendar overflow.
    pub fn advance(self, ts: NaiveDateTime) -> Option<NaiveDateTime> {
        match self {
            WindowSpan::Years(n) => ts.checked_add_months(Months::new(n.checked_mul(12)?)),
            WindowSpan::Months(n) => ts.checked_add_months(Months::new(n)),
            WindowSpan::Weeks(n) => ts.checked_add_signed(Duration::weeks(i64::from(n))),
            WindowSpan::Days(n) => ts.checked_add_signed(Duration::days(i64::from(n))),
        }
    }

    fn count(self) -> u32 {
        match self {
            WindowSpan::Years(n)
            | WindowSpan::Months(n)
            | WindowSpan::Weeks(n)
            | WindowSpan::Days(n) => n,
        }
    }
}

impl FromStr for WindowSpan {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let invalid = || DomainError::InvalidSpan(s.to_string());
        let unit = trimmed.chars().last().ok_or_else(invalid)?;
        let count: u32 = trimmed[..trimmed.len() - unit.len_utf8()]
            .parse()
            .map_err(|_| invalid())?;
        if count == 0 {
            return Err(invalid());
        }
        match unit.to_ascii_uppercase() {
            'Y' => Ok(WindowSpan::Years(count)),
            'M' => Ok(WindowSpan::Months(count)),
            'W' => Ok(WindowSpan::Weeks(count)),
            'D' => Ok(WindowSpan::Days(count)),
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for WindowSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = match self {
            WindowSpan::Years(_) => 'Y',
            WindowSpan::Months(_) => 'M',
            WindowSpan::Weeks(_) => 'W',
            WindowSpan::Days(_) => 'D',
        };
        write!(f, "{}{}", self.count(), unit)
    }
}

impl TryFrom<String> for WindowSpan {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<WindowSpan> for String {
    fn from(span: WindowSpan) -> Self {
        span.to_string()
    }
}

/// Split `series` into chronological windows of `span`, each carrying a
/// `look_back` prefix. Windows are labeled by index (`"0"`, `"1"`, …); use
/// [`label_windows`] to tag them with a role.
///
/// Buckets whose rows all fall inside the first `look_back` rows have nothing
/// to trade and are skipped.
pub fn generate(
    series: &PriceSeries,
    span: WindowSpan,
    look_back: usize,
) -> Result<Vec<Window>, DomainError> {
    if series.is_empty() {
        return Err(DomainError::EmptySeries);
    }
    if look_back == 0 {
        return Err(DomainError::ZeroLookBack);
    }
    let timestamps = series.timestamps();
    let len = series.len();

    let mut windows = Vec::new();
    let mut bucket_start = timestamps[0];
    let mut start_idx = 0;

    while start_idx < len {
        let next = span
            .advance(bucket_start)
            .ok_or_else(|| DomainError::InvalidSpan(span.to_string()))?;
        let end_idx = series.lower_bound(next);
        bucket_start = next;
        if end_idx == start_idx {
            // Calendar gap: empty bucket.
            continue;
        }

        let tradable_start = start_idx.max(look_back);
        if tradable_start >= end_idx {
            debug!(
                start = %timestamps[start_idx],
                rows = end_idx - start_idx,
                look_back,
                "skipping window without tradable rows"
            );
            start_idx = end_idx;
            continue;
        }

        let data_start = tradable_start - look_back;
        windows.push(Window {
            label: windows.len().to_string(),
            data: series.slice(data_start..end_idx),
            prefix_len: look_back,
            start: timestamps[tradable_start],
            end: timestamps[end_idx - 1],
        });
        start_idx = end_idx;
    }

    Ok(windows)
}

/// `"<role>_<index>"` for every window, in order.
pub fn generate_index_labels(windows: &[Window], role: &str) -> Vec<String> {
    (0..windows.len()).map(|i| format!("{role}_{i}")).collect()
}

/// Relabel windows with [`generate_index_labels`].
pub fn label_windows(windows: Vec<Window>, role: &str) -> Vec<Window> {
    let labels = generate_index_labels(&windows, role);
    windows
        .into_iter()
        .zip(labels)
        .map(|(w, label)| w.relabel(label))
        .collect()
}
