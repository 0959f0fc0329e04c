//! Backtest results and the append-only tables that accumulate them.
//!
//! Results are keyed by `(generation, label)`. Running the same policy
//! generation on the same window twice yields two entries under one key;
//! nothing is ever overwritten, so a table holds the full evaluation history
//! of a training run.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::btree_map::{self, BTreeMap};
use std::fmt;

use crate::runner::{EpisodeOutcome, TrajectoryRecord};

/// Policy generation plus window label.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResultKey {
    pub generation: u64,
    pub label: String,
}

impl ResultKey {
    pub fn new(generation: u64, label: impl Into<String>) -> Self {
        Self {
            generation,
            label: label.into(),
        }
    }
}

impl fmt::Display for ResultKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen {} / {}", self.generation, self.label)
    }
}

/// Summary of one backtest episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub generation: u64,
    pub label: String,
    pub policy: String,
    pub final_balance: f64,
    pub total_reward: f64,
    pub number_of_trades: usize,
    #[serde(deserialize_with = "nan_from_null")]
    pub sharpe: f64,
    #[serde(deserialize_with = "nan_from_null")]
    pub sortino: f64,
    #[serde(deserialize_with = "nan_from_null")]
    pub calmar: f64,
    #[serde(deserialize_with = "nan_from_null")]
    pub max_drawdown: f64,
    pub max_drawdown_index: Option<usize>,
    pub provision_sum: f64,
    #[serde(deserialize_with = "nan_from_null")]
    pub total_return: f64,
    #[serde(deserialize_with = "nan_from_null")]
    pub annual_return: f64,
    pub average_trade_duration: f64,
    pub long_fraction: f64,
    pub short_fraction: f64,
    pub neutral_fraction: f64,
}

/// serde_json writes NaN as `null`; read it back as NaN.
fn nan_from_null<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

impl BacktestResult {
    pub fn from_outcome(key: &ResultKey, policy: &str, outcome: &EpisodeOutcome) -> Self {
        let m = &outcome.metrics;
        Self {
            generation: key.generation,
            label: key.label.clone(),
            policy: policy.to_string(),
            final_balance: outcome.final_balance,
            total_reward: outcome.total_reward,
            number_of_trades: outcome.number_of_trades,
            sharpe: m.sharpe,
            sortino: m.sortino,
            calmar: m.calmar,
            max_drawdown: m.max_drawdown,
            max_drawdown_index: m.max_drawdown_index,
            provision_sum: outcome.provision_sum,
            total_return: m.total_return,
            annual_return: m.annual_return,
            average_trade_duration: m.average_trade_duration,
            long_fraction: m.long_fraction,
            short_fraction: m.short_fraction,
            neutral_fraction: m.neutral_fraction,
        }
    }

    pub fn key(&self) -> ResultKey {
        ResultKey::new(self.generation, self.label.clone())
    }
}

/// A backtest task that did not produce a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailure {
    pub key: ResultKey,
    pub error: String,
}

/// Append-only multimap: every key holds its records in insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyedHistory<T> {
    entries: BTreeMap<ResultKey, Vec<T>>,
}

impl<T> Default for KeyedHistory<T> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<T> KeyedHistory<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, key: ResultKey, record: T) {
        self.entries.entry(key).or_default().push(record);
    }

    /// Move every record of `other` to the end of the matching key here.
    pub fn merge(&mut self, other: KeyedHistory<T>) {
        for (key, records) in other.entries {
            self.entries.entry(key).or_default().extend(records);
        }
    }

    /// All records stored under `key`, oldest first. Empty when absent.
    pub fn get(&self, key: &ResultKey) -> &[T] {
        self.entries.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn latest(&self, key: &ResultKey) -> Option<&T> {
        self.get(key).last()
    }

    pub fn contains_key(&self, key: &ResultKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &ResultKey> {
        self.entries.keys()
    }

    /// Distinct generations, ascending.
    pub fn generations(&self) -> Vec<u64> {
        let mut generations: Vec<u64> = self.entries.keys().map(|k| k.generation).collect();
        generations.dedup();
        generations
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of records across all keys.
    pub fn record_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// `(key, records)` in key order.
    pub fn iter(&self) -> btree_map::Iter<'_, ResultKey, Vec<T>> {
        self.entries.iter()
    }
}

impl<'a, T> IntoIterator for &'a KeyedHistory<T> {
    type Item = (&'a ResultKey, &'a Vec<T>);
    type IntoIter = btree_map::Iter<'a, ResultKey, Vec<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

pub type ResultTable = KeyedHistory<BacktestResult>;
pub type TrajectoryTable = KeyedHistory<TrajectoryRecord>;

impl ResultTable {
    /// Append a result under its own key.
    pub fn push(&mut self, result: BacktestResult) {
        self.append(result.key(), result);
    }

    /// Only the results produced by `policy`, history order kept.
    ///
    /// Keys carry no policy name, so two policies reporting the same
    /// generation (the fixed benchmarks all report 0) share keys in one table.
    pub fn for_policy(&self, policy: &str) -> ResultTable {
        let mut out = ResultTable::new();
        for result in self.entries.values().flatten() {
            if result.policy == policy {
                out.push(result.clone());
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(generation: u64, label: &str, final_balance: f64) -> BacktestResult {
        BacktestResult {
            generation,
            label: label.into(),
            policy: "test".into(),
            final_balance,
            total_reward: 0.0,
            number_of_trades: 0,
            sharpe: f64::NAN,
            sortino: f64::NAN,
            calmar: f64::NAN,
            max_drawdown: 0.0,
            max_drawdown_index: None,
            provision_sum: 0.0,
            total_return: 0.0,
            annual_return: 0.0,
            average_trade_duration: 0.0,
            long_fraction: 0.0,
            short_fraction: 0.0,
            neutral_fraction: 1.0,
        }
    }

    #[test]
    fn same_key_appends_instead_of_overwriting() {
        let mut table = ResultTable::new();
        table.push(result(1, "test_0", 100.0));
        table.push(result(1, "test_0", 200.0));
        table.push(result(2, "test_0", 300.0));

        let key = ResultKey::new(1, "test_0");
        let balances: Vec<f64> = table.get(&key).iter().map(|r| r.final_balance).collect();
        assert_eq!(balances, vec![100.0, 200.0]);
        assert_eq!(table.latest(&key).map(|r| r.final_balance), Some(200.0));
        assert_eq!(table.len(), 2);
        assert_eq!(table.record_count(), 3);
        assert_eq!(table.generations(), vec![1, 2]);
    }

    #[test]
    fn merge_preserves_both_histories() {
        let mut a = ResultTable::new();
        a.push(result(1, "x", 1.0));
        let mut b = ResultTable::new();
        b.push(result(1, "x", 2.0));
        b.push(result(1, "y", 3.0));
        a.merge(b);

        assert_eq!(a.get(&ResultKey::new(1, "x")).len(), 2);
        assert_eq!(a.get(&ResultKey::new(1, "y")).len(), 1);
        assert!(a.get(&ResultKey::new(9, "x")).is_empty());
    }

    #[test]
    fn keys_iterate_by_generation_then_label() {
        let mut table = ResultTable::new();
        table.push(result(2, "a", 0.0));
        table.push(result(1, "b", 0.0));
        table.push(result(1, "a", 0.0));
        let keys: Vec<String> = table.keys().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["gen 1 / a", "gen 1 / b", "gen 2 / a"]);
    }

    #[test]
    fn shared_generation_splits_by_policy() {
        let mut table = ResultTable::new();
        let mut long = result(0, "test_0", 10_500.0);
        long.policy = "BuyAndHold".into();
        let mut short = result(0, "test_0", 9_500.0);
        short.policy = "SellAndHold".into();
        table.push(long);
        table.push(short);

        let key = ResultKey::new(0, "test_0");
        assert_eq!(table.get(&key).len(), 2);
        let long_only = table.for_policy("BuyAndHold");
        assert_eq!(long_only.record_count(), 1);
        assert_eq!(long_only.latest(&key).map(|r| r.final_balance), Some(10_500.0));
        assert!(table.for_policy("ppo").is_empty());
    }

    #[test]
    fn result_serializes_nan_metrics() {
        let json = serde_json::to_string(&result(0, "flat", 10_000.0)).unwrap();
        assert!(json.contains("\"sharpe\":null"));
    }
}
