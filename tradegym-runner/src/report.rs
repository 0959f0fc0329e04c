//! Result reporting — flat rows, CSV/JSONL export, benchmark comparison.
//!
//! `ResultTable` is a keyed multimap; reports want one flat row per result.
//! [`rows`] flattens a table in key order, numbering repeated runs of the same
//! key, and the writers below persist those rows.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::result::{BacktestResult, ResultTable};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("CSV output is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> ReportError + '_ {
    move |source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// One result plus its position among results sharing the same key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    /// 0 for the first result recorded under this key, 1 for the next, …
    pub run: usize,
    #[serde(flatten)]
    pub result: BacktestResult,
}

/// Flatten `table` in `(generation, label)` order.
pub fn rows(table: &ResultTable) -> Vec<ResultRow> {
    table
        .iter()
        .flat_map(|(_, results)| {
            results.iter().enumerate().map(|(run, result)| ResultRow {
                run,
                result: result.clone(),
            })
        })
        .collect()
}

impl ResultTable {
    pub fn rows(&self) -> Vec<ResultRow> {
        rows(self)
    }
}

// ─── CSV ────────────────────────────────────────────────────────────

const CSV_HEADER: [&str; 19] = [
    "run",
    "generation",
    "label",
    "policy",
    "final_balance",
    "total_reward",
    "number_of_trades",
    "sharpe",
    "sortino",
    "calmar",
    "max_drawdown",
    "max_drawdown_index",
    "provision_sum",
    "total_return",
    "annual_return",
    "average_trade_duration",
    "long_fraction",
    "short_fraction",
    "neutral_fraction",
];

/// Render rows as CSV. NaN metrics are written as `NaN`.
pub fn export_results_csv(rows: &[ResultRow]) -> Result<String, ReportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(CSV_HEADER)?;
    for row in rows {
        let r = &row.result;
        wtr.write_record([
            &row.run.to_string(),
            &r.generation.to_string(),
            &r.label,
            &r.policy,
            &format!("{:.6}", r.final_balance),
            &format!("{:.6}", r.total_reward),
            &r.number_of_trades.to_string(),
            &format!("{:.6}", r.sharpe),
            &format!("{:.6}", r.sortino),
            &format!("{:.6}", r.calmar),
            &format!("{:.6}", r.max_drawdown),
            &r.max_drawdown_index.map(|i| i.to_string()).unwrap_or_default(),
            &format!("{:.6}", r.provision_sum),
            &format!("{:.6}", r.total_return),
            &format!("{:.6}", r.annual_return),
            &format!("{:.4}", r.average_trade_duration),
            &format!("{:.4}", r.long_fraction),
            &format!("{:.4}", r.short_fraction),
            &format!("{:.4}", r.neutral_fraction),
        ])?;
    }
    let data = wtr
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    Ok(String::from_utf8(data)?)
}

pub fn write_csv(path: impl AsRef<Path>, rows: &[ResultRow]) -> Result<(), ReportError> {
    let path = path.as_ref();
    let text = export_results_csv(rows)?;
    std::fs::write(path, text).map_err(io_error(path))
}

// ─── JSON Lines ─────────────────────────────────────────────────────

/// One JSON object per line. NaN metrics become `null`.
pub fn write_jsonl(path: impl AsRef<Path>, rows: &[ResultRow]) -> Result<(), ReportError> {
    let path = path.as_ref();
    let file = File::create(path).map_err(io_error(path))?;
    let mut out = BufWriter::new(file);
    for row in rows {
        serde_json::to_writer(&mut out, row)?;
        out.write_all(b"\n").map_err(io_error(path))?;
    }
    out.flush().map_err(io_error(path))
}

/// Read rows written by [`write_jsonl`]. Blank lines are skipped.
///
/// `null` metrics are read back as NaN.
pub fn read_jsonl(path: impl AsRef<Path>) -> Result<Vec<ResultRow>, ReportError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(io_error(path))?;
    let mut rows = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(io_error(path))?;
        if line.trim().is_empty() {
            continue;
        }
        rows.push(serde_json::from_str(&line)?);
    }
    Ok(rows)
}

// ─── Benchmark comparison ───────────────────────────────────────────

/// One agent row next to one benchmark's result on the same window label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkComparison {
    pub label: String,
    pub generation: Option<u64>,
    pub agent: Option<String>,
    pub agent_final_balance: Option<f64>,
    pub agent_sharpe: Option<f64>,
    pub benchmark: String,
    pub benchmark_final_balance: Option<f64>,
    pub benchmark_sharpe: Option<f64>,
    /// `agent_final_balance - benchmark_final_balance` when both exist.
    pub excess_balance: Option<f64>,
}

/// Outer join on label: every agent key meets every benchmark's latest
/// result for that label, and labels only a benchmark saw still appear with
/// empty agent columns.
pub fn compare_with_benchmarks(
    agent: &ResultTable,
    benchmarks: &[&ResultTable],
) -> Vec<BenchmarkComparison> {
    let mut out = Vec::new();
    let agent_labels: BTreeSet<&str> = agent.keys().map(|k| k.label.as_str()).collect();

    for (key, results) in agent {
        let Some(latest) = results.last() else {
            continue;
        };
        for bench in benchmarks {
            let matched = latest_for_label(bench, &key.label);
            out.push(BenchmarkComparison {
                label: key.label.clone(),
                generation: Some(key.generation),
                agent: Some(latest.policy.clone()),
                agent_final_balance: Some(latest.final_balance),
                agent_sharpe: Some(latest.sharpe),
                benchmark: benchmark_name(bench, matched),
                benchmark_final_balance: matched.map(|b| b.final_balance),
                benchmark_sharpe: matched.map(|b| b.sharpe),
                excess_balance: matched.map(|b| latest.final_balance - b.final_balance),
            });
        }
    }

    for bench in benchmarks {
        let bench_labels: BTreeSet<&str> = bench.keys().map(|k| k.label.as_str()).collect();
        for label in bench_labels.difference(&agent_labels) {
            let matched = latest_for_label(bench, label);
            out.push(BenchmarkComparison {
                label: label.to_string(),
                generation: None,
                agent: None,
                agent_final_balance: None,
                agent_sharpe: None,
                benchmark: benchmark_name(bench, matched),
                benchmark_final_balance: matched.map(|b| b.final_balance),
                benchmark_sharpe: matched.map(|b| b.sharpe),
                excess_balance: None,
            });
        }
    }
    out
}

/// Most recent result for `label` across all generations of `table`.
fn latest_for_label<'a>(table: &'a ResultTable, label: &str) -> Option<&'a BacktestResult> {
    table
        .iter()
        .filter(|(k, _)| k.label == label)
        .filter_map(|(_, results)| results.last())
        .last()
}

fn benchmark_name(table: &ResultTable, matched: Option<&BacktestResult>) -> String {
    matched
        .or_else(|| table.iter().find_map(|(_, results)| results.first()))
        .map(|r| r.policy.clone())
        .unwrap_or_default()
}
