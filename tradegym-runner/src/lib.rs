//! TradeGym Runner — backtest orchestration, metrics, results and reporting.
//!
//! This crate builds on `tradegym-core` to provide:
//! - TOML sweep configuration with fail-fast validation
//! - Single-episode runner collecting balance/action/probability trajectories
//! - Performance metrics (Sharpe, Sortino, Calmar, drawdown, trade statistics)
//! - Append-only result tables keyed by `(generation, label)`
//! - Concurrent multi-window orchestration on a bounded worker pool
//! - Batch predictions and CSV/JSONL reporting with benchmark comparison

pub mod config;
pub mod metrics;
pub mod orchestrator;
pub mod predictions;
pub mod report;
pub mod result;
pub mod runner;

pub use config::{ActionMode, BacktestParams, ConfigError, SweepConfig};
pub use metrics::PerformanceMetrics;
pub use orchestrator::{run_many, BacktestOrchestrator, OrchestratorError, SweepBatch};
pub use predictions::{predict_positions, predict_probabilities};
pub use report::{compare_with_benchmarks, rows, BenchmarkComparison, ReportError, ResultRow};
pub use result::{
    BacktestResult, KeyedHistory, ResultKey, ResultTable, TaskFailure, TrajectoryTable,
};
pub use runner::{run_backtest, run_episode, EpisodeOutcome, RunError, TrajectoryRecord};
