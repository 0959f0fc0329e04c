//! Backtest orchestrator — fans episodes out over a bounded worker pool.
//!
//! One task per window, all reading the same policy snapshot. Each task owns
//! its environment and an RNG seeded from `(generation, label)`, so results do
//! not depend on worker count or completion order.
//!
//! Failure policy is best-effort: a task that errors or panics becomes a
//! [`TaskFailure`] and the remaining tasks still land in the result table.
//! Configuration problems are caught before any task is scheduled.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info, warn};

use tradegym_core::policy::{InferenceGuard, Policy};
use tradegym_core::windows::{self, WindowSpan};
use tradegym_core::{DomainError, PriceSeries, SeedHierarchy, Window};

use crate::config::{BacktestParams, ConfigError, SweepConfig};
use crate::result::{BacktestResult, ResultKey, ResultTable, TaskFailure, TrajectoryTable};
use crate::runner::{run_backtest, EpisodeOutcome};

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("window generation failed: {0}")]
    Windows(#[from] DomainError),
    #[error("failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// Everything one `run_many` call produced.
#[derive(Debug, Clone, Default)]
pub struct SweepBatch {
    pub results: ResultTable,
    pub trajectories: TrajectoryTable,
    pub failures: Vec<TaskFailure>,
}

impl SweepBatch {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Worker pool plus the accumulated history of every sweep it has run.
pub struct BacktestOrchestrator {
    pool: rayon::ThreadPool,
    workers: usize,
    seeds: SeedHierarchy,
    span: WindowSpan,
    params: BacktestParams,
    history: SweepBatch,
}

impl BacktestOrchestrator {
    /// Validate `config` and build a pool of `config.workers` threads.
    pub fn new(config: &SweepConfig) -> Result<Self, OrchestratorError> {
        config.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .thread_name(|i| format!("backtest-{i}"))
            .build()?;
        Ok(Self {
            pool,
            workers: config.workers,
            seeds: SeedHierarchy::new(config.seed),
            span: config.window_span,
            params: config.params.clone(),
            history: SweepBatch::default(),
        })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn params(&self) -> &BacktestParams {
        &self.params
    }

    /// Every result recorded so far, across all generations.
    pub fn results(&self) -> &ResultTable {
        &self.history.results
    }

    pub fn trajectories(&self) -> &TrajectoryTable {
        &self.history.trajectories
    }

    pub fn failures(&self) -> &[TaskFailure] {
        &self.history.failures
    }

    pub fn into_history(self) -> SweepBatch {
        self.history
    }

    /// Backtest `policy` on every window, keyed by
    /// `(policy.generation(), window.label)`.
    ///
    /// The batch is appended to the orchestrator's history and also returned.
    /// Policies sharing a generation share keys in the history; use one
    /// orchestrator per policy or split with [`ResultTable::for_policy`].
    pub fn run_many(&mut self, policy: &dyn Policy, windows: &[Window]) -> SweepBatch {
        let generation = policy.generation();
        info!(
            policy = policy.name(),
            generation,
            tasks = windows.len(),
            workers = self.workers,
            "backtest sweep started"
        );

        let seeds = self.seeds;
        let params = &self.params;
        let outcomes: Vec<(ResultKey, Result<EpisodeOutcome, String>)> = {
            let _guard = InferenceGuard::enter(policy);
            self.pool.install(|| {
                windows
                    .par_iter()
                    .map(|window| {
                        let key = ResultKey::new(generation, window.label.clone());
                        let outcome = run_task(policy, window, params, &seeds, generation);
                        (key, outcome)
                    })
                    .collect()
            })
        };

        let mut batch = SweepBatch::default();
        for (key, outcome) in outcomes {
            match outcome {
                Ok(outcome) => {
                    debug!(
                        %key,
                        final_balance = outcome.final_balance,
                        trades = outcome.number_of_trades,
                        "backtest task finished"
                    );
                    let result = BacktestResult::from_outcome(&key, policy.name(), &outcome);
                    batch.results.append(key.clone(), result);
                    batch.trajectories.append(key, outcome.trajectory);
                }
                Err(error) => {
                    warn!(generation = key.generation, label = %key.label, %error, "backtest task failed");
                    batch.failures.push(TaskFailure { key, error });
                }
            }
        }

        info!(
            generation,
            succeeded = batch.results.record_count(),
            failed = batch.failures.len(),
            "backtest sweep finished"
        );

        self.history.results.merge(batch.results.clone());
        self.history.trajectories.merge(batch.trajectories.clone());
        self.history.failures.extend(batch.failures.iter().cloned());
        batch
    }

    /// Cut `series` into windows of the configured span, label them
    /// `"<role>_<i>"`, and run them all.
    pub fn run_series(
        &mut self,
        policy: &dyn Policy,
        series: &PriceSeries,
        role: &str,
    ) -> Result<SweepBatch, OrchestratorError> {
        let generated = windows::generate(series, self.span, self.params.look_back)?;
        let labeled = windows::label_windows(generated, role);
        Ok(self.run_many(policy, &labeled))
    }
}

/// One-shot sweep without keeping an orchestrator around.
pub fn run_many(
    policy: &dyn Policy,
    windows: &[Window],
    config: &SweepConfig,
) -> Result<SweepBatch, OrchestratorError> {
    Ok(BacktestOrchestrator::new(config)?.run_many(policy, windows))
}

fn run_task(
    policy: &dyn Policy,
    window: &Window,
    params: &BacktestParams,
    seeds: &SeedHierarchy,
    generation: u64,
) -> Result<EpisodeOutcome, String> {
    let mut rng = seeds.rng_for(generation, &window.label, 0);
    match catch_unwind(AssertUnwindSafe(|| {
        run_backtest(policy, window, params, &mut rng)
    })) {
        Ok(Ok(outcome)) => Ok(outcome),
        Ok(Err(e)) => Err(e.to_string()),
        Err(payload) => Err(format!("task panicked: {}", panic_message(&*payload))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic payload"
    }
}
