//! Backtest runner — drives one environment to completion under a policy.
//!
//! Two entry points:
//! - `run_backtest()`: replays a generated `Window`. Used by the orchestrator.
//! - `run_episode()`: replays any `PriceSeries` from its first tradable row.
//!
//! The policy is held in inference mode for the whole episode through an
//! `InferenceGuard`, so it is restored even if the episode fails midway.

use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

use tradegym_core::env::MarketEnvironment;
use tradegym_core::policy::{InferenceGuard, Policy};
use tradegym_core::{
    Action, ActionProbabilities, DomainError, EnvError, Position, PriceSeries, Window,
};

use crate::config::{ActionMode, BacktestParams};
use crate::metrics::PerformanceMetrics;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("invalid backtest setup: {0}")]
    Domain(#[from] DomainError),
    #[error("environment error: {0}")]
    Env(#[from] EnvError),
}

/// Per-step record of one completed episode.
///
/// All vectors have one entry per step, in step order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryRecord {
    /// Balance after each step.
    pub balances: Vec<f64>,
    pub actions: Vec<Action>,
    pub probabilities: Vec<ActionProbabilities>,
    pub rewards: Vec<f64>,
}

impl TrajectoryRecord {
    pub fn len(&self) -> usize {
        self.balances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
    }

    /// Position held after each step.
    pub fn positions(&self) -> Vec<Position> {
        self.actions.iter().map(|a| a.target_position()).collect()
    }
}

/// Everything a result record is built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeOutcome {
    pub trajectory: TrajectoryRecord,
    pub final_balance: f64,
    pub total_reward: f64,
    pub number_of_trades: usize,
    pub provision_sum: f64,
    pub metrics: PerformanceMetrics,
}

/// Replay the tradable rows of `window`.
///
/// The window must have been cut with `params.look_back`; otherwise the
/// episode would trade prefix rows or skip tradable ones.
pub fn run_backtest(
    policy: &dyn Policy,
    window: &Window,
    params: &BacktestParams,
    rng: &mut StdRng,
) -> Result<EpisodeOutcome, RunError> {
    if window.prefix_len != params.look_back {
        return Err(DomainError::PrefixMismatch {
            prefix_len: window.prefix_len,
            look_back: params.look_back,
        }
        .into());
    }
    run_episode(policy, &window.data, params, rng)
}

/// Replay `series` from row `look_back` to the end.
pub fn run_episode(
    policy: &dyn Policy,
    series: &PriceSeries,
    params: &BacktestParams,
    rng: &mut StdRng,
) -> Result<EpisodeOutcome, RunError> {
    let mut env = MarketEnvironment::new(series, params.to_env_config())?;
    let _guard = InferenceGuard::enter(policy);

    let capacity = env.episode_len();
    let mut trajectory = TrajectoryRecord {
        balances: Vec::with_capacity(capacity),
        actions: Vec::with_capacity(capacity),
        probabilities: Vec::with_capacity(capacity),
        rewards: Vec::with_capacity(capacity),
    };

    let mut observation = env.reset()?;
    loop {
        let position = env.position();
        // One query per step; the action comes from the recorded distribution.
        let probabilities = policy.action_probabilities(&observation, position);
        let action = match params.action_mode {
            ActionMode::Best => probabilities.best(),
            ActionMode::Sampled => probabilities.sample(rng),
        };

        let outcome = env.step(action)?;
        trace!(
            step = outcome.info.step,
            ?action,
            balance = outcome.info.balance,
            reward = outcome.reward,
            "step"
        );
        trajectory.balances.push(outcome.info.balance);
        trajectory.actions.push(action);
        trajectory.probabilities.push(probabilities);
        trajectory.rewards.push(outcome.reward);

        if outcome.done {
            break;
        }
        observation = outcome.observation;
    }

    let metrics = PerformanceMetrics::compute(
        params.initial_balance,
        &trajectory.balances,
        &trajectory.positions(),
    );
    Ok(EpisodeOutcome {
        final_balance: env.balance(),
        total_reward: env.cumulative_reward(),
        number_of_trades: env.trade_count(),
        provision_sum: env.provision_sum(),
        metrics,
        trajectory,
    })
}
