//! Batch predictions — the policy's view of every tradable row.
//!
//! Instead of playing an episode, the environment is reset at each row in
//! turn with the position carried over, so each prediction sees the position
//! produced by the previous one.

use tradegym_core::env::MarketEnvironment;
use tradegym_core::policy::{InferenceGuard, Policy};
use tradegym_core::{Action, ActionProbabilities, Observation, Position, PriceSeries};

use crate::config::BacktestParams;
use crate::runner::RunError;

/// Greedy position at every tradable row of `series`.
pub fn predict_positions(
    policy: &dyn Policy,
    series: &PriceSeries,
    params: &BacktestParams,
) -> Result<Vec<Position>, RunError> {
    predict_with(policy, series, params, |observation, position| {
        let action = policy.select_best_action(observation, position);
        (action.target_position(), action)
    })
}

/// Action probabilities at every tradable row of `series`. The position
/// carried forward is the most likely action's.
pub fn predict_probabilities(
    policy: &dyn Policy,
    series: &PriceSeries,
    params: &BacktestParams,
) -> Result<Vec<ActionProbabilities>, RunError> {
    predict_with(policy, series, params, |observation, position| {
        let probs = policy.action_probabilities(observation, position);
        (probs, probs.best())
    })
}

fn predict_with<T>(
    policy: &dyn Policy,
    series: &PriceSeries,
    params: &BacktestParams,
    mut predict: impl FnMut(&Observation, Position) -> (T, Action),
) -> Result<Vec<T>, RunError> {
    let mut env = MarketEnvironment::new(series, params.to_env_config())?;
    let _guard = InferenceGuard::enter(policy);

    let rows = env.episode_len();
    let mut out = Vec::with_capacity(rows);
    for start in 0..rows {
        let observation = env.reset_with(Some(start), true)?;
        let (prediction, action) = predict(&observation, env.position());
        out.push(prediction);
        // Stepping sets the position the next reset carries over.
        env.step(action)?;
    }
    Ok(out)
}
