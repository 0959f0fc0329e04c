//! Market environment — the episodic state machine an agent trades in.
//!
//! Lifecycle: `Uninitialized` → [`reset`](MarketEnvironment::reset) →
//! `Running` → [`step`](MarketEnvironment::step)… → `Done`.
//!
//! Timing: with the cursor at row `t`, the observation covers rows
//! `[t - look_back, t)` and the chosen position earns the move
//! `close[t-1] → close[t]`. The cursor then advances; the episode is done once
//! every row has been traded (`t >= len`).
//!
//! Balance is updated multiplicatively (`balance *= exp(log_return * position
//! * leverage + log_cost)`), so it never changes sign.

pub mod observation;
pub mod reward;

use serde::{Deserialize, Serialize};

use crate::cost_model::CostModel;
use crate::domain::{Action, Position, PriceSeries};
use crate::error::{DomainError, EnvError, StateError};

pub use observation::{FeatureSpec, Observation, Transform};
pub use reward::{MarketMove, RewardModel};

/// Static configuration of one environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvConfig {
    pub look_back: usize,
    pub provision_rate: f64,
    pub leverage: f64,
    pub initial_balance: f64,
    /// Multiplier applied to the reward returned from `step`.
    pub reward_scaling: f64,
    pub reward_model: RewardModel,
    pub features: Vec<FeatureSpec>,
    /// Column whose moves are traded.
    pub price_column: String,
    /// Append the current position to every observation.
    pub include_position: bool,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            look_back: 20,
            provision_rate: 0.0001,
            leverage: 1.0,
            initial_balance: 10_000.0,
            reward_scaling: 1.0,
            reward_model: RewardModel::LogReturn,
            features: vec![FeatureSpec::standardized("close")],
            price_column: "close".into(),
            include_position: true,
        }
    }
}

impl EnvConfig {
    /// Check every scalar and return the cost model they imply.
    pub fn validate(&self) -> Result<CostModel, DomainError> {
        if self.look_back == 0 {
            return Err(DomainError::ZeroLookBack);
        }
        positive("leverage", self.leverage)?;
        positive("initial_balance", self.initial_balance)?;
        if !self.reward_scaling.is_finite() {
            return Err(DomainError::NonPositive {
                name: "reward_scaling",
                value: self.reward_scaling,
            });
        }
        CostModel::new(self.provision_rate)
    }
}

fn positive(name: &'static str, value: f64) -> Result<(), DomainError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(DomainError::NonPositive { name, value })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EpisodeStatus {
    Uninitialized,
    Running,
    Done,
}

/// Mutable per-episode state. Created on reset, mutated only by `step`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeState {
    pub current_step: usize,
    pub balance: f64,
    pub position: Position,
    pub cumulative_reward: f64,
    pub trade_count: usize,
    /// Currency withheld by provision so far.
    pub provision_sum: f64,
}

/// Diagnostics for one step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepInfo {
    /// Row whose close was reached by this step.
    pub step: usize,
    pub log_return: f64,
    pub log_cost: f64,
    pub provision_paid: f64,
    pub traded: bool,
    pub position: Position,
    pub balance: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub observation: Observation,
    pub reward: f64,
    pub done: bool,
    pub info: StepInfo,
}

/// Result of evaluating an action against the current state, without
/// committing it.
#[derive(Debug, Clone, Copy)]
struct Transition {
    next: Position,
    reward: f64,
    balance: f64,
    info: StepInfo,
}

/// Trading environment over one borrowed price series.
#[derive(Debug, Clone)]
pub struct MarketEnvironment<'a> {
    series: &'a PriceSeries,
    prices: &'a [f64],
    columns: Vec<(&'a [f64], Transform)>,
    config: EnvConfig,
    cost_model: CostModel,
    status: EpisodeStatus,
    state: EpisodeState,
}

impl<'a> MarketEnvironment<'a> {
    /// Validate the configuration against the series and build an
    /// uninitialized environment.
    pub fn new(series: &'a PriceSeries, config: EnvConfig) -> Result<Self, DomainError> {
        let cost_model = config.validate()?;
        if series.is_empty() {
            return Err(DomainError::EmptySeries);
        }
        if series.len() <= config.look_back {
            return Err(DomainError::LookBackTooLong {
                look_back: config.look_back,
                rows: series.len(),
            });
        }
        let prices = series.require_column(&config.price_column)?;
        let columns = config
            .features
            .iter()
            .map(|f| Ok((series.require_column(&f.column)?, f.transform)))
            .collect::<Result<Vec<_>, DomainError>>()?;

        let state = EpisodeState {
            current_step: config.look_back,
            balance: config.initial_balance,
            position: Position::Neutral,
            cumulative_reward: 0.0,
            trade_count: 0,
            provision_sum: 0.0,
        };
        Ok(Self {
            series,
            prices,
            columns,
            config,
            cost_model,
            status: EpisodeStatus::Uninitialized,
            state,
        })
    }

    /// Start a fresh episode at the first tradable row.
    pub fn reset(&mut self) -> Result<Observation, EnvError> {
        self.reset_with(None, false)
    }

    /// Start a fresh episode with the cursor at `start + look_back`.
    pub fn reset_at(&mut self, start: usize) -> Result<Observation, EnvError> {
        self.reset_with(Some(start), false)
    }

    /// Full reset. `keep_position` carries the current position into the new
    /// episode instead of flattening to Neutral.
    pub fn reset_with(
        &mut self,
        start: Option<usize>,
        keep_position: bool,
    ) -> Result<Observation, EnvError> {
        let look_back = self.config.look_back;
        let offset = start.unwrap_or(0);
        let step = offset + look_back;
        if step >= self.series.len() {
            return Err(DomainError::StartOutOfRange {
                start: offset,
                look_back,
                rows: self.series.len(),
            }
            .into());
        }
        let position = if keep_position {
            self.state.position
        } else {
            Position::Neutral
        };
        self.state = EpisodeState {
            current_step: step,
            balance: self.config.initial_balance,
            position,
            cumulative_reward: 0.0,
            trade_count: 0,
            provision_sum: 0.0,
        };
        self.status = EpisodeStatus::Running;
        self.observe()
    }

    /// Observation at the current cursor.
    pub fn observe(&self) -> Result<Observation, EnvError> {
        if self.status == EpisodeStatus::Uninitialized {
            return Err(StateError::NotReset.into());
        }
        let position = self.config.include_position.then_some(self.state.position);
        Ok(observation::build(
            &self.columns,
            self.state.current_step,
            self.config.look_back,
            position,
        ))
    }

    /// Take `action`, advance one row, and return the new observation.
    pub fn step(&mut self, action: Action) -> Result<StepOutcome, EnvError> {
        let transition = self.evaluate(action)?;

        self.state.balance = transition.balance;
        self.state.position = transition.next;
        self.state.cumulative_reward += transition.reward;
        self.state.provision_sum += transition.info.provision_paid;
        if transition.info.traded {
            self.state.trade_count += 1;
        }
        self.state.current_step += 1;

        let done = self.state.current_step >= self.series.len();
        if done {
            self.status = EpisodeStatus::Done;
        }

        Ok(StepOutcome {
            observation: self.observe()?,
            reward: transition.reward,
            done,
            info: transition.info,
        })
    }

    /// Reward `action` would earn from the current state. Does not mutate.
    pub fn simulate_step(&self, action: Action) -> Result<f64, EnvError> {
        Ok(self.evaluate(action)?.reward)
    }

    /// Hypothetical rewards of Short, Neutral and Long at the current step.
    pub fn alternative_rewards(&self) -> Result<[f64; 3], EnvError> {
        let mut rewards = [0.0; 3];
        for action in Action::ALL {
            rewards[action.index()] = self.simulate_step(action)?;
        }
        Ok(rewards)
    }

    fn evaluate(&self, action: Action) -> Result<Transition, EnvError> {
        match self.status {
            EpisodeStatus::Uninitialized => return Err(StateError::NotReset.into()),
            EpisodeStatus::Done => {
                return Err(StateError::EpisodeDone {
                    step: self.state.current_step,
                }
                .into())
            }
            EpisodeStatus::Running => {}
        }

        let t = self.state.current_step;
        let mv = MarketMove {
            previous_close: self.prices[t - 1],
            close: self.prices[t],
            previous: self.state.position,
            next: action.target_position(),
        };
        let log_return = mv.log_return();
        let market = log_return * mv.next.as_f64() * self.config.leverage;
        let log_cost = self.cost_model.log_cost(mv.previous, mv.next);
        let gross = self.state.balance * market.exp();
        let provision_paid = self.cost_model.provision_paid(gross, mv.previous, mv.next);
        let balance = self.state.balance * (market + log_cost).exp();
        let reward = self
            .config
            .reward_model
            .reward(&mv, self.config.leverage, &self.cost_model)
            * self.config.reward_scaling;

        Ok(Transition {
            next: mv.next,
            reward,
            balance,
            info: StepInfo {
                step: t,
                log_return,
                log_cost,
                provision_paid,
                traded: CostModel::is_entry(mv.previous, mv.next),
                position: mv.next,
                balance,
            },
        })
    }

    // ── Accessors ──

    pub fn status(&self) -> EpisodeStatus {
        self.status
    }

    pub fn is_done(&self) -> bool {
        self.status == EpisodeStatus::Done
    }

    pub fn state(&self) -> &EpisodeState {
        &self.state
    }

    pub fn balance(&self) -> f64 {
        self.state.balance
    }

    pub fn position(&self) -> Position {
        self.state.position
    }

    pub fn current_step(&self) -> usize {
        self.state.current_step
    }

    pub fn trade_count(&self) -> usize {
        self.state.trade_count
    }

    pub fn cumulative_reward(&self) -> f64 {
        self.state.cumulative_reward
    }

    pub fn provision_sum(&self) -> f64 {
        self.state.provision_sum
    }

    pub fn config(&self) -> &EnvConfig {
        &self.config
    }

    pub fn series(&self) -> &'a PriceSeries {
        self.series
    }

    /// Number of steps a full episode from the first tradable row takes.
    pub fn episode_len(&self) -> usize {
        self.series.len() - self.config.look_back
    }

    /// Length of every observation this environment produces.
    pub fn observation_len(&self) -> usize {
        self.columns.len() * self.config.look_back + usize::from(self.config.include_position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    fn day(n: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + Duration::days(n)
    }

    fn series(closes: &[f64]) -> PriceSeries {
        PriceSeries::from_closes((0..closes.len() as i64).map(day).collect(), closes.to_vec())
            .unwrap()
    }

    fn config(look_back: usize, provision: f64) -> EnvConfig {
        EnvConfig {
            look_back,
            provision_rate: provision,
            features: vec![FeatureSpec::identity("close")],
            ..EnvConfig::default()
        }
    }

    #[test]
    fn new_rejects_look_back_covering_series() {
        let s = series(&[1.0, 2.0, 3.0]);
        let err = MarketEnvironment::new(&s, config(3, 0.0)).unwrap_err();
        assert_eq!(err, DomainError::LookBackTooLong { look_back: 3, rows: 3 });
    }

    #[test]
    fn new_rejects_unknown_feature() {
        let s = series(&[1.0, 2.0, 3.0]);
        let mut cfg = config(1, 0.0);
        cfg.features.push(FeatureSpec::identity("rsi"));
        let err = MarketEnvironment::new(&s, cfg).unwrap_err();
        assert_eq!(err, DomainError::UnknownColumn("rsi".into()));
    }

    #[test]
    fn new_rejects_bad_provision() {
        let s = series(&[1.0, 2.0, 3.0]);
        let err = MarketEnvironment::new(&s, config(1, 1.0)).unwrap_err();
        assert_eq!(err, DomainError::InvalidProvision(1.0));
    }

    #[test]
    fn observe_before_reset_is_state_error() {
        let s = series(&[1.0, 2.0, 3.0]);
        let env = MarketEnvironment::new(&s, config(1, 0.0)).unwrap();
        assert_eq!(env.observe().unwrap_err(), EnvError::State(StateError::NotReset));
    }

    #[test]
    fn reset_places_cursor_after_look_back() {
        let s = series(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let mut env = MarketEnvironment::new(&s, config(2, 0.0)).unwrap();
        let obs = env.reset().unwrap();
        assert_eq!(env.current_step(), 2);
        assert_eq!(obs.values(), &[1.0, 2.0, 0.0]);

        let obs = env.reset_at(2).unwrap();
        assert_eq!(env.current_step(), 4);
        assert_eq!(obs.values(), &[3.0, 4.0, 0.0]);
    }

    #[test]
    fn reset_rejects_start_past_data() {
        let s = series(&[1.0, 2.0, 3.0]);
        let mut env = MarketEnvironment::new(&s, config(1, 0.0)).unwrap();
        assert!(matches!(
            env.reset_at(2),
            Err(EnvError::Domain(DomainError::StartOutOfRange { start: 2, .. }))
        ));
    }

    #[test]
    fn reset_can_keep_position() {
        let s = series(&[1.0, 2.0, 3.0, 4.0]);
        let mut env = MarketEnvironment::new(&s, config(1, 0.0)).unwrap();
        env.reset().unwrap();
        env.step(Action::Long).unwrap();
        env.reset_with(Some(1), true).unwrap();
        assert_eq!(env.position(), Position::Long);
        env.reset_with(Some(1), false).unwrap();
        assert_eq!(env.position(), Position::Neutral);
    }

    #[test]
    fn concrete_balance_trajectory() {
        let s = series(&[100.0, 101.0, 100.0, 100.0, 102.0]);
        let mut env = MarketEnvironment::new(&s, config(1, 0.0)).unwrap();
        env.reset().unwrap();

        let actions = [Action::Long, Action::Long, Action::Neutral, Action::Long];
        let mut balances = Vec::new();
        let mut done = false;
        for action in actions {
            assert!(!done);
            let out = env.step(action).unwrap();
            balances.push(env.balance());
            done = out.done;
        }
        assert!(done);

        let b1 = 10_000.0 * 101.0 / 100.0;
        let b2 = b1 * (100.0 / 101.0);
        let b3 = b2;
        let b4 = b3 * 102.0 / 100.0;
        for (got, want) in balances.iter().zip([b1, b2, b3, b4]) {
            assert!((got - want).abs() < 1e-9, "got {got}, want {want}");
        }
        assert_eq!(env.trade_count(), 2);
    }

    #[test]
    fn step_after_done_is_state_error() {
        let s = series(&[1.0, 2.0]);
        let mut env = MarketEnvironment::new(&s, config(1, 0.0)).unwrap();
        env.reset().unwrap();
        assert!(env.step(Action::Long).unwrap().done);
        assert_eq!(
            env.step(Action::Long).unwrap_err(),
            EnvError::State(StateError::EpisodeDone { step: 2 })
        );
        // Observing a finished episode is still allowed.
        assert!(env.observe().is_ok());
    }

    #[test]
    fn provision_is_charged_on_entry_only() {
        let s = series(&[100.0, 100.0, 100.0, 100.0]);
        let mut env = MarketEnvironment::new(&s, config(1, 0.01)).unwrap();
        env.reset().unwrap();
        env.step(Action::Long).unwrap();
        assert!((env.balance() - 9_900.0).abs() < 1e-9);
        assert!((env.provision_sum() - 100.0).abs() < 1e-9);
        env.step(Action::Long).unwrap();
        env.step(Action::Neutral).unwrap();
        assert!((env.balance() - 9_900.0).abs() < 1e-9);
        assert_eq!(env.trade_count(), 1);
    }

    #[test]
    fn simulate_does_not_mutate() {
        let s = series(&[100.0, 110.0, 121.0]);
        let mut env = MarketEnvironment::new(&s, config(1, 0.001)).unwrap();
        env.reset().unwrap();
        let before = env.state().clone();
        let rewards = env.alternative_rewards().unwrap();
        assert_eq!(env.state(), &before);

        let up = (1.1_f64).ln() + (0.999_f64).ln();
        let down = -(1.1_f64).ln() + (0.999_f64).ln();
        assert!((rewards[Action::Long.index()] - up).abs() < 1e-12);
        assert!((rewards[Action::Short.index()] - down).abs() < 1e-12);
        assert_eq!(rewards[Action::Neutral.index()], 0.0);

        let out = env.step(Action::Long).unwrap();
        assert!((out.reward - up).abs() < 1e-12);
    }

    #[test]
    fn reward_scaling_does_not_touch_balance() {
        let s = series(&[100.0, 110.0]);
        let mut cfg = config(1, 0.0);
        cfg.reward_scaling = 100.0;
        let mut env = MarketEnvironment::new(&s, cfg).unwrap();
        env.reset().unwrap();
        let out = env.step(Action::Long).unwrap();
        assert!((out.reward - 100.0 * (1.1_f64).ln()).abs() < 1e-9);
        assert!((env.balance() - 11_000.0).abs() < 1e-9);
        assert!((env.cumulative_reward() - out.reward).abs() < 1e-12);
    }

    #[test]
    fn observation_len_matches_config() {
        let s = series(&[1.0, 2.0, 3.0, 4.0]);
        let mut cfg = config(2, 0.0);
        cfg.features.push(FeatureSpec::normalized("open"));
        let mut env = MarketEnvironment::new(&s, cfg).unwrap();
        let obs = env.reset().unwrap();
        assert_eq!(obs.len(), env.observation_len());
        assert_eq!(obs.len(), 5);
    }
}
