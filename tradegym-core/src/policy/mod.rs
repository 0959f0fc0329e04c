//! Policy capability — what the backtest engine needs from an agent.
//!
//! A learned network and a fixed-rule benchmark look the same to the engine:
//! both expose action probabilities, exploratory and greedy action selection,
//! an inference-mode toggle, and a generation counter. How the probabilities
//! are computed is the implementor's business.
//!
//! Policies are shared read-only across worker threads during a sweep, hence
//! `Send + Sync` and `&self` receivers throughout. Implementors that keep a
//! mode flag should use interior mutability (e.g. an atomic depth counter).

pub mod benchmark;

use rand::RngCore;

use crate::domain::{Action, ActionProbabilities, Position};
use crate::env::Observation;

pub use benchmark::FixedPolicy;

pub trait Policy: Send + Sync {
    /// Human-readable agent name used in reports.
    fn name(&self) -> &str;

    /// Number of learning updates this snapshot has undergone.
    fn generation(&self) -> u64;

    /// Disable exploration / gradient tracking. Always paired with
    /// [`exit_inference_mode`](Self::exit_inference_mode); prefer
    /// [`InferenceGuard`] over calling these directly.
    fn enter_inference_mode(&self) {}

    fn exit_inference_mode(&self) {}

    /// `[P(short), P(neutral), P(long)]` for the given state.
    fn action_probabilities(
        &self,
        observation: &Observation,
        position: Position,
    ) -> ActionProbabilities;

    /// Exploratory action: sampled from [`action_probabilities`](Self::action_probabilities).
    fn select_action(
        &self,
        observation: &Observation,
        position: Position,
        rng: &mut dyn RngCore,
    ) -> Action {
        self.action_probabilities(observation, position).sample(rng)
    }

    /// Greedy action: the most likely one.
    fn select_best_action(&self, observation: &Observation, position: Position) -> Action {
        self.action_probabilities(observation, position).best()
    }
}

/// Scoped inference mode: enters on construction, exits on drop.
///
/// Drop runs on early returns and during unwinding, so the policy is always
/// restored to training mode.
pub struct InferenceGuard<'a, P: Policy + ?Sized> {
    policy: &'a P,
}

impl<'a, P: Policy + ?Sized> InferenceGuard<'a, P> {
    pub fn enter(policy: &'a P) -> Self {
        policy.enter_inference_mode();
        Self { policy }
    }

    pub fn policy(&self) -> &'a P {
        self.policy
    }
}

impl<P: Policy + ?Sized> Drop for InferenceGuard<'_, P> {
    fn drop(&mut self) {
        self.policy.exit_inference_mode();
    }
}
