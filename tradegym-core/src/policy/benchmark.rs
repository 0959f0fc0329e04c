//! Fixed-rule benchmark policies: buy-and-hold, sell-and-hold, stay-flat.

use crate::domain::{Action, ActionProbabilities, Position};
use crate::env::Observation;

use super::Policy;

/// Always takes the same action. Generation is fixed at 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedPolicy {
    action: Action,
    name: &'static str,
}

impl FixedPolicy {
    pub fn new(action: Action, name: &'static str) -> Self {
        Self { action, name }
    }

    /// Always long.
    pub fn buy_and_hold() -> Self {
        Self::new(Action::Long, "BuyAndHold")
    }

    /// Always short.
    pub fn sell_and_hold() -> Self {
        Self::new(Action::Short, "SellAndHold")
    }

    /// Never in the market.
    pub fn stay_flat() -> Self {
        Self::new(Action::Neutral, "StayFlat")
    }

    pub fn action(&self) -> Action {
        self.action
    }
}

impl Policy for FixedPolicy {
    fn name(&self) -> &str {
        self.name
    }

    fn generation(&self) -> u64 {
        0
    }

    fn action_probabilities(&self, _: &Observation, _: Position) -> ActionProbabilities {
        ActionProbabilities::one_hot(self.action)
    }
}
