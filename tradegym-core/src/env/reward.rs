//! Reward models — how a price move and a position change become a reward.
//!
//! Balance accounting always follows the log-return model; the reward model
//! only shapes the number handed back to the learner.

use serde::{Deserialize, Serialize};

use crate::cost_model::CostModel;
use crate::domain::Position;

/// One step's price move and position transition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketMove {
    pub previous_close: f64,
    pub close: f64,
    pub previous: Position,
    pub next: Position,
}

impl MarketMove {
    /// `ln(close / previous_close)`, or 0 when the ratio is undefined.
    pub fn log_return(&self) -> f64 {
        if self.previous_close == 0.0 {
            return 0.0;
        }
        let ratio = self.close / self.previous_close;
        if ratio > 0.0 && ratio.is_finite() {
            ratio.ln()
        } else {
            0.0
        }
    }

    /// `(close - previous_close) / previous_close`, or 0 when undefined.
    pub fn simple_return(&self) -> f64 {
        if self.previous_close == 0.0 {
            return 0.0;
        }
        (self.close - self.previous_close) / self.previous_close
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RewardModel {
    /// `log_return * position * leverage + log_cost`.
    #[default]
    LogReturn,
    /// Simple return scaled up, with an asymmetric loss penalty, a switching
    /// penalty and a small bonus for holding a position.
    Shaped {
        scale: f64,
        loss_penalty: f64,
        hold_bonus: f64,
        switch_penalty: f64,
    },
}

impl RewardModel {
    pub fn shaped() -> Self {
        RewardModel::Shaped {
            scale: 1000.0,
            loss_penalty: 1.5,
            hold_bonus: 1.0,
            switch_penalty: 10.0,
        }
    }

    pub fn reward(&self, mv: &MarketMove, leverage: f64, cost: &CostModel) -> f64 {
        match *self {
            RewardModel::LogReturn => {
                mv.log_return() * mv.next.as_f64() * leverage + cost.log_cost(mv.previous, mv.next)
            }
            RewardModel::Shaped {
                scale,
                loss_penalty,
                hold_bonus,
                switch_penalty,
            } => {
                let mut reward = mv.simple_return() * mv.next.as_f64() * leverage * scale;
                if reward < 0.0 {
                    reward *= loss_penalty;
                }
                let rate = cost.provision_rate();
                if CostModel::is_entry(mv.previous, mv.next) {
                    reward -= rate * switch_penalty;
                } else if mv.previous == mv.next && !mv.next.is_neutral() {
                    reward += rate * hold_bonus;
                }
                reward
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Position::*;

    fn mv(previous_close: f64, close: f64, previous: Position, next: Position) -> MarketMove {
        MarketMove {
            previous_close,
            close,
            previous,
            next,
        }
    }

    #[test]
    fn log_return_guards_zero_price() {
        assert_eq!(mv(0.0, 10.0, Neutral, Long).log_return(), 0.0);
        assert_eq!(mv(10.0, 0.0, Neutral, Long).log_return(), 0.0);
        assert!((mv(100.0, 101.0, Neutral, Long).log_return() - (1.01_f64).ln()).abs() < 1e-15);
    }

    #[test]
    fn log_reward_signs_by_position() {
        let cost = CostModel::frictionless();
        let m = RewardModel::LogReturn;
        let up = (1.01_f64).ln();
        assert!((m.reward(&mv(100.0, 101.0, Long, Long), 1.0, &cost) - up).abs() < 1e-15);
        assert!((m.reward(&mv(100.0, 101.0, Short, Short), 1.0, &cost) + up).abs() < 1e-15);
        assert_eq!(m.reward(&mv(100.0, 101.0, Long, Neutral), 1.0, &cost), 0.0);
    }

    #[test]
    fn log_reward_applies_leverage_then_cost() {
        let cost = CostModel::new(0.01).unwrap();
        let r = RewardModel::LogReturn.reward(&mv(100.0, 101.0, Neutral, Long), 3.0, &cost);
        let expected = 3.0 * (1.01_f64).ln() + (0.99_f64).ln();
        assert!((r - expected).abs() < 1e-15);
    }

    #[test]
    fn shaped_penalizes_losses_and_switches() {
        let cost = CostModel::new(0.001).unwrap();
        let m = RewardModel::shaped();
        // Long into a 1% drop: -0.01 * 1000 * 1.5 = -15, minus switch 0.01
        let r = m.reward(&mv(100.0, 99.0, Neutral, Long), 1.0, &cost);
        assert!((r - (-15.0 - 0.01)).abs() < 1e-9);
        // Holding long into a 1% rise: 10 + hold bonus 0.001
        let r = m.reward(&mv(100.0, 101.0, Long, Long), 1.0, &cost);
        assert!((r - 10.001).abs() < 1e-9);
        // Neutral earns nothing.
        assert_eq!(m.reward(&mv(100.0, 101.0, Neutral, Neutral), 1.0, &cost), 0.0);
    }
}
