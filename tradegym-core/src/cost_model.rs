//! Cost model — proportional provision charged when a position is opened.
//!
//! Costs are expressed in log space so they add directly to a log-return
//! reward: entering a non-neutral position costs `ln(1 - provision_rate)`.
//! Holding and closing (moving to Neutral) are free.

use serde::{Deserialize, Serialize};

use crate::domain::Position;
use crate::error::DomainError;

/// Log-cost of moving from `previous` to `next` at `provision_rate`.
///
/// Fails with `InvalidProvision` unless `provision_rate` is in `[0, 1)`.
pub fn cost(previous: Position, next: Position, provision_rate: f64) -> Result<f64, DomainError> {
    Ok(CostModel::new(provision_rate)?.log_cost(previous, next))
}

/// Validated provision rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostModel {
    provision_rate: f64,
}

impl CostModel {
    pub fn new(provision_rate: f64) -> Result<Self, DomainError> {
        // NaN fails both comparisons and is rejected too.
        if !(0.0..1.0).contains(&provision_rate) {
            return Err(DomainError::InvalidProvision(provision_rate));
        }
        Ok(Self { provision_rate })
    }

    pub fn frictionless() -> Self {
        Self { provision_rate: 0.0 }
    }

    pub fn provision_rate(&self) -> f64 {
        self.provision_rate
    }

    /// True when the transition opens a new non-neutral position.
    ///
    /// Neutral→Neutral and repeats of the same position never count.
    pub fn is_entry(previous: Position, next: Position) -> bool {
        previous != next && !next.is_neutral()
    }

    /// Log-cost of the transition: `ln(1 - rate)` on entry, 0 otherwise.
    pub fn log_cost(&self, previous: Position, next: Position) -> f64 {
        if Self::is_entry(previous, next) {
            (1.0 - self.provision_rate).ln()
        } else {
            0.0
        }
    }

    /// Currency withheld by the provision when `gross_balance` is carried
    /// through the transition.
    pub fn provision_paid(&self, gross_balance: f64, previous: Position, next: Position) -> f64 {
        if Self::is_entry(previous, next) {
            gross_balance * self.provision_rate
        } else {
            0.0
        }
    }
}

impl Default for CostModel {
    fn default() -> Self {
        Self::frictionless()
    }
}
