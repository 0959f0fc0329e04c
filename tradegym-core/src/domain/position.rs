//! Position, discrete action, and action-probability types.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DomainError;

/// Market exposure held by one environment: short, flat, or long.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum Position {
    Short,
    #[default]
    Neutral,
    Long,
}

impl Position {
    /// Signed exposure: -1, 0, +1.
    pub fn sign(self) -> i8 {
        match self {
            Position::Short => -1,
            Position::Neutral => 0,
            Position::Long => 1,
        }
    }

    /// Exposure as a float, used for observation encoding and reward scaling.
    pub fn as_f64(self) -> f64 {
        f64::from(self.sign())
    }

    pub fn is_neutral(self) -> bool {
        self == Position::Neutral
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Position::Short => write!(f, "Short"),
            Position::Neutral => write!(f, "Neutral"),
            Position::Long => write!(f, "Long"),
        }
    }
}

/// Discrete action emitted by a policy.
///
/// Index mapping follows the action space of the agents: 0 = Short,
/// 1 = Neutral, 2 = Long.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Short,
    Neutral,
    Long,
}

impl Action {
    pub const ALL: [Action; 3] = [Action::Short, Action::Neutral, Action::Long];

    pub fn index(self) -> usize {
        match self {
            Action::Short => 0,
            Action::Neutral => 1,
            Action::Long => 2,
        }
    }

    pub fn from_index(index: usize) -> Result<Self, DomainError> {
        match index {
            0 => Ok(Action::Short),
            1 => Ok(Action::Neutral),
            2 => Ok(Action::Long),
            other => Err(DomainError::InvalidAction(other)),
        }
    }

    /// The position the environment moves to when this action is taken.
    pub fn target_position(self) -> Position {
        match self {
            Action::Short => Position::Short,
            Action::Neutral => Position::Neutral,
            Action::Long => Position::Long,
        }
    }
}

impl From<Position> for Action {
    fn from(position: Position) -> Self {
        match position {
            Position::Short => Action::Short,
            Position::Neutral => Action::Neutral,
            Position::Long => Action::Long,
        }
    }
}

/// Ordered triple `[P(short), P(neutral), P(long)]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActionProbabilities(pub [f64; 3]);

impl ActionProbabilities {
    /// All mass on a single action.
    pub fn one_hot(action: Action) -> Self {
        let mut probs = [0.0; 3];
        probs[action.index()] = 1.0;
        Self(probs)
    }

    pub fn uniform() -> Self {
        Self([1.0 / 3.0; 3])
    }

    pub fn get(&self, action: Action) -> f64 {
        self.0[action.index()]
    }

    /// Most likely action. Ties resolve to the lowest index.
    pub fn best(&self) -> Action {
        let mut best = 0;
        for i in 1..3 {
            if self.0[i] > self.0[best] {
                best = i;
            }
        }
        Action::ALL[best]
    }

    /// Draw an action proportionally to the (possibly unnormalized) weights.
    ///
    /// Falls back to [`best`](Self::best) when the weights do not sum to a
    /// positive finite value.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Action {
        let total: f64 = self.0.iter().map(|p| p.max(0.0)).sum();
        if !total.is_finite() || total <= 0.0 {
            return self.best();
        }
        let mut draw = rng.gen::<f64>() * total;
        for action in Action::ALL {
            let weight = self.0[action.index()].max(0.0);
            if draw < weight {
                return action;
            }
            draw -= weight;
        }
        // Floating-point residue lands on the last action with mass.
        Action::ALL
            .into_iter()
            .rev()
            .find(|a| self.0[a.index()] > 0.0)
            .unwrap_or(Action::Neutral)
    }
}
