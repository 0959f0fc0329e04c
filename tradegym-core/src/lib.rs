//! TradeGym Core — market environment, cost model, windows and policy contract.
//!
//! This crate contains everything needed to replay one trading episode:
//! - Domain types (positions, actions, action probabilities, price series, windows)
//! - Transaction cost model for position switches
//! - The step/reset market environment with configurable observations and rewards
//! - Calendar-span window generation with look-back prefixes
//! - The `Policy` capability trait and fixed-rule benchmark policies
//! - A BLAKE3 seed hierarchy for reproducible sampling
//!
//! Orchestrating many episodes across a worker pool lives in `tradegym-runner`.

pub mod cost_model;
pub mod domain;
pub mod env;
pub mod error;
pub mod policy;
pub mod rng;
pub mod windows;

pub use cost_model::CostModel;
pub use domain::{Action, ActionProbabilities, Position, PricePoint, PriceSeries, Window};
pub use env::{EnvConfig, MarketEnvironment, Observation, StepOutcome};
pub use error::{DomainError, EnvError, StateError};
pub use policy::{FixedPolicy, InferenceGuard, Policy};
pub use rng::SeedHierarchy;
pub use windows::WindowSpan;
