//! Serializable backtest configuration.
//!
//! `BacktestParams` carries everything one episode needs; `SweepConfig` adds
//! the orchestration knobs (worker count, master seed, window span) and is
//! loaded from TOML:
//!
//! ```toml
//! workers = 8
//! seed = 7
//! window_span = "1Y"
//!
//! [params]
//! look_back = 30
//! provision_rate = 0.0005
//! action_mode = "sampled"
//!
//! [[params.features]]
//! column = "close"
//! transform = "standardize"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use tradegym_core::env::{EnvConfig, FeatureSpec, RewardModel};
use tradegym_core::windows::WindowSpan;
use tradegym_core::DomainError;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid parameters: {0}")]
    Domain(#[from] DomainError),
    #[error("at least one observation feature is required")]
    NoFeatures,
    #[error("worker count must be at least 1")]
    ZeroWorkers,
}

/// How the runner turns probabilities into actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionMode {
    /// Deterministic argmax.
    #[default]
    Best,
    /// Draw from the policy's distribution with a per-task seeded RNG.
    Sampled,
}

/// Parameters of a single backtest episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestParams {
    pub look_back: usize,
    pub provision_rate: f64,
    pub leverage: f64,
    pub initial_balance: f64,
    pub reward_scaling: f64,
    pub reward_model: RewardModel,
    pub action_mode: ActionMode,
    pub features: Vec<FeatureSpec>,
    pub price_column: String,
    pub include_position: bool,
}

impl Default for BacktestParams {
    fn default() -> Self {
        let env = EnvConfig::default();
        Self {
            look_back: env.look_back,
            provision_rate: env.provision_rate,
            leverage: env.leverage,
            initial_balance: env.initial_balance,
            reward_scaling: env.reward_scaling,
            reward_model: env.reward_model,
            action_mode: ActionMode::Best,
            features: env.features,
            price_column: env.price_column,
            include_position: env.include_position,
        }
    }
}

impl BacktestParams {
    /// Reject anything that would make every task fail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.features.is_empty() {
            return Err(ConfigError::NoFeatures);
        }
        self.to_env_config().validate()?;
        Ok(())
    }

    pub fn to_env_config(&self) -> EnvConfig {
        EnvConfig {
            look_back: self.look_back,
            provision_rate: self.provision_rate,
            leverage: self.leverage,
            initial_balance: self.initial_balance,
            reward_scaling: self.reward_scaling,
            reward_model: self.reward_model,
            features: self.features.clone(),
            price_column: self.price_column.clone(),
            include_position: self.include_position,
        }
    }
}

/// Orchestration settings for a multi-window sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub workers: usize,
    pub seed: u64,
    pub window_span: WindowSpan,
    pub params: BacktestParams,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            seed: 42,
            window_span: WindowSpan::Months(6),
            params: BacktestParams::default(),
        }
    }
}

impl SweepConfig {
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: SweepConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        self.params.validate()
    }
}
