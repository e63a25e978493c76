use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{fmt, str::FromStr};
use tuner_utils::load_json_arg;

/// Construction-time options of the tuner.
///
/// Integer periods are signed so that a non-positive value survives parsing and is rejected
/// by validation with a precise message rather than a serde type error.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TunerConfig {
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    #[serde(default = "default_high_pct")]
    pub high_pct: f64,
    #[serde(default = "default_low_pct")]
    pub low_pct: f64,
    #[serde(default = "default_gamma")]
    pub gamma: f64,
    #[serde(default = "default_mu_update_interval")]
    pub mu_update_interval: i64,
    #[serde(default = "default_slow_start_iters")]
    pub slow_start_iters: i64,
    #[serde(default = "default_curvature_window")]
    pub curvature_window: i64,
    #[serde(default = "default_group_boundaries")]
    pub group_boundaries: String,
    #[serde(default = "default_optimizer")]
    pub optimizer: String,
    #[serde(default = "default_injection")]
    pub injection: String,
    #[serde(default = "default_initial_learning_rate")]
    pub initial_learning_rate: f64,
    #[serde(default)]
    pub initial_momentum: f64,
    #[serde(default = "default_initial_clip_threshold")]
    pub initial_clip_threshold: f64,
}

fn default_alpha() -> f64 {
    10.0
}
fn default_high_pct() -> f64 {
    99.5
}
fn default_low_pct() -> f64 {
    0.5
}
fn default_gamma() -> f64 {
    0.1
}
fn default_mu_update_interval() -> i64 {
    10
}
fn default_slow_start_iters() -> i64 {
    200
}
fn default_curvature_window() -> i64 {
    10
}
fn default_group_boundaries() -> String {
    GroupingStrategy::PerParameter.to_string()
}
fn default_optimizer() -> String {
    OptimizerKind::Momentum.to_string()
}
fn default_injection() -> String {
    InjectionMode::Direct.to_string()
}
fn default_initial_learning_rate() -> f64 {
    1.0
}
fn default_initial_clip_threshold() -> f64 {
    1.0
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            alpha: default_alpha(),
            high_pct: default_high_pct(),
            low_pct: default_low_pct(),
            gamma: default_gamma(),
            mu_update_interval: default_mu_update_interval(),
            slow_start_iters: default_slow_start_iters(),
            curvature_window: default_curvature_window(),
            group_boundaries: default_group_boundaries(),
            optimizer: default_optimizer(),
            injection: default_injection(),
            initial_learning_rate: default_initial_learning_rate(),
            initial_momentum: 0.0,
            initial_clip_threshold: default_initial_clip_threshold(),
        }
    }
}

impl TunerConfig {
    pub fn from_hyperparameters(hyperparameters: &Option<Map<String, Value>>) -> Result<Self> {
        match hyperparameters {
            Some(hyperparams) => serde_json::from_value::<TunerConfig>(Value::Object(hyperparams.clone()))
                .map_err(|e| anyhow!("Failed to parse hyperparameters: {}", e)),
            None => Ok(Self::default()),
        }
    }

    /// Inline json string or path to a `.json` file.
    pub fn from_json_arg(arg: &str) -> Result<Self> {
        load_json_arg::<TunerConfig>(arg)
    }
}

/// How a flat parameter list is partitioned into groups sharing one hyperparameter triple.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GroupingStrategy {
    PerParameter,
    Bundle,
    Global,
}

impl fmt::Display for GroupingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupingStrategy::PerParameter => write!(f, "per_parameter"),
            GroupingStrategy::Bundle => write!(f, "bundle"),
            GroupingStrategy::Global => write!(f, "global"),
        }
    }
}

impl FromStr for GroupingStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "per_parameter" | "meta-per-layer" => Ok(GroupingStrategy::PerParameter),
            "bundle" | "meta-bundle" => Ok(GroupingStrategy::Bundle),
            "global" | "meta" => Ok(GroupingStrategy::Global),
            other => Err(other.to_string()),
        }
    }
}

/// The update primitive driven by the tuned hyperparameters.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerKind {
    Momentum,
}

impl fmt::Display for OptimizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptimizerKind::Momentum => write!(f, "momentum"),
        }
    }
}

impl FromStr for OptimizerKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "momentum" => Ok(OptimizerKind::Momentum),
            other => Err(other.to_string()),
        }
    }
}

/// Whether freshly estimated hyperparameters become current inside `step` or wait for the
/// collaborator to take them through a feed.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InjectionMode {
    Direct,
    Feed,
}

impl fmt::Display for InjectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InjectionMode::Direct => write!(f, "direct"),
            InjectionMode::Feed => write!(f, "feed"),
        }
    }
}

impl FromStr for InjectionMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "direct" => Ok(InjectionMode::Direct),
            "feed" => Ok(InjectionMode::Feed),
            other => Err(other.to_string()),
        }
    }
}
