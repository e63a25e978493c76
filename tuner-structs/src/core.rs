use crate::serializable_struct;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const MAX_MOMENTUM: f64 = 0.9;
pub const MAX_CLIP_THRESHOLD: f64 = 1.0;

/// The adaptive triple shared by every parameter in a group.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct HyperparameterState {
    pub learning_rate: f64,
    pub momentum: f64,
    pub clip_threshold: f64,
}

impl HyperparameterState {
    pub fn new(learning_rate: f64, momentum: f64, clip_threshold: f64) -> Self {
        Self {
            learning_rate,
            momentum,
            clip_threshold,
        }
    }

    /// Applies the momentum and clip ceilings.
    pub fn clamped(learning_rate: f64, momentum: f64, clip_threshold: f64) -> Self {
        Self {
            learning_rate,
            momentum: momentum.min(MAX_MOMENTUM),
            clip_threshold: clip_threshold.min(MAX_CLIP_THRESHOLD),
        }
    }

    pub fn get(&self, quantity: HyperparameterQuantity) -> f64 {
        match quantity {
            HyperparameterQuantity::LearningRate => self.learning_rate,
            HyperparameterQuantity::Momentum => self.momentum,
            HyperparameterQuantity::ClipThreshold => self.clip_threshold,
        }
    }

    /// Returns the name of the first violated invariant, if any.
    pub fn violated_invariant(&self) -> Option<&'static str> {
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            Some("learning_rate > 0")
        } else if !(0.0..=MAX_MOMENTUM).contains(&self.momentum) {
            Some("0 <= momentum <= 0.9")
        } else if !(self.clip_threshold <= MAX_CLIP_THRESHOLD) {
            Some("clip_threshold <= 1.0")
        } else {
            None
        }
    }
}

impl Default for HyperparameterState {
    fn default() -> Self {
        Self::new(1.0, 0.0, 1.0)
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum HyperparameterQuantity {
    LearningRate,
    Momentum,
    ClipThreshold,
}

impl HyperparameterQuantity {
    pub const ALL: [HyperparameterQuantity; 3] = [
        HyperparameterQuantity::LearningRate,
        HyperparameterQuantity::Momentum,
        HyperparameterQuantity::ClipThreshold,
    ];
}

impl fmt::Display for HyperparameterQuantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HyperparameterQuantity::LearningRate => write!(f, "learning_rate"),
            HyperparameterQuantity::Momentum => write!(f, "momentum"),
            HyperparameterQuantity::ClipThreshold => write!(f, "clip_threshold"),
        }
    }
}

serializable_struct! {
    /// Everything observed and derived for one group at one iteration.
    IterationRecord {
        hyperparameters: HyperparameterState,
        curvature: f64,
        curvature_sum: f64,
        smoothed_max_curvature: f64,
        /// Latest dynamic range, held between momentum recomputes.
        dynamic_range: Option<f64>,
        step_magnitude: f64,
    }
}

serializable_struct! {
    /// Per-group time series, one entry per iteration in iteration order.
    RunDiagnostics {
        group_id: usize,
        learning_rate: Vec<f64>,
        momentum: Vec<f64>,
        clip_threshold: Vec<f64>,
        curvature: Vec<f64>,
        curvature_sum: Vec<f64>,
        smoothed_max_curvature: Vec<f64>,
        dynamic_range: Vec<Option<f64>>,
        step_magnitude: Vec<f64>,
    }
}

impl RunDiagnostics {
    pub fn new(group_id: usize) -> Self {
        Self {
            group_id,
            learning_rate: Vec::new(),
            momentum: Vec::new(),
            clip_threshold: Vec::new(),
            curvature: Vec::new(),
            curvature_sum: Vec::new(),
            smoothed_max_curvature: Vec::new(),
            dynamic_range: Vec::new(),
            step_magnitude: Vec::new(),
        }
    }

    pub fn push(&mut self, record: &IterationRecord) {
        self.learning_rate.push(record.hyperparameters.learning_rate);
        self.momentum.push(record.hyperparameters.momentum);
        self.clip_threshold.push(record.hyperparameters.clip_threshold);
        self.curvature.push(record.curvature);
        self.curvature_sum.push(record.curvature_sum);
        self.smoothed_max_curvature.push(record.smoothed_max_curvature);
        self.dynamic_range.push(record.dynamic_range);
        self.step_magnitude.push(record.step_magnitude);
    }

    pub fn len(&self) -> usize {
        self.learning_rate.len()
    }

    pub fn is_empty(&self) -> bool {
        self.learning_rate.is_empty()
    }
}

serializable_struct! {
    LossHistory {
        loss: Vec<f64>,
    }
}
