use crate::error::{TunerError, TunerResult};
use tuner_structs::{
    config::{GroupingStrategy, InjectionMode, OptimizerKind, TunerConfig},
    core::HyperparameterState,
};

/// A [`TunerConfig`] whose selectors have been resolved and whose values have been checked.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub alpha: f64,
    pub high_pct: f64,
    pub low_pct: f64,
    pub gamma: f64,
    pub mu_update_interval: usize,
    pub slow_start_iters: usize,
    pub curvature_window: usize,
    pub grouping: GroupingStrategy,
    pub optimizer: OptimizerKind,
    pub injection: InjectionMode,
    pub initial: HyperparameterState,
}

impl Default for Settings {
    fn default() -> Self {
        // defaults of TunerConfig always validate
        Self {
            alpha: 10.0,
            high_pct: 99.5,
            low_pct: 0.5,
            gamma: 0.1,
            mu_update_interval: 10,
            slow_start_iters: 200,
            curvature_window: 10,
            grouping: GroupingStrategy::PerParameter,
            optimizer: OptimizerKind::Momentum,
            injection: InjectionMode::Direct,
            initial: HyperparameterState::default(),
        }
    }
}

impl Settings {
    /// Checks every value a unit relies on.
    pub fn validate(&self) -> TunerResult<()> {
        positive_f64("alpha", self.alpha)?;
        positive_f64("gamma", self.gamma)?;
        positive_count("mu_update_interval", self.mu_update_interval)?;
        positive_count("slow_start_iters", self.slow_start_iters)?;
        positive_count("curvature_window", self.curvature_window)?;
        if !(self.low_pct >= 0.0 && self.low_pct < self.high_pct && self.high_pct <= 100.0) {
            return Err(TunerError::InvalidSetting {
                name: "high_pct/low_pct",
                value: format!("{}/{}", self.high_pct, self.low_pct),
                requirement: "0 <= low_pct < high_pct <= 100",
            });
        }
        if let Some(invariant) = self.initial.violated_invariant() {
            return Err(TunerError::InvalidSetting {
                name: "initial hyperparameters",
                value: format!("{:?}", self.initial),
                requirement: invariant,
            });
        }
        Ok(())
    }
}

impl TryFrom<&TunerConfig> for Settings {
    type Error = TunerError;

    fn try_from(config: &TunerConfig) -> TunerResult<Self> {
        let optimizer = config
            .optimizer
            .parse::<OptimizerKind>()
            .map_err(|kind| TunerError::UnsupportedOptimizer { kind })?;
        let grouping = config
            .group_boundaries
            .parse::<GroupingStrategy>()
            .map_err(|strategy| TunerError::UnsupportedGrouping { strategy })?;
        let injection = config
            .injection
            .parse::<InjectionMode>()
            .map_err(|mode| TunerError::UnsupportedInjection { mode })?;

        let settings = Self {
            alpha: config.alpha,
            high_pct: config.high_pct,
            low_pct: config.low_pct,
            gamma: config.gamma,
            mu_update_interval: positive_period("mu_update_interval", config.mu_update_interval)?,
            slow_start_iters: positive_period("slow_start_iters", config.slow_start_iters)?,
            curvature_window: positive_period("curvature_window", config.curvature_window)?,
            grouping,
            optimizer,
            injection,
            initial: HyperparameterState::new(
                config.initial_learning_rate,
                config.initial_momentum,
                config.initial_clip_threshold,
            ),
        };
        settings.validate()?;
        Ok(settings)
    }
}

impl TryFrom<TunerConfig> for Settings {
    type Error = TunerError;

    fn try_from(config: TunerConfig) -> TunerResult<Self> {
        Settings::try_from(&config)
    }
}

pub(crate) fn positive_f64(name: &'static str, value: f64) -> TunerResult<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(TunerError::InvalidSetting {
            name,
            value: value.to_string(),
            requirement: "finite and > 0",
        })
    }
}

pub(crate) fn positive_period(name: &'static str, value: i64) -> TunerResult<usize> {
    if value > 0 {
        Ok(value as usize)
    } else {
        Err(TunerError::InvalidSetting {
            name,
            value: value.to_string(),
            requirement: "> 0",
        })
    }
}

fn positive_count(name: &'static str, value: usize) -> TunerResult<usize> {
    if value > 0 {
        Ok(value)
    } else {
        Err(TunerError::InvalidSetting {
            name,
            value: value.to_string(),
            requirement: "> 0",
        })
    }
}
