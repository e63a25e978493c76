use crate::{
    error::{TunerError, TunerResult},
    settings::{positive_f64, positive_period, Settings},
};
use ndarray::Array1;
use tuner_structs::core::{HyperparameterState, IterationRecord};
use tuner_utils::{percentile, sorted_nonzero};

const CURVATURE_EPS: f64 = 1e-6;
const DYNAMIC_RANGE_EPS: f64 = 1e-9;

/// Linear warm-up factor, reaching 1.0 at `iteration == slow_start_iters - 1`.
pub fn ramp(iteration: usize, slow_start_iters: usize) -> f64 {
    ((iteration + 1) as f64 / slow_start_iters as f64).min(1.0)
}

pub fn learning_rate(alpha: f64, ramp: f64, curvature_sum: f64) -> f64 {
    alpha * ramp / (curvature_sum + CURVATURE_EPS).sqrt()
}

/// Momentum from the condition number of a diagonal quadratic whose extreme curvatures are
/// `dynamic_range`: `((sqrt(dr) - 1) / (sqrt(dr) + 1))^2`.
pub fn momentum_from_dynamic_range(dynamic_range: f64) -> f64 {
    let root = dynamic_range.sqrt();
    ((root - 1.0) / (root + 1.0)).powi(2)
}

/// `sqrt(pct_max / (pct_min + eps))` over the non-zero entries of `accumulator`.
pub fn dynamic_range(accumulator: &Array1<f64>, high_pct: f64, low_pct: f64) -> Option<f64> {
    let nonzero = sorted_nonzero(accumulator.iter());
    let pct_max = percentile(&nonzero, high_pct)?;
    let pct_min = percentile(&nonzero, low_pct)?;
    Some((pct_max / (pct_min + DYNAMIC_RANGE_EPS)).sqrt())
}

/// Statistics of one group through the current iteration, current gradients included.
#[derive(Debug, Clone, Copy)]
pub struct Observation<'a> {
    pub iteration: usize,
    pub curvature: f64,
    pub curvature_sum: f64,
    pub window_max: f64,
    pub accumulator: &'a Array1<f64>,
    /// Momentum to keep on iterations that do not recompute it.
    pub held_momentum: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Estimate {
    pub hyperparameters: HyperparameterState,
    pub smoothed_max_curvature: f64,
    pub dynamic_range: Option<f64>,
    pub record: IterationRecord,
}

/// Turns accumulated statistics into the next (learning rate, momentum, clip threshold).
#[derive(Debug, Clone, PartialEq)]
pub struct HyperparameterEstimator {
    group_id: usize,
    alpha: f64,
    high_pct: f64,
    low_pct: f64,
    gamma: f64,
    mu_update_interval: usize,
    slow_start_iters: usize,
    smoothed_max_curvature: Option<f64>,
    dynamic_range: Option<f64>,
}

impl HyperparameterEstimator {
    pub fn new(group_id: usize, settings: &Settings) -> Self {
        Self {
            group_id,
            alpha: settings.alpha,
            high_pct: settings.high_pct,
            low_pct: settings.low_pct,
            gamma: settings.gamma,
            mu_update_interval: settings.mu_update_interval,
            slow_start_iters: settings.slow_start_iters,
            smoothed_max_curvature: None,
            dynamic_range: None,
        }
    }

    pub fn set_alpha(&mut self, alpha: f64) -> TunerResult<()> {
        self.alpha = positive_f64("alpha", alpha)?;
        Ok(())
    }

    pub fn set_slow_start_iters(&mut self, slow_start_iters: i64) -> TunerResult<()> {
        self.slow_start_iters = positive_period("slow_start_iters", slow_start_iters)?;
        Ok(())
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn slow_start_iters(&self) -> usize {
        self.slow_start_iters
    }

    pub fn smoothed_max_curvature(&self) -> Option<f64> {
        self.smoothed_max_curvature
    }

    pub fn dynamic_range(&self) -> Option<f64> {
        self.dynamic_range
    }

    pub fn recomputes_momentum(&self, iteration: usize) -> bool {
        iteration > 0 && iteration % self.mu_update_interval == 0
    }

    /// Polynomially decaying blend of the windowed max curvature, weight `(t + 1)^-gamma`.
    pub fn smooth_max_curvature(&self, iteration: usize, window_max: f64) -> f64 {
        match self.smoothed_max_curvature {
            None => window_max,
            Some(previous) => {
                let beta = (1.0 / (iteration + 1) as f64).powf(self.gamma);
                beta * window_max + (1.0 - beta) * previous
            }
        }
    }

    /// Computes the next triple without touching the estimator's own state.
    pub fn estimate(&self, observation: &Observation) -> TunerResult<Estimate> {
        let Observation {
            iteration,
            curvature,
            curvature_sum,
            window_max,
            accumulator,
            held_momentum,
        } = *observation;

        // each curvature is finite, but their sum or blend can still overflow
        self.check_finite("curvature_sum", curvature_sum)?;
        let smoothed_max_curvature = self.smooth_max_curvature(iteration, window_max);
        self.check_finite("smoothed_max_curvature", smoothed_max_curvature)?;

        let (momentum, dynamic_range) = if self.recomputes_momentum(iteration) {
            let dr = dynamic_range(accumulator, self.high_pct, self.low_pct).ok_or(
                TunerError::DegenerateStatistics {
                    group_id: self.group_id,
                    statistic: "gradient_variance",
                    iteration,
                },
            )?;
            (momentum_from_dynamic_range(dr), Some(dr))
        } else {
            (held_momentum, self.dynamic_range)
        };

        let lr = learning_rate(
            self.alpha,
            ramp(iteration, self.slow_start_iters),
            curvature_sum,
        );
        if !(lr.is_finite() && lr > 0.0) {
            return Err(TunerError::NonFiniteValue {
                group_id: Some(self.group_id),
                quantity: "learning_rate",
                value: lr,
            });
        }
        let clip_threshold = lr * smoothed_max_curvature.sqrt();
        let hyperparameters = HyperparameterState::clamped(lr, momentum, clip_threshold);

        Ok(Estimate {
            hyperparameters,
            smoothed_max_curvature,
            dynamic_range,
            record: IterationRecord {
                hyperparameters,
                curvature,
                curvature_sum,
                smoothed_max_curvature,
                dynamic_range,
                step_magnitude: lr * curvature.sqrt(),
            },
        })
    }

    fn check_finite(&self, quantity: &'static str, value: f64) -> TunerResult<()> {
        if value.is_finite() {
            Ok(())
        } else {
            Err(TunerError::NonFiniteValue {
                group_id: Some(self.group_id),
                quantity,
                value,
            })
        }
    }

    pub fn commit(&mut self, estimate: &Estimate) {
        self.smoothed_max_curvature = Some(estimate.smoothed_max_curvature);
        self.dynamic_range = estimate.dynamic_range;
    }
}
