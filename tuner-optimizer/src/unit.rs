use crate::{
    curvature::CurvatureTracker,
    error::{TunerError, TunerResult},
    estimator::{Estimate, HyperparameterEstimator, Observation},
    gradient::{Gradient, Parameter, ParameterGroup},
    momentum::{clip_by_global_norm, update_rule, UpdateRule},
    settings::Settings,
};
use ndarray::{Array1, ArrayD};
use tuner_structs::{
    config::InjectionMode,
    core::{HyperparameterState, RunDiagnostics},
};

#[derive(Debug, Clone)]
struct BoundGroup {
    parameters: Vec<Parameter>,
    velocities: Vec<ArrayD<f64>>,
    /// Running sum of squared gradients, one entry per coordinate of the flattened group.
    accumulator: Array1<f64>,
}

/// What a successful step changed.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedUpdate {
    pub group_id: usize,
    /// Per-parameter deltas, i.e. the new velocities.
    pub deltas: Vec<ArrayD<f64>>,
    pub global_norm: f64,
    pub clip_factor: f64,
    /// Hyperparameters the step was taken with.
    pub used: HyperparameterState,
    /// Hyperparameters estimated for the next step.
    pub next: HyperparameterState,
}

/// A fully computed step that has not been committed yet.
#[derive(Debug, Clone)]
pub(crate) struct PreparedStep {
    parameters: Vec<ArrayD<f64>>,
    velocities: Vec<ArrayD<f64>>,
    accumulator: Array1<f64>,
    curvature: f64,
    global_norm: f64,
    clip_factor: f64,
    estimate: Estimate,
}

/// Binds one parameter group to its curvature statistics, its estimator and a momentum update.
#[derive(Debug)]
pub struct OptimizerUnit {
    id: usize,
    curvature_window: usize,
    injection: InjectionMode,
    rule: Box<dyn UpdateRule>,
    tracker: CurvatureTracker,
    estimator: HyperparameterEstimator,
    current: HyperparameterState,
    pending: Option<HyperparameterState>,
    group: Option<BoundGroup>,
    diagnostics: RunDiagnostics,
    iteration: usize,
}

impl OptimizerUnit {
    pub fn new(id: usize, settings: &Settings) -> TunerResult<Self> {
        settings.validate()?;
        Ok(Self {
            id,
            curvature_window: settings.curvature_window,
            injection: settings.injection,
            rule: update_rule(settings.optimizer),
            tracker: CurvatureTracker::new(id),
            estimator: HyperparameterEstimator::new(id, settings),
            current: settings.initial,
            pending: None,
            group: None,
            diagnostics: RunDiagnostics::new(id),
            iteration: 0,
        })
    }

    pub fn bind(&mut self, group: ParameterGroup) -> TunerResult<()> {
        if self.group.is_some() {
            return Err(TunerError::AlreadyBound { group_id: self.id });
        }
        if group.is_empty() {
            return Err(TunerError::EmptyGroup { group_id: self.id });
        }
        let accumulator = Array1::zeros(group.num_coordinates());
        let parameters = group.into_parameters();
        let velocities = parameters
            .iter()
            .map(|p| ArrayD::zeros(p.value.raw_dim()))
            .collect();
        self.group = Some(BoundGroup {
            parameters,
            velocities,
            accumulator,
        });
        Ok(())
    }

    pub fn step(&mut self, gradients: &[Gradient]) -> TunerResult<AppliedUpdate> {
        let prepared = self.prepare(gradients)?;
        Ok(self.commit(prepared))
    }

    pub(crate) fn prepare(&self, gradients: &[Gradient]) -> TunerResult<PreparedStep> {
        let group = self
            .group
            .as_ref()
            .ok_or(TunerError::UnboundUnit { group_id: self.id })?;
        if self.pending.is_some() {
            return Err(TunerError::PendingInjection { group_id: self.id });
        }
        if gradients.len() != group.parameters.len() {
            return Err(TunerError::GradientCountMismatch {
                group_id: self.id,
                expected: group.parameters.len(),
                actual: gradients.len(),
            });
        }

        let mut dense = Vec::with_capacity(gradients.len());
        for (index, (gradient, parameter)) in gradients.iter().zip(&group.parameters).enumerate() {
            let gradient = gradient.densify()?;
            if gradient.shape() != parameter.shape() {
                return Err(TunerError::GradientShapeMismatch {
                    group_id: self.id,
                    index,
                    expected: parameter.shape().to_vec(),
                    actual: gradient.shape().to_vec(),
                });
            }
            dense.push(gradient);
        }

        let squared: Array1<f64> = dense
            .iter()
            .flat_map(|g| g.iter().map(|&v| v * v))
            .collect();
        let curvature = squared.sum();
        self.tracker.check(curvature)?;

        let (clipped, global_norm, clip_factor) =
            clip_by_global_norm(&dense, self.current.clip_threshold);
        let (parameters, velocities): (Vec<ArrayD<f64>>, Vec<ArrayD<f64>>) = group
            .parameters
            .iter()
            .zip(&group.velocities)
            .zip(&clipped)
            .map(|((parameter, velocity), gradient)| {
                self.rule
                    .apply(&parameter.value, velocity, gradient, &self.current)
            })
            .unzip();

        let accumulator = &group.accumulator + &squared;
        let (window_max, _) = self
            .tracker
            .window_extrema_with(curvature, self.curvature_window);
        let estimate = self.estimator.estimate(&Observation {
            iteration: self.iteration,
            curvature,
            curvature_sum: self.tracker.sum() + curvature,
            window_max,
            accumulator: &accumulator,
            held_momentum: self.current.momentum,
        })?;

        Ok(PreparedStep {
            parameters,
            velocities,
            accumulator,
            curvature,
            global_norm,
            clip_factor,
            estimate,
        })
    }

    /// Applies a step produced by [`OptimizerUnit::prepare`]. Cannot fail.
    pub(crate) fn commit(&mut self, prepared: PreparedStep) -> AppliedUpdate {
        let PreparedStep {
            parameters,
            velocities,
            accumulator,
            curvature,
            global_norm,
            clip_factor,
            estimate,
        } = prepared;

        if let Some(group) = self.group.as_mut() {
            for (parameter, value) in group.parameters.iter_mut().zip(parameters) {
                parameter.value = value;
            }
            group.velocities = velocities.clone();
            group.accumulator = accumulator;
        }
        self.tracker.push(curvature);
        self.estimator.commit(&estimate);
        self.diagnostics.push(&estimate.record);

        let used = self.current;
        let next = estimate.hyperparameters;
        match self.injection {
            InjectionMode::Direct => self.current = next,
            InjectionMode::Feed => self.pending = Some(next),
        }
        log::debug!(
            "group {} iteration {}: curvature {:.4e}, lr {:.4e}, mu {:.4}, clip {:.4e}",
            self.id,
            self.iteration,
            curvature,
            next.learning_rate,
            next.momentum,
            next.clip_threshold
        );
        self.iteration += 1;

        AppliedUpdate {
            group_id: self.id,
            deltas: velocities,
            global_norm,
            clip_factor,
            used,
            next,
        }
    }

    /// Overrides the current triple. Any pending feed is discarded.
    pub fn assign(&mut self, state: HyperparameterState) -> TunerResult<()> {
        if let Some(invariant) = state.violated_invariant() {
            return Err(TunerError::InvalidHyperparameters {
                group_id: self.id,
                invariant,
            });
        }
        self.current = state;
        self.pending = None;
        Ok(())
    }

    /// Makes the pending triple current, returning it.
    pub fn promote_pending(&mut self) -> Option<HyperparameterState> {
        let pending = self.pending.take()?;
        self.current = pending;
        Some(pending)
    }

    pub fn set_alpha(&mut self, alpha: f64) -> TunerResult<()> {
        self.estimator.set_alpha(alpha)
    }

    pub fn set_slow_start_iters(&mut self, slow_start_iters: i64) -> TunerResult<()> {
        self.estimator.set_slow_start_iters(slow_start_iters)
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn is_bound(&self) -> bool {
        self.group.is_some()
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Hyperparameters the next step will use.
    pub fn current(&self) -> HyperparameterState {
        self.current
    }

    pub fn pending(&self) -> Option<HyperparameterState> {
        self.pending
    }

    /// The most recently estimated triple, whether or not it has been injected.
    pub fn latest(&self) -> HyperparameterState {
        self.pending.unwrap_or(self.current)
    }

    pub fn tracker(&self) -> &CurvatureTracker {
        &self.tracker
    }

    pub fn estimator(&self) -> &HyperparameterEstimator {
        &self.estimator
    }

    pub fn diagnostics(&self) -> &RunDiagnostics {
        &self.diagnostics
    }

    pub fn parameters(&self) -> &[Parameter] {
        self.group
            .as_ref()
            .map(|g| g.parameters.as_slice())
            .unwrap_or(&[])
    }

    pub fn velocities(&self) -> &[ArrayD<f64>] {
        self.group
            .as_ref()
            .map(|g| g.velocities.as_slice())
            .unwrap_or(&[])
    }

    pub fn accumulator(&self) -> Option<&Array1<f64>> {
        self.group.as_ref().map(|g| &g.accumulator)
    }
}
