use crate::{
    diagnostics::DiagnosticsSink,
    error::{TunerError, TunerResult},
    gradient::{Gradient, Parameter, ParameterGroup},
    grouping::group_parameters,
    injection::{HyperparameterFeed, HyperparameterInjector},
    settings::Settings,
    unit::{AppliedUpdate, OptimizerUnit},
};
use anyhow::{anyhow, Result};
use logging_timer::time;
use std::collections::BTreeMap;
use tuner_structs::{
    config::{InjectionMode, TunerConfig},
    core::{HyperparameterState, LossHistory},
};

/// Result of one [`MetaOptimizer::step`].
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// The new triples are already current.
    Applied(BTreeMap<usize, HyperparameterState>),
    /// The new triples wait for [`MetaOptimizer::inject`].
    Deferred(HyperparameterFeed),
}

impl StepOutcome {
    pub fn hyperparameters(&self) -> &BTreeMap<usize, HyperparameterState> {
        match self {
            StepOutcome::Applied(states) => states,
            StepOutcome::Deferred(feed) => feed.states(),
        }
    }
}

/// Owns one [`OptimizerUnit`] per parameter group and drives them in lockstep.
#[derive(Debug)]
pub struct MetaOptimizer {
    settings: Settings,
    units: Vec<OptimizerUnit>,
    loss_history: Vec<f64>,
    last_updates: Vec<AppliedUpdate>,
    iteration: usize,
}

impl MetaOptimizer {
    pub fn configure(groups: Vec<ParameterGroup>, settings: Settings) -> TunerResult<Self> {
        let initial = vec![settings.initial; groups.len()];
        Self::configure_with_initial(groups, settings, initial)
    }

    /// Like [`MetaOptimizer::configure`] with an explicit starting triple per group.
    pub fn configure_with_initial(
        groups: Vec<ParameterGroup>,
        settings: Settings,
        initial: Vec<HyperparameterState>,
    ) -> TunerResult<Self> {
        settings.validate()?;
        if initial.len() != groups.len() {
            return Err(TunerError::GroupCountMismatch {
                expected: groups.len(),
                actual: initial.len(),
            });
        }
        let mut units = Vec::with_capacity(groups.len());
        for (id, (group, state)) in groups.into_iter().zip(initial).enumerate() {
            let mut unit = OptimizerUnit::new(id, &settings)?;
            unit.bind(group)?;
            unit.assign(state)?;
            units.push(unit);
        }
        log::info!(
            "configured {} groups: optimizer {}, injection {}, alpha {}, slow start {}, mu interval {}",
            units.len(),
            settings.optimizer,
            settings.injection,
            settings.alpha,
            settings.slow_start_iters,
            settings.mu_update_interval
        );
        Ok(Self {
            settings,
            units,
            loss_history: Vec::new(),
            last_updates: Vec::new(),
            iteration: 0,
        })
    }

    pub fn from_config(groups: Vec<ParameterGroup>, config: &TunerConfig) -> TunerResult<Self> {
        Self::configure(groups, Settings::try_from(config)?)
    }

    /// Partitions a flat list of named parameters with the configured grouping strategy.
    /// Returns the optimizer and the parameter indices of each group, which the collaborator
    /// uses with [`crate::grouping::regroup`] to split its flat gradient list the same way.
    pub fn from_parameters(
        parameters: Vec<Parameter>,
        settings: Settings,
    ) -> TunerResult<(Self, Vec<Vec<usize>>)> {
        let (groups, layout) = group_parameters(parameters, settings.grouping)?;
        Ok((Self::configure(groups, settings)?, layout))
    }

    /// One iteration across all groups. Either every group commits or none does.
    #[time]
    pub fn step(&mut self, grad_lists: &[Vec<Gradient>], loss: f64) -> TunerResult<StepOutcome> {
        if !loss.is_finite() {
            log::warn!("iteration {}: non-finite loss {}", self.iteration, loss);
            return Err(TunerError::NonFiniteValue {
                group_id: None,
                quantity: "loss",
                value: loss,
            });
        }
        if grad_lists.len() != self.units.len() {
            return Err(TunerError::GroupCountMismatch {
                expected: self.units.len(),
                actual: grad_lists.len(),
            });
        }

        let mut prepared = Vec::with_capacity(self.units.len());
        for (unit, gradients) in self.units.iter().zip(grad_lists) {
            match unit.prepare(gradients) {
                Ok(step) => prepared.push(step),
                Err(e) => {
                    if e.is_fatal() {
                        log::error!("iteration {}: {}", self.iteration, e);
                    } else {
                        log::warn!("iteration {}: {}", self.iteration, e);
                    }
                    return Err(e);
                }
            }
        }

        self.last_updates = self
            .units
            .iter_mut()
            .zip(prepared)
            .map(|(unit, step)| unit.commit(step))
            .collect();
        self.loss_history.push(loss);
        self.iteration += 1;

        Ok(match self.settings.injection {
            InjectionMode::Direct => StepOutcome::Applied(self.current_hyperparameters()),
            InjectionMode::Feed => StepOutcome::Deferred(self.feed()),
        })
    }

    /// Hyperparameters the next step will use, by group id.
    pub fn current_hyperparameters(&self) -> BTreeMap<usize, HyperparameterState> {
        self.units.iter().map(|u| (u.id(), u.current())).collect()
    }

    /// The latest estimated triples, pending ones included.
    pub fn feed(&self) -> HyperparameterFeed {
        HyperparameterFeed::new(self.units.iter().map(|u| (u.id(), u.latest())).collect())
    }

    /// Delivers the latest triples to `injector`; pending triples become current only once every
    /// group was delivered.
    pub fn inject<I: HyperparameterInjector + ?Sized>(&mut self, injector: &mut I) -> Result<()> {
        self.feed().deliver(injector)?;
        for unit in self.units.iter_mut() {
            unit.promote_pending();
        }
        Ok(())
    }

    pub fn assign_hyperparameters(&mut self, states: &[HyperparameterState]) -> TunerResult<()> {
        if states.len() != self.units.len() {
            return Err(TunerError::GroupCountMismatch {
                expected: self.units.len(),
                actual: states.len(),
            });
        }
        if let Some((id, invariant)) = states
            .iter()
            .enumerate()
            .find_map(|(id, s)| s.violated_invariant().map(|inv| (id, inv)))
        {
            return Err(TunerError::InvalidHyperparameters {
                group_id: id,
                invariant,
            });
        }
        for (unit, state) in self.units.iter_mut().zip(states) {
            unit.assign(*state)?;
        }
        Ok(())
    }

    pub fn set_alpha(&mut self, alpha: f64) -> TunerResult<()> {
        for unit in self.units.iter_mut() {
            unit.set_alpha(alpha)?;
        }
        self.settings.alpha = alpha;
        Ok(())
    }

    pub fn set_slow_start_iters(&mut self, slow_start_iters: i64) -> TunerResult<()> {
        for unit in self.units.iter_mut() {
            unit.set_slow_start_iters(slow_start_iters)?;
        }
        self.settings.slow_start_iters = slow_start_iters as usize;
        Ok(())
    }

    /// Writes diagnostics of `group_ids` (all groups when `None`) and the loss series to `sink`.
    #[time]
    pub fn export_diagnostics<S: DiagnosticsSink + ?Sized>(
        &self,
        sink: &mut S,
        group_ids: Option<&[usize]>,
    ) -> Result<()> {
        let all: Vec<usize> = (0..self.units.len()).collect();
        let group_ids = group_ids.unwrap_or(&all);
        let units = group_ids
            .iter()
            .map(|&group_id| self.unit(group_id))
            .collect::<TunerResult<Vec<_>>>()?;
        for unit in units {
            sink.write_group(unit.diagnostics()).map_err(|e| {
                anyhow!("Failed to export diagnostics of group {}: {}", unit.id(), e)
            })?;
        }
        sink.write_loss(&LossHistory {
            loss: self.loss_history.clone(),
        })?;
        log::info!(
            "exported diagnostics of {} groups at iteration {}",
            group_ids.len(),
            self.iteration
        );
        Ok(())
    }

    pub fn unit(&self, group_id: usize) -> TunerResult<&OptimizerUnit> {
        self.units.get(group_id).ok_or(TunerError::UnknownGroup {
            group_id,
            num_groups: self.units.len(),
        })
    }

    pub fn units(&self) -> &[OptimizerUnit] {
        &self.units
    }

    pub fn parameters(&self, group_id: usize) -> TunerResult<&[Parameter]> {
        Ok(self.unit(group_id)?.parameters())
    }

    pub fn last_updates(&self) -> &[AppliedUpdate] {
        &self.last_updates
    }

    pub fn loss_history(&self) -> &[f64] {
        &self.loss_history
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn num_groups(&self) -> usize {
        self.units.len()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}
