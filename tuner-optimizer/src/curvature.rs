use crate::error::{TunerError, TunerResult};
use tuner_utils::tail_extrema;

pub const DEFAULT_CURVATURE_WINDOW: usize = 10;

/// Per-iteration curvature of one group, i.e. the squared L2 norm of its gradients.
///
/// The history is never trimmed; the running sum is kept alongside so the learning-rate
/// denominator does not need a pass over the whole history.
#[derive(Debug, Clone, PartialEq)]
pub struct CurvatureTracker {
    group_id: usize,
    history: Vec<f64>,
    sum: f64,
}

impl CurvatureTracker {
    pub fn new(group_id: usize) -> Self {
        Self {
            group_id,
            history: Vec::new(),
            sum: 0.0,
        }
    }

    pub fn check(&self, curvature: f64) -> TunerResult<()> {
        if !curvature.is_finite() {
            return Err(TunerError::NonFiniteValue {
                group_id: Some(self.group_id),
                quantity: "curvature",
                value: curvature,
            });
        }
        if curvature < 0.0 {
            return Err(TunerError::NegativeCurvature {
                group_id: self.group_id,
                value: curvature,
            });
        }
        Ok(())
    }

    pub fn record(&mut self, curvature: f64) -> TunerResult<()> {
        self.check(curvature)?;
        self.push(curvature);
        Ok(())
    }

    /// Appends a value that already passed [`CurvatureTracker::check`].
    pub(crate) fn push(&mut self, curvature: f64) {
        self.history.push(curvature);
        self.sum += curvature;
    }

    /// `(max, min)` over the last `min(window, len)` observations; `None` before the first record.
    pub fn window_extrema(&self, window: usize) -> Option<(f64, f64)> {
        tail_extrema(&self.history, window)
    }

    /// The extrema [`CurvatureTracker::window_extrema`] would report after recording `next`.
    pub fn window_extrema_with(&self, next: f64, window: usize) -> (f64, f64) {
        match tail_extrema(&self.history, window.saturating_sub(1)) {
            Some((max, min)) => (max.max(next), min.min(next)),
            None => (next, next),
        }
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    pub fn history(&self) -> &[f64] {
        &self.history
    }

    pub fn last(&self) -> Option<f64> {
        self.history.last().copied()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}
