use ndarray::ArrayD;
use tuner_structs::{config::OptimizerKind, core::HyperparameterState};
use tuner_utils::sum_of_squares;

pub fn global_norm(gradients: &[ArrayD<f64>]) -> f64 {
    gradients
        .iter()
        .map(|g| sum_of_squares(g.iter()))
        .sum::<f64>()
        .sqrt()
}

/// Rescales all gradients by one shared factor so their joint L2 norm is at most `clip_norm`.
///
/// Returns the clipped gradients, the pre-clip global norm and the factor applied.
pub fn clip_by_global_norm(
    gradients: &[ArrayD<f64>],
    clip_norm: f64,
) -> (Vec<ArrayD<f64>>, f64, f64) {
    let norm = global_norm(gradients);
    let factor = if norm > clip_norm { clip_norm / norm } else { 1.0 };
    let clipped = gradients.iter().map(|g| g * factor).collect();
    (clipped, norm, factor)
}

/// The parameter update a unit forwards its clipped gradients to.
pub trait UpdateRule: std::fmt::Debug + Send + Sync {
    /// Returns the new `(parameter, velocity)`.
    fn apply(
        &self,
        parameter: &ArrayD<f64>,
        velocity: &ArrayD<f64>,
        gradient: &ArrayD<f64>,
        hyperparameters: &HyperparameterState,
    ) -> (ArrayD<f64>, ArrayD<f64>);
}

/// `v = mu * v - lr * g; p = p + v`
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassicalMomentum;

impl UpdateRule for ClassicalMomentum {
    fn apply(
        &self,
        parameter: &ArrayD<f64>,
        velocity: &ArrayD<f64>,
        gradient: &ArrayD<f64>,
        hyperparameters: &HyperparameterState,
    ) -> (ArrayD<f64>, ArrayD<f64>) {
        let velocity = velocity * hyperparameters.momentum - gradient * hyperparameters.learning_rate;
        let parameter = parameter + &velocity;
        (parameter, velocity)
    }
}

pub fn update_rule(kind: OptimizerKind) -> Box<dyn UpdateRule> {
    match kind {
        OptimizerKind::Momentum => Box::new(ClassicalMomentum),
    }
}
