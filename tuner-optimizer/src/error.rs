/// Coarse classification of a [`TunerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Fatal, raised while constructing or reconfiguring the tuner.
    Configuration,
    /// Fatal, raised while estimating hyperparameters from degenerate statistics.
    DegenerateStatistics,
    /// Recoverable, the caller sees a diverging run and decides what to do.
    NumericInstability,
    /// Misuse of the step/inject handshake.
    Protocol,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TunerError {
    InvalidSetting {
        name: &'static str,
        value: String,
        requirement: &'static str,
    },
    UnsupportedOptimizer {
        kind: String,
    },
    UnsupportedGrouping {
        strategy: String,
    },
    UnsupportedInjection {
        mode: String,
    },
    EmptyGroup {
        group_id: usize,
    },
    GroupCountMismatch {
        expected: usize,
        actual: usize,
    },
    GradientCountMismatch {
        group_id: usize,
        expected: usize,
        actual: usize,
    },
    ParameterCountMismatch {
        expected: usize,
        actual: usize,
    },
    GradientShapeMismatch {
        group_id: usize,
        index: usize,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
    InvalidSparseGradient {
        reason: String,
    },
    InvalidHyperparameters {
        group_id: usize,
        invariant: &'static str,
    },
    UnknownGroup {
        group_id: usize,
        num_groups: usize,
    },
    AlreadyBound {
        group_id: usize,
    },
    UnboundUnit {
        group_id: usize,
    },
    PendingInjection {
        group_id: usize,
    },
    DegenerateStatistics {
        group_id: usize,
        statistic: &'static str,
        iteration: usize,
    },
    NonFiniteValue {
        group_id: Option<usize>,
        quantity: &'static str,
        value: f64,
    },
    NegativeCurvature {
        group_id: usize,
        value: f64,
    },
}

impl TunerError {
    pub fn class(&self) -> ErrorClass {
        match self {
            TunerError::DegenerateStatistics { .. } => ErrorClass::DegenerateStatistics,
            TunerError::NonFiniteValue { .. } | TunerError::NegativeCurvature { .. } => {
                ErrorClass::NumericInstability
            }
            TunerError::UnboundUnit { .. } | TunerError::PendingInjection { .. } => {
                ErrorClass::Protocol
            }
            _ => ErrorClass::Configuration,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.class() != ErrorClass::NumericInstability
    }

    /// The group that triggered the error, when it is attributable to one.
    pub fn group_id(&self) -> Option<usize> {
        match self {
            TunerError::EmptyGroup { group_id }
            | TunerError::GradientCountMismatch { group_id, .. }
            | TunerError::GradientShapeMismatch { group_id, .. }
            | TunerError::InvalidHyperparameters { group_id, .. }
            | TunerError::UnknownGroup { group_id, .. }
            | TunerError::AlreadyBound { group_id }
            | TunerError::UnboundUnit { group_id }
            | TunerError::PendingInjection { group_id }
            | TunerError::DegenerateStatistics { group_id, .. }
            | TunerError::NegativeCurvature { group_id, .. } => Some(*group_id),
            TunerError::NonFiniteValue { group_id, .. } => *group_id,
            _ => None,
        }
    }
}

impl std::fmt::Display for TunerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TunerError::InvalidSetting {
                name,
                value,
                requirement,
            } => write!(
                f,
                "Setting '{}' has invalid value '{}'. Must satisfy: {}",
                name, value, requirement
            ),
            TunerError::UnsupportedOptimizer { kind } => {
                write!(f, "Optimizer kind '{}' is not supported", kind)
            }
            TunerError::UnsupportedGrouping { strategy } => {
                write!(f, "Grouping strategy '{}' is not supported", strategy)
            }
            TunerError::UnsupportedInjection { mode } => {
                write!(f, "Injection mode '{}' is not supported", mode)
            }
            TunerError::EmptyGroup { group_id } => {
                write!(f, "Group '{}' has no parameters", group_id)
            }
            TunerError::GroupCountMismatch { expected, actual } => write!(
                f,
                "Group count mismatch. Expected: '{}', Actual: '{}'",
                expected, actual
            ),
            TunerError::GradientCountMismatch {
                group_id,
                expected,
                actual,
            } => write!(
                f,
                "Group '{}' received the wrong number of gradients. Expected: '{}', Actual: '{}'",
                group_id, expected, actual
            ),
            TunerError::ParameterCountMismatch { expected, actual } => write!(
                f,
                "Flat gradient list does not cover the partitioned parameters. Expected: '{}', Actual: '{}'",
                expected, actual
            ),
            TunerError::GradientShapeMismatch {
                group_id,
                index,
                expected,
                actual,
            } => write!(
                f,
                "Gradient {} of group '{}' has shape '{:?}' but its parameter has shape '{:?}'",
                index, group_id, actual, expected
            ),
            TunerError::InvalidSparseGradient { reason } => {
                write!(f, "Sparse gradient is malformed: {}", reason)
            }
            TunerError::InvalidHyperparameters {
                group_id,
                invariant,
            } => write!(
                f,
                "Hyperparameters assigned to group '{}' violate '{}'",
                group_id, invariant
            ),
            TunerError::UnknownGroup {
                group_id,
                num_groups,
            } => write!(
                f,
                "Group '{}' does not exist. There are '{}' groups",
                group_id, num_groups
            ),
            TunerError::AlreadyBound { group_id } => {
                write!(f, "Unit for group '{}' is already bound", group_id)
            }
            TunerError::UnboundUnit { group_id } => {
                write!(f, "Unit for group '{}' was stepped before being bound", group_id)
            }
            TunerError::PendingInjection { group_id } => write!(
                f,
                "Hyperparameters of group '{}' were never injected since the previous step",
                group_id
            ),
            TunerError::DegenerateStatistics {
                group_id,
                statistic,
                iteration,
            } => write!(
                f,
                "Group '{}' has degenerate '{}' at iteration '{}'. Every accumulated squared gradient is zero",
                group_id, statistic, iteration
            ),
            TunerError::NonFiniteValue {
                group_id: Some(group_id),
                quantity,
                value,
            } => write!(
                f,
                "Group '{}' observed non-finite '{}' ({}). The run is diverging",
                group_id, quantity, value
            ),
            TunerError::NonFiniteValue {
                group_id: None,
                quantity,
                value,
            } => write!(
                f,
                "Observed non-finite '{}' ({}). The run is diverging",
                quantity, value
            ),
            TunerError::NegativeCurvature { group_id, value } => write!(
                f,
                "Group '{}' recorded negative curvature '{}'",
                group_id, value
            ),
        }
    }
}

impl std::error::Error for TunerError {}

pub type TunerResult<T> = std::result::Result<T, TunerError>;
