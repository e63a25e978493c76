pub mod curvature;
pub mod diagnostics;
pub mod error;
pub mod estimator;
pub mod gradient;
pub mod grouping;
pub mod injection;
pub mod meta;
pub mod momentum;
pub mod settings;
pub mod unit;

pub use curvature::CurvatureTracker;
pub use diagnostics::{DiagnosticsSink, JsonDirSink, MemorySink};
pub use error::{ErrorClass, TunerError, TunerResult};
pub use estimator::HyperparameterEstimator;
pub use gradient::{Gradient, Parameter, ParameterGroup};
pub use injection::{FeedKey, HyperparameterFeed, HyperparameterInjector};
pub use meta::{MetaOptimizer, StepOutcome};
pub use settings::Settings;
pub use unit::{AppliedUpdate, OptimizerUnit};
pub use tuner_structs::{
    config::{GroupingStrategy, InjectionMode, OptimizerKind, TunerConfig},
    core::{HyperparameterState, RunDiagnostics},
};
