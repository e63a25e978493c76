use serde_json::{json, Map, Value};
use tuner_structs::{
    config::{GroupingStrategy, InjectionMode, OptimizerKind, TunerConfig},
    core::{HyperparameterQuantity, HyperparameterState, IterationRecord, RunDiagnostics},
};

fn as_map(value: Value) -> Option<Map<String, Value>> {
    value.as_object().cloned()
}

#[test]
fn test_missing_hyperparameters_use_defaults() {
    let config = TunerConfig::from_hyperparameters(&None).unwrap();
    assert_eq!(config, TunerConfig::default());
    assert_eq!(config.alpha, 10.0);
    assert_eq!(config.high_pct, 99.5);
    assert_eq!(config.low_pct, 0.5);
    assert_eq!(config.gamma, 0.1);
    assert_eq!(config.mu_update_interval, 10);
    assert_eq!(config.slow_start_iters, 200);
    assert_eq!(config.curvature_window, 10);
    assert_eq!(config.group_boundaries, "per_parameter");
    assert_eq!(config.optimizer, "momentum");
    assert_eq!(config.injection, "direct");
}

#[test]
fn test_partial_hyperparameters_override_defaults() {
    let hyperparameters = as_map(json!({
        "alpha": 2.5,
        "slow_start_iters": 5,
        "group_boundaries": "meta-bundle",
    }));
    let config = TunerConfig::from_hyperparameters(&hyperparameters).unwrap();
    assert_eq!(config.alpha, 2.5);
    assert_eq!(config.slow_start_iters, 5);
    assert_eq!(config.mu_update_interval, 10);
    assert_eq!(
        config.group_boundaries.parse::<GroupingStrategy>(),
        Ok(GroupingStrategy::Bundle)
    );
}

#[test]
fn test_non_positive_periods_still_parse() {
    let hyperparameters = as_map(json!({"mu_update_interval": -3, "slow_start_iters": 0}));
    let config = TunerConfig::from_hyperparameters(&hyperparameters).unwrap();
    assert_eq!(config.mu_update_interval, -3);
    assert_eq!(config.slow_start_iters, 0);
}

#[test]
fn test_malformed_hyperparameters_are_rejected() {
    let hyperparameters = as_map(json!({"alpha": "ten"}));
    assert!(TunerConfig::from_hyperparameters(&hyperparameters).is_err());
}

#[test]
fn test_from_json_arg_inline() {
    let config = TunerConfig::from_json_arg(r#"{"gamma": 0.5, "injection": "feed"}"#).unwrap();
    assert_eq!(config.gamma, 0.5);
    assert_eq!(config.injection.parse::<InjectionMode>(), Ok(InjectionMode::Feed));
}

#[test]
fn test_selector_aliases() {
    assert_eq!("meta-per-layer".parse::<GroupingStrategy>(), Ok(GroupingStrategy::PerParameter));
    assert_eq!("meta".parse::<GroupingStrategy>(), Ok(GroupingStrategy::Global));
    assert_eq!("global".parse::<GroupingStrategy>(), Ok(GroupingStrategy::Global));
    assert_eq!(
        "layers".parse::<GroupingStrategy>(),
        Err("layers".to_string())
    );
    assert_eq!("momentum".parse::<OptimizerKind>(), Ok(OptimizerKind::Momentum));
    assert_eq!("adam".parse::<OptimizerKind>(), Err("adam".to_string()));
}

#[test]
fn test_hyperparameter_state_invariants() {
    assert_eq!(HyperparameterState::default().violated_invariant(), None);
    let clamped = HyperparameterState::clamped(0.1, 2.0, 7.0);
    assert_eq!(clamped, HyperparameterState::new(0.1, 0.9, 1.0));
    assert_eq!(
        HyperparameterState::new(0.0, 0.0, 1.0).violated_invariant(),
        Some("learning_rate > 0")
    );
    assert_eq!(
        HyperparameterState::new(0.1, -0.1, 1.0).violated_invariant(),
        Some("0 <= momentum <= 0.9")
    );
    assert_eq!(
        HyperparameterState::new(0.1, 0.5, 1.5).violated_invariant(),
        Some("clip_threshold <= 1.0")
    );
    assert_eq!(clamped.get(HyperparameterQuantity::Momentum), 0.9);
}

#[test]
fn test_run_diagnostics_keep_iteration_order() {
    let mut diagnostics = RunDiagnostics::new(3);
    for i in 0..3 {
        diagnostics.push(&IterationRecord {
            hyperparameters: HyperparameterState::new(i as f64 + 1.0, 0.0, 1.0),
            curvature: 2.0,
            curvature_sum: 2.0 * (i + 1) as f64,
            smoothed_max_curvature: 2.0,
            dynamic_range: None,
            step_magnitude: 0.0,
        });
    }
    assert_eq!(diagnostics.len(), 3);
    assert_eq!(diagnostics.learning_rate, vec![1.0, 2.0, 3.0]);
    assert_eq!(diagnostics.curvature_sum, vec![2.0, 4.0, 6.0]);

    let restored: RunDiagnostics =
        serde_json::from_str(&serde_json::to_string(&diagnostics).unwrap()).unwrap();
    assert_eq!(restored, diagnostics);
}
