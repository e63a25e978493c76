use ndarray::{arr2, Array1};
use rand::{rngs::StdRng, Rng, SeedableRng};
use tuner_optimizer::{
    Gradient, HyperparameterState, InjectionMode, OptimizerUnit, Parameter, ParameterGroup,
    Settings, TunerError,
};

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
}

fn bound_unit(settings: &Settings, sizes: &[usize]) -> OptimizerUnit {
    let parameters = sizes
        .iter()
        .enumerate()
        .map(|(i, &n)| Parameter::from_vec(format!("model/layer/p{}", i), vec![0.0; n]))
        .collect();
    let mut unit = OptimizerUnit::new(0, settings).unwrap();
    unit.bind(ParameterGroup::new(parameters)).unwrap();
    unit
}

#[test]
fn test_bind_rules() {
    let settings = Settings::default();
    let mut unit = OptimizerUnit::new(2, &settings).unwrap();
    assert!(!unit.is_bound());
    assert_eq!(
        unit.step(&[Gradient::from_vec(vec![1.0])]).unwrap_err(),
        TunerError::UnboundUnit { group_id: 2 }
    );
    assert_eq!(
        unit.bind(ParameterGroup::new(vec![])).unwrap_err(),
        TunerError::EmptyGroup { group_id: 2 }
    );

    unit.bind(ParameterGroup::new(vec![Parameter::from_vec("w", vec![1.0, 2.0])]))
        .unwrap();
    assert!(unit.is_bound());
    assert_eq!(unit.accumulator(), Some(&Array1::zeros(2)));
    assert_eq!(
        unit.bind(ParameterGroup::new(vec![Parameter::from_vec("v", vec![1.0])]))
            .unwrap_err(),
        TunerError::AlreadyBound { group_id: 2 }
    );
}

#[test]
fn test_first_step_uses_initial_hyperparameters() {
    let settings = Settings::default();
    let mut unit = bound_unit(&settings, &[2]);
    assert_eq!(unit.current(), HyperparameterState::new(1.0, 0.0, 1.0));

    let update = unit.step(&[Gradient::from_vec(vec![3.0, 4.0])]).unwrap();
    assert_eq!(update.used, HyperparameterState::new(1.0, 0.0, 1.0));
    assert_eq!(update.global_norm, 5.0);
    assert!(close(update.clip_factor, 0.2));

    let value = &unit.parameters()[0].value;
    assert!(close(value[[0]], -0.6));
    assert!(close(value[[1]], -0.8));
    assert_eq!(update.deltas[0], unit.velocities()[0]);

    // alpha * ramp(0) / sqrt(25)
    let lr = 10.0 * (1.0 / 200.0) / (25.0f64 + 1e-6).sqrt();
    assert!(close(update.next.learning_rate, lr));
    assert_eq!(update.next.momentum, 0.0);
    assert!(close(update.next.clip_threshold, lr * 5.0));
    assert_eq!(unit.current(), update.next);

    assert_eq!(unit.iteration(), 1);
    assert_eq!(unit.tracker().history(), &[25.0]);
    assert_eq!(unit.accumulator(), Some(&Array1::from(vec![9.0, 16.0])));
    assert_eq!(unit.diagnostics().len(), 1);
    assert_eq!(unit.diagnostics().curvature, vec![25.0]);
}

#[test]
fn test_rejected_gradients_leave_state_untouched() {
    let settings = Settings::default();
    let mut unit = bound_unit(&settings, &[2, 3]);

    let err = unit.step(&[Gradient::from_vec(vec![1.0, 1.0])]).unwrap_err();
    assert_eq!(
        err,
        TunerError::GradientCountMismatch {
            group_id: 0,
            expected: 2,
            actual: 1
        }
    );

    let err = unit
        .step(&[
            Gradient::from_vec(vec![1.0, 1.0]),
            Gradient::from_vec(vec![1.0, 1.0]),
        ])
        .unwrap_err();
    assert_eq!(
        err,
        TunerError::GradientShapeMismatch {
            group_id: 0,
            index: 1,
            expected: vec![3],
            actual: vec![2]
        }
    );

    let err = unit
        .step(&[
            Gradient::from_vec(vec![1.0, f64::NAN]),
            Gradient::from_vec(vec![1.0, 1.0, 1.0]),
        ])
        .unwrap_err();
    assert!(matches!(
        err,
        TunerError::NonFiniteValue {
            quantity: "curvature",
            ..
        }
    ));

    assert_eq!(unit.iteration(), 0);
    assert!(unit.tracker().is_empty());
    assert!(unit.diagnostics().is_empty());
    assert_eq!(unit.parameters()[0].value.sum(), 0.0);
}

#[test]
fn test_sparse_gradient_matches_dense_equivalent() {
    let settings = Settings::default();
    let mut sparse_unit = OptimizerUnit::new(0, &settings).unwrap();
    let mut dense_unit = OptimizerUnit::new(0, &settings).unwrap();
    let embedding = Parameter::new("model/embedding/table", ndarray::ArrayD::zeros(vec![3, 2]));
    sparse_unit
        .bind(ParameterGroup::new(vec![embedding.clone()]))
        .unwrap();
    dense_unit.bind(ParameterGroup::new(vec![embedding])).unwrap();

    let sparse = Gradient::Sparse {
        dense_shape: vec![3, 2],
        indices: vec![0, 2, 0],
        values: arr2(&[[1.0, 1.0], [2.0, 2.0], [3.0, 3.0]]).into_dyn(),
    };
    let dense = Gradient::Dense(arr2(&[[4.0, 4.0], [0.0, 0.0], [2.0, 2.0]]).into_dyn());
    assert_eq!(sparse.densify().unwrap(), dense.densify().unwrap());

    for _ in 0..3 {
        let a = sparse_unit.step(&[sparse.clone()]).unwrap();
        let b = dense_unit.step(&[dense.clone()]).unwrap();
        assert_eq!(a, b);
    }
    assert_eq!(sparse_unit.parameters(), dense_unit.parameters());
}

#[test]
fn test_malformed_sparse_gradient() {
    let out_of_bounds = Gradient::Sparse {
        dense_shape: vec![2, 2],
        indices: vec![5],
        values: arr2(&[[1.0, 1.0]]).into_dyn(),
    };
    assert!(matches!(
        out_of_bounds.densify(),
        Err(TunerError::InvalidSparseGradient { .. })
    ));

    let wrong_rows = Gradient::Sparse {
        dense_shape: vec![2, 2],
        indices: vec![0, 1],
        values: arr2(&[[1.0, 1.0]]).into_dyn(),
    };
    assert!(wrong_rows.densify().is_err());
}

#[test]
fn test_feed_mode_requires_injection_between_steps() {
    let settings = Settings {
        injection: InjectionMode::Feed,
        ..Settings::default()
    };
    let mut unit = bound_unit(&settings, &[2]);
    let gradients = [Gradient::from_vec(vec![3.0, 4.0])];

    let update = unit.step(&gradients).unwrap();
    assert_eq!(unit.current(), HyperparameterState::default());
    assert_eq!(unit.pending(), Some(update.next));
    assert_eq!(unit.latest(), update.next);
    assert_eq!(
        unit.step(&gradients).unwrap_err(),
        TunerError::PendingInjection { group_id: 0 }
    );

    assert_eq!(unit.promote_pending(), Some(update.next));
    assert_eq!(unit.current(), update.next);
    assert_eq!(unit.promote_pending(), None);
    let second = unit.step(&gradients).unwrap();
    assert_eq!(second.used, update.next);
}

#[test]
fn test_assign_validates_and_clears_pending() {
    let settings = Settings {
        injection: InjectionMode::Feed,
        ..Settings::default()
    };
    let mut unit = bound_unit(&settings, &[1]);
    unit.step(&[Gradient::from_vec(vec![1.0])]).unwrap();
    assert!(unit.pending().is_some());

    assert_eq!(
        unit.assign(HyperparameterState::new(0.1, 0.95, 0.5))
            .unwrap_err(),
        TunerError::InvalidHyperparameters {
            group_id: 0,
            invariant: "0 <= momentum <= 0.9"
        }
    );
    assert!(unit.assign(HyperparameterState::new(0.0, 0.5, 0.5)).is_err());
    assert!(unit.assign(HyperparameterState::new(0.1, 0.5, 1.5)).is_err());
    assert!(unit.pending().is_some());

    let state = HyperparameterState::new(0.1, 0.5, 0.5);
    unit.assign(state).unwrap();
    assert_eq!(unit.current(), state);
    assert_eq!(unit.pending(), None);
}

#[test]
fn test_invariants_hold_over_random_run() {
    let settings = Settings {
        mu_update_interval: 5,
        slow_start_iters: 20,
        ..Settings::default()
    };
    let mut unit = bound_unit(&settings, &[8, 4]);
    let mut rng = StdRng::seed_from_u64(1337);

    for t in 0..100 {
        let scale = rng.gen_range(0.01..10.0);
        let gradients = vec![
            Gradient::from_vec((0..8).map(|_| scale * rng.gen_range(-1.0..1.0)).collect()),
            Gradient::from_vec((0..4).map(|_| rng.gen_range(-1.0..1.0)).collect()),
        ];
        let update = unit.step(&gradients).unwrap();
        let next = update.next;
        assert_eq!(next.violated_invariant(), None, "iteration {}", t);
        assert!(next.learning_rate > 0.0);
        assert!((0.0..=0.9).contains(&next.momentum));
        assert!(next.clip_threshold <= 1.0);
        assert!(update.clip_factor > 0.0 && update.clip_factor <= 1.0);
        assert!(update.global_norm * update.clip_factor <= update.used.clip_threshold + 1e-12);
    }

    let diagnostics = unit.diagnostics();
    assert_eq!(diagnostics.len(), 100);
    assert!(diagnostics.dynamic_range[..5].iter().all(|dr| dr.is_none()));
    assert!(diagnostics.dynamic_range[5..].iter().all(|dr| dr.is_some()));
    assert!(diagnostics
        .curvature_sum
        .windows(2)
        .all(|pair| pair[1] >= pair[0]));
}
