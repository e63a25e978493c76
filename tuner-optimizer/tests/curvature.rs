use tuner_optimizer::{curvature::DEFAULT_CURVATURE_WINDOW, CurvatureTracker, ErrorClass, TunerError};

#[test]
fn test_record_accumulates_history_and_sum() {
    let mut tracker = CurvatureTracker::new(0);
    assert!(tracker.is_empty());
    assert_eq!(tracker.window_extrema(DEFAULT_CURVATURE_WINDOW), None);

    for c in [1.0, 4.0, 2.0] {
        tracker.record(c).unwrap();
    }
    assert_eq!(tracker.len(), 3);
    assert_eq!(tracker.history(), &[1.0, 4.0, 2.0]);
    assert_eq!(tracker.sum(), 7.0);
    assert_eq!(tracker.last(), Some(2.0));
}

#[test]
fn test_window_covers_only_recent_observations() {
    let mut tracker = CurvatureTracker::new(0);
    for c in 1..=20 {
        tracker.record(c as f64).unwrap();
    }
    assert_eq!(tracker.window_extrema(10), Some((20.0, 11.0)));
    assert_eq!(tracker.window_extrema(1), Some((20.0, 20.0)));
    // window longer than the history uses everything
    assert_eq!(tracker.window_extrema(100), Some((20.0, 1.0)));
    // the sum still covers the whole history
    assert_eq!(tracker.sum(), 210.0);
}

#[test]
fn test_window_extrema_with_previews_next_record() {
    let mut tracker = CurvatureTracker::new(0);
    assert_eq!(tracker.window_extrema_with(3.0, 10), (3.0, 3.0));
    for c in 1..=20 {
        tracker.record(c as f64).unwrap();
    }
    assert_eq!(tracker.window_extrema_with(0.5, 10), (20.0, 0.5));
    assert_eq!(tracker.window_extrema_with(30.0, 1), (30.0, 30.0));

    let preview = tracker.window_extrema_with(7.0, 10);
    tracker.record(7.0).unwrap();
    assert_eq!(tracker.window_extrema(10), Some(preview));
}

#[test]
fn test_rejects_negative_and_non_finite_curvature() {
    let mut tracker = CurvatureTracker::new(3);
    let err = tracker.record(-1.0).unwrap_err();
    assert_eq!(
        err,
        TunerError::NegativeCurvature {
            group_id: 3,
            value: -1.0
        }
    );
    assert_eq!(err.class(), ErrorClass::NumericInstability);

    let err = tracker.record(f64::INFINITY).unwrap_err();
    assert_eq!(err.group_id(), Some(3));
    assert!(!err.is_fatal());
    assert!(tracker.is_empty());
}
