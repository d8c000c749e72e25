//! End-to-end tests of the flat multi-objective engine.

use mobo::prelude::*;

fn engine(seed: u64) -> MultiObjectiveEngine<Test1D2M> {
    MultiObjectiveEngine::<Test1D2M>::builder()
        .length_scale(0.3)
        .solver_candidates(300)
        .seed(seed)
        .build(Test1D2M::with_seed(seed))
        .unwrap()
}

#[test]
fn fresh_run_leaves_grid_plus_iterations_samples() {
    let mut engine = engine(1);
    engine.run(5, 3, None, 1, 5).unwrap();
    assert_eq!(engine.history().len(), 5 + 3);
}

#[test]
fn single_metric_objective_is_rejected_at_construction() {
    let err = MultiObjectiveEngine::new(Test1D1M::with_seed(0)).unwrap_err();
    assert!(matches!(err, Error::SingleMetric(1)));
}

#[test]
fn save_load_round_trip_preserves_history_and_model() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");

    let mut original = engine(2);
    original.run(5, 2, None, 1, 5).unwrap();
    original.save(&path).unwrap();

    let mut restored = engine(2);
    restored.load(&path).unwrap();

    assert_eq!(original.history().len(), restored.history().len());
    assert_eq!(original.history().points(), restored.history().points());
    assert_eq!(original.history().scores(), restored.history().scores());

    // Identical histories refit to the same model.
    for point in original.history().points() {
        let a = original.acquisition(point).unwrap();
        let b = restored.acquisition(point).unwrap();
        assert!((a - b).abs() < 1e-9, "acquisition mismatch at {point:?}");
    }
}

#[test]
fn loading_a_missing_snapshot_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = engine(3);
    let err = engine.load(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, Error::Checkpoint(_)));
}

#[test]
fn checkpointed_run_resumes_without_redoing_iterations() {
    let dir = tempfile::tempdir().unwrap();

    let mut first = engine(4);
    first.run(4, 3, Some(dir.path()), 1, 2).unwrap();
    assert_eq!(first.history().len(), 4 + 3);

    // Only the two newest iteration snapshots survive rotation.
    assert!(!dir.path().join("iter-1.json").exists());
    assert!(dir.path().join("iter-2.json").exists());
    assert!(dir.path().join("iter-3.json").exists());

    // A fresh engine over the same directory picks up where the first
    // stopped: the seed comes from init.json, the state from iter-3.
    let mut second = engine(4);
    second.run(4, 3, Some(dir.path()), 1, 2).unwrap();
    assert_eq!(second.history().len(), first.history().len());
    assert_eq!(second.history().points(), first.history().points());
}

#[test]
fn interrupted_run_continues_to_the_full_budget() {
    let dir = tempfile::tempdir().unwrap();

    let mut engine_a = engine(5);
    engine_a.run(4, 2, Some(dir.path()), 1, 5).unwrap();

    // Same directory, larger budget: only the remaining iterations run.
    let mut engine_b = engine(5);
    engine_b.run(4, 5, Some(dir.path()), 1, 5).unwrap();
    assert_eq!(engine_b.history().len(), 4 + 5);
    // The first engine's samples are a prefix of the continued history.
    assert_eq!(
        &engine_b.history().points()[..engine_a.history().len()],
        engine_a.history().points()
    );
}

#[test]
fn pareto_front_is_mutually_non_dominating() {
    let mut engine = engine(6);
    engine.run(6, 2, None, 1, 5).unwrap();
    let front = engine.pareto_front(24).unwrap();
    assert!(!front.is_empty());
    for (_, a) in &front {
        for (_, b) in &front {
            if !std::ptr::eq(a, b) {
                assert!(!mobo::pareto::dominates(a, b));
            }
        }
    }
}

#[test]
fn best_on_metric_lands_inside_the_bounds() {
    let mut engine = engine(8);
    engine.run(6, 1, None, 1, 5).unwrap();
    for metric in 0..2 {
        let best = engine.best_on_metric(metric).unwrap();
        assert_eq!(best.len(), 1);
        assert!((0.0..=1.0).contains(&best[0]));
    }
}
