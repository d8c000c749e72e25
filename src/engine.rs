//! The flat multi-objective GP-UCB engine.
//!
//! [`MultiObjectiveEngine`] models the *full* point space with one
//! vector-valued regressor and drives the grid-seed + iterate loop:
//!
//! 1. `init` — evaluate the objective on a full Cartesian grid and fit.
//! 2. `iterate` — maximize the scalarized acquisition over the bounds,
//!    evaluate the objective at the argmax, append, refit on the full
//!    history.
//!
//! The acquisition is `Π mean_m(x) + κ · Σ std_m(x)`. The product treats
//! the per-metric means as a joint "volume" reward — all metrics must be
//! simultaneously good for the product to be large — while the summed
//! standard deviations reward exploration additively. `kappa` trades the
//! two off. The product term is deliberately unguarded against negative
//! predicted means; clamping would change the search semantics for metrics
//! that are conceptually non-negative, so callers who need a guard should
//! shift their metrics instead.
//!
//! Refitting from scratch on the full history every iteration costs O(n³)
//! in the accumulated sample count. This is a deliberate simplicity
//! trade-off that bounds practical sample counts to the low thousands —
//! acceptable because each objective evaluation is assumed to dwarf the
//! refit.
//!
//! # Examples
//!
//! ```
//! use mobo::prelude::*;
//!
//! let mut engine = MultiObjectiveEngine::<Test1D2M>::builder()
//!     .kappa(5.0)
//!     .seed(42)
//!     .build(Test1D2M::with_seed(7))
//!     .unwrap();
//!
//! engine.run(4, 2, None, 1, 5).unwrap();
//! assert_eq!(engine.history().len(), 4 + 2);
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::checkpoint::{self, CheckpointRing};
use crate::error::{Error, Result};
use crate::objective::Objective;
use crate::pareto;
use crate::regressor::{GpRegressor, Prediction, Regressor};
use crate::solver::{RandomSearchSolver, Solver};
use crate::types::{Point, SampleHistory, Score};

/// Default exploit/explore trade-off constant.
pub(crate) const DEFAULT_KAPPA: f64 = 10.0;

/// Scalarized GP-UCB value of one prediction.
pub(crate) fn ucb(prediction: &Prediction, kappa: f64) -> f64 {
    let volume: f64 = prediction.mean.iter().product();
    let sigma_sum: f64 = prediction.std.iter().sum();
    volume + kappa * sigma_sum
}

/// Serialized engine state: the exact sample history, in evaluation order.
#[derive(Serialize, Deserialize)]
pub(crate) struct EngineSnapshot {
    /// Schema version for forward compatibility.
    pub(crate) version: u32,
    pub(crate) points: Vec<Point>,
    pub(crate) scores: Vec<Score>,
}

pub(crate) const SNAPSHOT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Multi-objective Bayesian optimization over the full point space.
///
/// Construction rejects single-metric problems ([`Error::SingleMetric`]);
/// this machinery only pays off when at least two metrics compete.
#[derive(Debug)]
pub struct MultiObjectiveEngine<O, R = GpRegressor, S = RandomSearchSolver> {
    objective: O,
    regressor: R,
    solver: S,
    kappa: f64,
    history: SampleHistory,
    fitted: bool,
}

impl<O: Objective> MultiObjectiveEngine<O> {
    /// Creates an engine with the packaged GP regressor and random-search
    /// solver at default settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SingleMetric`] when the objective has fewer than
    /// two metrics.
    pub fn new(objective: O) -> Result<Self> {
        Self::with_parts(
            objective,
            GpRegressor::new(),
            RandomSearchSolver::new(),
            DEFAULT_KAPPA,
        )
    }

    /// Creates a builder for configuring the engine.
    #[must_use]
    pub fn builder() -> MultiObjectiveEngineBuilder {
        MultiObjectiveEngineBuilder::default()
    }
}

impl<O: Objective, R: Regressor, S: Solver> MultiObjectiveEngine<O, R, S> {
    /// Creates an engine from explicit parts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SingleMetric`] when the objective has fewer than
    /// two metrics. The check happens before any evaluation.
    pub fn with_parts(objective: O, regressor: R, solver: S, kappa: f64) -> Result<Self> {
        let n_metrics = objective.metrics().len();
        if n_metrics < 2 {
            return Err(Error::SingleMetric(n_metrics));
        }
        Ok(Self {
            objective,
            regressor,
            solver,
            kappa,
            history: SampleHistory::new(),
            fitted: false,
        })
    }

    /// The accumulated sample history, in evaluation order.
    #[must_use]
    pub fn history(&self) -> &SampleHistory {
        &self.history
    }

    /// The objective under optimization.
    #[must_use]
    pub fn objective(&self) -> &O {
        &self.objective
    }

    /// Refits the regressor on the full normalized history.
    fn refit(&mut self) -> Result<()> {
        let bounds = self.objective.bounds();
        let x: Vec<Vec<f64>> = self
            .history
            .points()
            .iter()
            .map(|p| bounds.normalize(p))
            .collect();
        self.regressor.fit(&x, self.history.scores())?;
        self.fitted = true;
        Ok(())
    }

    /// Seeds the engine: evaluates the objective on the full Cartesian grid
    /// (`grid_size` samples per dimension — `grid_size^D` evaluations, so
    /// keep `D` small) and fits the regressor.
    ///
    /// # Errors
    ///
    /// Propagates objective and regression failures.
    pub fn init(&mut self, grid_size: usize) -> Result<()> {
        let grid = self.objective.bounds().grid(grid_size);
        let scores = self.objective.evaluate(&grid)?;
        self.history.extend(&grid, &scores)?;
        self.refit()
    }

    /// The scalarized GP-UCB acquisition `Π mean + κ · Σ std` at `x`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RegressionFailure`] before the first fit.
    pub fn acquisition(&self, x: &[f64]) -> Result<f64> {
        let normalized = self.objective.bounds().normalize(x);
        let prediction = &self.regressor.predict(&[normalized])?[0];
        Ok(ucb(prediction, self.kappa))
    }

    /// One optimization step: maximize the acquisition, evaluate the
    /// objective at the argmax, append, refit on the full history.
    ///
    /// # Errors
    ///
    /// Propagates objective, solver, and regression failures; evaluation
    /// errors abort the run (recovery is restart + checkpoint resume).
    pub fn iterate(&mut self) -> Result<()> {
        let bounds = self.objective.bounds();
        let regressor = &self.regressor;
        let kappa = self.kappa;

        // The solver minimizes, so negate. Prediction failures surface as
        // +inf, the worst possible value for a minimizer.
        let neg_acquisition = |x: &[f64]| -> f64 {
            let normalized = bounds.normalize(x);
            regressor
                .predict(&[normalized])
                .map_or(f64::INFINITY, |preds| -ucb(&preds[0], kappa))
        };
        let outcome = self
            .solver
            .minimize(&neg_acquisition, bounds.lower(), bounds.upper())?;

        let point = outcome.point;
        let scores = self.objective.evaluate(std::slice::from_ref(&point))?;
        self.history.extend(&[point], &scores)?;
        self.refit()?;

        tracing::info!(
            samples = self.history.len(),
            acquisition = -outcome.value,
            "engine iteration complete"
        );
        Ok(())
    }

    /// Runs the full loop: grid seed (reusing the checkpointed seed when
    /// present), resume from the newest iteration snapshot, then iterate
    /// until `num_iter`, checkpointing every `checkpoint_interval`
    /// iterations and retaining only the `keep_latest` newest snapshots.
    ///
    /// Starting fresh with a grid of G points and `num_iter = N` leaves
    /// exactly `G + N` samples in the history.
    ///
    /// # Errors
    ///
    /// Propagates objective, regression, and checkpoint failures. Missing
    /// checkpoint files are not errors.
    pub fn run(
        &mut self,
        grid_size: usize,
        num_iter: usize,
        checkpoint_dir: Option<&Path>,
        checkpoint_interval: usize,
        keep_latest: usize,
    ) -> Result<()> {
        let mut ring = match checkpoint_dir {
            Some(dir) => Some(CheckpointRing::open(dir, keep_latest)?),
            None => None,
        };

        // Seed: reuse the init snapshot when one exists.
        let seeded = match &ring {
            Some(ring) => match ring.load_init::<EngineSnapshot>()? {
                Some(snapshot) => {
                    self.restore(snapshot)?;
                    true
                }
                None => false,
            },
            None => false,
        };
        if !seeded && grid_size > 0 {
            self.init(grid_size)?;
            if let Some(ring) = &ring {
                ring.save_init(&self.snapshot())?;
            }
        }

        // Resume from the newest iteration snapshot, if any.
        let mut start = 0u64;
        if let Some(ring) = &ring
            && let Some((iteration, snapshot)) = ring.load_latest::<EngineSnapshot>()?
        {
            self.restore(snapshot)?;
            start = iteration;
        }

        for i in (start + 1)..=(num_iter as u64) {
            tracing::info!(iteration = i, "multi-objective iteration");
            self.iterate()?;
            if let Some(ring) = &mut ring
                && checkpoint_interval > 0
                && i % checkpoint_interval as u64 == 0
            {
                ring.save_iteration(i, &self.snapshot())?;
            }
        }
        Ok(())
    }

    /// Builds the Pareto front of the *fitted model*: predicted means on a
    /// dense grid, pruned by strict dominance in every metric (O(n²) over
    /// the grid). Returns `(point, predicted mean score)` pairs with no
    /// tie-breaking beyond the dominance test.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RegressionFailure`] before the first fit.
    pub fn pareto_front(&self, grid_size: usize) -> Result<Vec<(Point, Score)>> {
        let bounds = self.objective.bounds();
        let grid = bounds.grid(grid_size);
        let normalized: Vec<Vec<f64>> = grid.iter().map(|p| bounds.normalize(p)).collect();
        let predictions = self.regressor.predict(&normalized)?;
        let means: Vec<Vec<f64>> = predictions.into_iter().map(|p| p.mean).collect();

        Ok(pareto::non_dominated_indices(&means)
            .into_iter()
            .map(|i| (grid[i].clone(), means[i].clone()))
            .collect())
    }

    /// The point maximizing the fitted model's predicted mean for one
    /// metric, found by the same global solver used for the acquisition.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] for an out-of-range metric
    /// index and propagates solver failures.
    pub fn best_on_metric(&self, metric: usize) -> Result<Point> {
        let n_metrics = self.objective.metrics().len();
        if metric >= n_metrics {
            return Err(Error::DimensionMismatch {
                expected: n_metrics,
                got: metric,
            });
        }
        let bounds = self.objective.bounds();
        let regressor = &self.regressor;
        let neg_mean = |x: &[f64]| -> f64 {
            let normalized = bounds.normalize(x);
            regressor
                .predict(&[normalized])
                .map_or(f64::INFINITY, |preds| -preds[0].mean[metric])
        };
        let outcome = self
            .solver
            .minimize(&neg_mean, bounds.lower(), bounds.upper())?;
        Ok(outcome.point)
    }

    /// Saves the sample history to a single snapshot file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Checkpoint`] on I/O failure.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        checkpoint::write_json_atomic(path.as_ref(), &self.snapshot())
    }

    /// Loads a snapshot written by [`save`](Self::save) and refits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Checkpoint`] when the file is missing or invalid.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let snapshot: EngineSnapshot = checkpoint::read_json_opt(path.as_ref())?
            .ok_or_else(|| Error::Checkpoint(format!("{}: not found", path.as_ref().display())))?;
        self.restore(snapshot)
    }

    fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            version: SNAPSHOT_VERSION,
            points: self.history.points().to_vec(),
            scores: self.history.scores().to_vec(),
        }
    }

    fn restore(&mut self, snapshot: EngineSnapshot) -> Result<()> {
        self.history = SampleHistory::from_parts(snapshot.points, snapshot.scores)?;
        self.refit()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for a [`MultiObjectiveEngine`] with the packaged GP regressor
/// and random-search solver.
///
/// Defaults: `kappa` 10.0, Matérn 5/2 GP with lengthscale 1.0 and noise
/// 1e-4, solver with 2000 candidates and a random seed.
#[derive(Clone, Debug, Default)]
pub struct MultiObjectiveEngineBuilder {
    kappa: Option<f64>,
    length_scale: Option<f64>,
    noise: Option<f64>,
    kernel: Option<crate::regressor::Kernel>,
    solver_candidates: Option<usize>,
    seed: Option<u64>,
}

impl MultiObjectiveEngineBuilder {
    /// Sets the exploit/explore trade-off constant. Default: 10.0.
    #[must_use]
    pub fn kappa(mut self, kappa: f64) -> Self {
        self.kappa = Some(kappa);
        self
    }

    /// Sets the GP kernel lengthscale. Default: 1.0.
    #[must_use]
    pub fn length_scale(mut self, length_scale: f64) -> Self {
        self.length_scale = Some(length_scale);
        self
    }

    /// Sets the GP observation noise. Default: 1e-4.
    #[must_use]
    pub fn noise(mut self, noise: f64) -> Self {
        self.noise = Some(noise);
        self
    }

    /// Sets the GP kernel. Default: Matérn 5/2.
    #[must_use]
    pub fn kernel(mut self, kernel: crate::regressor::Kernel) -> Self {
        self.kernel = Some(kernel);
        self
    }

    /// Sets the solver's global candidate budget. Default: 2000.
    #[must_use]
    pub fn solver_candidates(mut self, n: usize) -> Self {
        self.solver_candidates = Some(n);
        self
    }

    /// Sets the solver seed for reproducibility.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Builds the engine over `objective`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SingleMetric`] when the objective has fewer than
    /// two metrics.
    pub fn build<O: Objective>(self, objective: O) -> Result<MultiObjectiveEngine<O>> {
        let mut gp = GpRegressor::builder();
        if let Some(kernel) = self.kernel {
            gp = gp.kernel(kernel);
        }
        if let Some(ls) = self.length_scale {
            gp = gp.length_scale(ls);
        }
        if let Some(noise) = self.noise {
            gp = gp.noise(noise);
        }

        let mut solver = RandomSearchSolver::builder();
        if let Some(n) = self.solver_candidates {
            solver = solver.n_candidates(n);
        }
        if let Some(seed) = self.seed {
            solver = solver.seed(seed);
        }

        MultiObjectiveEngine::with_parts(
            objective,
            gp.build(),
            solver.build(),
            self.kappa.unwrap_or(DEFAULT_KAPPA),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regressor::Prediction;
    use crate::synthetic::{Test1D1M, Test1D2M};

    fn small_engine() -> MultiObjectiveEngine<Test1D2M> {
        MultiObjectiveEngine::<Test1D2M>::builder()
            .length_scale(0.3)
            .solver_candidates(200)
            .seed(11)
            .build(Test1D2M::with_seed(5))
            .unwrap()
    }

    #[test]
    fn rejects_single_metric_before_any_evaluation() {
        let err = MultiObjectiveEngine::new(Test1D1M::with_seed(0)).unwrap_err();
        assert!(matches!(err, Error::SingleMetric(1)));
    }

    #[test]
    fn ucb_is_invariant_under_metric_permutation() {
        let pred = Prediction {
            mean: vec![0.3, -1.2, 2.0],
            std: vec![0.1, 0.4, 0.2],
        };
        let permuted = Prediction {
            mean: vec![2.0, 0.3, -1.2],
            std: vec![0.2, 0.1, 0.4],
        };
        assert!((ucb(&pred, 7.0) - ucb(&permuted, 7.0)).abs() < 1e-12);
    }

    #[test]
    fn init_seeds_the_full_grid() {
        let mut engine = small_engine();
        engine.init(6).unwrap();
        assert_eq!(engine.history().len(), 6);
        // Acquisition is defined once fitted.
        assert!(engine.acquisition(&[0.5]).unwrap().is_finite());
    }

    #[test]
    fn iterate_appends_exactly_one_sample() {
        let mut engine = small_engine();
        engine.init(4).unwrap();
        engine.iterate().unwrap();
        engine.iterate().unwrap();
        assert_eq!(engine.history().len(), 6);
    }

    #[test]
    fn pareto_front_of_fitted_model_is_mutually_non_dominating() {
        let mut engine = small_engine();
        engine.init(6).unwrap();
        let front = engine.pareto_front(16).unwrap();
        assert!(!front.is_empty());
        for (_, a) in &front {
            for (_, b) in &front {
                if !core::ptr::eq(a, b) {
                    assert!(!crate::pareto::dominates(a, b));
                }
            }
        }
    }

    #[test]
    fn best_on_metric_rejects_out_of_range_index() {
        let mut engine = small_engine();
        engine.init(4).unwrap();
        assert!(engine.best_on_metric(2).is_err());
        let best = engine.best_on_metric(0).unwrap();
        assert_eq!(best.len(), 1);
    }
}
