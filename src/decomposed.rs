//! The decomposed GP-UCB engine for design/policy problems.
//!
//! [`DecomposedEngine`] splits a composite problem along its natural seams
//! instead of modeling the full point space at once:
//!
//! - one **shared model** over the design sub-space covers the
//!   object-independent metrics (policies do not influence them, so the
//!   design prefix is the whole story);
//! - a 2-D grid of [`DesignPolicyUnit`]s, indexed
//!   `(object, object-dependent metric)`, covers everything the policy
//!   touches.
//!
//! The outer acquisition search runs over the design sub-bounds only. Each
//! unit's actor supplies the per-object policy for a candidate design, so
//! acquisition evaluation never re-runs the inner policy optimization.
//! Per iteration the engine proposes one [`CompositePoint`] per
//! object-dependent metric, evaluates them in a single batch, and feeds
//! every unit the whole batch; all composite points of one iteration share
//! a design, so each unit performs exactly one inner search per iteration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::actor_critic::{DesignPolicyUnit, UnitSnapshot};
use crate::checkpoint::{self, CheckpointRing};
use crate::engine::{DEFAULT_KAPPA, SNAPSHOT_VERSION};
use crate::error::{Error, Result};
use crate::objective::{CompositePoint, DecomposedObjective, DecomposedScores};
use crate::regressor::{GpRegressor, Regressor};
use crate::solver::{RandomSearchSolver, Solver};
use crate::types::{Bounds, Point, SampleHistory, Score};

/// Serialized engine state: the shared history plus one snapshot per unit,
/// object-major over `(objects × object-dependent metrics)`.
#[derive(Serialize, Deserialize)]
struct DecomposedSnapshot {
    /// Schema version for forward compatibility.
    version: u32,
    points: Vec<Point>,
    scores: Vec<Score>,
    units: Vec<UnitSnapshot>,
}

/// Decomposed multi-objective Bayesian optimization.
///
/// Construction rejects single-metric problems ([`Error::SingleMetric`])
/// and problems without at least one object-dependent metric — without one
/// the decomposition degenerates to [`MultiObjectiveEngine`](crate::MultiObjectiveEngine).
#[derive(Debug)]
pub struct DecomposedEngine<O, R = GpRegressor, S = RandomSearchSolver> {
    objective: O,
    shared: R,
    /// `units[object][j]` models object-dependent metric
    /// `od_metric_idx[j]` for that object.
    units: Vec<Vec<DesignPolicyUnit<R, S>>>,
    solver: S,
    kappa: f64,
    /// Designs against shared-metric score rows, in evaluation order.
    shared_history: SampleHistory,
    shared_metric_idx: Vec<usize>,
    od_metric_idx: Vec<usize>,
}

impl<O: DecomposedObjective> DecomposedEngine<O> {
    /// Creates a builder for configuring the engine.
    #[must_use]
    pub fn builder() -> DecomposedEngineBuilder {
        DecomposedEngineBuilder::default()
    }
}

impl<O: DecomposedObjective, R: Regressor, S: Solver> DecomposedEngine<O, R, S> {
    /// Creates an engine from explicit parts. `units` must be shaped
    /// `num_objects × (number of object-dependent metrics)`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SingleMetric`] for fewer than two metrics,
    /// [`Error::Internal`] when no metric is object-dependent or no policy
    /// dimension remains, and [`Error::DimensionMismatch`] when the unit
    /// grid has the wrong shape. All checks happen before any evaluation.
    pub fn with_parts(
        objective: O,
        shared: R,
        units: Vec<Vec<DesignPolicyUnit<R, S>>>,
        solver: S,
        kappa: f64,
    ) -> Result<Self> {
        let n_metrics = objective.metrics().len();
        if n_metrics < 2 {
            return Err(Error::SingleMetric(n_metrics));
        }
        let shared_metric_idx: Vec<usize> = objective
            .metrics()
            .iter()
            .enumerate()
            .filter(|(_, m)| !m.object_dependent)
            .map(|(i, _)| i)
            .collect();
        let od_metric_idx: Vec<usize> = objective
            .metrics()
            .iter()
            .enumerate()
            .filter(|(_, m)| m.object_dependent)
            .map(|(i, _)| i)
            .collect();
        if od_metric_idx.is_empty() {
            return Err(Error::Internal("no object-dependent metric to decompose"));
        }
        if objective.design_dims() >= objective.bounds().len() {
            return Err(Error::Internal("no policy dimensions after the design"));
        }
        if units.len() != objective.num_objects() {
            return Err(Error::DimensionMismatch {
                expected: objective.num_objects(),
                got: units.len(),
            });
        }
        for row in &units {
            if row.len() != od_metric_idx.len() {
                return Err(Error::DimensionMismatch {
                    expected: od_metric_idx.len(),
                    got: row.len(),
                });
            }
        }
        Ok(Self {
            objective,
            shared,
            units,
            solver,
            kappa,
            shared_history: SampleHistory::new(),
            shared_metric_idx,
            od_metric_idx,
        })
    }

    /// The shared design history: `(design, shared-metric scores)` rows in
    /// evaluation order.
    #[must_use]
    pub fn shared_history(&self) -> &SampleHistory {
        &self.shared_history
    }

    /// The unit modeling `metric` for `object`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] when `object` is out of range
    /// or `metric` is not an object-dependent metric index.
    pub fn unit(&self, object: usize, metric: usize) -> Result<&DesignPolicyUnit<R, S>> {
        let j = self
            .od_metric_idx
            .iter()
            .position(|&m| m == metric)
            .ok_or(Error::DimensionMismatch {
                expected: self.objective.metrics().len(),
                got: metric,
            })?;
        self.units
            .get(object)
            .map(|row| &row[j])
            .ok_or(Error::DimensionMismatch {
                expected: self.units.len(),
                got: object,
            })
    }

    /// The objective under optimization.
    #[must_use]
    pub fn objective(&self) -> &O {
        &self.objective
    }

    fn design_bounds(&self) -> Bounds {
        self.objective
            .bounds()
            .slice(0..self.objective.design_dims())
    }

    fn num_objects_f(&self) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let k = self.units.len() as f64;
        k
    }

    /// Refits the shared model on the normalized design history.
    fn refit_shared(&mut self) -> Result<()> {
        if self.shared_metric_idx.is_empty() || self.shared_history.is_empty() {
            return Ok(());
        }
        let design_bounds = self.design_bounds();
        let x: Vec<Vec<f64>> = self
            .shared_history
            .points()
            .iter()
            .map(|d| design_bounds.normalize(d))
            .collect();
        self.shared.fit(&x, self.shared_history.scores())
    }

    /// Appends one evaluated composite batch to the shared model and to
    /// every unit.
    fn update(&mut self, points: &[CompositePoint], scores: &DecomposedScores) -> Result<()> {
        let designs: Vec<Point> = points.iter().map(|p| p.design.clone()).collect();
        let shared_rows: Vec<Score> = scores
            .independent
            .iter()
            .map(|row| self.shared_metric_idx.iter().map(|&m| row[m]).collect())
            .collect();
        self.shared_history.extend(&designs, &shared_rows)?;
        self.refit_shared()?;

        for (object, row) in self.units.iter_mut().enumerate() {
            let flats: Vec<Point> = points.iter().map(|p| p.flatten_for(object)).collect();
            for (j, unit) in row.iter_mut().enumerate() {
                let metric = self.od_metric_idx[j];
                let ys: Vec<f64> = scores
                    .per_object
                    .iter()
                    .map(|pt| pt[object][metric])
                    .collect();
                unit.add_points(&flats, &ys)?;
            }
        }
        Ok(())
    }

    /// Seeds the engine: the full design+policy Cartesian grid, each grid
    /// point evaluated as a composite point whose policy is replicated
    /// across all objects.
    ///
    /// # Errors
    ///
    /// Propagates objective, solver, and regression failures.
    pub fn init(&mut self, grid_size: usize) -> Result<()> {
        let ndesign = self.objective.design_dims();
        let num_objects = self.units.len();
        let composites: Vec<CompositePoint> = self
            .objective
            .bounds()
            .grid(grid_size)
            .into_iter()
            .map(|p| CompositePoint {
                design: p[..ndesign].to_vec(),
                policies: vec![p[ndesign..].to_vec(); num_objects],
            })
            .collect();
        let scores = self.objective.evaluate_composite(&composites)?;
        self.update(&composites, &scores)
    }

    /// The decomposed acquisition at `design`: shared-model means and
    /// stds, combined with the across-object average of each unit's
    /// `estimate_best_score`, under the usual `Π mean + κ · Σ std` rule.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RegressionFailure`] before the first fit.
    pub fn acquisition(&self, design: &[f64]) -> Result<f64> {
        let mut volume = 1.0;
        let mut sigma_sum = 0.0;

        if !self.shared_metric_idx.is_empty() {
            let normalized = self.design_bounds().normalize(design);
            let prediction = &self.shared.predict(&[normalized])?[0];
            volume *= prediction.mean.iter().product::<f64>();
            sigma_sum += prediction.std.iter().sum::<f64>();
        }

        let k = self.num_objects_f();
        for j in 0..self.od_metric_idx.len() {
            let mut mean_sum = 0.0;
            let mut std_sum = 0.0;
            for row in &self.units {
                let (mean, std) = row[j].estimate_best_score(design)?;
                mean_sum += mean;
                std_sum += std;
            }
            volume *= mean_sum / k;
            sigma_sum += std_sum / k;
        }
        Ok(volume + self.kappa * sigma_sum)
    }

    /// One optimization step: maximize the acquisition over the design
    /// sub-bounds, propose one composite point per object-dependent metric
    /// (policies from each unit's actor), evaluate the batch, update the
    /// shared model and every unit.
    ///
    /// # Errors
    ///
    /// Propagates objective, solver, and regression failures.
    pub fn iterate(&mut self) -> Result<()> {
        let design_bounds = self.design_bounds();

        // The solver minimizes, so negate. Prediction failures surface as
        // +inf, the worst possible value for a minimizer.
        let neg_acquisition =
            |x: &[f64]| -> f64 { self.acquisition(x).map_or(f64::INFINITY, |v| -v) };
        let outcome =
            self.solver
                .minimize(&neg_acquisition, design_bounds.lower(), design_bounds.upper())?;
        let design = outcome.point;

        let mut composites = Vec::with_capacity(self.od_metric_idx.len());
        for j in 0..self.od_metric_idx.len() {
            let policies = self
                .units
                .iter()
                .map(|row| row[j].estimate_best_policy(&design))
                .collect::<Result<Vec<_>>>()?;
            composites.push(CompositePoint {
                design: design.clone(),
                policies,
            });
        }

        let scores = self.objective.evaluate_composite(&composites)?;
        self.update(&composites, &scores)?;

        tracing::info!(
            designs = self.shared_history.len(),
            acquisition = -outcome.value,
            "decomposed iteration complete"
        );
        Ok(())
    }

    /// Runs the full loop: grid seed (reusing the checkpointed seed when
    /// present), resume from the newest iteration snapshot, then iterate
    /// until `num_iter`, checkpointing every `checkpoint_interval`
    /// iterations and retaining the `keep_latest` newest snapshots.
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

        let seeded = match &ring {
            Some(ring) => match ring.load_init::<DecomposedSnapshot>()? {
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

        let mut start = 0u64;
        if let Some(ring) = &ring
            && let Some((iteration, snapshot)) = ring.load_latest::<DecomposedSnapshot>()?
        {
            self.restore(snapshot)?;
            start = iteration;
        }

        for i in (start + 1)..=(num_iter as u64) {
            tracing::info!(iteration = i, "decomposed iteration");
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

    /// One full-width reporting row per stored design: raw stored values
    /// for shared metrics, across-object average of the units'
    /// `estimate_best_score` means for object-dependent metrics.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RegressionFailure`] before the first fit.
    pub fn reconstruct_scores(&self) -> Result<Vec<Score>> {
        let width = self.objective.metrics().len();
        let k = self.num_objects_f();
        let mut rows = Vec::with_capacity(self.shared_history.len());

        for (design, shared_row) in self
            .shared_history
            .points()
            .iter()
            .zip(self.shared_history.scores())
        {
            let mut row = vec![0.0; width];
            for (col, &m) in self.shared_metric_idx.iter().enumerate() {
                row[m] = shared_row[col];
            }
            for (j, &m) in self.od_metric_idx.iter().enumerate() {
                let mut mean_sum = 0.0;
                for unit_row in &self.units {
                    mean_sum += unit_row[j].estimate_best_score(design)?.0;
                }
                row[m] = mean_sum / k;
            }
            rows.push(row);
        }
        Ok(rows)
    }

    /// Saves the full engine state to a single snapshot file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Checkpoint`] on I/O failure.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        checkpoint::write_json_atomic(path.as_ref(), &self.snapshot())
    }

    /// Loads a snapshot written by [`save`](Self::save) and refits every
    /// model. Cached unit policies survive the round trip, so no inner
    /// search is re-run.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Checkpoint`] when the file is missing or invalid.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let snapshot: DecomposedSnapshot = checkpoint::read_json_opt(path.as_ref())?
            .ok_or_else(|| Error::Checkpoint(format!("{}: not found", path.as_ref().display())))?;
        self.restore(snapshot)
    }

    fn snapshot(&self) -> DecomposedSnapshot {
        DecomposedSnapshot {
            version: SNAPSHOT_VERSION,
            points: self.shared_history.points().to_vec(),
            scores: self.shared_history.scores().to_vec(),
            units: self
                .units
                .iter()
                .flat_map(|row| row.iter().map(DesignPolicyUnit::snapshot))
                .collect(),
        }
    }

    fn restore(&mut self, snapshot: DecomposedSnapshot) -> Result<()> {
        let expected = self.units.len() * self.od_metric_idx.len();
        if snapshot.units.len() != expected {
            return Err(Error::DimensionMismatch {
                expected,
                got: snapshot.units.len(),
            });
        }
        self.shared_history = SampleHistory::from_parts(snapshot.points, snapshot.scores)?;
        self.refit_shared()?;

        // Same object-major order as `snapshot`.
        let mut states = snapshot.units.into_iter();
        for row in &mut self.units {
            for unit in row {
                let state = states.next().ok_or(Error::Internal("snapshot underrun"))?;
                unit.restore(state)?;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for a [`DecomposedEngine`] with the packaged GP regressor and
/// random-search solver.
///
/// Defaults match [`MultiObjectiveEngine::builder`](crate::MultiObjectiveEngine::builder);
/// the seed, when set, is offset per unit so the inner searches do not
/// share a random stream.
#[derive(Clone, Debug, Default)]
pub struct DecomposedEngineBuilder {
    kappa: Option<f64>,
    length_scale: Option<f64>,
    noise: Option<f64>,
    kernel: Option<crate::regressor::Kernel>,
    solver_candidates: Option<usize>,
    seed: Option<u64>,
}

impl DecomposedEngineBuilder {
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

    /// Sets the base solver seed for reproducibility.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn gp(&self) -> GpRegressor {
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
        gp.build()
    }

    fn solver(&self, offset: u64) -> RandomSearchSolver {
        let mut solver = RandomSearchSolver::builder();
        if let Some(n) = self.solver_candidates {
            solver = solver.n_candidates(n);
        }
        if let Some(seed) = self.seed {
            solver = solver.seed(seed.wrapping_add(offset));
        }
        solver.build()
    }

    /// Builds the engine over `objective`.
    ///
    /// # Errors
    ///
    /// Same as [`DecomposedEngine::with_parts`].
    pub fn build<O: DecomposedObjective>(self, objective: O) -> Result<DecomposedEngine<O>> {
        let num_objects = objective.num_objects();
        let od_metrics = objective
            .metrics()
            .iter()
            .filter(|m| m.object_dependent)
            .count();
        let bounds = objective.bounds().clone();
        let ndesign = objective.design_dims();

        let units = (0..num_objects)
            .map(|object| {
                (0..od_metrics)
                    .map(|j| {
                        let offset = 1 + (object * od_metrics + j) as u64;
                        DesignPolicyUnit::new(
                            bounds.clone(),
                            ndesign,
                            self.gp(),
                            self.gp(),
                            self.solver(offset),
                        )
                    })
                    .collect()
            })
            .collect();

        DecomposedEngine::with_parts(
            objective,
            self.gp(),
            units,
            self.solver(0),
            self.kappa.unwrap_or(DEFAULT_KAPPA),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::objective::Objective;
    use crate::synthetic::DecomposedToy;
    use crate::types::MetricDescriptor;

    fn small_engine(seed: u64) -> DecomposedEngine<DecomposedToy> {
        DecomposedEngine::<DecomposedToy>::builder()
            .length_scale(0.4)
            .solver_candidates(200)
            .seed(seed)
            .build(DecomposedToy::new(vec![0.25, 0.75], seed))
            .unwrap()
    }

    #[test]
    fn init_seeds_shared_history_and_every_unit() {
        let mut engine = small_engine(7);
        engine.init(3).unwrap();
        // 3^2 grid points, one shared row each.
        assert_eq!(engine.shared_history().len(), 9);
        let unit = engine.unit(0, 1).unwrap();
        assert_eq!(unit.history().len(), 9);
        // 3 distinct designs in the grid, one cache entry per design.
        assert_eq!(unit.policy_cache().len(), 3);
    }

    #[test]
    fn iterate_appends_one_row_per_object_dependent_metric() {
        let mut engine = small_engine(8);
        engine.init(2).unwrap();
        let before = engine.shared_history().len();
        let unit_before = engine.unit(1, 1).unwrap().history().len();
        engine.iterate().unwrap();
        // One object-dependent metric, hence one composite point.
        assert_eq!(engine.shared_history().len(), before + 1);
        assert_eq!(engine.unit(1, 1).unwrap().history().len(), unit_before + 1);
    }

    #[test]
    fn acquisition_is_finite_after_init() {
        let mut engine = small_engine(9);
        engine.init(3).unwrap();
        assert!(engine.acquisition(&[0.5]).unwrap().is_finite());
    }

    #[test]
    fn reconstructed_rows_span_the_full_metric_list() {
        let mut engine = small_engine(10);
        engine.init(2).unwrap();
        engine.iterate().unwrap();
        let rows = engine.reconstruct_scores().unwrap();
        assert_eq!(rows.len(), engine.shared_history().len());
        assert!(rows.iter().all(|r| r.len() == 2));
    }

    #[test]
    fn unit_lookup_rejects_shared_metric_index() {
        let mut engine = small_engine(11);
        engine.init(2).unwrap();
        // Metric 0 is shared, so no unit models it.
        assert!(engine.unit(0, 0).is_err());
        assert!(engine.unit(5, 1).is_err());
    }

    /// One-metric decomposed objective, for the construction check.
    #[derive(Debug)]
    struct OneMetricToy {
        bounds: crate::types::Bounds,
        metrics: Vec<MetricDescriptor>,
    }

    impl Objective for OneMetricToy {
        fn metrics(&self) -> &[MetricDescriptor] {
            &self.metrics
        }
        fn bounds(&self) -> &crate::types::Bounds {
            &self.bounds
        }
        fn evaluate(&self, points: &[Point]) -> Result<Vec<Score>> {
            Ok(points.iter().map(|_| vec![0.0]).collect())
        }
    }

    impl DecomposedObjective for OneMetricToy {
        fn num_objects(&self) -> usize {
            1
        }
        fn design_dims(&self) -> usize {
            1
        }
        fn evaluate_composite(&self, points: &[CompositePoint]) -> Result<DecomposedScores> {
            Ok(DecomposedScores {
                independent: points.iter().map(|_| vec![0.0]).collect(),
                per_object: points.iter().map(|_| vec![vec![0.0]]).collect(),
            })
        }
        fn compute_metrics(
            &self,
            points: &[Point],
        ) -> Result<(Vec<Vec<f64>>, Vec<Vec<Vec<Vec<f64>>>>)> {
            Ok((
                points.iter().map(|_| vec![0.0]).collect(),
                points.iter().map(|_| vec![vec![vec![0.0]]]).collect(),
            ))
        }
    }

    #[test]
    fn rejects_single_metric_before_any_evaluation() {
        let toy = OneMetricToy {
            bounds: crate::types::Bounds::unit(2),
            metrics: vec![MetricDescriptor::per_object("only")],
        };
        let err = DecomposedEngine::<OneMetricToy>::builder().build(toy).unwrap_err();
        assert!(matches!(err, Error::SingleMetric(1)));
    }
}
