//! The actor-critic unit behind decomposed optimization.
//!
//! One [`DesignPolicyUnit`] exists per `(object, object-dependent metric)`
//! pair. It owns two regressors:
//!
//! - the **critic** maps a full point (`design ++ policy`) to that pair's
//!   scalar score;
//! - the **actor** maps a design to the best policy found for it, fitted
//!   over the unit's policy cache.
//!
//! When new samples arrive, the unit refits the critic, then re-runs the
//! inner policy search (design fixed, policy ranging over the policy
//! sub-bounds, critic mean as the objective) for every design the new batch
//! touches, and finally refits the actor on the full cache. At query time
//! the actor answers in a single model evaluation — the inner search is
//! amortized away, which is the point of having an actor.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::regressor::Regressor;
use crate::solver::Solver;
use crate::types::{Bounds, Point, SampleHistory};

/// Serialized unit state: critic history plus the policy cache.
#[derive(Serialize, Deserialize)]
pub(crate) struct UnitSnapshot {
    pub(crate) points: Vec<Point>,
    pub(crate) scores: Vec<f64>,
    pub(crate) policy_cache: Vec<(Vec<f64>, Vec<f64>)>,
}

/// Critic + actor pair for one `(object, object-dependent metric)` slot.
#[derive(Debug)]
pub struct DesignPolicyUnit<R, S> {
    critic: R,
    actor: R,
    solver: S,
    bounds: Bounds,
    ndesign: usize,
    /// Critic history: full points against scalar scores.
    history: SampleHistory,
    /// Exactly one `(design, best policy)` entry per distinct design ever
    /// added, in first-seen order.
    cache: Vec<(Vec<f64>, Vec<f64>)>,
}

impl<R: Regressor, S: Solver> DesignPolicyUnit<R, S> {
    /// Creates an empty unit over the full point `bounds`, of which the
    /// first `ndesign` dimensions are the design.
    pub fn new(bounds: Bounds, ndesign: usize, critic: R, actor: R, solver: S) -> Self {
        Self {
            critic,
            actor,
            solver,
            bounds,
            ndesign,
            history: SampleHistory::new(),
            cache: Vec::new(),
        }
    }

    /// The critic's sample history.
    #[must_use]
    pub fn history(&self) -> &SampleHistory {
        &self.history
    }

    /// The `(design, best policy)` cache, in first-seen order.
    #[must_use]
    pub fn policy_cache(&self) -> &[(Vec<f64>, Vec<f64>)] {
        &self.cache
    }

    fn design_bounds(&self) -> Bounds {
        self.bounds.slice(0..self.ndesign)
    }

    fn policy_bounds(&self) -> Bounds {
        self.bounds.slice(self.ndesign..self.bounds.len())
    }

    /// Appends evaluated samples, refits the critic, refreshes the cached
    /// best policy of every design the batch touches, and refits the actor
    /// on the full cache.
    ///
    /// Designs already cached and absent from the batch are *not*
    /// re-searched; their cached policies stay as-is. Calling with empty
    /// batches forces the refits alone, which is how restored units come
    /// back to life without redoing the inner search.
    ///
    /// # Errors
    ///
    /// Propagates regression and solver failures and rejects ragged
    /// batches.
    pub fn add_points(&mut self, points: &[Point], scores: &[f64]) -> Result<()> {
        let score_rows: Vec<Vec<f64>> = scores.iter().map(|&s| vec![s]).collect();
        self.history.extend(points, &score_rows)?;
        if self.history.is_empty() {
            return Ok(());
        }

        // Critic: full point -> scalar score, on normalized inputs.
        let x: Vec<Vec<f64>> = self
            .history
            .points()
            .iter()
            .map(|p| self.bounds.normalize(p))
            .collect();
        self.critic.fit(&x, self.history.scores())?;

        // Inner policy search for every design touched by this batch, plus
        // any design in history that has no cache entry yet (the case after
        // a restore from a snapshot without a cache).
        let mut stale: Vec<Vec<f64>> = Vec::new();
        for point in points {
            let design = point[..self.ndesign].to_vec();
            if !stale.contains(&design) {
                stale.push(design);
            }
        }
        for point in self.history.points() {
            let design = point[..self.ndesign].to_vec();
            if !stale.contains(&design) && !self.cache.iter().any(|(d, _)| *d == design) {
                stale.push(design);
            }
        }

        for design in stale {
            let policy = self.search_best_policy(&design)?;
            match self.cache.iter_mut().find(|(d, _)| *d == design) {
                Some(entry) => entry.1 = policy,
                None => self.cache.push((design, policy)),
            }
        }

        // Actor: normalized design -> best policy, over the full cache.
        let design_bounds = self.design_bounds();
        let ax: Vec<Vec<f64>> = self
            .cache
            .iter()
            .map(|(d, _)| design_bounds.normalize(d))
            .collect();
        let ay: Vec<Vec<f64>> = self.cache.iter().map(|(_, p)| p.clone()).collect();
        self.actor.fit(&ax, &ay)
    }

    /// Runs the nested inner optimization: design fixed, policy free.
    fn search_best_policy(&self, design: &[f64]) -> Result<Vec<f64>> {
        let policy_bounds = self.policy_bounds();
        let critic = &self.critic;
        let bounds = &self.bounds;

        let neg_score = |policy: &[f64]| -> f64 {
            let mut point = design.to_vec();
            point.extend_from_slice(policy);
            let normalized = bounds.normalize(&point);
            critic
                .predict(&[normalized])
                .map_or(f64::INFINITY, |preds| -preds[0].mean[0])
        };
        let outcome =
            self.solver
                .minimize(&neg_score, policy_bounds.lower(), policy_bounds.upper())?;
        Ok(outcome.point)
    }

    /// The actor's policy estimate for `design` — one model query, no
    /// re-optimization.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RegressionFailure`] before the first
    /// [`add_points`](Self::add_points).
    pub fn estimate_best_policy(&self, design: &[f64]) -> Result<Vec<f64>> {
        let normalized = self.design_bounds().normalize(design);
        Ok(self.actor.predict(&[normalized])?[0].mean.clone())
    }

    /// `design ++ estimate_best_policy(design)`, exactly, by construction.
    ///
    /// # Errors
    ///
    /// Same as [`estimate_best_policy`](Self::estimate_best_policy).
    pub fn estimate_best_design_policy(&self, design: &[f64]) -> Result<Point> {
        let mut point = design.to_vec();
        point.extend(self.estimate_best_policy(design)?);
        Ok(point)
    }

    /// Critic `(mean, std)` at the actor-completed point for `design`.
    ///
    /// # Errors
    ///
    /// Same as [`estimate_best_policy`](Self::estimate_best_policy).
    pub fn estimate_best_score(&self, design: &[f64]) -> Result<(f64, f64)> {
        let point = self.estimate_best_design_policy(design)?;
        let normalized = self.bounds.normalize(&point);
        let prediction = &self.critic.predict(&[normalized])?[0];
        Ok((prediction.mean[0], prediction.std[0]))
    }

    pub(crate) fn snapshot(&self) -> UnitSnapshot {
        UnitSnapshot {
            points: self.history.points().to_vec(),
            scores: self.history.scores().iter().map(|s| s[0]).collect(),
            policy_cache: self.cache.clone(),
        }
    }

    /// Restores serialized state, then replays an empty `add_points` to
    /// refit both models. Only designs missing from the restored cache
    /// trigger the inner search.
    pub(crate) fn restore(&mut self, snapshot: UnitSnapshot) -> Result<()> {
        let score_rows: Vec<Vec<f64>> = snapshot.scores.iter().map(|&s| vec![s]).collect();
        self.history = SampleHistory::from_parts(snapshot.points, score_rows)?;
        self.cache = snapshot.policy_cache;

        for (design, _) in &self.cache {
            if design.len() != self.ndesign {
                return Err(Error::DimensionMismatch {
                    expected: self.ndesign,
                    got: design.len(),
                });
            }
        }
        self.add_points(&[], &[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regressor::GpRegressor;
    use crate::solver::RandomSearchSolver;

    fn unit() -> DesignPolicyUnit<GpRegressor, RandomSearchSolver> {
        let gp = || GpRegressor::builder().length_scale(0.4).build();
        DesignPolicyUnit::new(
            Bounds::unit(2),
            1,
            gp(),
            gp(),
            RandomSearchSolver::builder()
                .n_candidates(300)
                .seed(3)
                .build(),
        )
    }

    /// Score peaked at policy = 0.7, independent of design.
    fn score(point: &[f64]) -> f64 {
        1.0 - (point[1] - 0.7) * (point[1] - 0.7)
    }

    fn seed_batch() -> (Vec<Point>, Vec<f64>) {
        let mut points = Vec::new();
        for &d in &[0.0, 0.5, 1.0] {
            for &p in &[0.0, 0.25, 0.5, 0.75, 1.0] {
                points.push(vec![d, p]);
            }
        }
        let scores = points.iter().map(|p| score(p)).collect();
        (points, scores)
    }

    #[test]
    fn one_cache_entry_per_distinct_design() {
        let mut unit = unit();
        let (points, scores) = seed_batch();
        unit.add_points(&points, &scores).unwrap();
        assert_eq!(unit.policy_cache().len(), 3);
        assert_eq!(unit.history().len(), 15);
    }

    #[test]
    fn inner_search_finds_the_policy_peak() {
        let mut unit = unit();
        let (points, scores) = seed_batch();
        unit.add_points(&points, &scores).unwrap();
        for (_, policy) in unit.policy_cache() {
            assert!((policy[0] - 0.7).abs() < 0.15, "policy {policy:?}");
        }
    }

    #[test]
    fn design_policy_concatenation_identity() {
        let mut unit = unit();
        let (points, scores) = seed_batch();
        unit.add_points(&points, &scores).unwrap();

        let design = [0.3];
        let policy = unit.estimate_best_policy(&design).unwrap();
        let full = unit.estimate_best_design_policy(&design).unwrap();
        assert_eq!(full[..1], design);
        assert_eq!(full[1..], policy[..]);
    }

    #[test]
    fn estimate_best_score_reports_uncertainty() {
        let mut unit = unit();
        let (points, scores) = seed_batch();
        unit.add_points(&points, &scores).unwrap();
        let (mean, std) = unit.estimate_best_score(&[0.5]).unwrap();
        assert!(mean > 0.5);
        assert!(std >= 0.0);
    }

    #[test]
    fn snapshot_restore_round_trip_preserves_cache() {
        let mut unit_a = unit();
        let (points, scores) = seed_batch();
        unit_a.add_points(&points, &scores).unwrap();

        let snapshot = unit_a.snapshot();
        let mut unit_b = unit();
        unit_b.restore(snapshot).unwrap();

        assert_eq!(unit_a.history().len(), unit_b.history().len());
        assert_eq!(unit_a.policy_cache(), unit_b.policy_cache());

        // Restored critic reproduces stored targets within fit tolerance.
        let (mean, _) = unit_b.estimate_best_score(&[0.5]).unwrap();
        assert!((mean - 1.0).abs() < 0.2);
    }

    #[test]
    fn re_adding_a_design_refreshes_its_cache_entry() {
        let mut unit = unit();
        let (points, scores) = seed_batch();
        unit.add_points(&points, &scores).unwrap();
        let before = unit.policy_cache().len();

        // Same design again, new sample.
        unit.add_points(&[vec![0.5, 0.7]], &[score(&[0.5, 0.7])])
            .unwrap();
        assert_eq!(unit.policy_cache().len(), before);
    }
}
