//! Derivative-free box-constrained minimization: the [`Solver`] trait and
//! the packaged multi-start random search.
//!
//! Engines maximize their acquisition by negating it and handing the result
//! to a [`Solver`]; the solver never sees gradients. This is the global
//! optimizer boundary of the system — a different algorithm (DIRECT, CMA-ES,
//! a hand-rolled pattern search) plugs in by implementing the one-method
//! trait.
//!
//! [`RandomSearchSolver`] evaluates `n_candidates` uniform samples in the
//! box, then runs `n_refinements` rounds of local search in a box that
//! shrinks by half around the incumbent each round. Diagnostics go to
//! `tracing::debug!`.

use parking_lot::Mutex;

use crate::error::Result;

/// Outcome of one minimization call.
#[derive(Clone, Debug)]
pub struct SolverOutcome {
    /// The best point found.
    pub point: Vec<f64>,
    /// The objective value at that point.
    pub value: f64,
    /// Whether the search completed normally.
    pub status: SolverStatus,
}

/// Error indicator of a [`SolverOutcome`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolverStatus {
    /// The search ran its full budget and found a finite value.
    Converged,
    /// The box was empty or the objective never returned a finite value;
    /// `point` is the box midpoint and `value` is whatever was observed.
    Degenerate,
}

/// A global, derivative-free, box-constrained minimizer.
///
/// Callers that want to *maximize* negate their objective.
pub trait Solver {
    /// Minimizes `f` over the box `[lower[i], upper[i]]` per dimension.
    ///
    /// # Errors
    ///
    /// Implementations backed by external processes may fail; the packaged
    /// solver never does.
    fn minimize(&self, f: &dyn Fn(&[f64]) -> f64, lower: &[f64], upper: &[f64])
    -> Result<SolverOutcome>;
}

// ---------------------------------------------------------------------------
// RandomSearchSolver
// ---------------------------------------------------------------------------

/// Default number of uniform candidates in the global phase.
const DEFAULT_N_CANDIDATES: usize = 2000;
/// Default number of box-shrinking refinement rounds.
const DEFAULT_N_REFINEMENTS: usize = 8;
/// Candidates per refinement round.
const REFINE_CANDIDATES: usize = 64;

/// Multi-start random search with box-shrinking local refinement.
///
/// The global phase draws `n_candidates` uniform points; each refinement
/// round then draws [`REFINE_CANDIDATES`] points in a box centered on the
/// incumbent whose extent halves every round, clipped to the original
/// bounds. Seedable for reproducibility.
///
/// # Examples
///
/// ```
/// use mobo::{RandomSearchSolver, Solver};
///
/// let solver = RandomSearchSolver::with_seed(42);
/// let out = solver
///     .minimize(&|x| (x[0] - 0.3).powi(2), &[0.0], &[1.0])
///     .unwrap();
/// assert!((out.point[0] - 0.3).abs() < 0.02);
/// ```
#[derive(Debug)]
pub struct RandomSearchSolver {
    n_candidates: usize,
    n_refinements: usize,
    rng: Mutex<fastrand::Rng>,
}

impl RandomSearchSolver {
    /// Creates a solver with default settings and a random seed.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates a solver with a fixed seed for reproducibility.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self::builder().seed(seed).build()
    }

    /// Creates a builder for configuring a `RandomSearchSolver`.
    #[must_use]
    pub fn builder() -> RandomSearchSolverBuilder {
        RandomSearchSolverBuilder::default()
    }
}

impl Default for RandomSearchSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Solver for RandomSearchSolver {
    fn minimize(
        &self,
        f: &dyn Fn(&[f64]) -> f64,
        lower: &[f64],
        upper: &[f64],
    ) -> Result<SolverOutcome> {
        let dims = lower.len();
        let midpoint: Vec<f64> = lower
            .iter()
            .zip(upper)
            .map(|(&lo, &hi)| (lo + hi) / 2.0)
            .collect();

        if dims == 0 {
            return Ok(SolverOutcome {
                value: f(&midpoint),
                point: midpoint,
                status: SolverStatus::Degenerate,
            });
        }

        let mut rng = self.rng.lock();
        let mut best_point = midpoint.clone();
        let mut best_value = f(&midpoint);

        // Global phase: uniform samples over the whole box.
        for _ in 0..self.n_candidates {
            let candidate: Vec<f64> = lower
                .iter()
                .zip(upper)
                .map(|(&lo, &hi)| lo + rng.f64() * (hi - lo))
                .collect();
            let value = f(&candidate);
            if value < best_value || !best_value.is_finite() {
                best_value = value;
                best_point = candidate;
            }
        }

        // Local phase: shrink the search box around the incumbent.
        let mut half_extent: Vec<f64> = lower
            .iter()
            .zip(upper)
            .map(|(&lo, &hi)| (hi - lo) / 4.0)
            .collect();
        for round in 0..self.n_refinements {
            for _ in 0..REFINE_CANDIDATES {
                let candidate: Vec<f64> = best_point
                    .iter()
                    .zip(&half_extent)
                    .zip(lower.iter().zip(upper))
                    .map(|((&center, &h), (&lo, &hi))| {
                        (center + (rng.f64() * 2.0 - 1.0) * h).clamp(lo, hi)
                    })
                    .collect();
                let value = f(&candidate);
                if value < best_value || !best_value.is_finite() {
                    best_value = value;
                    best_point = candidate;
                }
            }
            for h in &mut half_extent {
                *h /= 2.0;
            }
            tracing::debug!(round, best_value, "refinement round complete");
        }

        let status = if best_value.is_finite() {
            SolverStatus::Converged
        } else {
            SolverStatus::Degenerate
        };
        Ok(SolverOutcome {
            point: best_point,
            value: best_value,
            status,
        })
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for configuring a [`RandomSearchSolver`].
///
/// Defaults: `n_candidates` 2000, `n_refinements` 8, random seed.
#[derive(Clone, Debug, Default)]
pub struct RandomSearchSolverBuilder {
    n_candidates: Option<usize>,
    n_refinements: Option<usize>,
    seed: Option<u64>,
}

impl RandomSearchSolverBuilder {
    /// Sets the number of uniform candidates in the global phase.
    /// Default: 2000.
    #[must_use]
    pub fn n_candidates(mut self, n: usize) -> Self {
        self.n_candidates = Some(n);
        self
    }

    /// Sets the number of box-shrinking refinement rounds. Default: 8.
    #[must_use]
    pub fn n_refinements(mut self, n: usize) -> Self {
        self.n_refinements = Some(n);
        self
    }

    /// Sets the random seed for reproducibility.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Builds the configured [`RandomSearchSolver`].
    #[must_use]
    pub fn build(self) -> RandomSearchSolver {
        let rng = self
            .seed
            .map_or_else(fastrand::Rng::new, fastrand::Rng::with_seed);
        RandomSearchSolver {
            n_candidates: self.n_candidates.unwrap_or(DEFAULT_N_CANDIDATES),
            n_refinements: self.n_refinements.unwrap_or(DEFAULT_N_REFINEMENTS),
            rng: Mutex::new(rng),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_minimum_of_smooth_bowl() {
        let solver = RandomSearchSolver::with_seed(1);
        let out = solver
            .minimize(
                &|x| (x[0] - 0.7).powi(2) + (x[1] + 0.2).powi(2),
                &[-1.0, -1.0],
                &[1.0, 1.0],
            )
            .unwrap();
        assert_eq!(out.status, SolverStatus::Converged);
        assert!((out.point[0] - 0.7).abs() < 0.05);
        assert!((out.point[1] + 0.2).abs() < 0.05);
    }

    #[test]
    fn respects_bounds() {
        let solver = RandomSearchSolver::with_seed(2);
        // Minimum of x² over [1, 2] is the boundary.
        let out = solver.minimize(&|x| x[0] * x[0], &[1.0], &[2.0]).unwrap();
        assert!(out.point[0] >= 1.0 && out.point[0] <= 2.0);
        assert!((out.point[0] - 1.0).abs() < 0.02);
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let f = |x: &[f64]| (x[0] - 0.25).powi(2);
        let a = RandomSearchSolver::with_seed(7)
            .minimize(&f, &[0.0], &[1.0])
            .unwrap();
        let b = RandomSearchSolver::with_seed(7)
            .minimize(&f, &[0.0], &[1.0])
            .unwrap();
        assert_eq!(a.point, b.point);
    }

    #[test]
    fn zero_dimensional_box_is_degenerate() {
        let solver = RandomSearchSolver::with_seed(3);
        let out = solver.minimize(&|_| 1.0, &[], &[]).unwrap();
        assert_eq!(out.status, SolverStatus::Degenerate);
        assert!(out.point.is_empty());
    }

    #[test]
    fn non_finite_objective_reports_degenerate() {
        let solver = RandomSearchSolver::builder()
            .n_candidates(10)
            .n_refinements(1)
            .seed(4)
            .build();
        let out = solver
            .minimize(&|_| f64::INFINITY, &[0.0], &[1.0])
            .unwrap();
        assert_eq!(out.status, SolverStatus::Degenerate);
    }
}
