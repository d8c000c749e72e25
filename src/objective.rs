//! The [`Objective`] and [`DecomposedObjective`] traits define what gets
//! optimized.
//!
//! Both traits are *closed capability interfaces*: every method is required
//! and meaningful, so there are no runtime "not implemented" escapes. An
//! objective that cannot provide per-object breakdowns simply implements
//! [`Objective`] alone and works with
//! [`MultiObjectiveEngine`](crate::MultiObjectiveEngine); objectives whose
//! points factor into a design and per-object policies implement
//! [`DecomposedObjective`] as well and unlock
//! [`DecomposedEngine`](crate::DecomposedEngine) and
//! [`ScalarizationAdapter`](crate::ScalarizationAdapter).
//!
//! Evaluations are batched: engines pass the whole seed grid in one call and
//! single points during iteration. Implementations must return one score per
//! input point, in input order, each of length `metrics().len()`.
//!
//! Errors raised during evaluation propagate uncaught through the engine's
//! `run` loop and abort it; recovery is a process restart plus checkpoint
//! resume, never a mid-run retry.

use crate::error::Result;
use crate::types::{Bounds, MetricDescriptor, Point, Score};

/// A vector-valued black-box objective. All metrics are maximized.
pub trait Objective {
    /// The metrics this objective scores, in score-vector order.
    fn metrics(&self) -> &[MetricDescriptor];

    /// The box bounds of the point space.
    fn bounds(&self) -> &Bounds;

    /// Evaluates a batch of points.
    ///
    /// Returns one score per point, in input order; each score has length
    /// `metrics().len()`.
    ///
    /// # Errors
    ///
    /// Implementations may fail for any evaluation-side reason (a crashed
    /// simulation, an invalid geometry). Engines do not retry.
    fn evaluate(&self, points: &[Point]) -> Result<Vec<Score>>;
}

// ---------------------------------------------------------------------------
// Decomposed evaluation
// ---------------------------------------------------------------------------

/// A point of a decomposed problem: one shared design sub-vector plus one
/// policy sub-vector per object.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CompositePoint {
    /// The design sub-vector, shared across all objects.
    pub design: Vec<f64>,
    /// One policy sub-vector per object, indexed like
    /// `DecomposedObjective::num_objects`.
    pub policies: Vec<Vec<f64>>,
}

impl CompositePoint {
    /// The flat point `design ++ policies[object]` seen by models that
    /// score a single object.
    #[must_use]
    pub fn flatten_for(&self, object: usize) -> Point {
        let mut point = self.design.clone();
        point.extend_from_slice(&self.policies[object]);
        point
    }
}

/// Scores of one composite batch, both tables spanning the full metric list.
///
/// Engines select the relevant columns through
/// [`MetricDescriptor::object_dependent`]; values in the other columns are
/// ignored (objectives may fill them with anything, conventionally `0.0`).
#[derive(Clone, Debug)]
pub struct DecomposedScores {
    /// `independent[point][metric]` — scores of the object-independent view.
    pub independent: Vec<Score>,
    /// `per_object[point][object][metric]` — per-object breakdowns.
    pub per_object: Vec<Vec<Score>>,
}

/// An [`Objective`] whose points factor into `design ++ policy` and which
/// can report per-object, per-metric breakdowns.
pub trait DecomposedObjective: Objective {
    /// Number of objects in the population.
    fn num_objects(&self) -> usize;

    /// Number of leading design dimensions; the remaining
    /// `bounds().len() - design_dims()` dimensions are the policy.
    fn design_dims(&self) -> usize;

    /// Evaluates a batch of composite points, returning both the
    /// object-independent scores and the per-object breakdown.
    ///
    /// Both result tables have one row per input point, in input order.
    ///
    /// # Errors
    ///
    /// Same contract as [`Objective::evaluate`].
    fn evaluate_composite(&self, points: &[CompositePoint]) -> Result<DecomposedScores>;

    /// Raw metric tables for scalarization: for each flat point, the shared
    /// metrics and, per policy candidate and object, the object metrics.
    ///
    /// Returns `(shared[point][metric], object[point][candidate][object][metric])`.
    /// Objectives without an enumerable policy-candidate set report a single
    /// candidate (the point's own policy).
    ///
    /// # Errors
    ///
    /// Same contract as [`Objective::evaluate`].
    #[allow(clippy::type_complexity)]
    fn compute_metrics(
        &self,
        points: &[Point],
    ) -> Result<(Vec<Vec<f64>>, Vec<Vec<Vec<Vec<f64>>>>)>;
}
