//! Collapsing a decomposed problem to a single scalar metric.
//!
//! [`ScalarizationAdapter`] wraps a [`DecomposedObjective`] and presents it
//! as a plain [`Objective`] with one synthetic metric. For each point it
//! pulls the raw metric tables from
//! [`compute_metrics`](DecomposedObjective::compute_metrics) and collapses
//! them: shared metrics are broadcast across the policy-candidate and
//! object axes, added elementwise to the object metrics, multiplied across
//! the metric axis, maximized over policy candidates (each object gets its
//! best candidate), averaged over objects, and finally scaled by a fixed
//! constant.
//!
//! The product couples the metrics the same way the engines' acquisition
//! does, so the collapsed scalar ranks points consistently with the
//! multi-objective search.

use crate::error::Result;
use crate::objective::{DecomposedObjective, Objective};
use crate::types::{Bounds, MetricDescriptor, Point, Score};

/// A [`DecomposedObjective`] collapsed to one scalar metric.
pub struct ScalarizationAdapter<O> {
    inner: O,
    scale: f64,
    metrics: Vec<MetricDescriptor>,
}

impl<O: DecomposedObjective> ScalarizationAdapter<O> {
    /// Wraps `inner`, scaling the collapsed scalar by `scale`.
    #[must_use]
    pub fn new(inner: O, scale: f64) -> Self {
        Self {
            inner,
            scale,
            metrics: vec![MetricDescriptor::shared("scalarized")],
        }
    }

    /// The wrapped objective.
    #[must_use]
    pub fn inner(&self) -> &O {
        &self.inner
    }

    /// Collapses one point's metric tables to the scalar.
    fn collapse(&self, shared: &[f64], object: &[Vec<Vec<f64>>]) -> f64 {
        let num_objects = self.inner.num_objects();
        let mut object_sum = 0.0;
        for obj in 0..num_objects {
            // Best policy candidate for this object.
            let best = object
                .iter()
                .map(|candidate| {
                    candidate[obj]
                        .iter()
                        .zip(shared)
                        .map(|(&om, &sm)| om + sm)
                        .product::<f64>()
                })
                .fold(f64::NEG_INFINITY, f64::max);
            object_sum += best;
        }
        #[allow(clippy::cast_precision_loss)]
        let mean = object_sum / num_objects as f64;
        mean * self.scale
    }
}

impl<O: DecomposedObjective> Objective for ScalarizationAdapter<O> {
    fn metrics(&self) -> &[MetricDescriptor] {
        &self.metrics
    }

    fn bounds(&self) -> &Bounds {
        self.inner.bounds()
    }

    fn evaluate(&self, points: &[Point]) -> Result<Vec<Score>> {
        let (shared, object) = self.inner.compute_metrics(points)?;
        Ok(shared
            .iter()
            .zip(&object)
            .map(|(s, o)| vec![self.collapse(s, o)])
            .collect())
    }
}
