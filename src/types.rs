//! Core data types: points, scores, bounds, and sample histories.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// An ordered, fixed-length vector of input coordinates.
///
/// For decomposed problems the layout is `design ++ policy`:
/// `point[..ndesign]` is the design sub-vector shared across objects and
/// `point[ndesign..]` is the policy sub-vector allowed to vary per object.
pub type Point = Vec<f64>;

/// An ordered, fixed-length vector of metric values, one per metric.
/// All scores of one problem share the same length.
pub type Score = Vec<f64>;

/// Describes one metric of a vector-valued objective.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricDescriptor {
    /// Human-readable metric name, used in reports and diagnostics.
    pub name: String,
    /// Whether the metric depends on the object being manipulated.
    /// Object-dependent metrics require one model per object;
    /// object-independent metrics are modeled once.
    pub object_dependent: bool,
}

impl MetricDescriptor {
    /// Creates an object-independent metric descriptor.
    #[must_use]
    pub fn shared(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            object_dependent: false,
        }
    }

    /// Creates an object-dependent metric descriptor.
    #[must_use]
    pub fn per_object(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            object_dependent: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Bounds
// ---------------------------------------------------------------------------

/// Per-dimension box bounds, fixed for the lifetime of a problem instance.
///
/// # Examples
///
/// ```
/// use mobo::Bounds;
///
/// let bounds = Bounds::new(vec![0.0, -1.0], vec![1.0, 1.0]).unwrap();
/// assert_eq!(bounds.len(), 2);
/// assert_eq!(bounds.grid(3).len(), 9);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    lower: Vec<f64>,
    upper: Vec<f64>,
}

impl Bounds {
    /// Creates new bounds, validating componentwise `lower[i] <= upper[i]`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] when the vectors differ in
    /// length, or [`Error::InvalidBounds`] when any dimension is inverted.
    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> Result<Self> {
        if lower.len() != upper.len() {
            return Err(Error::DimensionMismatch {
                expected: lower.len(),
                got: upper.len(),
            });
        }
        for (dim, (&low, &high)) in lower.iter().zip(&upper).enumerate() {
            if low > high {
                return Err(Error::InvalidBounds { dim, low, high });
            }
        }
        Ok(Self { lower, upper })
    }

    /// Creates the unit cube `[0, 1]^dims`.
    #[must_use]
    pub fn unit(dims: usize) -> Self {
        Self {
            lower: vec![0.0; dims],
            upper: vec![1.0; dims],
        }
    }

    /// Number of dimensions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lower.len()
    }

    /// Returns `true` if the bounds have zero dimensions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lower.is_empty()
    }

    /// Per-dimension lower bounds.
    #[must_use]
    pub fn lower(&self) -> &[f64] {
        &self.lower
    }

    /// Per-dimension upper bounds.
    #[must_use]
    pub fn upper(&self) -> &[f64] {
        &self.upper
    }

    /// Sub-bounds over a contiguous range of dimensions, e.g. the design
    /// prefix `0..ndesign` or the policy suffix `ndesign..len`.
    #[must_use]
    pub fn slice(&self, range: core::ops::Range<usize>) -> Self {
        Self {
            lower: self.lower[range.clone()].to_vec(),
            upper: self.upper[range].to_vec(),
        }
    }

    /// Maps a point into the unit cube. Degenerate dimensions
    /// (`low == high`) map to 0.5.
    #[must_use]
    pub fn normalize(&self, point: &[f64]) -> Vec<f64> {
        point
            .iter()
            .zip(&self.lower)
            .zip(&self.upper)
            .map(|((&v, &lo), &hi)| {
                if (hi - lo).abs() < 1e-15 {
                    0.5
                } else {
                    (v - lo) / (hi - lo)
                }
            })
            .collect()
    }

    /// Maps a unit-cube point back into the original box.
    #[must_use]
    pub fn denormalize(&self, point: &[f64]) -> Vec<f64> {
        point
            .iter()
            .zip(&self.lower)
            .zip(&self.upper)
            .map(|((&v, &lo), &hi)| lo + v * (hi - lo))
            .collect()
    }

    /// Evenly spaced coordinates for one dimension, endpoints included.
    fn linspace(&self, dim: usize, samples: usize) -> Vec<f64> {
        let (lo, hi) = (self.lower[dim], self.upper[dim]);
        match samples {
            0 => Vec::new(),
            1 => vec![(lo + hi) / 2.0],
            n => (0..n)
                .map(|i| {
                    #[allow(clippy::cast_precision_loss)]
                    let t = i as f64 / (n - 1) as f64;
                    lo + t * (hi - lo)
                })
                .collect(),
        }
    }

    /// The full Cartesian grid with `samples_per_dim` coordinates per
    /// dimension, in row-major order (last dimension varies fastest).
    ///
    /// The grid has `samples_per_dim^D` points — cost is exponential in the
    /// dimension count, so this is only practical for small `D`.
    #[must_use]
    pub fn grid(&self, samples_per_dim: usize) -> Vec<Point> {
        let axes: Vec<Vec<f64>> = (0..self.len())
            .map(|d| self.linspace(d, samples_per_dim))
            .collect();

        let mut points: Vec<Point> = vec![Vec::new()];
        for axis in &axes {
            let mut next = Vec::with_capacity(points.len() * axis.len());
            for prefix in &points {
                for &coord in axis {
                    let mut p = prefix.clone();
                    p.push(coord);
                    next.push(p);
                }
            }
            points = next;
        }
        points
    }
}

// ---------------------------------------------------------------------------
// SampleHistory
// ---------------------------------------------------------------------------

/// Append-only ordered sequence of `(Point, Score)` pairs.
///
/// Index equals evaluation order ("iteration"). Entries are never reordered
/// or deleted; checkpoint rotation happens at the storage boundary only.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SampleHistory {
    points: Vec<Point>,
    scores: Vec<Score>,
}

impl SampleHistory {
    /// Creates an empty history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores a history from previously serialized parallel vectors.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] when the vectors differ in length.
    pub fn from_parts(points: Vec<Point>, scores: Vec<Score>) -> Result<Self> {
        if points.len() != scores.len() {
            return Err(Error::DimensionMismatch {
                expected: points.len(),
                got: scores.len(),
            });
        }
        Ok(Self { points, scores })
    }

    /// Appends a batch of evaluated samples, preserving input order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] when the batches differ in length.
    pub fn extend(&mut self, points: &[Point], scores: &[Score]) -> Result<()> {
        if points.len() != scores.len() {
            return Err(Error::DimensionMismatch {
                expected: points.len(),
                got: scores.len(),
            });
        }
        self.points.extend_from_slice(points);
        self.scores.extend_from_slice(scores);
        Ok(())
    }

    /// Number of stored samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns `true` if no samples have been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// All stored points, in evaluation order.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// All stored scores, in evaluation order.
    #[must_use]
    pub fn scores(&self) -> &[Score] {
        &self.scores
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_reject_inverted_dimension() {
        let err = Bounds::new(vec![0.0, 2.0], vec![1.0, 1.0]).unwrap_err();
        assert!(matches!(err, Error::InvalidBounds { dim: 1, .. }));
    }

    #[test]
    fn bounds_reject_length_mismatch() {
        let err = Bounds::new(vec![0.0], vec![1.0, 2.0]).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { .. }));
    }

    #[test]
    fn grid_cardinality_is_exponential() {
        let bounds = Bounds::unit(3);
        assert_eq!(bounds.grid(2).len(), 8);
        assert_eq!(bounds.grid(4).len(), 64);
    }

    #[test]
    fn grid_endpoints_included() {
        let bounds = Bounds::new(vec![-1.0], vec![3.0]).unwrap();
        let grid = bounds.grid(5);
        assert_eq!(grid.first().unwrap()[0], -1.0);
        assert_eq!(grid.last().unwrap()[0], 3.0);
    }

    #[test]
    fn normalize_round_trip() {
        let bounds = Bounds::new(vec![-2.0, 0.0], vec![2.0, 10.0]).unwrap();
        let p = vec![1.0, 7.5];
        let back = bounds.denormalize(&bounds.normalize(&p));
        for (a, b) in p.iter().zip(&back) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn history_rejects_ragged_batch() {
        let mut h = SampleHistory::new();
        let err = h.extend(&[vec![0.0]], &[]).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { .. }));
    }

    #[test]
    fn history_preserves_order() {
        let mut h = SampleHistory::new();
        h.extend(&[vec![0.0], vec![1.0]], &[vec![0.5, 0.5], vec![1.5, 1.5]])
            .unwrap();
        h.extend(&[vec![2.0]], &[vec![2.5, 2.5]]).unwrap();
        assert_eq!(h.len(), 3);
        assert_eq!(h.points()[2], vec![2.0]);
        assert_eq!(h.scores()[0], vec![0.5, 0.5]);
    }
}
