//! Closed-form noisy test objectives.
//!
//! These stand in for simulation-backed design evaluations in tests, doc
//! examples, and quick engine shakedowns. Every metric is a smooth curve
//! plus seeded Gaussian noise (σ = 0.1 by default), so repeated evaluation
//! of the same point scatters the way a noisy simulator would.

use parking_lot::Mutex;

use crate::error::Result;
use crate::objective::{CompositePoint, DecomposedObjective, DecomposedScores, Objective};
use crate::types::{Bounds, MetricDescriptor, Point, Score};

/// Noise standard deviation shared by all synthetic metrics.
pub const NOISE_STD: f64 = 0.1;

/// The 1-D test curve `x² · sin(5πx)⁶`, maximized near x ≈ 0.9.
#[must_use]
pub fn curve_1d(x: f64) -> f64 {
    x * x * (5.0 * core::f64::consts::PI * x).sin().powi(6)
}

/// Box-Muller Gaussian draw.
fn gaussian(rng: &mut fastrand::Rng, std: f64) -> f64 {
    let u1 = rng.f64().max(f64::MIN_POSITIVE);
    let u2 = rng.f64();
    (-2.0 * u1.ln()).sqrt() * (core::f64::consts::TAU * u2).cos() * std
}

// ---------------------------------------------------------------------------
// Flat objectives
// ---------------------------------------------------------------------------

/// One metric over `[0, 1]`: `curve_1d(x) + N(0, 0.1)`.
///
/// Deliberately single-metric — multi-objective engines must reject it at
/// construction.
#[derive(Debug)]
pub struct Test1D1M {
    bounds: Bounds,
    metrics: Vec<MetricDescriptor>,
    rng: Mutex<fastrand::Rng>,
}

impl Test1D1M {
    /// Creates the objective with a seeded noise source.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            bounds: Bounds::unit(1),
            metrics: vec![MetricDescriptor::shared("forward")],
            rng: Mutex::new(fastrand::Rng::with_seed(seed)),
        }
    }
}

impl Objective for Test1D1M {
    fn metrics(&self) -> &[MetricDescriptor] {
        &self.metrics
    }

    fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    fn evaluate(&self, points: &[Point]) -> Result<Vec<Score>> {
        let mut rng = self.rng.lock();
        Ok(points
            .iter()
            .map(|p| vec![curve_1d(p[0]) + gaussian(&mut rng, NOISE_STD)])
            .collect())
    }
}

/// Two conflicting metrics over `[0, 1]`: the forward curve and its mirror
/// `curve_1d(1 - x)`, so no single x maximizes both.
pub struct Test1D2M {
    bounds: Bounds,
    metrics: Vec<MetricDescriptor>,
    rng: Mutex<fastrand::Rng>,
}

impl Test1D2M {
    /// Creates the objective with a seeded noise source.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            bounds: Bounds::unit(1),
            metrics: vec![
                MetricDescriptor::shared("forward"),
                MetricDescriptor::shared("reversed"),
            ],
            rng: Mutex::new(fastrand::Rng::with_seed(seed)),
        }
    }
}

impl Objective for Test1D2M {
    fn metrics(&self) -> &[MetricDescriptor] {
        &self.metrics
    }

    fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    fn evaluate(&self, points: &[Point]) -> Result<Vec<Score>> {
        let mut rng = self.rng.lock();
        Ok(points
            .iter()
            .map(|p| {
                vec![
                    curve_1d(p[0]) + gaussian(&mut rng, NOISE_STD),
                    curve_1d(1.0 - p[0]) + gaussian(&mut rng, NOISE_STD),
                ]
            })
            .collect())
    }
}

/// Two conflicting metrics over `[0, 1]²`, the 2-D product analogue of
/// [`Test1D2M`].
pub struct Test2D2M {
    bounds: Bounds,
    metrics: Vec<MetricDescriptor>,
    rng: Mutex<fastrand::Rng>,
}

impl Test2D2M {
    /// Creates the objective with a seeded noise source.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            bounds: Bounds::unit(2),
            metrics: vec![
                MetricDescriptor::shared("forward"),
                MetricDescriptor::shared("reversed"),
            ],
            rng: Mutex::new(fastrand::Rng::with_seed(seed)),
        }
    }

    fn surface(x: f64, y: f64) -> f64 {
        let pi5 = 5.0 * core::f64::consts::PI;
        x * x * (pi5 * x).sin().powi(6) * y * y * (pi5 * y).cos().powi(6)
    }
}

impl Objective for Test2D2M {
    fn metrics(&self) -> &[MetricDescriptor] {
        &self.metrics
    }

    fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    fn evaluate(&self, points: &[Point]) -> Result<Vec<Score>> {
        let mut rng = self.rng.lock();
        Ok(points
            .iter()
            .map(|p| {
                vec![
                    Self::surface(p[0], p[1]) + gaussian(&mut rng, NOISE_STD),
                    Self::surface(1.0 - p[0], 1.0 - p[1]) + gaussian(&mut rng, NOISE_STD),
                ]
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Decomposed objective
// ---------------------------------------------------------------------------

/// A decomposed toy problem: one design dimension, one policy dimension,
/// a configurable population of objects.
///
/// Metric 0 ("compactness", shared) rewards small designs:
/// `1 - design² + noise`. Metric 1 ("reach", object-dependent) rewards a
/// policy close to each object's preferred value `c`:
/// `1 - (policy - c)² + noise`. The best policy therefore differs per
/// object while the design is shared, which is exactly the structure the
/// decomposed engine exploits.
pub struct DecomposedToy {
    bounds: Bounds,
    metrics: Vec<MetricDescriptor>,
    /// Preferred policy value per object.
    object_centers: Vec<f64>,
    /// Policy candidates reported by `compute_metrics`.
    policy_candidates: Vec<f64>,
    noise_std: f64,
    rng: Mutex<fastrand::Rng>,
}

impl DecomposedToy {
    /// Creates the toy with the given per-object preferred policies.
    #[must_use]
    pub fn new(object_centers: Vec<f64>, seed: u64) -> Self {
        Self {
            bounds: Bounds::unit(2),
            metrics: vec![
                MetricDescriptor::shared("compactness"),
                MetricDescriptor::per_object("reach"),
            ],
            object_centers,
            policy_candidates: vec![0.25, 0.5, 0.75],
            noise_std: NOISE_STD,
            rng: Mutex::new(fastrand::Rng::with_seed(seed)),
        }
    }

    /// Replaces the default noise level (useful to make tests tighter).
    #[must_use]
    pub fn noise_std(mut self, std: f64) -> Self {
        self.noise_std = std;
        self
    }

    fn shared_score(&self, design: f64, rng: &mut fastrand::Rng) -> f64 {
        1.0 - design * design + gaussian(rng, self.noise_std)
    }

    fn reach_score(&self, policy: f64, object: usize, rng: &mut fastrand::Rng) -> f64 {
        let c = self.object_centers[object];
        1.0 - (policy - c) * (policy - c) + gaussian(rng, self.noise_std)
    }
}

impl Objective for DecomposedToy {
    fn metrics(&self) -> &[MetricDescriptor] {
        &self.metrics
    }

    fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    fn evaluate(&self, points: &[Point]) -> Result<Vec<Score>> {
        let mut rng = self.rng.lock();
        Ok(points
            .iter()
            .map(|p| {
                let shared = self.shared_score(p[0], &mut rng);
                #[allow(clippy::cast_precision_loss)]
                let reach = (0..self.object_centers.len())
                    .map(|o| self.reach_score(p[1], o, &mut rng))
                    .sum::<f64>()
                    / self.object_centers.len() as f64;
                vec![shared, reach]
            })
            .collect())
    }
}

impl DecomposedObjective for DecomposedToy {
    fn num_objects(&self) -> usize {
        self.object_centers.len()
    }

    fn design_dims(&self) -> usize {
        1
    }

    fn evaluate_composite(&self, points: &[CompositePoint]) -> Result<DecomposedScores> {
        let mut rng = self.rng.lock();
        let mut independent = Vec::with_capacity(points.len());
        let mut per_object = Vec::with_capacity(points.len());
        for point in points {
            independent.push(vec![self.shared_score(point.design[0], &mut rng), 0.0]);
            let rows = (0..self.object_centers.len())
                .map(|o| {
                    vec![
                        0.0,
                        self.reach_score(point.policies[o][0], o, &mut rng),
                    ]
                })
                .collect();
            per_object.push(rows);
        }
        Ok(DecomposedScores {
            independent,
            per_object,
        })
    }

    fn compute_metrics(
        &self,
        points: &[Point],
    ) -> Result<(Vec<Vec<f64>>, Vec<Vec<Vec<Vec<f64>>>>)> {
        let mut rng = self.rng.lock();
        let mut shared = Vec::with_capacity(points.len());
        let mut object = Vec::with_capacity(points.len());
        for point in points {
            shared.push(vec![self.shared_score(point[0], &mut rng), 0.0]);
            let per_candidate = self
                .policy_candidates
                .iter()
                .map(|&policy| {
                    (0..self.object_centers.len())
                        .map(|o| vec![0.0, self.reach_score(policy, o, &mut rng)])
                        .collect()
                })
                .collect();
            object.push(per_candidate);
        }
        Ok((shared, object))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_shape_matches_contract() {
        let obj = Test1D2M::with_seed(0);
        let scores = obj.evaluate(&[vec![0.1], vec![0.2], vec![0.3]]).unwrap();
        assert_eq!(scores.len(), 3);
        assert!(scores.iter().all(|s| s.len() == 2));
    }

    #[test]
    fn noisy_scores_track_the_noiseless_curve() {
        let obj = Test1D1M::with_seed(99);
        let points: Vec<Point> = vec![vec![0.1], vec![0.2], vec![0.3]];
        let scores = obj.evaluate(&points).unwrap();
        for (p, s) in points.iter().zip(&scores) {
            assert_eq!(s.len(), 1);
            // Within a few noise standard deviations of the formula.
            assert!((s[0] - curve_1d(p[0])).abs() < 5.0 * NOISE_STD);
        }
    }

    #[test]
    fn composite_breakdown_has_one_row_per_object() {
        let obj = DecomposedToy::new(vec![0.25, 0.75], 1);
        let point = CompositePoint {
            design: vec![0.5],
            policies: vec![vec![0.2], vec![0.8]],
        };
        let scores = obj.evaluate_composite(&[point]).unwrap();
        assert_eq!(scores.independent.len(), 1);
        assert_eq!(scores.per_object[0].len(), 2);
        assert_eq!(scores.per_object[0][0].len(), 2);
    }

    #[test]
    fn metric_tables_carry_the_candidate_axis() {
        let obj = DecomposedToy::new(vec![0.25, 0.75], 2);
        let (shared, object) = obj.compute_metrics(&[vec![0.5, 0.5]]).unwrap();
        assert_eq!(shared.len(), 1);
        assert_eq!(object[0].len(), 3); // policy candidates
        assert_eq!(object[0][0].len(), 2); // objects
        assert_eq!(object[0][0][0].len(), 2); // metrics
    }
}
