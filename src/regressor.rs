//! Vector-valued regression with uncertainty: the [`Regressor`] trait and
//! the packaged Gaussian Process implementation.
//!
//! The trait is the model boundary of the engines: `fit` is full-batch
//! (refit-from-scratch, never incremental) and `predict` returns a mean and
//! a standard deviation per output. The O(n³) cost of refitting on the full
//! history every iteration is a deliberate simplicity trade-off that bounds
//! practical sample counts — engines document it rather than work around it.
//!
//! [`GpRegressor`] fits one Gaussian Process per output column. All outputs
//! share the same kernel and therefore the same Cholesky factorization; only
//! the per-output weight vectors differ, so a vector-valued fit costs the
//! same single decomposition as a scalar one. Inputs are expected in the
//! unit cube (engines normalize against their bounds before calling in).
//!
//! # Examples
//!
//! ```
//! use mobo::{GpRegressor, Regressor};
//!
//! let mut gp = GpRegressor::default();
//! let x = vec![vec![0.0], vec![0.5], vec![1.0]];
//! let y = vec![vec![0.0, 1.0], vec![0.5, 0.5], vec![1.0, 0.0]];
//! gp.fit(&x, &y).unwrap();
//!
//! let pred = &gp.predict(&[vec![0.5]]).unwrap()[0];
//! assert!((pred.mean[0] - 0.5).abs() < 0.05);
//! assert_eq!(pred.mean.len(), 2);
//! ```

use nalgebra::{DMatrix, DVector};

use crate::error::{Error, Result};

/// Posterior mean and standard deviation at one point, one entry per output.
#[derive(Clone, Debug)]
pub struct Prediction {
    /// Predicted mean per output.
    pub mean: Vec<f64>,
    /// Predicted standard deviation per output.
    pub std: Vec<f64>,
}

/// A vector-valued regression model with predictive uncertainty.
///
/// `fit` replaces any previous state; models are refit from scratch on the
/// full accumulated history after every engine iteration.
pub trait Regressor {
    /// Fits the model to `x[i] -> y[i]`. All rows of `x` share one length,
    /// all rows of `y` share another.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyBatch`] on empty input,
    /// [`Error::DimensionMismatch`] on ragged input, and
    /// [`Error::RegressionFailure`] when the model cannot be fitted.
    fn fit(&mut self, x: &[Vec<f64>], y: &[Vec<f64>]) -> Result<()>;

    /// Predicts mean and standard deviation at each query point.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RegressionFailure`] when called before `fit`.
    fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<Prediction>>;
}

// ---------------------------------------------------------------------------
// Kernels
// ---------------------------------------------------------------------------

/// Covariance kernel of a [`GpRegressor`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Kernel {
    /// Matérn 5/2: `(1 + √5 r + 5/3 r²) exp(-√5 r)`. Smooth but tolerant of
    /// moderate roughness; the default.
    Matern52,
    /// Squared exponential (RBF): `exp(-r² / 2)`. Assumes very smooth
    /// objectives.
    Rbf,
}

const SQRT_5: f64 = 2.236_067_977_499_79;

impl Kernel {
    /// Evaluates the kernel between two points under a shared lengthscale.
    fn eval(self, x1: &[f64], x2: &[f64], length_scale: f64) -> f64 {
        let mut r_sq = 0.0;
        for (a, b) in x1.iter().zip(x2) {
            let diff = (a - b) / length_scale;
            r_sq += diff * diff;
        }
        match self {
            Self::Matern52 => {
                let r = r_sq.sqrt();
                let sqrt5_r = SQRT_5 * r;
                (1.0 + sqrt5_r + 5.0 / 3.0 * r_sq) * (-sqrt5_r).exp()
            }
            Self::Rbf => (-0.5 * r_sq).exp(),
        }
    }
}

// ---------------------------------------------------------------------------
// GpRegressor
// ---------------------------------------------------------------------------

/// Gaussian Process regressor over vector-valued targets.
///
/// Targets are standardized per output column before fitting; predictions
/// are mapped back, so the predictive standard deviation of each output is
/// the shared latent deviation scaled by that output's spread.
///
/// # Examples
///
/// ```
/// use mobo::{GpRegressor, Kernel};
///
/// let gp = GpRegressor::builder()
///     .kernel(Kernel::Rbf)
///     .length_scale(0.5)
///     .noise(1e-4)
///     .build();
/// ```
#[derive(Debug)]
pub struct GpRegressor {
    kernel: Kernel,
    length_scale: f64,
    noise: f64,
    fitted: Option<FittedGp>,
}

#[derive(Debug)]
struct FittedGp {
    cholesky: nalgebra::linalg::Cholesky<f64, nalgebra::Dyn>,
    /// One weight vector `α_m = (K + σ²I)⁻¹ y_m` per output.
    alphas: Vec<DVector<f64>>,
    x_train: Vec<Vec<f64>>,
    y_mean: Vec<f64>,
    y_std: Vec<f64>,
}

/// Default shared lengthscale.
const DEFAULT_LENGTH_SCALE: f64 = 1.0;
/// Default observation noise added to the kernel diagonal.
const DEFAULT_NOISE: f64 = 1e-4;

impl GpRegressor {
    /// Creates a GP with default settings (Matérn 5/2, lengthscale 1.0,
    /// noise 1e-4).
    #[must_use]
    pub fn new() -> Self {
        Self {
            kernel: Kernel::Matern52,
            length_scale: DEFAULT_LENGTH_SCALE,
            noise: DEFAULT_NOISE,
            fitted: None,
        }
    }

    /// Creates a builder for configuring a `GpRegressor`.
    #[must_use]
    pub fn builder() -> GpRegressorBuilder {
        GpRegressorBuilder::default()
    }

    fn kernel_matrix(&self, x: &[Vec<f64>]) -> DMatrix<f64> {
        let n = x.len();
        DMatrix::from_fn(n, n, |i, j| {
            let k = self.kernel.eval(&x[i], &x[j], self.length_scale);
            if i == j { k + self.noise } else { k }
        })
    }

    fn kernel_vector(&self, x_star: &[f64], x_train: &[Vec<f64>]) -> DVector<f64> {
        DVector::from_fn(x_train.len(), |i, _| {
            self.kernel.eval(x_star, &x_train[i], self.length_scale)
        })
    }
}

impl Default for GpRegressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Regressor for GpRegressor {
    #[allow(clippy::cast_precision_loss)]
    fn fit(&mut self, x: &[Vec<f64>], y: &[Vec<f64>]) -> Result<()> {
        if x.is_empty() {
            return Err(Error::EmptyBatch);
        }
        if x.len() != y.len() {
            return Err(Error::DimensionMismatch {
                expected: x.len(),
                got: y.len(),
            });
        }
        let n = x.len();
        let n_outputs = y[0].len();
        let n_dims = x[0].len();
        for row in x {
            if row.len() != n_dims {
                return Err(Error::DimensionMismatch {
                    expected: n_dims,
                    got: row.len(),
                });
            }
        }
        for row in y {
            if row.len() != n_outputs {
                return Err(Error::DimensionMismatch {
                    expected: n_outputs,
                    got: row.len(),
                });
            }
        }

        // Standardize each output column.
        let mut y_mean = vec![0.0; n_outputs];
        let mut y_std = vec![0.0; n_outputs];
        for m in 0..n_outputs {
            let mean = y.iter().map(|row| row[m]).sum::<f64>() / n as f64;
            let var = if n > 1 {
                y.iter().map(|row| (row[m] - mean).powi(2)).sum::<f64>() / (n - 1) as f64
            } else {
                1.0
            };
            y_mean[m] = mean;
            y_std[m] = var.sqrt().max(1e-10);
        }

        let k = self.kernel_matrix(x);
        let cholesky = nalgebra::linalg::Cholesky::new(k)
            .ok_or(Error::RegressionFailure("kernel matrix not positive definite"))?;

        let alphas = (0..n_outputs)
            .map(|m| {
                let y_col =
                    DVector::from_fn(n, |i, _| (y[i][m] - y_mean[m]) / y_std[m]);
                cholesky.solve(&y_col)
            })
            .collect();

        self.fitted = Some(FittedGp {
            cholesky,
            alphas,
            x_train: x.to_vec(),
            y_mean,
            y_std,
        });
        Ok(())
    }

    fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<Prediction>> {
        let model = self
            .fitted
            .as_ref()
            .ok_or(Error::RegressionFailure("predict called before fit"))?;

        let mut out = Vec::with_capacity(x.len());
        for point in x {
            let k_star = self.kernel_vector(point, &model.x_train);

            // Latent variance is shared across outputs: the kernel does not
            // depend on the targets.
            let v = model.cholesky.solve(&k_star);
            let latent_var = (1.0 - k_star.dot(&v)).max(0.0);
            let latent_std = latent_var.sqrt();

            let mean = model
                .alphas
                .iter()
                .zip(&model.y_mean)
                .zip(&model.y_std)
                .map(|((alpha, &mu), &sd)| k_star.dot(alpha) * sd + mu)
                .collect();
            let std = model.y_std.iter().map(|&sd| latent_std * sd).collect();

            out.push(Prediction { mean, std });
        }
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for configuring a [`GpRegressor`].
///
/// Defaults: Matérn 5/2 kernel, `length_scale` 1.0, `noise` 1e-4.
#[derive(Clone, Debug, Default)]
pub struct GpRegressorBuilder {
    kernel: Option<Kernel>,
    length_scale: Option<f64>,
    noise: Option<f64>,
}

impl GpRegressorBuilder {
    /// Sets the covariance kernel. Default: [`Kernel::Matern52`].
    #[must_use]
    pub fn kernel(mut self, kernel: Kernel) -> Self {
        self.kernel = Some(kernel);
        self
    }

    /// Sets the shared lengthscale. Larger values assume smoother
    /// objectives. Default: 1.0.
    #[must_use]
    pub fn length_scale(mut self, length_scale: f64) -> Self {
        self.length_scale = Some(length_scale);
        self
    }

    /// Sets the observation noise added to the kernel diagonal.
    /// Default: 1e-4.
    #[must_use]
    pub fn noise(mut self, noise: f64) -> Self {
        self.noise = Some(noise);
        self
    }

    /// Builds the configured [`GpRegressor`].
    #[must_use]
    pub fn build(self) -> GpRegressor {
        GpRegressor {
            kernel: self.kernel.unwrap_or(Kernel::Matern52),
            length_scale: self.length_scale.unwrap_or(DEFAULT_LENGTH_SCALE),
            noise: self.noise.unwrap_or(DEFAULT_NOISE),
            fitted: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn training_set() -> (Vec<Vec<f64>>, Vec<Vec<f64>>) {
        let x: Vec<Vec<f64>> = (0..6).map(|i| vec![f64::from(i) / 5.0]).collect();
        let y: Vec<Vec<f64>> = x
            .iter()
            .map(|p| vec![p[0] * p[0], 1.0 - p[0]])
            .collect();
        (x, y)
    }

    #[test]
    fn interpolates_training_points() {
        let (x, y) = training_set();
        let mut gp = GpRegressor::builder().length_scale(0.3).build();
        gp.fit(&x, &y).unwrap();

        let preds = gp.predict(&x).unwrap();
        for (pred, target) in preds.iter().zip(&y) {
            for (m, t) in pred.mean.iter().zip(target) {
                assert!((m - t).abs() < 0.05, "mean {m} vs target {t}");
            }
        }
    }

    #[test]
    fn uncertainty_grows_away_from_data() {
        let (x, y) = training_set();
        let mut gp = GpRegressor::builder().length_scale(0.1).build();
        gp.fit(&x, &y).unwrap();

        let at_data = gp.predict(&[vec![0.2]]).unwrap()[0].std[0];
        let far = gp.predict(&[vec![3.0]]).unwrap()[0].std[0];
        assert!(far > at_data);
    }

    #[test]
    fn predict_before_fit_fails() {
        let gp = GpRegressor::new();
        assert!(matches!(
            gp.predict(&[vec![0.0]]),
            Err(Error::RegressionFailure(_))
        ));
    }

    #[test]
    fn fit_rejects_empty_and_ragged_batches() {
        let mut gp = GpRegressor::new();
        assert!(matches!(gp.fit(&[], &[]), Err(Error::EmptyBatch)));
        let err = gp
            .fit(&[vec![0.0], vec![1.0]], &[vec![0.0]])
            .unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { .. }));
    }

    #[test]
    fn output_shapes_match_metric_count() {
        let (x, y) = training_set();
        let mut gp = GpRegressor::default();
        gp.fit(&x, &y).unwrap();
        let pred = &gp.predict(&[vec![0.4]]).unwrap()[0];
        assert_eq!(pred.mean.len(), 2);
        assert_eq!(pred.std.len(), 2);
    }

    #[test]
    fn rbf_kernel_fits_too() {
        let (x, y) = training_set();
        let mut gp = GpRegressor::builder().kernel(Kernel::Rbf).length_scale(0.3).build();
        gp.fit(&x, &y).unwrap();
        let pred = &gp.predict(&[vec![0.2]]).unwrap()[0];
        assert!((pred.mean[0] - 0.04).abs() < 0.05);
    }
}
