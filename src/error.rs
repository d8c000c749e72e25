//! Error and result types used across the crate.

/// All failure classes surfaced by engines, regressors, and storage.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned when a multi-objective engine is constructed over a problem
    /// with fewer than two metrics. Raised before any evaluation occurs;
    /// single-objective inputs belong to a plain scalar optimizer.
    #[error("multi-objective engine requires at least 2 metrics, got {0}")]
    SingleMetric(usize),

    /// Returned when the lower bound exceeds the upper bound in a dimension.
    #[error("invalid bounds in dimension {dim}: low ({low}) must be <= high ({high})")]
    InvalidBounds {
        /// Index of the offending dimension.
        dim: usize,
        /// The lower bound value.
        low: f64,
        /// The upper bound value.
        high: f64,
    },

    /// Returned when a point, score, or batch has the wrong length.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// The expected length.
        expected: usize,
        /// The actual length.
        got: usize,
    },

    /// Returned when a regressor is asked to fit or predict on an empty batch.
    #[error("empty batch: at least one sample is required")]
    EmptyBatch,

    /// Returned when the regression model cannot be fitted
    /// (e.g. the kernel matrix is not positive definite).
    #[error("regression failure: {0}")]
    RegressionFailure(&'static str),

    /// Returned when a checkpoint cannot be written or read.
    /// A *missing* checkpoint file is not an error — engines fall back to
    /// fresh initialization.
    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    /// Returned when an internal invariant is violated.
    #[error("internal error: {0}")]
    Internal(&'static str),
}

/// Crate-wide result alias.
pub type Result<T> = core::result::Result<T, Error>;
