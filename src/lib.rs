#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![deny(unreachable_pub)]
#![deny(clippy::correctness)]
#![deny(clippy::suspicious)]
#![deny(clippy::style)]
#![deny(clippy::complexity)]
#![deny(clippy::perf)]

//! Multi-objective Bayesian optimization for expensive, noisy, vector-valued
//! black-box objectives — physical design evaluations scored by simulation,
//! where every evaluation is costly and returns one value per quality metric.
//!
//! Two engines are provided:
//!
//! | Engine | Search space | When to use |
//! |--------|--------------|-------------|
//! | [`MultiObjectiveEngine`] | full point space | small dimensionality, no structure |
//! | [`DecomposedEngine`] | design sub-space only | points split into a shared *design* and per-object *policies* |
//!
//! Both run the same loop: seed a Cartesian grid, then repeat
//! {maximize a scalarized GP-UCB acquisition → evaluate the objective →
//! refit the surrogate} until the iteration budget is exhausted,
//! checkpointing along the way.
//!
//! The acquisition is `Π mean_m(x) + κ · Σ std_m(x)`: the product couples
//! metrics multiplicatively (all must be simultaneously good), the sum of
//! standard deviations rewards exploration additively, and `kappa` trades
//! the two off — a vector generalization of GP-UCB.
//!
//! # Getting started
//!
//! ```
//! use mobo::prelude::*;
//!
//! let objective = Test1D2M::with_seed(7);
//! let mut engine = MultiObjectiveEngine::<Test1D2M>::builder()
//!     .kappa(10.0)
//!     .seed(42)
//!     .build(objective)
//!     .unwrap();
//!
//! engine.run(5, 3, None, 1, 5).unwrap();
//! assert_eq!(engine.history().len(), 5 + 3);
//!
//! let front = engine.pareto_front(32).unwrap();
//! assert!(!front.is_empty());
//! ```
//!
//! # Decomposed ("actor-critic") optimization
//!
//! When a point factors into `design ++ policy` and the policy may vary per
//! object, [`DecomposedEngine`] searches only the design sub-space. Each
//! `(object, object-dependent metric)` pair owns a [`DesignPolicyUnit`]
//! holding a *critic* (full point → score) and an *actor* (design → best
//! policy), so the inner policy search is amortized into one model query
//! per acquisition evaluation.
//!
//! # Scope
//!
//! Objective evaluation, regression-model training algorithms, and global
//! derivative-free optimizers are boundaries, not contents: they enter
//! through the [`Objective`], [`Regressor`], and [`Solver`] traits. The
//! crate ships one packaged implementation of each ([`synthetic`]
//! objectives, [`GpRegressor`], [`RandomSearchSolver`]).

pub mod actor_critic;
pub mod checkpoint;
pub mod decomposed;
pub mod engine;
mod error;
pub mod objective;
pub mod pareto;
pub mod regressor;
pub mod scalarize;
pub mod solver;
pub mod synthetic;
pub mod types;

pub use actor_critic::DesignPolicyUnit;
pub use checkpoint::CheckpointRing;
pub use decomposed::DecomposedEngine;
pub use engine::MultiObjectiveEngine;
pub use error::{Error, Result};
pub use objective::{CompositePoint, DecomposedObjective, DecomposedScores, Objective};
pub use regressor::{GpRegressor, Kernel, Prediction, Regressor};
pub use scalarize::ScalarizationAdapter;
pub use solver::{RandomSearchSolver, Solver, SolverOutcome, SolverStatus};
pub use types::{Bounds, MetricDescriptor, Point, SampleHistory, Score};

/// Convenient wildcard import for the most common types.
///
/// ```
/// use mobo::prelude::*;
/// ```
pub mod prelude {
    pub use crate::actor_critic::DesignPolicyUnit;
    pub use crate::decomposed::DecomposedEngine;
    pub use crate::engine::MultiObjectiveEngine;
    pub use crate::error::{Error, Result};
    pub use crate::objective::{CompositePoint, DecomposedObjective, DecomposedScores, Objective};
    pub use crate::regressor::{GpRegressor, Kernel, Prediction, Regressor};
    pub use crate::scalarize::ScalarizationAdapter;
    pub use crate::solver::{RandomSearchSolver, Solver, SolverOutcome, SolverStatus};
    pub use crate::synthetic::{DecomposedToy, Test1D1M, Test1D2M, Test2D2M};
    pub use crate::types::{Bounds, MetricDescriptor, Point, SampleHistory, Score};
}
