//! Numerical building blocks: combinatorial counters, ODE integration and
//! bounded minimization.

pub mod combinatorics;
pub mod ode;
pub mod optimize;

pub use combinatorics::{Combinations, MixedRadix, binomial};
pub use ode::{DormandPrince, FnField, SolverError, SolverOptions, VectorField};
pub use optimize::{Minimum, OptimizerOptions, minimize_bounded};
