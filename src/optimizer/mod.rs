//! Site selection as a binary optimization problem.
//!
//! [`sites`] turns candidate profiles into a [`BinaryModel`] and decodes the
//! solution. Solving goes through the [`Solver`] trait; [`BranchAndBound`]
//! is the built-in implementation.

pub mod model;
pub mod sites;
pub mod solver;

pub use model::{BinaryModel, Sense, Solution, SolveOutcome, SolveStatus, Solver, VarId};
pub use sites::{OptimizationOutcome, PeriodTraffic, SiteOptimizer, SiteResult};
pub use solver::BranchAndBound;
