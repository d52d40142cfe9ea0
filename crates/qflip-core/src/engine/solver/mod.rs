//! Backends that minimize a [`FlipModel`].
//!
//! A backend receives the model and the solver settings and returns one value per
//! flip variable. Anything that can honor the time limit and report a status fits
//! behind [`FlipSolver`]; [`BranchAndBound`] is the exact backend shipped with the
//! crate, and [`crate::engine::milp::MilpModel`] exports the same problem for
//! external MILP solvers.

pub mod branch_bound;
mod relaxation;

pub use branch_bound::BranchAndBound;

use crate::engine::config::SolverSettings;
use crate::engine::error::EngineError;
use crate::engine::model::FlipModel;
use crate::engine::progress::ProgressReporter;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// The returned assignment is proven optimal.
    Optimal,
    /// The time limit expired; the best assignment found so far is returned.
    TimeLimitReached,
    Infeasible,
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Optimal => write!(f, "optimal"),
            Self::TimeLimitReached => write!(f, "time limit reached"),
            Self::Infeasible => write!(f, "infeasible"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolveOutcome {
    pub status: SolveStatus,
    /// One value per flip variable, in `[0, 1]`. Values above one half mean "flip".
    pub values: Vec<f64>,
    pub objective: f64,
    pub nodes_explored: u64,
}

pub trait FlipSolver {
    fn name(&self) -> &'static str;

    fn solve(
        &self,
        model: &FlipModel,
        settings: &SolverSettings,
        reporter: &ProgressReporter,
    ) -> Result<SolveOutcome, EngineError>;
}
