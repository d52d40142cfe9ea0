//! # Engine Module
//!
//! Builds and solves the sign-flip optimization problem for a gradient scheme.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Criterion, weights, electrostatic order and the
//!   solver settings, with a validating builder
//! - **Model** ([`model`]) - The binary flip model: pairwise same/flipped terms grouped
//!   by shell and aggregated by sum or max
//! - **MILP** ([`milp`]) - The explicit linearized form of the model, exportable in LP
//!   format
//! - **Solvers** ([`solver`]) - The [`solver::FlipSolver`] seam and the built-in exact
//!   branch-and-bound backend
//! - **Driver** ([`driver`]) - Runs a solver, checks its status and applies the masks
//! - **Progress Monitoring** ([`progress`]) - Callback-based progress events
//! - **Error Handling** ([`error`]) - Engine-specific error types
//!
//! The time limit and verbosity are kept in [`config::SolverSettings`] and only reach
//! the solver through the driver, so building a model never depends on them.

pub mod config;
pub mod driver;
pub mod error;
pub mod milp;
pub mod model;
pub mod progress;
pub mod solver;
