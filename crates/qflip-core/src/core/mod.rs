//! # Core Module
//!
//! Stateless building blocks shared by the optimization engine.
//!
//! - **Scheme Representation** ([`models`]) - Directions, single- and multi-shell
//!   schemes, and flip masks
//! - **Cost Oracle** ([`loss`]) - Covering radius, electrostatic energy and the
//!   multi-shell weighting of any single-shell cost
//! - **File I/O** ([`io`]) - Reading and writing bvec files in row or fslgrad layout

pub mod io;
pub mod loss;
pub mod models;
