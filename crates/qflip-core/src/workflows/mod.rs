//! # Workflows Module
//!
//! High-level entry points that run a complete flip optimization: validation of the
//! input shells, objective resolution, model construction, solving and mask
//! application.
//!
//! - **Flip Workflow** ([`flip`]) - Optimizes the signs of one or more jointly scored
//!   shells and returns the flipped shells with their masks.

pub mod flip;
