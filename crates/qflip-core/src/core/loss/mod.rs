//! # Loss Module
//!
//! Pure functions scoring how well a set of directions is spread over the sphere.
//! The flip optimizer uses them as an objective oracle: the per-pair kernels
//! ([`covering::pair_angle`], [`electrostatic::pair_energy`]) are shared with the
//! model builder so that the optimized objective and the reported cost agree.
//!
//! - [`covering`] - Covering radius and its theoretical upper bound
//! - [`electrostatic`] - Reciprocal-power repulsion energy
//! - [`aggregate`] - Centroid norm, packing density and multi-shell weighting

pub mod aggregate;
pub mod covering;
pub mod electrostatic;

pub use aggregate::{norm_of_mean, packing_density_loss, weighted_cost_multi_shell};
pub use covering::{covering_radius, covering_radius_upper_bound};
pub use electrostatic::{DEFAULT_ORDER, ENERGY_EPSILON, electrostatic_energy};
