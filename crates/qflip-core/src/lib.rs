//! # qflip Core Library
//!
//! Sign-flip optimization of q-space sampling schemes. Diffusion-MRI gradient
//! directions are antipodally symmetric, so negating a direction leaves the set of
//! sampled orientations unchanged while changing how the directions spread over the
//! full sphere. This library chooses which directions to negate so that the flipped
//! scheme minimizes an electrostatic energy or maximizes its covering radius.
//!
//! ## Architectural Philosophy
//!
//! The library follows a three-layer architecture:
//!
//! - **[`core`]: The Foundation.** Stateless data models (`Scheme`, `FlipMask`), the
//!   geometric and electrostatic cost oracle (`loss`), and bvec file I/O.
//!
//! - **[`engine`]: The Logic Core.** Builds the binary flip model from a scheme,
//!   linearizes it into an explicit MILP, and drives a combinatorial solver with a
//!   time limit to obtain the flip assignment.
//!
//! - **[`workflows`]: The Public API.** One-call entry points that tie the `engine`
//!   and `core` together.

pub mod core;
pub mod engine;
pub mod workflows;
