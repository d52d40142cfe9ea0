//! Reading and writing sampling schemes.
//!
//! Schemes are stored as plain-text bvec files, either one direction per line or in
//! the three-row fslgrad layout. A trait-based interface keeps the file layout
//! separate from the scheme model, and [`paths`] derives the per-shell output file
//! names used in multi-shell mode.

pub mod bvec;
pub mod paths;
pub mod traits;
