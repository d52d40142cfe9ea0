//! Data structures describing sampling schemes and the flips applied to them.

pub mod mask;
pub mod scheme;
