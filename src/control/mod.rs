//! Output control algorithms.

pub mod fade;
