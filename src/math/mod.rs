//! Mathematical utilities for the pipeline

/// Dense linear algebra kernels for small symmetric systems
pub mod linalg;
/// Probability distributions and statistical functions
pub mod probability;
