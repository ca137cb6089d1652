//! Benchmarking utilities for evaluating heritability estimation.
//!
//! This module provides synthetic herds with known variance components for
//! checking estimates against the truth.

mod generate;

pub use generate::{generate_herd, HerdConfig, HerdTruth, SyntheticHerd};
