//! Synthetic data generation.

pub mod synth;

pub use synth::*;
