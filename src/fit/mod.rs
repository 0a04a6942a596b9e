//! Circuit fitting orchestration.
//!
//! Responsibilities:
//!
//! - generate optimizer start points
//! - run Levenberg–Marquardt from each start (parallel)
//! - select the best circuit using BIC + guardrails

pub mod fitter;
pub mod selection;
pub mod starts;

pub use fitter::*;
pub use selection::*;
pub use starts::*;
