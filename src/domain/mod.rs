//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - input configuration enums (`LayoutArg`, `SortOrder`, `Weighting`)
//! - impedance samples (`ImpedancePoint`) and dataset stats
//! - fit outputs (`FitResult`, `FitQuality`, `FitFile`, etc.)

pub mod types;

pub use types::*;
