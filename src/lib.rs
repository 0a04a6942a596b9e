//! `eis-fit` library crate.
//!
//! Equivalent-circuit fitting for electrochemical impedance spectra: CSV
//! ingest, first-quadrant filtering, bounded Levenberg–Marquardt fits of
//! series/parallel circuits, and Nyquist/Bode plots.
//!
//! The binary (`eis`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod plot;
pub mod report;
pub mod tui;
