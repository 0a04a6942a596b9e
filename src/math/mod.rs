//! Mathematical utilities: grids, linear solves and Levenberg–Marquardt.

pub mod grid;
pub mod lm;
pub mod ols;

pub use grid::*;
pub use lm::*;
pub use ols::*;
