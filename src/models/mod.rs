//! Equivalent-circuit models.
//!
//! Elements are small, pure impedance functions; circuits combine them in
//! series and parallel so that fitting code can stay generic over topology.

pub mod circuit;
pub mod elements;
pub mod guess;

pub use circuit::*;
pub use elements::*;
pub use guess::*;
