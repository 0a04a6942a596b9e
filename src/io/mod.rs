//! Input/output helpers.
//!
//! - CSV ingest + validation (`ingest`)
//! - point filters (`filter`)
//! - per-point result export (CSV) (`export`)
//! - fit JSON read/write (`fit_file`)

pub mod export;
pub mod filter;
pub mod fit_file;
pub mod ingest;

pub use export::*;
pub use filter::*;
pub use fit_file::*;
pub use ingest::*;
