//! Input/output helpers.
//!
//! - model-bag JSON read/write (`export`)

pub mod export;

pub use export::*;
