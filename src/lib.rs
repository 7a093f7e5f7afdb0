//! `tsa` library crate: topological sensitivity analysis of ODE networks.
//!
//! The binary (`tsa`) is a thin wrapper around this library so that:
//!
//! - the search stages are testable without spawning processes
//! - enumeration, fitting and verification are reusable on their own

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod report;
