//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - structural hypotheses (`Topology`, `ParentUnit`, `InteractionKind`)
//! - parameter catalogs and instantiated parameters
//! - fit outputs (`TargetModel`, `WholeModel`, `ModelBag`)
//! - model-space limits and run configuration (`ModelSpace`, `SearchConfig`)
//! - the serialization-neutral export of a `ModelBag`

pub mod config;
pub mod export;
pub mod types;

pub use config::*;
pub use export::*;
pub use types::*;
