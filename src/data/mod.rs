//! Reference data: time grids, sampled trajectories and built-in systems.

pub mod reference;
pub mod systems;

pub use reference::{ReferenceData, TimeSpec};
pub use systems::{ReferenceSystem, SystemPreset};
