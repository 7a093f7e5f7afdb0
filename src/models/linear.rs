//! Linear dynamics: `dX = c + Σ k_i·x_{p_i}`.

use crate::domain::{ParameterCatalog, ParameterType, Topology};
use crate::models::Dynamics;

#[derive(Debug, Clone, Copy, Default)]
pub struct Linear;

impl Dynamics for Linear {
    fn evaluate(&self, state: &[f64], _time: f64, topology: &Topology, params: &[f64]) -> f64 {
        let mut dx = params[0];
        for (i, parent) in topology.parents.iter().enumerate() {
            dx += params[i + 1] * parent.value(state);
        }
        dx
    }

    fn parameter_catalog(&self) -> ParameterCatalog {
        ParameterCatalog::from_types([
            ParameterType::node("CONST", -10.0, 10.0),
            ParameterType::edge("COEFF", -10.0, 10.0),
        ])
    }
}
