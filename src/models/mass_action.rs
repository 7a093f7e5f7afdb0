//! Mass-action dynamics.
//!
//! Same shape as the linear family, but a joint parent unit contributes the
//! product of its members: `dX = c + Σ k_i·Π_{j∈p_i} x_j`.

use crate::domain::{ParameterCatalog, ParameterType, Topology};
use crate::models::Dynamics;

#[derive(Debug, Clone, Copy, Default)]
pub struct MassAction;

impl Dynamics for MassAction {
    fn evaluate(&self, state: &[f64], _time: f64, topology: &Topology, params: &[f64]) -> f64 {
        params[0]
            + topology
                .parents
                .iter()
                .enumerate()
                .map(|(i, unit)| params[i + 1] * unit.value(state))
                .sum::<f64>()
    }

    fn parameter_catalog(&self) -> ParameterCatalog {
        ParameterCatalog::from_types([
            ParameterType::node("CONST", -10.0, 10.0),
            ParameterType::edge("COEFF", -10.0, 10.0),
        ])
    }
}
