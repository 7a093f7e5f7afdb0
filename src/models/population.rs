//! Competitive Lotka–Volterra population dynamics:
//! `dX = r·x·(1 - x - Σ s_i·x_{p_i})`.

use crate::domain::{ParameterCatalog, ParameterType, Topology};
use crate::models::Dynamics;

#[derive(Debug, Clone, Copy, Default)]
pub struct PopulationDynamics;

impl Dynamics for PopulationDynamics {
    fn evaluate(&self, state: &[f64], _time: f64, topology: &Topology, params: &[f64]) -> f64 {
        let x = state[topology.target];
        let growth = params[0] * x;
        let mut capacity = 1.0 - x;
        for (i, parent) in topology.parents.iter().enumerate() {
            capacity -= params[i + 1] * parent.value(state);
        }
        growth * capacity
    }

    fn parameter_catalog(&self) -> ParameterCatalog {
        ParameterCatalog::from_types([
            ParameterType::node("Growth Rate", 0.1, 1.0),
            ParameterType::edge("Interaction Strength", 0.1, 2.0),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{InteractionKind, ParentUnit};

    #[test]
    fn logistic_without_competitors() {
        let top = Topology::basal(0);
        let dx = PopulationDynamics.evaluate(&[0.5], 0.0, &top, &[0.4]);
        assert!((dx - 0.4 * 0.5 * 0.5).abs() < 1e-12);

        let top = Topology::new(0, vec![ParentUnit::Single(1)], vec![InteractionKind(0)]).unwrap();
        let dx = PopulationDynamics.evaluate(&[0.5, 0.25], 0.0, &top, &[0.4, 2.0]);
        assert!(dx.abs() < 1e-12);
    }
}
