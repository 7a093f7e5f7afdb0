//! Gene regulation with Hill kinetics.
//!
//! `dX = s - g·x_target + Σ edge_i` where each edge is either
//!
//! - activation (kind 0): `b·x^m / (x^m + k^m)`
//! - repression (kind 1): `b / (1 + (x/k)^m)`

use crate::domain::{ParameterCatalog, ParameterType, Topology};
use crate::models::Dynamics;

pub const ACTIVATION: usize = 0;
pub const REPRESSION: usize = 1;

#[derive(Debug, Clone, Copy, Default)]
pub struct GeneRegulation;

impl Dynamics for GeneRegulation {
    fn evaluate(&self, state: &[f64], _time: f64, topology: &Topology, params: &[f64]) -> f64 {
        let synth = params[0];
        let degr = params[1];
        let mut dx = synth - state[topology.target] * degr;

        for (i, (parent, inter)) in topology.parents.iter().zip(&topology.interactions).enumerate() {
            let j = 2 + i * 3;
            let b = params[j];
            let k = params[j + 1];
            let m = params[j + 2];
            // Hill terms are only defined for non-negative concentrations.
            let x = parent.value(state).max(0.0);

            dx += match inter.index() {
                ACTIVATION => {
                    let xm = x.powf(m);
                    let denom = xm + k.powf(m);
                    if denom > 0.0 { b * xm / denom } else { 0.0 }
                }
                _ => b / (1.0 + (x / k).powf(m)),
            };
        }
        dx
    }

    fn parameter_catalog(&self) -> ParameterCatalog {
        ParameterCatalog::from_types([
            ParameterType::node("Basal Synth", 0.1, 1.0),
            ParameterType::node("Basal Degr", 0.1, 2.0),
            ParameterType::edge("Strength", 0.5, 4.0),
            ParameterType::edge("Theta", 0.2, 3.0),
            ParameterType::edge("Hill Coeff", 0.7, 5.0),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{InteractionKind, ParentUnit};

    #[test]
    fn activation_and_repression_are_half_max_at_theta() {
        let act = Topology::new(0, vec![ParentUnit::Single(1)], vec![InteractionKind(ACTIVATION)]).unwrap();
        let rep = Topology::new(0, vec![ParentUnit::Single(1)], vec![InteractionKind(REPRESSION)]).unwrap();
        // s=0, g=0, b=2, k=1.5, m=5 with x1 = k: both terms equal b/2.
        let params = [0.0, 0.0, 2.0, 1.5, 5.0];
        let state = [0.3, 1.5];

        let a = GeneRegulation.evaluate(&state, 0.0, &act, &params);
        let r = GeneRegulation.evaluate(&state, 0.0, &rep, &params);
        assert!((a - 1.0).abs() < 1e-12, "activation={a}");
        assert!((r - 1.0).abs() < 1e-12, "repression={r}");
    }

    #[test]
    fn basal_terms_only_without_parents() {
        let top = Topology::basal(0);
        let dx = GeneRegulation.evaluate(&[2.0], 0.0, &top, &[0.5, 0.25]);
        assert!((dx - 0.0).abs() < 1e-12);
    }
}
