//! Built-in reference systems.
//!
//! Each preset is a known network with a fixed initial state and sampling
//! grid. They double as worked examples for the CLI and as fixtures for the
//! end-to-end tests.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::data::reference::TimeSpec;
use crate::math::VectorField;
use crate::models::DynamicsKind;

/// Selectable reference system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SystemPreset {
    /// 2-node linear system with a single cross edge per node.
    TwoNodeLinear,
    /// 6-node linear network.
    Linear,
    /// 5-node gene regulatory network (Hill kinetics).
    GeneRegulation,
    /// 5-node mass-action network with pairwise products.
    MassAction,
    /// 5-species competitive Lotka–Volterra system.
    PopulationDynamics,
}

/// A reference vector field plus the settings it is usually explored with.
#[derive(Debug, Clone)]
pub struct ReferenceSystem {
    pub name: &'static str,
    pub node_names: Vec<String>,
    pub initial_state: Vec<f64>,
    pub time: TimeSpec,
    pub family: DynamicsKind,
    pub max_parents: usize,
    rhs: fn(f64, &[f64], &mut [f64]),
}

impl VectorField for ReferenceSystem {
    fn dimension(&self) -> usize {
        self.initial_state.len()
    }

    fn apply(&self, t: f64, x: &[f64], out: &mut [f64]) {
        (self.rhs)(t, x, out)
    }
}

impl ReferenceSystem {
    pub fn num_nodes(&self) -> usize {
        self.initial_state.len()
    }
}

fn names(prefix: &str, n: usize) -> Vec<String> {
    (0..n).map(|i| format!("{prefix} {i}")).collect()
}

impl SystemPreset {
    pub fn system(self) -> ReferenceSystem {
        match self {
            SystemPreset::TwoNodeLinear => ReferenceSystem {
                name: "two-node linear",
                node_names: names("Node", 2),
                initial_state: vec![0.0, 1.0],
                time: TimeSpec::new(0.0, 10.0, 21),
                family: DynamicsKind::Linear,
                max_parents: 1,
                rhs: two_node_linear,
            },
            SystemPreset::Linear => ReferenceSystem {
                name: "six-node linear",
                node_names: names("Node", 6),
                initial_state: vec![0.0; 6],
                time: TimeSpec::new(0.0, 20.0, 51),
                family: DynamicsKind::Linear,
                max_parents: 3,
                rhs: linear_six,
            },
            SystemPreset::GeneRegulation => ReferenceSystem {
                name: "five-gene regulatory network",
                node_names: names("Gene", 5),
                initial_state: vec![1.0, 0.5, 1.0, 1.5, 0.5],
                time: TimeSpec::new(0.0, 10.0, 31),
                family: DynamicsKind::GeneRegulation,
                max_parents: 2,
                rhs: gene_regulation_five,
            },
            SystemPreset::MassAction => ReferenceSystem {
                name: "five-molecule mass action",
                node_names: names("Molecule", 5),
                initial_state: vec![0.0, 1.5, 1.0, 3.0, 2.0],
                time: TimeSpec::new(0.0, 2.0, 51),
                family: DynamicsKind::MassAction,
                max_parents: 3,
                rhs: mass_action_five,
            },
            SystemPreset::PopulationDynamics => ReferenceSystem {
                name: "five-species competitive Lotka-Volterra",
                node_names: names("Species", 5),
                initial_state: vec![0.2, 0.5, 0.2, 0.2, 0.3],
                time: TimeSpec::new(0.0, 10.0, 40),
                family: DynamicsKind::PopulationDynamics,
                max_parents: 3,
                rhs: lotka_volterra_five,
            },
        }
    }
}

fn two_node_linear(_t: f64, x: &[f64], dx: &mut [f64]) {
    dx[0] = 0.5 - x[0] + 0.3 * x[1];
    dx[1] = -0.2 * x[1] + 0.1 * x[0];
}

fn linear_six(_t: f64, x: &[f64], dx: &mut [f64]) {
    const S: [f64; 6] = [0.5, 0.3, 0.7, 0.4, 1.0, 1.5];
    const G: [f64; 6] = [1.0, 0.3, 0.7, 1.5, 1.5, 3.0];
    const B: [f64; 8] = [-1.0, -0.5, 1.5, -0.8, -0.6, 0.7, -1.5, 1.0];
    dx[0] = S[0] - G[0] * x[0] + B[0] * x[2] + B[1] * x[4];
    dx[1] = S[1] - G[1] * x[1] + B[2] * x[5];
    dx[2] = S[2] - G[2] * x[2] + B[3] * x[4];
    dx[3] = S[3] - G[3] * x[3] + B[4] * x[0];
    dx[4] = S[4] - G[4] * x[4] + B[5] * x[1];
    dx[5] = S[5] - G[5] * x[5] + B[6] * x[0] + B[7] * x[3];
}

fn gene_regulation_five(_t: f64, x: &[f64], dx: &mut [f64]) {
    const S: f64 = 0.2;
    const G: [f64; 5] = [0.9, 0.9, 0.7, 1.5, 1.5];
    const B: f64 = 2.0;
    const K: f64 = 1.5;
    const M: f64 = 5.0;
    let act = |v: f64| B * v.powf(M) / (v.powf(M) + K.powf(M));
    let rep = |v: f64| B / (1.0 + (v / K).powf(M));
    dx[0] = S - G[0] * x[0] + act(x[4]);
    dx[1] = S - G[1] * x[1] + act(x[0]);
    dx[2] = S - G[2] * x[2] + act(x[0]);
    dx[3] = S - G[3] * x[3] + act(x[0]) + rep(x[2]);
    dx[4] = S - G[4] * x[4] + act(x[3]) + rep(x[1]);
}

fn mass_action_five(_t: f64, x: &[f64], dx: &mut [f64]) {
    dx[0] = 1.6 - 2.0 * x[0] + 1.5 * x[2] * x[3];
    dx[1] = 4.0 - 3.0 * x[1] - 2.0 * x[3] * x[0];
    dx[2] = 3.0 - x[2] - 0.5 * x[4] * x[1] + x[1];
    dx[3] = 4.0 - 3.0 * x[3] + 1.5 * x[0] * x[1] - x[0];
    dx[4] = 3.0 - x[4] - 2.0 * x[1] * x[3];
}

fn lotka_volterra_five(_t: f64, y: &[f64], dy: &mut [f64]) {
    const R: [f64; 5] = [0.3, 0.7, 0.5, 0.4, 0.4];
    const A: [f64; 6] = [0.4, 0.7, 1.5, 1.4, 0.7, 1.2];
    dy[0] = R[0] * y[0] * (1.0 - y[0] - A[0] * y[2] - A[1] * y[4]);
    dy[1] = R[1] * y[1] * (1.0 - y[1] - A[2] * y[3]);
    dy[2] = R[2] * y[2] * (1.0 - y[2]);
    dy[3] = R[3] * y[3] * (1.0 - y[3] - A[3] * y[1] - A[4] * y[2]);
    dy[4] = R[4] * y[4] * (1.0 - y[4] - A[5] * y[1]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ReferenceData;
    use crate::math::SolverOptions;

    #[test]
    fn presets_are_consistent() {
        for preset in SystemPreset::value_variants() {
            let sys = preset.system();
            assert_eq!(sys.node_names.len(), sys.num_nodes(), "{}", sys.name);
            assert!(sys.time.validate().is_ok());
            assert!(sys.max_parents >= 1);
        }
    }

    #[test]
    fn every_preset_simulates() {
        for preset in SystemPreset::value_variants() {
            let sys = preset.system();
            let data =
                ReferenceData::simulate(&sys, &sys.initial_state, &sys.time, SolverOptions::default())
                    .unwrap();
            assert_eq!(data.num_samples(), sys.time.steps);
            assert!(data.states.iter().all(|v| v.is_finite()), "{}", sys.name);
        }
    }
}
