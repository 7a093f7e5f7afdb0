//! Dynamics families.
//!
//! A family turns a `Topology` plus a flat parameter vector into the derivative
//! of the topology's target. Families are small, pure implementations of
//! [`Dynamics`] so the enumeration/fitting code stays generic.

pub mod gene_regulation;
pub mod linear;
pub mod mass_action;
pub mod population;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::domain::{ParameterCatalog, Topology};

pub use gene_regulation::GeneRegulation;
pub use linear::Linear;
pub use mass_action::MassAction;
pub use population::PopulationDynamics;

/// The plugin interface every dynamics family implements.
///
/// Parameter vectors follow the catalog layout: node parameters first, then
/// edge parameters per parent in parent order.
pub trait Dynamics: Send + Sync {
    /// Derivative of `topology.target` at `(state, time)`.
    fn evaluate(&self, state: &[f64], time: f64, topology: &Topology, params: &[f64]) -> f64;

    /// Parameter kinds with their bounds.
    fn parameter_catalog(&self) -> ParameterCatalog;
}

/// Default model-space settings for a family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FamilyDefaults {
    pub num_interactions: usize,
    pub max_order: usize,
}

/// Registry of the built-in families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum DynamicsKind {
    GeneRegulation,
    Linear,
    MassAction,
    PopulationDynamics,
}

impl DynamicsKind {
    pub const ALL: [DynamicsKind; 4] = [
        DynamicsKind::GeneRegulation,
        DynamicsKind::Linear,
        DynamicsKind::MassAction,
        DynamicsKind::PopulationDynamics,
    ];

    pub fn display_name(self) -> &'static str {
        match self {
            DynamicsKind::GeneRegulation => "gene regulation (Hill)",
            DynamicsKind::Linear => "linear",
            DynamicsKind::MassAction => "mass action",
            DynamicsKind::PopulationDynamics => "population dynamics (Lotka-Volterra)",
        }
    }

    pub fn defaults(self) -> FamilyDefaults {
        match self {
            DynamicsKind::GeneRegulation => FamilyDefaults {
                num_interactions: 2,
                max_order: 1,
            },
            DynamicsKind::Linear | DynamicsKind::PopulationDynamics => FamilyDefaults {
                num_interactions: 1,
                max_order: 1,
            },
            DynamicsKind::MassAction => FamilyDefaults {
                num_interactions: 1,
                max_order: 2,
            },
        }
    }

    pub fn build(self) -> Box<dyn Dynamics> {
        match self {
            DynamicsKind::GeneRegulation => Box::new(GeneRegulation),
            DynamicsKind::Linear => Box::new(Linear),
            DynamicsKind::MassAction => Box::new(MassAction),
            DynamicsKind::PopulationDynamics => Box::new(PopulationDynamics),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_family_has_valid_catalog() {
        for kind in DynamicsKind::ALL {
            let catalog = kind.build().parameter_catalog();
            assert!(catalog.validate().is_ok(), "{}", kind.display_name());
            assert!(!catalog.node.is_empty());
            assert!(!catalog.edge.is_empty());
        }
    }

    #[test]
    fn mass_action_defaults_allow_joint_terms() {
        assert_eq!(DynamicsKind::MassAction.defaults().max_order, 2);
        assert_eq!(DynamicsKind::GeneRegulation.defaults().num_interactions, 2);
    }
}
