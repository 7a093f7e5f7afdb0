//! Serialization-neutral export of a [`ModelBag`].
//!
//! The export is a plain tree of owned data (no references into a live run).
//! It derives `serde` traits so any format can be plugged in; the binary uses
//! JSON via `crate::io`. A bag can be rebuilt from its export, which is how
//! saved results are reloaded for comparison.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::config::ModelSpace;
use crate::domain::types::{
    InteractionKind, ModelBag, NodeId, Parameter, ParameterCatalog, ParameterType, ParentUnit,
    TargetModel, Topology, WholeModel,
};
use crate::error::TsaError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelBagExport {
    pub generated_at: Option<DateTime<Utc>>,
    pub system: SystemExport,
    pub models: Vec<ModelExport>,
}

/// System-level metadata shared by every model in the bag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemExport {
    pub num_nodes: usize,
    pub node_names: Vec<String>,
    pub max_parents: usize,
    pub num_interactions: usize,
    pub max_order: usize,
    pub enforced_edges: Vec<(NodeId, NodeId)>,
    pub enforced_gaps: Vec<(NodeId, NodeId)>,
    pub node_param_types: Vec<ParameterType>,
    pub edge_param_types: Vec<ParameterType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelExport {
    /// 0 = best.
    pub rank: usize,
    pub distance: Option<f64>,
    pub targets: Vec<TargetExport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetExport {
    pub target: NodeId,
    pub parents: Vec<ParentUnit>,
    pub interactions: Vec<InteractionKind>,
    pub order: usize,
    pub distance: f64,
    pub aic: f64,
    pub parameters: Vec<Parameter>,
}

impl ModelBag {
    pub fn to_export(&self) -> Result<ModelBagExport, TsaError> {
        let mut models = Vec::with_capacity(self.len());
        for (rank, model) in self.models().iter().enumerate() {
            let mut targets = Vec::with_capacity(model.num_nodes());
            for tm in &model.targets {
                targets.push(TargetExport {
                    target: tm.topology.target,
                    parents: tm.topology.parents.clone(),
                    interactions: tm.topology.interactions.clone(),
                    order: tm.topology.order,
                    distance: tm.distance,
                    aic: tm.aic,
                    parameters: self.catalog.instantiate(&tm.topology, &tm.params)?,
                });
            }
            models.push(ModelExport {
                rank,
                distance: model.distance,
                targets,
            });
        }

        Ok(ModelBagExport {
            generated_at: Some(Utc::now()),
            system: SystemExport {
                num_nodes: self.space.num_nodes,
                node_names: self.space.node_names.clone(),
                max_parents: self.space.max_parents,
                num_interactions: self.space.num_interactions,
                max_order: self.space.max_order,
                enforced_edges: self.space.enforced_edges.clone(),
                enforced_gaps: self.space.enforced_gaps.clone(),
                node_param_types: self.catalog.node.clone(),
                edge_param_types: self.catalog.edge.clone(),
            },
            models,
        })
    }

    /// Rebuild a bag, validating the structure as it goes.
    pub fn from_export(export: &ModelBagExport) -> Result<Self, TsaError> {
        let sys = &export.system;
        let space = ModelSpace::new(
            sys.num_nodes,
            sys.node_names.clone(),
            sys.max_parents,
            sys.num_interactions,
            sys.max_order,
            sys.enforced_edges.clone(),
            sys.enforced_gaps.clone(),
        )?;
        let catalog = ParameterCatalog {
            node: sys.node_param_types.clone(),
            edge: sys.edge_param_types.clone(),
        };
        catalog.validate()?;

        let mut ordered: Vec<&ModelExport> = export.models.iter().collect();
        ordered.sort_by_key(|m| m.rank);

        let mut models = Vec::with_capacity(ordered.len());
        for m in ordered {
            let mut targets = Vec::with_capacity(m.targets.len());
            for t in &m.targets {
                let topology = Topology::new(t.target, t.parents.clone(), t.interactions.clone())?;
                let expected = catalog.param_count(&topology);
                if t.parameters.len() != expected {
                    return Err(TsaError::config(format!(
                        "model {} target {}: {} parameters exported, {expected} expected",
                        m.rank,
                        t.target,
                        t.parameters.len()
                    )));
                }
                targets.push(TargetModel {
                    topology,
                    params: t.parameters.iter().map(|p| p.value).collect(),
                    distance: t.distance,
                    aic: t.aic,
                });
            }
            models.push(WholeModel {
                targets,
                distance: m.distance,
            });
        }

        Ok(ModelBag::new(models, catalog, space))
    }
}
