//! Model-space limits and run configuration.
//!
//! `ModelSpace` describes which structures are admissible; `SearchConfig` is a
//! full run's configuration as understood by the pipeline (derived from CLI
//! flags plus defaults).

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::data::{SystemPreset, TimeSpec};
use crate::domain::types::NodeId;
use crate::error::TsaError;
use crate::models::DynamicsKind;

/// Functional description and limits of the space of candidate networks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpace {
    pub num_nodes: usize,
    /// Display names, one per node (generated when not supplied).
    pub node_names: Vec<String>,
    pub max_parents: usize,
    pub num_interactions: usize,
    /// Largest joint parent unit. 0 and 1 both mean single nodes only.
    pub max_order: usize,
    /// `(parent, target)` pairs present in every candidate.
    pub enforced_edges: Vec<(NodeId, NodeId)>,
    /// `(parent, target)` pairs absent from every candidate.
    pub enforced_gaps: Vec<(NodeId, NodeId)>,
}

impl ModelSpace {
    pub fn new(
        num_nodes: usize,
        node_names: Vec<String>,
        max_parents: usize,
        num_interactions: usize,
        max_order: usize,
        enforced_edges: Vec<(NodeId, NodeId)>,
        enforced_gaps: Vec<(NodeId, NodeId)>,
    ) -> Result<Self, TsaError> {
        if num_nodes == 0 {
            return Err(TsaError::config("model space needs at least one node"));
        }
        if num_interactions == 0 {
            return Err(TsaError::config("num_interactions must be >= 1"));
        }
        if !node_names.is_empty() && node_names.len() != num_nodes {
            return Err(TsaError::config(format!(
                "{} node names supplied for {num_nodes} nodes",
                node_names.len()
            )));
        }
        for &(p, t) in enforced_edges.iter().chain(&enforced_gaps) {
            if p >= num_nodes || t >= num_nodes {
                return Err(TsaError::config(format!(
                    "enforced pair {p}:{t} references a node outside 0..{num_nodes}"
                )));
            }
        }
        if let Some(&(p, t)) = enforced_edges.iter().find(|e| enforced_gaps.contains(e)) {
            return Err(TsaError::config(format!(
                "edge {p}:{t} is both enforced and forbidden"
            )));
        }

        let node_names = if node_names.is_empty() {
            (0..num_nodes).map(|i| format!("Node {i}")).collect()
        } else {
            node_names
        };

        Ok(Self {
            num_nodes,
            node_names,
            max_parents,
            num_interactions,
            max_order,
            enforced_edges,
            enforced_gaps,
        })
    }

    /// Parents that must be present for `target`, in declaration order.
    pub fn enforced_parents(&self, target: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        for &(p, t) in &self.enforced_edges {
            if t == target && !out.contains(&p) {
                out.push(p);
            }
        }
        out
    }

    /// Parents that must be absent for `target`.
    pub fn forbidden_parents(&self, target: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        for &(p, t) in &self.enforced_gaps {
            if t == target && !out.contains(&p) {
                out.push(p);
            }
        }
        out
    }

    pub fn node_name(&self, node: NodeId) -> &str {
        self.node_names.get(node).map(String::as_str).unwrap_or("?")
    }
}

/// A full run's configuration.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub family: DynamicsKind,
    pub preset: SystemPreset,

    pub max_parents: usize,
    /// Overrides the family default when set.
    pub num_interactions: Option<usize>,
    /// Overrides the family default when set.
    pub max_order: Option<usize>,
    pub enforced_edges: Vec<(NodeId, NodeId)>,
    pub enforced_gaps: Vec<(NodeId, NodeId)>,

    /// Overrides the preset's time grid when set.
    pub time: Option<TimeSpec>,

    /// Best topologies kept per target.
    pub retain_k: usize,
    /// Optimizer restarts per topology.
    pub restarts: usize,
    pub weak_signal_threshold: f64,
    pub tolerance: f64,
    pub max_iters: u64,
    pub seed: u64,

    /// Worker threads for fitting and verification (1 = sequential).
    pub parallelism: usize,
    /// Per-task time limit for optimizations and integrations.
    pub task_timeout: Option<Duration>,

    /// Jointly refit the top-N ranked whole models against the trajectory.
    pub refit_top: usize,

    pub top_n: usize,
    pub export: Option<PathBuf>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            family: DynamicsKind::Linear,
            preset: SystemPreset::TwoNodeLinear,
            max_parents: 2,
            num_interactions: None,
            max_order: None,
            enforced_edges: Vec::new(),
            enforced_gaps: Vec::new(),
            time: None,
            retain_k: 5,
            restarts: 1,
            weak_signal_threshold: 1e-5,
            tolerance: 1e-6,
            max_iters: 2000,
            seed: 42,
            parallelism: 1,
            task_timeout: None,
            refit_top: 0,
            top_n: 10,
            export: None,
        }
    }
}

impl SearchConfig {
    pub fn validate(&self) -> Result<(), TsaError> {
        if self.retain_k == 0 {
            return Err(TsaError::config("retain_k must be >= 1"));
        }
        if self.restarts == 0 {
            return Err(TsaError::config("restarts must be >= 1"));
        }
        if !(self.weak_signal_threshold.is_finite() && self.weak_signal_threshold >= 0.0) {
            return Err(TsaError::config("weak-signal threshold must be finite and >= 0"));
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(TsaError::config("optimizer tolerance must be finite and > 0"));
        }
        if self.max_iters == 0 {
            return Err(TsaError::config("max_iters must be >= 1"));
        }
        if let Some(time) = &self.time {
            time.validate()?;
        }
        Ok(())
    }

    pub fn num_interactions(&self) -> usize {
        self.num_interactions
            .unwrap_or(self.family.defaults().num_interactions)
    }

    pub fn max_order(&self) -> usize {
        self.max_order.unwrap_or(self.family.defaults().max_order)
    }
}

/// Parse a `parent:target` pair as used on the command line.
pub fn parse_edge(s: &str) -> Result<(NodeId, NodeId), String> {
    let (p, t) = s
        .split_once(':')
        .ok_or_else(|| format!("expected 'parent:target', got '{s}'"))?;
    let p = p
        .trim()
        .parse::<NodeId>()
        .map_err(|e| format!("invalid parent '{p}': {e}"))?;
    let t = t
        .trim()
        .parse::<NodeId>()
        .map_err(|e| format!("invalid target '{t}': {e}"))?;
    Ok((p, t))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_space_splits_enforced_pairs_per_target() {
        let space = ModelSpace::new(
            4,
            Vec::new(),
            2,
            1,
            1,
            vec![(1, 0), (2, 0), (1, 0), (3, 2)],
            vec![(3, 0)],
        )
        .unwrap();
        assert_eq!(space.enforced_parents(0), vec![1, 2]);
        assert_eq!(space.enforced_parents(2), vec![3]);
        assert_eq!(space.forbidden_parents(0), vec![3]);
        assert!(space.forbidden_parents(1).is_empty());
        assert_eq!(space.node_name(3), "Node 3");
    }

    #[test]
    fn model_space_rejects_contradictions() {
        let both = ModelSpace::new(3, Vec::new(), 2, 1, 1, vec![(1, 0)], vec![(1, 0)]);
        assert!(both.is_err());
        let out_of_range = ModelSpace::new(3, Vec::new(), 2, 1, 1, vec![(5, 0)], Vec::new());
        assert!(out_of_range.is_err());
        let names = ModelSpace::new(3, vec!["a".into()], 2, 1, 1, Vec::new(), Vec::new());
        assert!(names.is_err());
    }

    #[test]
    fn parse_edge_accepts_pairs() {
        assert_eq!(parse_edge("2:0"), Ok((2, 0)));
        assert_eq!(parse_edge(" 3 : 1 "), Ok((3, 1)));
        assert!(parse_edge("3").is_err());
        assert!(parse_edge("a:1").is_err());
    }

    #[test]
    fn config_defaults_come_from_family() {
        let mut config = SearchConfig {
            family: DynamicsKind::GeneRegulation,
            ..SearchConfig::default()
        };
        assert_eq!(config.num_interactions(), 2);
        config.num_interactions = Some(3);
        assert_eq!(config.num_interactions(), 3);
        assert!(config.validate().is_ok());
        config.retain_k = 0;
        assert!(config.validate().is_err());
    }
}
