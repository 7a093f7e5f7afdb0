//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - streamed through enumeration and fitting without copying large buffers
//! - handed to persistence/visualization collaborators via `domain::export`
//! - rebuilt from an export for later comparisons

use std::fmt;

use nalgebra::DMatrix;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::domain::config::ModelSpace;
use crate::error::TsaError;

/// Node identifier: the index of a state variable in the system.
///
/// Identifiers are structural (position in the state vector), so no global
/// counter is involved in issuing them.
pub type NodeId = usize;

/// Tag selecting the functional form an edge uses.
///
/// The meaning of each tag (e.g. activation vs. repression) is owned by the
/// dynamics family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InteractionKind(pub usize);

impl InteractionKind {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One parent position of a topology.
///
/// Under structural order 1 every parent is a single node. Higher orders add
/// joint units: an unordered tuple of nodes that acts as one multiplicative term.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParentUnit {
    Single(NodeId),
    Joint(Vec<NodeId>),
}

impl ParentUnit {
    /// Build a unit from its member nodes. One member yields `Single`.
    pub fn from_nodes(mut nodes: Vec<NodeId>) -> Self {
        if nodes.len() == 1 {
            ParentUnit::Single(nodes[0])
        } else {
            nodes.sort_unstable();
            ParentUnit::Joint(nodes)
        }
    }

    pub fn nodes(&self) -> &[NodeId] {
        match self {
            ParentUnit::Single(node) => std::slice::from_ref(node),
            ParentUnit::Joint(nodes) => nodes,
        }
    }

    pub fn as_single(&self) -> Option<NodeId> {
        match self {
            ParentUnit::Single(node) => Some(*node),
            ParentUnit::Joint(_) => None,
        }
    }

    /// Number of member nodes.
    pub fn order(&self) -> usize {
        self.nodes().len()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes().contains(&node)
    }

    /// Value of the unit at a state: the product of its members' values.
    pub fn value(&self, state: &[f64]) -> f64 {
        self.nodes().iter().map(|&n| state[n]).product()
    }
}

impl fmt::Display for ParentUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParentUnit::Single(node) => write!(f, "{node}"),
            ParentUnit::Joint(nodes) => {
                let parts: Vec<String> = nodes.iter().map(|n| n.to_string()).collect();
                write!(f, "({})", parts.join("*"))
            }
        }
    }
}

/// A candidate structural hypothesis for one target node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Topology {
    pub target: NodeId,
    pub parents: Vec<ParentUnit>,
    /// Interaction kind per parent, aligned with `parents`.
    pub interactions: Vec<InteractionKind>,
    /// Size of the largest parent unit (0 when there are no parents).
    pub order: usize,
}

impl Topology {
    pub fn new(
        target: NodeId,
        parents: Vec<ParentUnit>,
        interactions: Vec<InteractionKind>,
    ) -> Result<Self, TsaError> {
        if parents.len() != interactions.len() {
            return Err(TsaError::config(format!(
                "topology for target {target} has {} parents but {} interactions",
                parents.len(),
                interactions.len()
            )));
        }
        Ok(Self::from_parts(target, parents, interactions))
    }

    /// Build without checking alignment. Callers guarantee equal lengths.
    pub(crate) fn from_parts(
        target: NodeId,
        parents: Vec<ParentUnit>,
        interactions: Vec<InteractionKind>,
    ) -> Self {
        let order = parents.iter().map(ParentUnit::order).max().unwrap_or(0);
        Self {
            target,
            parents,
            interactions,
            order,
        }
    }

    /// Topology with no parents: the target's intrinsic dynamics only.
    pub fn basal(target: NodeId) -> Self {
        Self::from_parts(target, Vec::new(), Vec::new())
    }

    pub fn num_parents(&self) -> usize {
        self.parents.len()
    }

    pub fn has_parent(&self, unit: &ParentUnit) -> bool {
        self.parents.contains(unit)
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.parents.is_empty() {
            return write!(f, "{} <- []", self.target);
        }
        let parts: Vec<String> = self
            .parents
            .iter()
            .zip(&self.interactions)
            .map(|(p, i)| format!("{p}:{i}"))
            .collect();
        write!(f, "{} <- [{}]", self.target, parts.join(", "))
    }
}

/// Closed interval of admissible parameter values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub lower: f64,
    pub upper: f64,
}

impl Bounds {
    pub const fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    pub fn is_valid(&self) -> bool {
        self.lower.is_finite() && self.upper.is_finite() && self.lower <= self.upper
    }

    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.lower, self.upper)
    }

    /// Uniform draw within the interval.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> f64 {
        if self.width() <= 0.0 {
            return self.lower;
        }
        rng.gen_range(self.lower..=self.upper)
    }
}

/// Whether a parameter type attaches to a node or to an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamScope {
    Node,
    Edge,
}

/// Static description of one parameter kind of a dynamics family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterType {
    pub name: String,
    pub bounds: Bounds,
    pub scope: ParamScope,
}

impl ParameterType {
    pub fn node(name: impl Into<String>, lower: f64, upper: f64) -> Self {
        Self {
            name: name.into(),
            bounds: Bounds::new(lower, upper),
            scope: ParamScope::Node,
        }
    }

    pub fn edge(name: impl Into<String>, lower: f64, upper: f64) -> Self {
        Self {
            name: name.into(),
            bounds: Bounds::new(lower, upper),
            scope: ParamScope::Edge,
        }
    }

    /// Attach a value to a node or an edge.
    ///
    /// The binding must match this type's scope.
    pub fn instantiate(&self, value: f64, binding: ParamBinding) -> Result<Parameter, TsaError> {
        let matches = matches!(
            (self.scope, &binding),
            (ParamScope::Node, ParamBinding::Node(_)) | (ParamScope::Edge, ParamBinding::Edge { .. })
        );
        if !matches {
            return Err(TsaError::config(format!(
                "parameter type '{}' is {:?}-scoped but was bound to {binding}",
                self.name, self.scope
            )));
        }
        Ok(Parameter {
            param_type: self.name.clone(),
            bounds: self.bounds,
            value,
            binding,
        })
    }
}

/// What an instantiated parameter is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamBinding {
    Node(NodeId),
    Edge { parent: ParentUnit, target: NodeId },
}

impl fmt::Display for ParamBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamBinding::Node(node) => write!(f, "node {node}"),
            ParamBinding::Edge { parent, target } => write!(f, "edge {parent}->{target}"),
        }
    }
}

/// A parameter value bound to exactly one node or edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub param_type: String,
    pub bounds: Bounds,
    pub value: f64,
    pub binding: ParamBinding,
}

/// The parameter kinds of one dynamics family, split by scope.
///
/// Parameter vectors always use the layout: node-scoped types for the target
/// first, then the edge-scoped types repeated once per parent in parent order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParameterCatalog {
    pub node: Vec<ParameterType>,
    pub edge: Vec<ParameterType>,
}

impl ParameterCatalog {
    /// Split a flat list of types by scope, preserving their order.
    pub fn from_types(types: impl IntoIterator<Item = ParameterType>) -> Self {
        let (node, edge): (Vec<_>, Vec<_>) = types
            .into_iter()
            .partition(|t| t.scope == ParamScope::Node);
        Self { node, edge }
    }

    /// Reject malformed bounds before any optimization starts.
    pub fn validate(&self) -> Result<(), TsaError> {
        for t in self.node.iter().chain(&self.edge) {
            if !t.bounds.is_valid() {
                return Err(TsaError::InvalidBounds {
                    param_type: t.name.clone(),
                    lower: t.bounds.lower,
                    upper: t.bounds.upper,
                });
            }
        }
        Ok(())
    }

    pub fn param_count(&self, topology: &Topology) -> usize {
        self.node.len() + topology.num_parents() * self.edge.len()
    }

    pub fn bounds_for(&self, topology: &Topology) -> Vec<Bounds> {
        let mut out = Vec::with_capacity(self.param_count(topology));
        out.extend(self.node.iter().map(|t| t.bounds));
        for _ in &topology.parents {
            out.extend(self.edge.iter().map(|t| t.bounds));
        }
        out
    }

    /// Offset of the first edge parameter of parent `i` within the vector.
    pub fn edge_offset(&self, parent_index: usize) -> usize {
        self.node.len() + parent_index * self.edge.len()
    }

    /// Bind a flat parameter vector to its nodes and edges.
    pub fn instantiate(&self, topology: &Topology, values: &[f64]) -> Result<Vec<Parameter>, TsaError> {
        let expected = self.param_count(topology);
        if values.len() != expected {
            return Err(TsaError::config(format!(
                "topology {topology} needs {expected} parameters, got {}",
                values.len()
            )));
        }

        let mut out = Vec::with_capacity(expected);
        let mut at = 0;
        for t in &self.node {
            out.push(t.instantiate(values[at], ParamBinding::Node(topology.target))?);
            at += 1;
        }
        for parent in &topology.parents {
            for t in &self.edge {
                let binding = ParamBinding::Edge {
                    parent: parent.clone(),
                    target: topology.target,
                };
                out.push(t.instantiate(values[at], binding)?);
                at += 1;
            }
        }
        Ok(out)
    }
}

/// A fitted topology for one target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetModel {
    pub topology: Topology,
    pub params: Vec<f64>,
    /// Gradient-matching residual (Euclidean norm over time samples).
    pub distance: f64,
    pub aic: f64,
}

/// A directed single-node edge of a whole model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
    pub interaction: InteractionKind,
}

/// One fitted topology per node, optionally scored by re-simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WholeModel {
    pub targets: Vec<TargetModel>,
    /// Global trajectory residual; `None` until verified.
    pub distance: Option<f64>,
}

impl WholeModel {
    pub fn unscored(targets: Vec<TargetModel>) -> Self {
        Self {
            targets,
            distance: None,
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.targets.len()
    }

    pub fn topologies(&self) -> impl Iterator<Item = &Topology> {
        self.targets.iter().map(|t| &t.topology)
    }

    /// Single-node edges. Joint parent units are not edges in the graph sense
    /// and are left out.
    pub fn edges(&self) -> Vec<Edge> {
        self.topologies()
            .flat_map(|top| {
                top.parents
                    .iter()
                    .zip(&top.interactions)
                    .filter_map(move |(p, &interaction)| {
                        p.as_single().map(|from| Edge {
                            from,
                            to: top.target,
                            interaction,
                        })
                    })
            })
            .collect()
    }

    pub fn edge_exists(&self, from: NodeId, to: NodeId) -> bool {
        self.edges().iter().any(|e| e.from == from && e.to == to)
    }

    /// `adj[(p, t)] = 1` when `p` is a single-node parent of `t`.
    pub fn adjacency(&self) -> DMatrix<u8> {
        let n = self.num_nodes();
        let mut adj = DMatrix::<u8>::zeros(n, n);
        for e in self.edges() {
            if e.from < n && e.to < n {
                adj[(e.from, e.to)] = 1;
            }
        }
        adj
    }

    pub fn parameters(&self, catalog: &ParameterCatalog) -> Result<Vec<Parameter>, TsaError> {
        let mut out = Vec::new();
        for t in &self.targets {
            out.extend(catalog.instantiate(&t.topology, &t.params)?);
        }
        Ok(out)
    }

    /// Value of a node-scoped parameter.
    pub fn node_param(&self, catalog: &ParameterCatalog, param_type: &str, node: NodeId) -> Option<f64> {
        let idx = catalog.node.iter().position(|t| t.name == param_type)?;
        let target = self.targets.iter().find(|t| t.topology.target == node)?;
        target.params.get(idx).copied()
    }

    /// Value of an edge-scoped parameter on `parent -> target`.
    pub fn edge_param(
        &self,
        catalog: &ParameterCatalog,
        param_type: &str,
        parent: &ParentUnit,
        target: NodeId,
    ) -> Option<f64> {
        let idx = catalog.edge.iter().position(|t| t.name == param_type)?;
        let model = self.targets.iter().find(|t| t.topology.target == target)?;
        let pos = model.topology.parents.iter().position(|p| p == parent)?;
        model.params.get(catalog.edge_offset(pos) + idx).copied()
    }
}

/// Where a parameter lives, for bag-level queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamLocation {
    Node(NodeId),
    Edge { parent: ParentUnit, target: NodeId },
}

/// Final ranked collection of whole models plus shared metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelBag {
    models: Vec<WholeModel>,
    pub catalog: ParameterCatalog,
    pub space: ModelSpace,
}

impl ModelBag {
    /// Build a bag, ordering models by ascending distance (unscored last).
    pub fn new(mut models: Vec<WholeModel>, catalog: ParameterCatalog, space: ModelSpace) -> Self {
        models.sort_by(|a, b| match (a.distance, b.distance) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });
        Self {
            models,
            catalog,
            space,
        }
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Model at a rank (0 = best).
    pub fn get(&self, rank: usize) -> Option<&WholeModel> {
        self.models.get(rank)
    }

    pub fn top(&self, n: usize) -> &[WholeModel] {
        &self.models[..n.min(self.models.len())]
    }

    pub fn models(&self) -> &[WholeModel] {
        &self.models
    }

    /// Values of one parameter across the top-n models.
    ///
    /// Models where the parameter does not exist (e.g. the edge is absent)
    /// are skipped.
    pub fn param_values(&self, param_type: &str, top_n: usize, location: &ParamLocation) -> Vec<f64> {
        self.top(top_n)
            .iter()
            .filter_map(|m| match location {
                ParamLocation::Node(node) => m.node_param(&self.catalog, param_type, *node),
                ParamLocation::Edge { parent, target } => {
                    m.edge_param(&self.catalog, param_type, parent, *target)
                }
            })
            .collect()
    }
}
