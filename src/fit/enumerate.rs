//! Exhaustive enumeration of candidate topologies for one target.
//!
//! The enumerator walks parent-unit selections in increasing size. Selections
//! are lexicographic combinations of the free units (so each parent *set*
//! appears once), followed by the target's enforced parents. The free part of
//! every selection is then expanded into all interaction labelings with a
//! mixed-radix counter whose last position varies fastest. Enforced parents
//! always carry interaction kind 0.
//!
//! The sequence is finite and single-pass; build a new enumerator to iterate
//! again.

use std::iter::FusedIterator;

use tracing::warn;

use crate::domain::{InteractionKind, ModelSpace, NodeId, ParentUnit, Topology};
use crate::error::TsaError;
use crate::math::{Combinations, MixedRadix, binomial};

#[derive(Debug, Clone)]
pub struct TopologyEnumerator {
    target: NodeId,
    units: Vec<ParentUnit>,
    enforced: Vec<ParentUnit>,
    dropped: Vec<NodeId>,
    num_interactions: usize,
    max_free: usize,
    k: usize,
    selections: Combinations,
    current: Option<Vec<ParentUnit>>,
    labels: MixedRadix,
    done: bool,
}

impl TopologyEnumerator {
    pub fn new(space: &ModelSpace, target: NodeId) -> Result<Self, TsaError> {
        if target >= space.num_nodes {
            return Err(TsaError::config(format!(
                "target {target} is outside 0..{}",
                space.num_nodes
            )));
        }

        let mut enforced_nodes = space.enforced_parents(target);
        let mut dropped = Vec::new();
        if enforced_nodes.len() > space.max_parents {
            dropped = enforced_nodes.split_off(space.max_parents);
            warn!(
                target,
                max_parents = space.max_parents,
                ?dropped,
                "more enforced parents than max_parents; truncating"
            );
        }

        let forbidden = space.forbidden_parents(target);
        let enforced_all = space.enforced_parents(target);
        let allowed: Vec<NodeId> = (0..space.num_nodes)
            .filter(|n| !forbidden.contains(n))
            .collect();

        // Singletons first, then joint units by increasing size.
        let mut units: Vec<ParentUnit> = allowed
            .iter()
            .filter(|n| !enforced_all.contains(n))
            .map(|&n| ParentUnit::Single(n))
            .collect();
        for size in 2..=space.max_order {
            for idx in Combinations::new(allowed.len(), size) {
                units.push(ParentUnit::Joint(idx.iter().map(|&i| allowed[i]).collect()));
            }
        }

        let enforced: Vec<ParentUnit> = enforced_nodes.into_iter().map(ParentUnit::Single).collect();
        let max_free = space.max_parents.saturating_sub(enforced.len());

        Ok(Self {
            target,
            selections: Combinations::new(units.len(), 0),
            units,
            enforced,
            dropped,
            num_interactions: space.num_interactions,
            max_free,
            k: 0,
            current: None,
            labels: MixedRadix::new(Vec::new()),
            done: false,
        })
    }

    pub fn target(&self) -> NodeId {
        self.target
    }

    /// Enforced parents that did not fit under `max_parents` and were ignored.
    pub fn dropped_enforced(&self) -> &[NodeId] {
        &self.dropped
    }

    /// Number of topologies a fresh enumerator yields:
    /// `Σ_k C(u, k)·I^k` over `k = 0..=K−E`.
    pub fn candidate_count(&self) -> usize {
        (0..=self.max_free).fold(0usize, |acc, k| {
            let labels = (0..k).fold(1usize, |p, _| p.saturating_mul(self.num_interactions));
            acc.saturating_add(binomial(self.units.len(), k).saturating_mul(labels))
        })
    }
}

impl Iterator for TopologyEnumerator {
    type Item = Topology;

    fn next(&mut self) -> Option<Topology> {
        if self.done {
            return None;
        }
        loop {
            if let Some(parents) = &self.current {
                if let Some(digits) = self.labels.next() {
                    let fixed = std::iter::repeat_n(InteractionKind(0), self.enforced.len());
                    let interactions = digits.into_iter().map(InteractionKind).chain(fixed).collect();
                    return Some(Topology::from_parts(self.target, parents.clone(), interactions));
                }
                self.current = None;
            }

            match self.selections.next() {
                Some(idx) => {
                    let mut parents: Vec<ParentUnit> =
                        idx.iter().map(|&i| self.units[i].clone()).collect();
                    self.labels = MixedRadix::uniform(parents.len(), self.num_interactions);
                    parents.extend(self.enforced.iter().cloned());
                    self.current = Some(parents);
                }
                None if self.k < self.max_free => {
                    self.k += 1;
                    self.selections = Combinations::new(self.units.len(), self.k);
                }
                None => {
                    self.done = true;
                    return None;
                }
            }
        }
    }
}

impl FusedIterator for TopologyEnumerator {}
