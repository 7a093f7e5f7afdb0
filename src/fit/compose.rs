//! Whole-model composition: the cartesian product of per-target winners.

use std::iter::FusedIterator;

use crate::domain::{TargetModel, WholeModel};
use crate::math::MixedRadix;

/// Lazily yields one unscored [`WholeModel`] per combination, choosing one
/// model per node. The last node's choice varies fastest.
#[derive(Debug, Clone)]
pub struct EnsembleComposer<'a> {
    lists: &'a [Vec<TargetModel>],
    counter: MixedRadix,
}

impl<'a> EnsembleComposer<'a> {
    /// `lists[i]` holds node `i`'s retained models. With no nodes, or any
    /// empty list, nothing is yielded.
    pub fn new(lists: &'a [Vec<TargetModel>]) -> Self {
        let counter = if lists.is_empty() {
            MixedRadix::new(vec![0])
        } else {
            MixedRadix::new(lists.iter().map(Vec::len).collect())
        };
        Self { lists, counter }
    }

    /// Number of whole models a fresh composer yields (saturating).
    pub fn total(&self) -> usize {
        if self.lists.is_empty() {
            return 0;
        }
        let sizes: Vec<usize> = self.lists.iter().map(Vec::len).collect();
        MixedRadix::total(&sizes)
    }
}

impl Iterator for EnsembleComposer<'_> {
    type Item = WholeModel;

    fn next(&mut self) -> Option<WholeModel> {
        let digits = self.counter.next()?;
        let targets = digits
            .iter()
            .zip(self.lists)
            .map(|(&d, list)| list[d].clone())
            .collect();
        Some(WholeModel::unscored(targets))
    }
}

impl FusedIterator for EnsembleComposer<'_> {}
