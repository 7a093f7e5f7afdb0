//! Reporting utilities: edge statistics and formatted terminal output.

pub mod format;

pub use format::*;

use nalgebra::DMatrix;

use crate::domain::ModelBag;

/// Fraction of the top-n models in which each single-node edge appears.
///
/// `prevalence[(p, t)]` is the share of models where `p` is a parent of `t`.
pub fn edge_prevalence(bag: &ModelBag, top_n: usize) -> DMatrix<f64> {
    let n = bag.space.num_nodes;
    let models = bag.top(top_n);
    let mut out = DMatrix::<f64>::zeros(n, n);
    if models.is_empty() {
        return out;
    }
    for m in models {
        let adj = m.adjacency();
        for p in 0..n.min(adj.nrows()) {
            for t in 0..n.min(adj.ncols()) {
                out[(p, t)] += f64::from(adj[(p, t)]);
            }
        }
    }
    out / models.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        InteractionKind, ModelSpace, ParameterCatalog, ParentUnit, TargetModel, Topology, WholeModel,
    };

    #[test]
    fn prevalence_counts_edges_over_top_models() {
        let with_edge = TargetModel {
            topology: Topology::new(0, vec![ParentUnit::Single(1)], vec![InteractionKind(0)]).unwrap(),
            params: vec![0.1, 0.2],
            distance: 0.0,
            aic: 0.0,
        };
        let basal = |t| TargetModel {
            topology: Topology::basal(t),
            params: vec![0.1],
            distance: 0.0,
            aic: 0.0,
        };
        let models = vec![
            WholeModel {
                targets: vec![with_edge, basal(1)],
                distance: Some(1.0),
            },
            WholeModel {
                targets: vec![basal(0), basal(1)],
                distance: Some(2.0),
            },
        ];
        let space = ModelSpace::new(2, Vec::new(), 1, 1, 1, Vec::new(), Vec::new()).unwrap();
        let bag = ModelBag::new(models, ParameterCatalog::default(), space);

        let all = edge_prevalence(&bag, 10);
        assert_eq!(all[(1, 0)], 0.5);
        assert_eq!(all[(0, 1)], 0.0);
        assert_eq!(edge_prevalence(&bag, 1)[(1, 0)], 1.0);
    }
}
