//! Per-target gradient matching.
//!
//! Every candidate topology is fitted with several random restarts of a
//! bounded optimizer, scored with the sample-size-corrected AIC, screened for
//! weak signal and offered to a bounded top-K set. One matcher owns one
//! target's top-K exclusively.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::debug;

use crate::data::ReferenceData;
use crate::domain::{NodeId, ParameterCatalog, TargetModel, Topology};
use crate::error::TsaError;
use crate::fit::objective::Objective;
use crate::math::{OptimizerOptions, minimize_bounded};
use crate::models::Dynamics;

/// Distances are floored here before taking the log in the AIC.
pub const DISTANCE_FLOOR: f64 = 1e-12;

/// `N·ln(d/N) + 2(P+1)·N/(N−P)`, or `None` when `P >= N`.
pub fn corrected_aic(distance: f64, num_samples: usize, num_params: usize) -> Option<f64> {
    if num_params >= num_samples {
        return None;
    }
    let n = num_samples as f64;
    let p = num_params as f64;
    let d = distance.max(DISTANCE_FLOOR);
    Some(n * (d / n).ln() + 2.0 * (p + 1.0) * n / (n - p))
}

/// `true` when the smallest-magnitude parameter is below `threshold`.
pub fn is_weak_signal(params: &[f64], threshold: f64) -> bool {
    params
        .iter()
        .map(|v| v.abs())
        .min_by(f64::total_cmp)
        .is_some_and(|m| m < threshold)
}

/// Bounded set keeping the lowest-AIC models seen so far.
#[derive(Debug, Clone)]
pub struct TopK {
    capacity: usize,
    items: Vec<TargetModel>,
}

impl TopK {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn worst(&self) -> Option<usize> {
        self.items
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.aic.total_cmp(&b.1.aic))
            .map(|(i, _)| i)
    }

    /// Insert while not full; afterwards replace the worst member only if
    /// `model` is strictly better. Returns whether it was kept.
    pub fn offer(&mut self, model: TargetModel) -> bool {
        if self.capacity == 0 {
            return false;
        }
        if self.items.len() < self.capacity {
            self.items.push(model);
            return true;
        }
        match self.worst() {
            Some(i) if model.aic < self.items[i].aic => {
                self.items[i] = model;
                true
            }
            _ => false,
        }
    }

    /// Retained models, ascending by AIC.
    pub fn into_sorted(mut self) -> Vec<TargetModel> {
        self.items.sort_by(|a, b| a.aic.total_cmp(&b.aic));
        self.items
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatcherOptions {
    pub restarts: usize,
    pub retain_k: usize,
    pub weak_signal_threshold: f64,
    pub optimizer: OptimizerOptions,
}

impl Default for MatcherOptions {
    fn default() -> Self {
        Self {
            restarts: 1,
            retain_k: 5,
            weak_signal_threshold: 1e-5,
            optimizer: OptimizerOptions::default(),
        }
    }
}

/// Counters for one target's fitting pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchStats {
    pub evaluated: usize,
    /// Skipped because the AIC correction is undefined (`P >= N`).
    pub too_many_params: usize,
    pub pruned: usize,
    pub not_converged: usize,
}

/// Output of one target's fitting pass.
#[derive(Debug, Clone)]
pub struct TargetFit {
    pub target: NodeId,
    /// Retained models, ascending by AIC.
    pub models: Vec<TargetModel>,
    pub stats: MatchStats,
}

/// Stable per-target seed so results do not depend on scheduling.
pub fn target_seed(seed: u64, target: NodeId) -> u64 {
    let mut hasher = DefaultHasher::new();
    seed.hash(&mut hasher);
    target.hash(&mut hasher);
    hasher.finish()
}

pub struct GradientMatcher<'a> {
    target: NodeId,
    dynamics: &'a dyn Dynamics,
    catalog: &'a ParameterCatalog,
    data: &'a ReferenceData,
    options: MatcherOptions,
    top: TopK,
    stats: MatchStats,
    rng: StdRng,
}

impl<'a> GradientMatcher<'a> {
    /// Fails fast on malformed bounds, before any optimization.
    pub fn new(
        target: NodeId,
        dynamics: &'a dyn Dynamics,
        catalog: &'a ParameterCatalog,
        data: &'a ReferenceData,
        options: MatcherOptions,
        seed: u64,
    ) -> Result<Self, TsaError> {
        catalog.validate()?;
        if target >= data.num_nodes() {
            return Err(TsaError::config(format!(
                "target {target} is outside the reference data's {} nodes",
                data.num_nodes()
            )));
        }
        Ok(Self {
            target,
            dynamics,
            catalog,
            data,
            options,
            top: TopK::new(options.retain_k),
            stats: MatchStats::default(),
            rng: StdRng::seed_from_u64(target_seed(seed, target)),
        })
    }

    /// Best restart for `topology`, or `None` when it cannot be scored.
    pub fn fit_topology(&mut self, topology: &Topology) -> Result<Option<TargetModel>, TsaError> {
        let n = self.data.num_samples();
        let bounds = self.catalog.bounds_for(topology);
        if bounds.len() >= n {
            debug!(%topology, params = bounds.len(), samples = n, "skipping: too many parameters");
            self.stats.too_many_params += 1;
            return Ok(None);
        }

        let objective = Objective::new(self.dynamics, topology, self.data);
        let mut best: Option<TargetModel> = None;
        let mut best_converged = true;

        for _ in 0..self.options.restarts.max(1) {
            let x0: Vec<f64> = bounds.iter().map(|b| b.sample(&mut self.rng)).collect();
            let min = minimize_bounded(objective.as_fn(), &x0, &bounds, &self.options.optimizer)?;
            let distance = objective.distance(&min.params);
            let Some(aic) = corrected_aic(distance, n, bounds.len()) else {
                continue;
            };
            if best.as_ref().is_none_or(|b| aic < b.aic) {
                best_converged = min.converged;
                best = Some(TargetModel {
                    topology: topology.clone(),
                    params: min.params,
                    distance,
                    aic,
                });
            }
        }

        self.stats.evaluated += 1;
        if !best_converged {
            self.stats.not_converged += 1;
            debug!(%topology, "optimizer stopped before converging; using best point");
        }
        Ok(best)
    }

    /// Screen a fitted model and offer it to the top-K. Returns whether it
    /// is currently retained.
    pub fn consider(&mut self, model: TargetModel) -> bool {
        if is_weak_signal(&model.params, self.options.weak_signal_threshold) {
            debug!(topology = %model.topology, "pruned: weak signal");
            self.stats.pruned += 1;
            return false;
        }
        self.top.offer(model)
    }

    /// Fit one topology and offer the result.
    pub fn fit(&mut self, topology: &Topology) -> Result<bool, TsaError> {
        match self.fit_topology(topology)? {
            Some(model) => Ok(self.consider(model)),
            None => Ok(false),
        }
    }

    pub fn finish(self) -> TargetFit {
        TargetFit {
            target: self.target,
            models: self.top.into_sorted(),
            stats: self.stats,
        }
    }
}

/// Fit every topology of a stream for one target and return the retained
/// models, ascending by AIC.
pub fn gradient_match(
    topologies: impl IntoIterator<Item = Topology>,
    target: NodeId,
    dynamics: &dyn Dynamics,
    catalog: &ParameterCatalog,
    data: &ReferenceData,
    options: MatcherOptions,
    seed: u64,
) -> Result<TargetFit, TsaError> {
    let mut matcher = GradientMatcher::new(target, dynamics, catalog, data, options, seed)?;
    for topology in topologies {
        matcher.fit(&topology)?;
    }
    Ok(matcher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::TimeSpec;
    use crate::domain::{Bounds, InteractionKind, ParameterType, ParentUnit};
    use crate::math::{FnField, SolverOptions};
    use crate::models::Linear;

    fn model(aic: f64, params: Vec<f64>) -> TargetModel {
        TargetModel {
            topology: Topology::basal(0),
            params,
            distance: 1.0,
            aic,
        }
    }

    #[test]
    fn aic_matches_formula_and_guards_zero() {
        let aic = corrected_aic(2.0, 21, 2).unwrap();
        let expected = 21.0 * (2.0f64 / 21.0).ln() + 2.0 * 3.0 * 21.0 / 19.0;
        assert!((aic - expected).abs() < 1e-12);

        let zero = corrected_aic(0.0, 21, 2).unwrap();
        assert!(zero.is_finite());
        assert_eq!(zero, corrected_aic(DISTANCE_FLOOR, 21, 2).unwrap());

        assert!(corrected_aic(1.0, 3, 3).is_none());
    }

    #[test]
    fn weak_signal_uses_smallest_magnitude() {
        assert!(is_weak_signal(&[0.5, -1e-8], 1e-5));
        assert!(!is_weak_signal(&[0.5, -1e-3], 1e-5));
        assert!(!is_weak_signal(&[], 1e-5));
    }

    #[test]
    fn top_k_keeps_lowest_and_replaces_only_on_strict_improvement() {
        let mut top = TopK::new(3);
        for aic in [5.0, 1.0, 4.0] {
            assert!(top.offer(model(aic, vec![1.0])));
        }
        assert!(!top.offer(model(5.0, vec![1.0])));
        // Ties with the worst member are not an improvement.
        assert!(!top.offer(model(5.0, vec![2.0])));
        assert!(top.offer(model(2.0, vec![1.0])));
        assert!(top.offer(model(0.5, vec![1.0])));

        let sorted: Vec<f64> = top.into_sorted().iter().map(|m| m.aic).collect();
        assert_eq!(sorted, vec![0.5, 1.0, 2.0]);
    }

    #[test]
    fn top_k_matches_brute_force_sort() {
        let stream = [3.0, 9.0, -1.0, 7.0, 2.0, 2.5, 8.0, -4.0, 6.0, 0.0];
        let mut top = TopK::new(4);
        for (i, &aic) in stream.iter().enumerate() {
            top.offer(model(aic, vec![1.0]));
            let mut seen: Vec<f64> = stream[..=i].to_vec();
            seen.sort_by(f64::total_cmp);
            seen.truncate(4);
            let mut kept: Vec<f64> = top.clone().into_sorted().iter().map(|m| m.aic).collect();
            kept.sort_by(f64::total_cmp);
            assert_eq!(kept, seen);
        }
    }

    /// `dx_t = c − x_t + Σ k_i·x_{p_i}`: linear with unit self-decay, so a
    /// single cross edge suffices to describe node 0 of the two-node system.
    struct UnitDecayLinear;

    impl Dynamics for UnitDecayLinear {
        fn evaluate(&self, state: &[f64], _t: f64, top: &Topology, params: &[f64]) -> f64 {
            let mut dx = params[0] - state[top.target];
            for (i, p) in top.parents.iter().enumerate() {
                dx += params[i + 1] * p.value(state);
            }
            dx
        }

        fn parameter_catalog(&self) -> ParameterCatalog {
            ParameterCatalog::from_types([
                ParameterType::node("CONST", -10.0, 10.0),
                ParameterType::edge("COEFF", -10.0, 10.0),
            ])
        }
    }

    fn two_node_data() -> ReferenceData {
        let field = FnField::new(2, |_t, x: &[f64], dx: &mut [f64]| {
            dx[0] = 0.5 - x[0] + 0.3 * x[1];
            dx[1] = -0.2 * x[1] + 0.1 * x[0];
        });
        ReferenceData::simulate(&field, &[0.0, 1.0], &TimeSpec::new(0.0, 10.0, 21), SolverOptions::default())
            .unwrap()
    }

    #[test]
    fn recovers_two_node_parameters() {
        let data = two_node_data();
        let dynamics = UnitDecayLinear;
        let catalog = dynamics.parameter_catalog();
        let options = MatcherOptions {
            restarts: 4,
            optimizer: OptimizerOptions {
                tolerance: 1e-12,
                max_iters: 5000,
                ..OptimizerOptions::default()
            },
            ..MatcherOptions::default()
        };
        let top = Topology::new(0, vec![ParentUnit::Single(1)], vec![InteractionKind(0)]).unwrap();
        let fit = gradient_match([top], 0, &dynamics, &catalog, &data, options, 7).unwrap();

        assert_eq!(fit.models.len(), 1);
        let params = &fit.models[0].params;
        assert!((params[0] - 0.5).abs() < 1e-3, "{params:?}");
        assert!((params[1] - 0.3).abs() < 1e-3, "{params:?}");
    }

    #[test]
    fn weak_candidate_is_pruned_even_with_better_aic() {
        let data = two_node_data();
        let catalog = Linear.parameter_catalog();
        let mut matcher =
            GradientMatcher::new(0, &Linear, &catalog, &data, MatcherOptions::default(), 1).unwrap();

        let edge = Topology::new(0, vec![ParentUnit::Single(1)], vec![InteractionKind(0)]).unwrap();
        let weak = TargetModel {
            topology: edge,
            params: vec![0.5, 1e-8],
            distance: 1e-6,
            aic: -500.0,
        };
        let valid = TargetModel {
            topology: Topology::basal(0),
            params: vec![0.4],
            distance: 2.0,
            aic: 10.0,
        };

        assert!(!matcher.consider(weak));
        assert!(matcher.consider(valid.clone()));
        let fit = matcher.finish();
        assert_eq!(fit.models, vec![valid]);
        assert_eq!(fit.stats.pruned, 1);
    }

    #[test]
    fn malformed_bounds_fail_before_fitting() {
        let data = two_node_data();
        let catalog = ParameterCatalog {
            node: vec![ParameterType {
                bounds: Bounds::new(1.0, -1.0),
                ..ParameterType::node("CONST", 0.0, 0.0)
            }],
            edge: Vec::new(),
        };
        let err = GradientMatcher::new(0, &Linear, &catalog, &data, MatcherOptions::default(), 1)
            .err()
            .unwrap();
        assert!(matches!(err, TsaError::InvalidBounds { .. }));
    }

    #[test]
    fn fitting_is_seed_deterministic() {
        let data = two_node_data();
        let catalog = Linear.parameter_catalog();
        let tops = || {
            vec![
                Topology::basal(1),
                Topology::new(1, vec![ParentUnit::Single(0)], vec![InteractionKind(0)]).unwrap(),
            ]
        };
        let a = gradient_match(tops(), 1, &Linear, &catalog, &data, MatcherOptions::default(), 3).unwrap();
        let b = gradient_match(tops(), 1, &Linear, &catalog, &data, MatcherOptions::default(), 3).unwrap();
        assert_eq!(a.models, b.models);
        assert_eq!(a.stats.evaluated, 2);
    }
}
