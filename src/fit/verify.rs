//! Whole-model verification by re-simulation.
//!
//! Each candidate is integrated from the reference initial state over the
//! reference grid. Its global distance is the Euclidean (Frobenius) norm of
//! the difference to the reference trajectory over every sample and node.
//! This ranking is authoritative; per-target AIC only decides which
//! topologies make it this far.

use std::time::{Duration, Instant};

use nalgebra::DMatrix;
use tracing::{debug, warn};

use crate::data::ReferenceData;
use crate::domain::WholeModel;
use crate::fit::pool::run_indexed;
use crate::math::{DormandPrince, SolverError, SolverOptions, VectorField};
use crate::models::Dynamics;

/// The combined vector field of a whole model: node `i`'s derivative comes
/// from the target model whose topology targets `i`.
pub struct WholeModelField<'a> {
    dynamics: &'a dyn Dynamics,
    model: &'a WholeModel,
}

impl<'a> WholeModelField<'a> {
    pub fn new(dynamics: &'a dyn Dynamics, model: &'a WholeModel) -> Self {
        Self { dynamics, model }
    }
}

impl VectorField for WholeModelField<'_> {
    fn dimension(&self) -> usize {
        self.model.num_nodes()
    }

    fn apply(&self, t: f64, x: &[f64], out: &mut [f64]) {
        for tm in &self.model.targets {
            out[tm.topology.target] = self.dynamics.evaluate(x, t, &tm.topology, &tm.params);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VerifyOptions {
    /// Worker threads (1 = sequential).
    pub parallelism: usize,
    /// Per-candidate integration time limit.
    pub timeout: Option<Duration>,
    pub solver: SolverOptions,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            parallelism: 1,
            timeout: None,
            solver: SolverOptions::default(),
        }
    }
}

/// A candidate that could not be scored.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationFailure {
    /// Position of the candidate in the input order.
    pub index: usize,
    pub model: WholeModel,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct Verification {
    /// Scored candidates, ascending by global distance.
    pub ranked: Vec<WholeModel>,
    pub failures: Vec<VerificationFailure>,
}

/// Simulated trajectory of `model`, one row per reference sample.
pub fn simulate_model(
    dynamics: &dyn Dynamics,
    model: &WholeModel,
    data: &ReferenceData,
    solver: SolverOptions,
    deadline: Option<Instant>,
) -> Result<DMatrix<f64>, SolverError> {
    let field = WholeModelField::new(dynamics, model);
    let mut integrator = DormandPrince::new(field.dimension(), solver);
    integrator.integrate(&field, &data.initial_state, &data.times, deadline)
}

/// Global distance of one candidate. Pure given its inputs.
pub fn model_distance(
    dynamics: &dyn Dynamics,
    model: &WholeModel,
    data: &ReferenceData,
    solver: SolverOptions,
    deadline: Option<Instant>,
) -> Result<f64, SolverError> {
    if model.num_nodes() != data.num_nodes() {
        return Err(SolverError::Dimension {
            expected: data.num_nodes(),
            got: model.num_nodes(),
        });
    }
    // Every node needs exactly one equation or stale stage values leak in.
    let mut targets: Vec<usize> = model.targets.iter().map(|t| t.topology.target).collect();
    targets.sort_unstable();
    if !targets.iter().copied().eq(0..data.num_nodes()) {
        return Err(SolverError::Coverage {
            nodes: data.num_nodes(),
        });
    }
    let sim = simulate_model(dynamics, model, data, solver, deadline)?;
    Ok((sim - &data.states).norm())
}

/// Score every candidate and sort ascending by global distance.
///
/// A candidate whose integration fails (or panics, or times out) is excluded
/// from the ranking and reported in `failures`; the rest of the batch is
/// unaffected.
pub fn rank_models(
    candidates: Vec<WholeModel>,
    dynamics: &dyn Dynamics,
    data: &ReferenceData,
    options: &VerifyOptions,
) -> Verification {
    let total = candidates.len();
    let results = run_indexed(candidates.iter().collect(), options.parallelism, |model| {
        let deadline = options.timeout.map(|t| Instant::now() + t);
        model_distance(dynamics, model, data, options.solver, deadline)
    });

    let mut out = Verification::default();
    for (index, (mut model, result)) in candidates.into_iter().zip(results).enumerate() {
        match result {
            Ok(Ok(distance)) if distance.is_finite() => {
                model.distance = Some(distance);
                out.ranked.push(model);
            }
            Ok(Ok(distance)) => {
                out.failures.push(VerificationFailure {
                    index,
                    model,
                    reason: format!("non-finite distance {distance}"),
                });
            }
            Ok(Err(err)) => out.failures.push(VerificationFailure {
                index,
                model,
                reason: err.to_string(),
            }),
            Err(reason) => out.failures.push(VerificationFailure {
                index,
                model,
                reason,
            }),
        }
    }

    out.ranked.sort_by(|a, b| {
        let da = a.distance.unwrap_or(f64::INFINITY);
        let db = b.distance.unwrap_or(f64::INFINITY);
        da.total_cmp(&db)
    });

    for f in &out.failures {
        warn!(candidate = f.index, reason = %f.reason, "verification failed; candidate excluded");
    }
    debug!(total, scored = out.ranked.len(), failed = out.failures.len(), "verification done");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SystemPreset, TimeSpec};
    use crate::domain::{InteractionKind, ParentUnit, TargetModel, Topology};
    use crate::models::Linear;

    fn reference() -> ReferenceData {
        let sys = SystemPreset::TwoNodeLinear.system();
        ReferenceData::simulate(&sys, &sys.initial_state, &TimeSpec::new(0.0, 10.0, 21), SolverOptions::default())
            .unwrap()
    }

    fn target(target: usize, parents: &[usize], params: Vec<f64>) -> TargetModel {
        let units: Vec<ParentUnit> = parents.iter().map(|&p| ParentUnit::Single(p)).collect();
        let n = units.len();
        TargetModel {
            topology: Topology::new(target, units, vec![InteractionKind(0); n]).unwrap(),
            params,
            distance: 0.0,
            aic: 0.0,
        }
    }

    fn candidates() -> Vec<WholeModel> {
        let true0 = target(0, &[0, 1], vec![0.5, -1.0, 0.3]);
        let true1 = target(1, &[0, 1], vec![0.0, 0.1, -0.2]);
        let wrong0 = target(0, &[0], vec![0.6, -1.0]);
        let wrong1 = target(1, &[1], vec![0.05, -0.2]);
        vec![
            WholeModel::unscored(vec![wrong0.clone(), wrong1.clone()]),
            WholeModel::unscored(vec![wrong0, true1.clone()]),
            WholeModel::unscored(vec![true0.clone(), true1]),
            WholeModel::unscored(vec![true0, wrong1]),
        ]
    }

    #[test]
    fn true_model_ranks_first_with_near_zero_distance() {
        let data = reference();
        let v = rank_models(candidates(), &Linear, &data, &VerifyOptions::default());
        assert!(v.failures.is_empty());
        assert_eq!(v.ranked.len(), 4);

        let best = &v.ranked[0];
        assert_eq!(best.targets[0].topology.num_parents(), 2);
        assert_eq!(best.targets[1].topology.num_parents(), 2);
        assert!(best.distance.unwrap() < 1e-2, "{:?}", best.distance);

        let ds: Vec<f64> = v.ranked.iter().map(|m| m.distance.unwrap()).collect();
        assert!(ds.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn verification_is_deterministic_across_parallelism() {
        let data = reference();
        let seq = rank_models(candidates(), &Linear, &data, &VerifyOptions::default());
        let par = rank_models(
            candidates(),
            &Linear,
            &data,
            &VerifyOptions {
                parallelism: 3,
                ..VerifyOptions::default()
            },
        );
        assert_eq!(seq.ranked, par.ranked);

        let again = model_distance(&Linear, &seq.ranked[0], &data, SolverOptions::default(), None).unwrap();
        assert_eq!(Some(again), seq.ranked[0].distance);
    }

    #[test]
    fn diverging_candidate_is_reported_not_fatal() {
        let data = reference();
        // x0' = 1 + x0² reaches infinity near t = π/2.
        let square = TargetModel {
            topology: Topology::new(0, vec![ParentUnit::Joint(vec![0, 0])], vec![InteractionKind(0)])
                .unwrap(),
            params: vec![1.0, 1.0],
            distance: 0.0,
            aic: 0.0,
        };
        let explode = WholeModel::unscored(vec![square, target(1, &[1], vec![0.0, -0.2])]);
        let mut all = candidates();
        all.push(explode);

        let options = VerifyOptions {
            solver: SolverOptions {
                max_steps: 2_000,
                ..SolverOptions::default()
            },
            ..VerifyOptions::default()
        };
        let v = rank_models(all, &Linear, &data, &options);
        assert_eq!(v.ranked.len(), 4);
        assert_eq!(v.failures.len(), 1);
        assert_eq!(v.failures[0].index, 4);
        assert!(v.ranked[0].distance.unwrap() < 1e-2);
    }

    #[test]
    fn node_count_mismatch_is_a_failure() {
        let data = reference();
        let short = WholeModel::unscored(vec![target(0, &[], vec![0.5])]);
        let v = rank_models(vec![short], &Linear, &data, &VerifyOptions::default());
        assert!(v.ranked.is_empty());
        assert_eq!(v.failures.len(), 1);
        assert_eq!(v.failures[0].index, 0);
    }

    #[test]
    fn duplicated_target_is_a_failure() {
        let data = reference();
        let twice = WholeModel::unscored(vec![
            target(0, &[0, 1], vec![0.5, -1.0, 0.3]),
            target(0, &[0], vec![0.6, -1.0]),
        ]);
        let err = model_distance(&Linear, &twice, &data, SolverOptions::default(), None).unwrap_err();
        assert_eq!(err, SolverError::Coverage { nodes: 2 });

        let mut all = candidates();
        all.insert(1, twice);
        let v = rank_models(all, &Linear, &data, &VerifyOptions::default());
        assert_eq!(v.ranked.len(), 4);
        assert_eq!(v.failures.len(), 1);
        assert_eq!(v.failures[0].index, 1);
    }
}
