//! Joint refit of a whole model against the full reference trajectory.
//!
//! Gradient matching fits each target in isolation; errors that only show up
//! once the targets are coupled are invisible to it. A refit optimizes all
//! parameters of a whole model together, using the re-simulation distance as
//! the objective, starting from the gradient-matching solution.

use std::time::Duration;

use crate::data::ReferenceData;
use crate::domain::{Bounds, ParameterCatalog, TargetModel, WholeModel};
use crate::error::TsaError;
use crate::fit::matcher::corrected_aic;
use crate::fit::objective::Objective;
use crate::fit::verify::model_distance;
use crate::math::{OptimizerOptions, SolverOptions, minimize_bounded};
use crate::models::Dynamics;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefitOptions {
    pub optimizer: OptimizerOptions,
    pub solver: SolverOptions,
    /// Time limit for each trajectory integration inside the objective.
    pub integration_timeout: Option<Duration>,
}

impl Default for RefitOptions {
    fn default() -> Self {
        Self {
            optimizer: OptimizerOptions {
                polish_rounds: 0,
                ..OptimizerOptions::default()
            },
            solver: SolverOptions::default(),
            integration_timeout: None,
        }
    }
}

fn with_params(model: &WholeModel, flat: &[f64]) -> WholeModel {
    let mut at = 0;
    let targets = model
        .targets
        .iter()
        .map(|tm| {
            let n = tm.params.len();
            let params = flat[at..at + n].to_vec();
            at += n;
            TargetModel {
                params,
                ..tm.clone()
            }
        })
        .collect();
    WholeModel {
        targets,
        distance: model.distance,
    }
}

/// Refit every parameter of `model` jointly and return the scored result.
///
/// Per-target distances and AICs are recomputed for the new parameters so
/// the returned model is internally consistent.
pub fn refit_whole_model(
    model: &WholeModel,
    dynamics: &dyn Dynamics,
    catalog: &ParameterCatalog,
    data: &ReferenceData,
    options: &RefitOptions,
) -> Result<WholeModel, TsaError> {
    let mut bounds: Vec<Bounds> = Vec::new();
    let mut x0: Vec<f64> = Vec::new();
    for tm in &model.targets {
        let b = catalog.bounds_for(&tm.topology);
        if b.len() != tm.params.len() {
            return Err(TsaError::config(format!(
                "target {} has {} parameters, catalog expects {}",
                tm.topology.target,
                tm.params.len(),
                b.len()
            )));
        }
        bounds.extend(b);
        x0.extend_from_slice(&tm.params);
    }

    let objective = |p: &[f64]| {
        let deadline = options
            .integration_timeout
            .map(|t| std::time::Instant::now() + t);
        model_distance(dynamics, &with_params(model, p), data, options.solver, deadline)
            .unwrap_or(f64::INFINITY)
    };
    let min = minimize_bounded(objective, &x0, &bounds, &options.optimizer)?;

    let mut refit = with_params(model, &min.params);
    refit.distance = Some(model_distance(dynamics, &refit, data, options.solver, None)?);
    let n = data.num_samples();
    for tm in &mut refit.targets {
        let local = Objective::new(dynamics, &tm.topology, data).distance(&tm.params);
        tm.distance = local;
        if let Some(aic) = corrected_aic(local, n, tm.params.len()) {
            tm.aic = aic;
        }
    }
    Ok(refit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SystemPreset, TimeSpec};
    use crate::domain::{InteractionKind, ParentUnit, Topology};
    use crate::models::{Dynamics, Linear};

    fn target(target: usize, params: Vec<f64>) -> TargetModel {
        TargetModel {
            topology: Topology::new(
                target,
                vec![ParentUnit::Single(0), ParentUnit::Single(1)],
                vec![InteractionKind(0); 2],
            )
            .unwrap(),
            params,
            distance: 0.0,
            aic: 0.0,
        }
    }

    #[test]
    fn refit_improves_perturbed_model() {
        let sys = SystemPreset::TwoNodeLinear.system();
        let data =
            ReferenceData::simulate(&sys, &sys.initial_state, &TimeSpec::new(0.0, 10.0, 21), SolverOptions::default())
                .unwrap();
        let catalog = Linear.parameter_catalog();

        let perturbed = WholeModel::unscored(vec![
            target(0, vec![0.45, -1.0, 0.3]),
            target(1, vec![0.0, 0.1, -0.25]),
        ]);
        let before = model_distance(&Linear, &perturbed, &data, SolverOptions::default(), None).unwrap();

        let options = RefitOptions {
            optimizer: OptimizerOptions {
                tolerance: 1e-10,
                max_iters: 400,
                polish_rounds: 0,
                timeout: None,
            },
            ..RefitOptions::default()
        };
        let refit = refit_whole_model(&perturbed, &Linear, &catalog, &data, &options).unwrap();

        let after = refit.distance.unwrap();
        assert!(after < before, "{after} >= {before}");
        assert_eq!(refit.targets[0].params.len(), 3);
        assert!(refit.targets.iter().all(|t| t.aic.is_finite()));
    }

    #[test]
    fn parameter_count_mismatch_is_rejected() {
        let sys = SystemPreset::TwoNodeLinear.system();
        let data = ReferenceData::simulate(&sys, &sys.initial_state, &sys.time, SolverOptions::default()).unwrap();
        let bad = WholeModel::unscored(vec![target(0, vec![0.5]), target(1, vec![0.0, 0.1, -0.2])]);
        let err = refit_whole_model(&bad, &Linear, &Linear.parameter_catalog(), &data, &RefitOptions::default())
            .unwrap_err();
        assert!(matches!(err, TsaError::Config(_)));
    }
}
