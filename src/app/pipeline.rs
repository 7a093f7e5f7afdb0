//! Shared "search pipeline" logic used by the CLI front-end.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! reference simulation -> per-target enumeration + gradient matching ->
//! composition -> verification -> optional refit -> ranked model bag
//!
//! The CLI can then focus on presentation (printing vs exporting).

use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::data::{ReferenceData, TimeSpec};
use crate::domain::{ModelBag, ModelSpace, SearchConfig, TargetModel, WholeModel};
use crate::error::TsaError;
use crate::fit::matcher::{MatcherOptions, TargetFit, gradient_match};
use crate::fit::pool::run_indexed;
use crate::fit::refit::{RefitOptions, refit_whole_model};
use crate::fit::verify::{VerificationFailure, VerifyOptions, rank_models};
use crate::fit::{EnsembleComposer, TopologyEnumerator};
use crate::math::{OptimizerOptions, SolverOptions};

/// Wall-clock time spent in each stage.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StageTimings {
    pub reference: Duration,
    pub fitting: Duration,
    pub verification: Duration,
    pub refit: Duration,
}

/// All computed outputs of a single `tsa search` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub system_name: &'static str,
    pub time: TimeSpec,
    pub data: ReferenceData,
    /// One entry per target, in node order.
    pub per_target: Vec<TargetFit>,
    /// Whole models produced by composition.
    pub composed: usize,
    pub failures: Vec<VerificationFailure>,
    pub bag: ModelBag,
    pub timings: StageTimings,
}

impl RunOutput {
    /// Targets whose retained list is empty, which leaves the bag empty.
    pub fn empty_targets(&self) -> Vec<usize> {
        self.per_target
            .iter()
            .filter(|f| f.models.is_empty())
            .map(|f| f.target)
            .collect()
    }
}

/// Build the model space a config describes for a system of `num_nodes`.
pub fn model_space(config: &SearchConfig, node_names: Vec<String>) -> Result<ModelSpace, TsaError> {
    ModelSpace::new(
        node_names.len(),
        node_names,
        config.max_parents,
        config.num_interactions(),
        config.max_order(),
        config.enforced_edges.clone(),
        config.enforced_gaps.clone(),
    )
}

/// Execute the full search pipeline and return the computed outputs.
pub fn run_search(config: &SearchConfig) -> Result<RunOutput, TsaError> {
    config.validate()?;
    let system = config.preset.system();
    let time = config.time.unwrap_or(system.time);

    // 1) Reference trajectory and derivatives.
    let started = Instant::now();
    let data = ReferenceData::simulate(&system, &system.initial_state, &time, SolverOptions::default())?;
    let mut timings = StageTimings {
        reference: started.elapsed(),
        ..StageTimings::default()
    };
    info!(
        system = system.name,
        nodes = data.num_nodes(),
        samples = data.num_samples(),
        "reference simulated"
    );

    // 2) Model space and parameter catalog; both fail fast on bad input.
    let space = model_space(config, system.node_names.clone())?;
    let dynamics = config.family.build();
    let catalog = dynamics.parameter_catalog();
    catalog.validate()?;

    // 3) Per-target enumeration + gradient matching, fanned out across targets.
    let started = Instant::now();
    let matcher = MatcherOptions {
        restarts: config.restarts,
        retain_k: config.retain_k,
        weak_signal_threshold: config.weak_signal_threshold,
        optimizer: OptimizerOptions {
            tolerance: config.tolerance,
            max_iters: config.max_iters,
            timeout: config.task_timeout,
            ..OptimizerOptions::default()
        },
    };
    let targets: Vec<usize> = (0..space.num_nodes).collect();
    let results = run_indexed(targets, config.parallelism, |target| {
        let topologies = TopologyEnumerator::new(&space, target)?;
        info!(target, candidates = topologies.candidate_count(), "fitting target");
        gradient_match(
            topologies,
            target,
            dynamics.as_ref(),
            &catalog,
            &data,
            matcher,
            config.seed,
        )
    });

    let mut per_target = Vec::with_capacity(space.num_nodes);
    for (target, result) in results.into_iter().enumerate() {
        match result {
            Ok(fit) => per_target.push(fit?),
            Err(reason) => {
                warn!(target, %reason, "fitting worker failed; target has no candidates");
                per_target.push(TargetFit {
                    target,
                    models: Vec::new(),
                    stats: Default::default(),
                });
            }
        }
    }
    timings.fitting = started.elapsed();
    for fit in &per_target {
        info!(
            target = fit.target,
            retained = fit.models.len(),
            evaluated = fit.stats.evaluated,
            pruned = fit.stats.pruned,
            not_converged = fit.stats.not_converged,
            "target fitted"
        );
    }

    let empty: Vec<usize> = per_target
        .iter()
        .filter(|f| f.models.is_empty())
        .map(|f| f.target)
        .collect();
    if !empty.is_empty() {
        warn!(targets = ?empty, "targets without retained models; nothing can be composed");
    }

    // 4) Composition. The retained lists are lent to the composer and handed
    // back afterwards, so only the composed models are held twice.
    let lists: Vec<Vec<TargetModel>> = per_target
        .iter_mut()
        .map(|f| std::mem::take(&mut f.models))
        .collect();
    let candidates: Vec<WholeModel> = EnsembleComposer::new(&lists).collect();
    for (fit, models) in per_target.iter_mut().zip(lists) {
        fit.models = models;
    }
    let composed = candidates.len();
    info!(composed, "whole models composed");

    // 5) Verification by re-simulation.
    let started = Instant::now();
    let verify = VerifyOptions {
        parallelism: config.parallelism,
        timeout: config.task_timeout,
        solver: SolverOptions::default(),
    };
    let verification = rank_models(candidates, dynamics.as_ref(), &data, &verify);
    timings.verification = started.elapsed();
    info!(
        scored = verification.ranked.len(),
        failed = verification.failures.len(),
        elapsed_ms = timings.verification.as_millis() as u64,
        "verification done"
    );

    // 6) Optional joint refit of the leaders, then re-rank.
    let mut ranked = verification.ranked;
    if config.refit_top > 0 && !ranked.is_empty() {
        let started = Instant::now();
        let n = config.refit_top.min(ranked.len());
        let leaders: Vec<WholeModel> = ranked[..n].to_vec();
        let refit_options = RefitOptions {
            optimizer: OptimizerOptions {
                tolerance: config.tolerance,
                max_iters: config.max_iters,
                timeout: config.task_timeout,
                polish_rounds: 0,
            },
            solver: SolverOptions::default(),
            integration_timeout: None,
        };
        let refits = run_indexed(leaders, config.parallelism, |model| {
            refit_whole_model(&model, dynamics.as_ref(), &catalog, &data, &refit_options)
        });
        for (slot, result) in ranked.iter_mut().zip(refits) {
            match result {
                Ok(Ok(model)) => *slot = model,
                Ok(Err(err)) => warn!(%err, "refit failed; keeping gradient-matching parameters"),
                Err(reason) => warn!(%reason, "refit worker failed"),
            }
        }
        timings.refit = started.elapsed();
        info!(refit = n, "leaders refit");
    }

    let bag = ModelBag::new(ranked, catalog, space);

    Ok(RunOutput {
        system_name: system.name,
        time,
        data,
        per_target,
        composed,
        failures: verification.failures,
        bag,
        timings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SystemPreset;
    use crate::domain::ParentUnit;
    use crate::models::DynamicsKind;

    fn two_node_config() -> SearchConfig {
        SearchConfig {
            family: DynamicsKind::Linear,
            preset: SystemPreset::TwoNodeLinear,
            max_parents: 2,
            retain_k: 3,
            restarts: 3,
            // Node 1 has no constant term, so its true model would otherwise
            // be pruned as weak signal.
            weak_signal_threshold: 0.0,
            tolerance: 1e-10,
            max_iters: 4000,
            ..SearchConfig::default()
        }
    }

    #[test]
    fn recovers_two_node_system_end_to_end() {
        let run = run_search(&two_node_config()).unwrap();

        assert_eq!(run.per_target.len(), 2);
        assert!(run.per_target.iter().all(|f| f.models.len() <= 3));
        assert_eq!(run.composed, run.per_target.iter().map(|f| f.models.len()).product::<usize>());
        assert!(run.failures.is_empty());

        let best = run.bag.get(0).unwrap();
        let both = vec![ParentUnit::Single(0), ParentUnit::Single(1)];
        assert_eq!(best.targets[0].topology.parents, both);
        assert_eq!(best.targets[1].topology.parents, both);
        assert!(best.distance.unwrap() < 1e-2, "{:?}", best.distance);

        let p0 = &best.targets[0].params;
        assert!((p0[0] - 0.5).abs() < 1e-3, "{p0:?}");
        assert!((p0[2] - 0.3).abs() < 1e-3, "{p0:?}");
    }

    #[test]
    fn parallel_run_matches_sequential() {
        let seq = run_search(&two_node_config()).unwrap();
        let par = run_search(&SearchConfig {
            parallelism: 4,
            ..two_node_config()
        })
        .unwrap();
        assert_eq!(seq.bag.models(), par.bag.models());
    }

    #[test]
    fn everything_pruned_completes_with_empty_bag() {
        let config = SearchConfig {
            weak_signal_threshold: 1e3,
            max_iters: 200,
            ..two_node_config()
        };
        let run = run_search(&config).unwrap();
        assert!(run.bag.is_empty());
        assert_eq!(run.composed, 0);
        assert!(run.failures.is_empty());
        assert_eq!(run.per_target.len(), 2);
        assert!(run.per_target.iter().all(|f| f.models.is_empty() && f.stats.pruned > 0));
        assert_eq!(run.empty_targets(), vec![0, 1]);

        let summary = crate::report::format_run_summary(&run, &config);
        assert!(summary.contains("Targets without candidates: Node 0, Node 1"), "{summary}");
        assert!(summary.contains("composed=0 verified=0 failed=0"), "{summary}");
    }

    #[test]
    fn conflicting_enforcement_fails_fast() {
        let config = SearchConfig {
            enforced_edges: vec![(1, 0)],
            enforced_gaps: vec![(1, 0)],
            ..two_node_config()
        };
        assert_eq!(run_search(&config).unwrap_err().exit_code(), 2);
    }

    #[test]
    fn refit_keeps_ranking_sorted() {
        let config = SearchConfig {
            refit_top: 2,
            max_iters: 300,
            ..two_node_config()
        };
        let run = run_search(&config).unwrap();
        let ds: Vec<f64> = run.bag.models().iter().filter_map(|m| m.distance).collect();
        assert!(ds.windows(2).all(|w| w[0] <= w[1]));
    }
}
