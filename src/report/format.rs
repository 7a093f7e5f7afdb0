//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the fitting code stays clean and testable
//! - output changes are localized

use crate::app::pipeline::RunOutput;
use crate::domain::{ModelBag, ModelSpace, SearchConfig, TargetModel, Topology, WholeModel};
use crate::report::edge_prevalence;

/// Format the full run summary (system, settings, per-target diagnostics, timings).
pub fn format_run_summary(run: &RunOutput, config: &SearchConfig) -> String {
    let mut out = String::new();
    let space = &run.bag.space;

    out.push_str("=== tsa - Topological Sensitivity Analysis ===\n");
    out.push_str(&format!("System: {} ({} nodes)\n", run.system_name, space.num_nodes));
    out.push_str(&format!("Family: {}\n", config.family.display_name()));
    out.push_str(&format!(
        "Time grid: [{}, {}] with {} samples\n",
        run.time.start, run.time.stop, run.time.steps
    ));
    out.push_str(&format!(
        "Space: max_parents={} interactions={} max_order={}\n",
        space.max_parents, space.num_interactions, space.max_order
    ));
    if !space.enforced_edges.is_empty() {
        out.push_str(&format!("Enforced edges: {}\n", fmt_pairs(&space.enforced_edges)));
    }
    if !space.enforced_gaps.is_empty() {
        out.push_str(&format!("Enforced gaps: {}\n", fmt_pairs(&space.enforced_gaps)));
    }

    out.push_str("\nPer-target fitting:\n");
    out.push_str(&format!(
        "{:<14} {:>9} {:>8} {:>8} {:>10} {:>12}\n",
        "target", "evaluated", "pruned", "kept", "unconverged", "best AIC"
    ));
    out.push_str(&format!(
        "{:-<14} {:-<9} {:-<8} {:-<8} {:-<10} {:-<12}\n",
        "", "", "", "", "", ""
    ));
    for fit in &run.per_target {
        let best = fit
            .models
            .first()
            .map(|m| format!("{:.3}", m.aic))
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!(
            "{:<14} {:>9} {:>8} {:>8} {:>10} {:>12}\n",
            truncate(space.node_name(fit.target), 14),
            fit.stats.evaluated,
            fit.stats.pruned,
            fit.models.len(),
            fit.stats.not_converged,
            best
        ));
    }

    let empty = run.empty_targets();
    if !empty.is_empty() {
        let names: Vec<&str> = empty.iter().map(|&t| space.node_name(t)).collect();
        out.push_str(&format!("Targets without candidates: {}\n", names.join(", ")));
    }

    out.push_str(&format!(
        "\nWhole models: composed={} verified={} failed={}\n",
        run.composed,
        run.bag.len(),
        run.failures.len()
    ));
    for f in &run.failures {
        out.push_str(&format!("  (failed #{}) {}\n", f.index, f.reason));
    }

    let t = &run.timings;
    out.push_str(&format!(
        "Timings: reference={:.2?} fitting={:.2?} verification={:.2?} refit={:.2?}\n",
        t.reference, t.fitting, t.verification, t.refit
    ));
    out.push('\n');
    out
}

/// Format the top-n ranked whole models with their topologies and parameters.
pub fn format_rankings(bag: &ModelBag, top_n: usize) -> String {
    let mut out = String::new();
    out.push_str(&format!("Top {} of {} whole models:\n", top_n.min(bag.len()), bag.len()));
    for (rank, model) in bag.top(top_n).iter().enumerate() {
        out.push_str(&format_model(rank, model, &bag.space));
    }
    out
}

fn format_model(rank: usize, model: &WholeModel, space: &ModelSpace) -> String {
    let mut out = String::new();
    let distance = model
        .distance
        .map(|d| format!("{d:.6e}"))
        .unwrap_or_else(|| "unscored".to_string());
    out.push_str(&format!("#{:<3} distance={distance}\n", rank + 1));
    for tm in &model.targets {
        out.push_str(&format_target(tm, space));
    }
    out
}

fn format_target(tm: &TargetModel, space: &ModelSpace) -> String {
    let line = format!(
        "     {:<14} {:<28} AIC={:>10.3} params={}",
        truncate(space.node_name(tm.topology.target), 14),
        format_parents(&tm.topology),
        tm.aic,
        fmt_vec(&tm.params)
    );
    format!("{}\n", line.trim_end())
}

fn format_parents(topology: &Topology) -> String {
    if topology.parents.is_empty() {
        return "<- (basal)".to_string();
    }
    let parts: Vec<String> = topology
        .parents
        .iter()
        .zip(&topology.interactions)
        .map(|(p, i)| format!("{p}:{i}"))
        .collect();
    format!("<- {}", parts.join(" "))
}

/// Format the topologies of one target, as listed by `tsa enumerate`.
pub fn format_enumeration(space: &ModelSpace, target: usize, topologies: &[Topology], limit: usize) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{} (target {target}): {} candidate topologies\n",
        space.node_name(target),
        topologies.len()
    ));
    for top in topologies.iter().take(limit) {
        out.push_str(&format!("  {}\n", format_parents(top)));
    }
    if topologies.len() > limit {
        out.push_str(&format!("  ... {} more\n", topologies.len() - limit));
    }
    out
}

/// Edge prevalence matrix across the top-n models, rows = parents.
pub fn format_prevalence(bag: &ModelBag, top_n: usize) -> String {
    let prevalence = edge_prevalence(bag, top_n);
    let n = bag.space.num_nodes;
    let mut out = String::new();
    out.push_str(&format!(
        "Edge prevalence over top {} (row = parent, column = target):\n",
        top_n.min(bag.len())
    ));
    out.push_str(&format!("{:>6}", ""));
    for t in 0..n {
        out.push_str(&format!(" {t:>6}"));
    }
    out.push('\n');
    for p in 0..n {
        out.push_str(&format!("{p:>6}"));
        for t in 0..n {
            out.push_str(&format!(" {:>6.2}", prevalence[(p, t)]));
        }
        out.push('\n');
    }
    out
}

fn fmt_pairs(pairs: &[(usize, usize)]) -> String {
    let parts: Vec<String> = pairs.iter().map(|(p, t)| format!("{p}->{t}")).collect();
    parts.join(", ")
}

fn fmt_vec(v: &[f64]) -> String {
    let parts: Vec<String> = v.iter().map(|x| format!("{x:.6}")).collect();
    format!("[{}]", parts.join(", "))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{InteractionKind, ParameterCatalog, ParentUnit};

    fn bag() -> ModelBag {
        let edge = TargetModel {
            topology: Topology::new(0, vec![ParentUnit::Single(1)], vec![InteractionKind(1)]).unwrap(),
            params: vec![0.5, 0.3],
            distance: 0.0,
            aic: -42.0,
        };
        let basal = TargetModel {
            topology: Topology::basal(1),
            params: vec![0.2],
            distance: 0.0,
            aic: -7.0,
        };
        let space = ModelSpace::new(2, Vec::new(), 1, 2, 1, Vec::new(), Vec::new()).unwrap();
        ModelBag::new(
            vec![WholeModel {
                targets: vec![edge, basal],
                distance: Some(0.001),
            }],
            ParameterCatalog::default(),
            space,
        )
    }

    #[test]
    fn rankings_list_topologies_and_params() {
        let text = format_rankings(&bag(), 5);
        assert!(text.starts_with("Top 1 of 1 whole models:"));
        assert!(text.contains("#1"));
        assert!(text.contains("<- 1:1"));
        assert!(text.contains("<- (basal)"));
        assert!(text.contains("[0.500000, 0.300000]"));
    }

    #[test]
    fn enumeration_listing_is_truncated() {
        let space = ModelSpace::new(2, Vec::new(), 1, 1, 1, Vec::new(), Vec::new()).unwrap();
        let tops = vec![Topology::basal(0); 5];
        let text = format_enumeration(&space, 0, &tops, 2);
        assert!(text.contains("5 candidate topologies"));
        assert!(text.contains("... 3 more"));
    }

    #[test]
    fn prevalence_table_has_one_row_per_node() {
        let text = format_prevalence(&bag(), 1);
        assert_eq!(text.lines().count(), 4);
        assert!(text.contains("1.00"));
    }

    #[test]
    fn truncate_marks_cut_names() {
        assert_eq!(truncate("Molecule 12", 8), "Molecul.");
        assert_eq!(truncate("Node 1", 8), "Node 1");
    }
}
