//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and sets up logging
//! - runs the search pipeline or lists the model space
//! - prints reports
//! - writes optional exports

use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::{Command, EnumerateArgs, SearchArgs, ShowArgs, SpaceArgs};
use crate::domain::{ModelSpace, SearchConfig, Topology};
use crate::error::TsaError;
use crate::fit::TopologyEnumerator;

pub mod pipeline;

/// Entry point for the `tsa` binary.
pub fn run() -> Result<(), TsaError> {
    dotenvy::dotenv().ok();
    let cli = crate::cli::Cli::parse();
    init_tracing(cli.quiet, cli.verbose)?;

    match cli.command {
        Command::Search(args) => handle_search(args),
        Command::Enumerate(args) => handle_enumerate(args),
        Command::Show(args) => handle_show(args),
    }
}

/// Log to stderr. `TSA_LOG` takes precedence over the verbosity flags.
fn init_tracing(quiet: bool, verbose: bool) -> Result<(), TsaError> {
    let level = if quiet {
        "error"
    } else if verbose {
        "info"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_env("TSA_LOG").unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| TsaError::config(format!("failed to initialize logging: {e}")))
}

fn handle_search(args: SearchArgs) -> Result<(), TsaError> {
    let config = search_config_from_args(&args)?;
    let run = pipeline::run_search(&config)?;

    println!("{}", crate::report::format_run_summary(&run, &config));
    println!("{}", crate::report::format_rankings(&run.bag, config.top_n));
    if args.prevalence {
        println!("{}", crate::report::format_prevalence(&run.bag, config.top_n));
    }

    if let Some(path) = &config.export {
        crate::io::write_bag_json(path, &run.bag)?;
        info!(path = %path.display(), models = run.bag.len(), "model bag exported");
    }
    Ok(())
}

fn handle_enumerate(args: EnumerateArgs) -> Result<(), TsaError> {
    let config = space_config(&args.space);
    let system = config.preset.system();
    let space = pipeline::model_space(&config, system.node_names)?;

    let targets: Vec<usize> = match args.target {
        Some(t) => vec![t],
        None => (0..space.num_nodes).collect(),
    };
    println!(
        "Model space: {} nodes, max_parents={} interactions={} max_order={}\n",
        space.num_nodes, space.max_parents, space.num_interactions, space.max_order
    );
    for target in targets {
        let (dropped, topologies) = list_topologies(&space, target)?;
        if !dropped.is_empty() {
            warn!(target, ?dropped, "enforced parents exceed max_parents and were dropped");
        }
        println!(
            "{}",
            crate::report::format_enumeration(&space, target, &topologies, args.limit)
        );
    }
    Ok(())
}

fn list_topologies(space: &ModelSpace, target: usize) -> Result<(Vec<usize>, Vec<Topology>), TsaError> {
    let enumerator = TopologyEnumerator::new(space, target)?;
    let dropped = enumerator.dropped_enforced().to_vec();
    Ok((dropped, enumerator.collect()))
}

fn handle_show(args: ShowArgs) -> Result<(), TsaError> {
    let bag = crate::io::read_bag_json(&args.path)?;
    println!(
        "Model bag: {} ({} nodes, {} models)\n",
        args.path.display(),
        bag.space.num_nodes,
        bag.len()
    );
    println!("{}", crate::report::format_rankings(&bag, args.top));
    if args.prevalence {
        println!("{}", crate::report::format_prevalence(&bag, args.top));
    }
    Ok(())
}

/// Resolve the model-space flags against the chosen system's defaults.
fn space_config(args: &SpaceArgs) -> SearchConfig {
    let system = args.system.system();
    SearchConfig {
        family: args.family.unwrap_or(system.family),
        preset: args.system,
        max_parents: args.max_parents.unwrap_or(system.max_parents),
        num_interactions: args.interactions,
        max_order: args.max_order,
        enforced_edges: args.enforce.clone(),
        enforced_gaps: args.forbid.clone(),
        ..SearchConfig::default()
    }
}

pub fn search_config_from_args(args: &SearchArgs) -> Result<SearchConfig, TsaError> {
    let task_timeout = args
        .timeout
        .map(|secs| {
            Duration::try_from_secs_f64(secs)
                .ok()
                .filter(|d| !d.is_zero())
                .ok_or_else(|| TsaError::config(format!("invalid timeout '{secs}' seconds")))
        })
        .transpose()?;
    let parallelism = match args.jobs {
        Some(0) => return Err(TsaError::config("--jobs must be >= 1")),
        Some(n) => n,
        None => std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
    };

    Ok(SearchConfig {
        time: args.time,
        retain_k: args.retain,
        restarts: args.restarts,
        weak_signal_threshold: args.weak_signal,
        tolerance: args.tolerance,
        max_iters: args.max_iters,
        seed: args.seed,
        parallelism,
        task_timeout,
        refit_top: args.refit_top,
        top_n: args.top,
        export: args.export.clone(),
        ..space_config(&args.space)
    })
}
