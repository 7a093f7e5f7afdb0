//! Command-line parsing for the topology search.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! search code; `app` turns parsed arguments into a `SearchConfig`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::data::{SystemPreset, TimeSpec};
use crate::domain::{NodeId, parse_edge};
use crate::models::DynamicsKind;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "tsa",
    version,
    about = "Topological sensitivity analysis: rank candidate ODE network structures"
)]
pub struct Cli {
    /// Log progress at info level (overridden by TSA_LOG).
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors (overridden by TSA_LOG).
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit, compose and verify candidate networks against a reference system.
    Search(SearchArgs),
    /// List the candidate topologies of the model space without fitting.
    Enumerate(EnumerateArgs),
    /// Print a previously exported model bag.
    Show(ShowArgs),
}

/// Model-space options shared by `search` and `enumerate`.
#[derive(Debug, Args, Clone)]
pub struct SpaceArgs {
    /// Reference system to explore.
    #[arg(short = 's', long, value_enum, default_value_t = SystemPreset::TwoNodeLinear)]
    pub system: SystemPreset,

    /// Dynamics family used for candidates (defaults to the system's own).
    #[arg(short = 'f', long, value_enum)]
    pub family: Option<DynamicsKind>,

    /// Maximum parent units per target (defaults to the system's setting).
    #[arg(short = 'k', long)]
    pub max_parents: Option<usize>,

    /// Number of interaction kinds (defaults to the family's setting).
    #[arg(long)]
    pub interactions: Option<usize>,

    /// Largest joint parent unit (defaults to the family's setting).
    #[arg(long)]
    pub max_order: Option<usize>,

    /// Edge present in every candidate, as PARENT:TARGET (repeatable).
    #[arg(long = "enforce", value_name = "PARENT:TARGET", value_parser = parse_edge)]
    pub enforce: Vec<(NodeId, NodeId)>,

    /// Edge absent from every candidate, as PARENT:TARGET (repeatable).
    #[arg(long = "forbid", value_name = "PARENT:TARGET", value_parser = parse_edge)]
    pub forbid: Vec<(NodeId, NodeId)>,
}

/// Options for a full search.
#[derive(Debug, Parser, Clone)]
pub struct SearchArgs {
    #[command(flatten)]
    pub space: SpaceArgs,

    /// Override the system's time grid, as START:STOP:SAMPLES.
    #[arg(long, value_name = "START:STOP:SAMPLES", value_parser = parse_time)]
    pub time: Option<TimeSpec>,

    /// Best topologies retained per target.
    #[arg(long, default_value_t = 5)]
    pub retain: usize,

    /// Random restarts per topology.
    #[arg(long, default_value_t = 1)]
    pub restarts: usize,

    /// Discard candidates whose smallest |parameter| is below this.
    #[arg(long, default_value_t = 1e-5)]
    pub weak_signal: f64,

    /// Optimizer convergence tolerance.
    #[arg(long, default_value_t = 1e-6)]
    pub tolerance: f64,

    /// Optimizer iteration cap per run.
    #[arg(long, default_value_t = 2000)]
    pub max_iters: u64,

    /// Seed for restart initialization.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Worker threads (defaults to available cores; 1 = sequential).
    #[arg(short = 'j', long)]
    pub jobs: Option<usize>,

    /// Per-task time limit in seconds for optimizations and integrations.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<f64>,

    /// Jointly refit the top-N whole models against the trajectory.
    #[arg(long, default_value_t = 0)]
    pub refit_top: usize,

    /// Show the top-N whole models.
    #[arg(long, default_value_t = 10)]
    pub top: usize,

    /// Print the edge-prevalence matrix over the shown models.
    #[arg(long)]
    pub prevalence: bool,

    /// Export the ranked model bag to JSON.
    #[arg(long, value_name = "JSON")]
    pub export: Option<PathBuf>,
}

/// Options for listing the model space.
#[derive(Debug, Parser, Clone)]
pub struct EnumerateArgs {
    #[command(flatten)]
    pub space: SpaceArgs,

    /// Only list this target (defaults to every node).
    #[arg(short = 't', long)]
    pub target: Option<NodeId>,

    /// Topologies printed per target.
    #[arg(long, default_value_t = 20)]
    pub limit: usize,
}

/// Options for printing a saved bag.
#[derive(Debug, Parser)]
pub struct ShowArgs {
    /// Model-bag JSON produced by `tsa search --export`.
    #[arg(value_name = "JSON")]
    pub path: PathBuf,

    /// Show the top-N whole models.
    #[arg(long, default_value_t = 10)]
    pub top: usize,

    /// Print the edge-prevalence matrix over the shown models.
    #[arg(long)]
    pub prevalence: bool,
}

/// Parse `START:STOP:SAMPLES`.
pub fn parse_time(s: &str) -> Result<TimeSpec, String> {
    let parts: Vec<&str> = s.split(':').map(str::trim).collect();
    let [start, stop, steps] = parts.as_slice() else {
        return Err(format!("expected 'START:STOP:SAMPLES', got '{s}'"));
    };
    let start: f64 = start.parse().map_err(|_| format!("invalid start '{start}'"))?;
    let stop: f64 = stop.parse().map_err(|_| format!("invalid stop '{stop}'"))?;
    let steps: usize = steps.parse().map_err(|_| format!("invalid sample count '{steps}'"))?;
    let grid = TimeSpec::new(start, stop, steps);
    grid.validate().map_err(|e| e.to_string())?;
    Ok(grid)
}
