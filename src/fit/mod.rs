//! Structure search.
//!
//! Responsibilities:
//!
//! - enumerate candidate topologies per target (`enumerate`)
//! - score a topology's parameters against reference derivatives (`objective`)
//! - multi-restart fitting, AIC scoring and top-K retention (`matcher`)
//! - combine per-target winners into whole models (`compose`)
//! - re-simulate and rank whole models (`verify`), optionally refitting them (`refit`)

pub mod compose;
pub mod enumerate;
pub mod matcher;
pub mod objective;
pub mod pool;
pub mod refit;
pub mod verify;

pub use compose::EnsembleComposer;
pub use enumerate::TopologyEnumerator;
pub use matcher::{
    GradientMatcher, MatchStats, MatcherOptions, TargetFit, TopK, corrected_aic, gradient_match,
    is_weak_signal,
};
pub use objective::Objective;
pub use refit::{RefitOptions, refit_whole_model};
pub use verify::{
    Verification, VerificationFailure, VerifyOptions, WholeModelField, model_distance, rank_models,
    simulate_model,
};
