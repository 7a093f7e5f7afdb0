//! Crate-wide error type.
//!
//! Every error maps to a stable process exit code so the `tsa` binary can
//! report failures consistently:
//!
//! - `2`: configuration (bad bounds, enforced edges, time grid, node ids)
//! - `4`: numerical primitives (integrator/optimizer) could not run
//! - `5`: reading/writing export files

use thiserror::Error;

use crate::math::ode::SolverError;

#[derive(Debug, Error)]
pub enum TsaError {
    #[error("configuration error: {0}")]
    Config(String),

    /// A parameter type whose lower bound exceeds its upper bound.
    #[error("invalid bounds for parameter type '{param_type}': lower={lower} > upper={upper}")]
    InvalidBounds {
        param_type: String,
        lower: f64,
        upper: f64,
    },

    #[error("integration failed: {0}")]
    Solver(#[from] SolverError),

    #[error("optimizer error: {0}")]
    Optimizer(String),

    #[error("i/o error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TsaError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            TsaError::Config(_) | TsaError::InvalidBounds { .. } => 2,
            TsaError::Solver(_) | TsaError::Optimizer(_) => 4,
            TsaError::Io { .. } | TsaError::Serialization(_) => 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_group_by_category() {
        assert_eq!(TsaError::config("x").exit_code(), 2);
        let bounds = TsaError::InvalidBounds {
            param_type: "CONST".to_string(),
            lower: 1.0,
            upper: 0.0,
        };
        assert_eq!(bounds.exit_code(), 2);
        assert!(bounds.to_string().contains("CONST"));
        assert_eq!(TsaError::Optimizer("stalled".into()).exit_code(), 4);
        assert_eq!(TsaError::Solver(SolverError::StepSizeUnderflow { t: 0.5 }).exit_code(), 4);
    }
}
