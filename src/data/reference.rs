//! Reference trajectories.
//!
//! A reference system is integrated once per run. Fitting consumes both the
//! sampled states and the derivatives, which are obtained by evaluating the
//! reference vector field at each sample (never by finite differencing).

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::TsaError;
use crate::math::{DormandPrince, SolverOptions, VectorField};

/// `(start, stop, steps)` where `steps` is the number of evenly spaced samples,
/// both endpoints included.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSpec {
    pub start: f64,
    pub stop: f64,
    pub steps: usize,
}

impl TimeSpec {
    pub const fn new(start: f64, stop: f64, steps: usize) -> Self {
        Self { start, stop, steps }
    }

    pub fn validate(&self) -> Result<(), TsaError> {
        if !(self.start.is_finite() && self.stop.is_finite()) {
            return Err(TsaError::config("time grid bounds must be finite"));
        }
        if self.stop <= self.start {
            return Err(TsaError::config(format!(
                "time grid stop ({}) must exceed start ({})",
                self.stop, self.start
            )));
        }
        if self.steps < 2 {
            return Err(TsaError::config("time grid needs at least 2 samples"));
        }
        Ok(())
    }

    pub fn grid(&self) -> Vec<f64> {
        if self.steps == 0 {
            return Vec::new();
        }
        if self.steps == 1 {
            return vec![self.start];
        }
        let dt = (self.stop - self.start) / (self.steps - 1) as f64;
        let mut out: Vec<f64> = (0..self.steps).map(|i| self.start + dt * i as f64).collect();
        // Land exactly on `stop` regardless of rounding.
        if let Some(last) = out.last_mut() {
            *last = self.stop;
        }
        out
    }
}

/// Sampled reference behaviour: states and derivatives, one row per sample.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceData {
    pub times: Vec<f64>,
    pub initial_state: Vec<f64>,
    pub states: DMatrix<f64>,
    pub derivatives: DMatrix<f64>,
    rows: Vec<Vec<f64>>,
}

impl ReferenceData {
    /// Integrate `field` from `initial_state` over `time` and evaluate the
    /// field at every sample.
    pub fn simulate(
        field: &impl VectorField,
        initial_state: &[f64],
        time: &TimeSpec,
        options: SolverOptions,
    ) -> Result<Self, TsaError> {
        time.validate()?;
        let times = time.grid();
        let dim = field.dimension();

        let mut solver = DormandPrince::new(dim, options);
        let states = solver.integrate(field, initial_state, &times, None)?;

        let mut derivatives = DMatrix::<f64>::zeros(times.len(), dim);
        let mut buf = vec![0.0; dim];
        for (i, &t) in times.iter().enumerate() {
            let row: Vec<f64> = states.row(i).iter().copied().collect();
            field.apply(t, &row, &mut buf);
            derivatives.row_mut(i).copy_from_slice(&buf);
        }

        Ok(Self::from_parts(times, initial_state.to_vec(), states, derivatives))
    }

    /// Assemble from precomputed arrays (e.g. measured data).
    pub fn from_parts(
        times: Vec<f64>,
        initial_state: Vec<f64>,
        states: DMatrix<f64>,
        derivatives: DMatrix<f64>,
    ) -> Self {
        let rows = (0..states.nrows())
            .map(|i| states.row(i).iter().copied().collect())
            .collect();
        Self {
            times,
            initial_state,
            states,
            derivatives,
            rows,
        }
    }

    pub fn num_samples(&self) -> usize {
        self.times.len()
    }

    pub fn num_nodes(&self) -> usize {
        self.states.ncols()
    }

    /// State vectors, one per sample.
    pub fn state_rows(&self) -> &[Vec<f64>] {
        &self.rows
    }
}
