//! Adaptive ODE integration.
//!
//! A Dormand–Prince 5(4) stepper with embedded error control. Trajectories are
//! sampled on a caller-supplied time grid: each grid interval is crossed with
//! as many adaptive steps as needed, and the final step of an interval is
//! clipped so the sample lands exactly on the grid time.
//!
//! The integrator is deterministic: identical inputs always produce identical
//! trajectories, which the verifier relies on for reproducible rankings.

use std::time::Instant;

use nalgebra::DMatrix;
use thiserror::Error;

/// A continuous-time vector field `dx/dt = f(t, x)`.
pub trait VectorField: Sync {
    fn dimension(&self) -> usize;

    /// Write `f(t, x)` into `out`.
    fn apply(&self, t: f64, x: &[f64], out: &mut [f64]);
}

/// Adapter turning a closure into a [`VectorField`].
pub struct FnField<F> {
    dim: usize,
    f: F,
}

impl<F> FnField<F>
where
    F: Fn(f64, &[f64], &mut [f64]) + Sync,
{
    pub fn new(dim: usize, f: F) -> Self {
        Self { dim, f }
    }
}

impl<F> VectorField for FnField<F>
where
    F: Fn(f64, &[f64], &mut [f64]) + Sync,
{
    fn dimension(&self) -> usize {
        self.dim
    }

    fn apply(&self, t: f64, x: &[f64], out: &mut [f64]) {
        (self.f)(t, x, out)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolverError {
    #[error("state dimension {got} does not match vector field dimension {expected}")]
    Dimension { expected: usize, got: usize },
    #[error("time grid must be strictly increasing and finite")]
    InvalidGrid,
    #[error("state became non-finite at t={t}")]
    NonFinite { t: f64 },
    #[error("step size underflow at t={t}")]
    StepSizeUnderflow { t: f64 },
    #[error("step budget of {max_steps} exhausted at t={t}")]
    StepBudget { max_steps: usize, t: f64 },
    #[error("time limit exceeded at t={t}")]
    Timeout { t: f64 },
    #[error("model does not define each of the {nodes} nodes exactly once")]
    Coverage { nodes: usize },
}

/// Error-control settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverOptions {
    pub rtol: f64,
    pub atol: f64,
    /// Maximum accepted + rejected steps across the whole grid.
    pub max_steps: usize,
    pub min_step: f64,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            rtol: 1e-8,
            atol: 1e-10,
            max_steps: 200_000,
            min_step: 1e-14,
        }
    }
}

const C: [f64; 7] = [0.0, 1.0 / 5.0, 3.0 / 10.0, 4.0 / 5.0, 8.0 / 9.0, 1.0, 1.0];

const A: [[f64; 6]; 7] = [
    [0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [1.0 / 5.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [3.0 / 40.0, 9.0 / 40.0, 0.0, 0.0, 0.0, 0.0],
    [44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0, 0.0, 0.0, 0.0],
    [
        19372.0 / 6561.0,
        -25360.0 / 2187.0,
        64448.0 / 6561.0,
        -212.0 / 729.0,
        0.0,
        0.0,
    ],
    [
        9017.0 / 3168.0,
        -355.0 / 33.0,
        46732.0 / 5247.0,
        49.0 / 176.0,
        -5103.0 / 18656.0,
        0.0,
    ],
    [
        35.0 / 384.0,
        0.0,
        500.0 / 1113.0,
        125.0 / 192.0,
        -2187.0 / 6784.0,
        11.0 / 84.0,
    ],
];

// 5th-order weights are the last row of A (FSAL); E = b5 - b4.
const E: [f64; 7] = [
    71.0 / 57600.0,
    0.0,
    -71.0 / 16695.0,
    71.0 / 1920.0,
    -17253.0 / 339200.0,
    22.0 / 525.0,
    -1.0 / 40.0,
];

const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 5.0;

/// Dormand–Prince 5(4) integrator with reusable stage buffers.
pub struct DormandPrince {
    options: SolverOptions,
    k: [Vec<f64>; 7],
    tmp: Vec<f64>,
    y_new: Vec<f64>,
}

impl DormandPrince {
    pub fn new(dim: usize, options: SolverOptions) -> Self {
        Self {
            options,
            k: std::array::from_fn(|_| vec![0.0; dim]),
            tmp: vec![0.0; dim],
            y_new: vec![0.0; dim],
        }
    }

    /// Integrate from `y0` at `times[0]` and sample the state at every grid time.
    ///
    /// Row `i` of the result is the state at `times[i]`.
    pub fn integrate(
        &mut self,
        field: &impl VectorField,
        y0: &[f64],
        times: &[f64],
        deadline: Option<Instant>,
    ) -> Result<DMatrix<f64>, SolverError> {
        let dim = field.dimension();
        if y0.len() != dim {
            return Err(SolverError::Dimension {
                expected: dim,
                got: y0.len(),
            });
        }
        if self.tmp.len() != dim {
            *self = Self::new(dim, self.options);
        }
        if times.iter().any(|t| !t.is_finite()) || times.windows(2).any(|w| w[1] <= w[0]) {
            return Err(SolverError::InvalidGrid);
        }

        let mut out = DMatrix::<f64>::zeros(times.len(), dim);
        if times.is_empty() {
            return Ok(out);
        }
        out.row_mut(0).copy_from_slice(y0);

        let mut y = y0.to_vec();
        let mut t = times[0];
        let mut h = times.get(1).map(|t1| (t1 - times[0]) * 0.1).unwrap_or(0.0);
        let mut steps = 0usize;

        for (row, &t_end) in times.iter().enumerate().skip(1) {
            while t < t_end {
                if let Some(deadline) = deadline {
                    if Instant::now() >= deadline {
                        return Err(SolverError::Timeout { t });
                    }
                }
                steps += 1;
                if steps > self.options.max_steps {
                    return Err(SolverError::StepBudget {
                        max_steps: self.options.max_steps,
                        t,
                    });
                }

                let remaining = t_end - t;
                let last = h >= remaining;
                let step = if last { remaining } else { h };

                let err = self.attempt(field, t, &y, step);
                if !err.is_finite() {
                    // Shrink and retry; a non-finite estimate usually means the
                    // trial step left the region where the field is defined.
                    h = step * MIN_FACTOR;
                    if h < self.options.min_step {
                        return Err(SolverError::NonFinite { t });
                    }
                    continue;
                }

                if err <= 1.0 {
                    t = if last { t_end } else { t + step };
                    y.copy_from_slice(&self.y_new);
                    if y.iter().any(|v| !v.is_finite()) {
                        return Err(SolverError::NonFinite { t });
                    }
                    let factor = if err == 0.0 {
                        MAX_FACTOR
                    } else {
                        (SAFETY * err.powf(-0.2)).clamp(MIN_FACTOR, MAX_FACTOR)
                    };
                    // Keep the pre-clip step size when the last step was clipped.
                    h = if last { h.max(step * factor) } else { step * factor };
                } else {
                    h = step * (SAFETY * err.powf(-0.25)).max(MIN_FACTOR);
                    if h < self.options.min_step {
                        return Err(SolverError::StepSizeUnderflow { t });
                    }
                }
            }
            out.row_mut(row).copy_from_slice(&y);
        }

        Ok(out)
    }

    /// One trial step; fills `y_new` and returns the scaled error norm.
    fn attempt(&mut self, field: &impl VectorField, t: f64, y: &[f64], h: f64) -> f64 {
        let dim = y.len();

        field.apply(t, y, &mut self.k[0]);
        for s in 1..7 {
            for i in 0..dim {
                let mut acc = 0.0;
                for (j, a) in A[s].iter().enumerate().take(s) {
                    acc += a * self.k[j][i];
                }
                self.tmp[i] = y[i] + h * acc;
            }
            field.apply(t + C[s] * h, &self.tmp, &mut self.k[s]);
        }

        // Stage 7 was evaluated at the 5th-order solution.
        self.y_new.copy_from_slice(&self.tmp);

        let mut sum = 0.0;
        for i in 0..dim {
            let mut e = 0.0;
            for (s, coeff) in E.iter().enumerate() {
                e += coeff * self.k[s][i];
            }
            let scale = self.options.atol + self.options.rtol * y[i].abs().max(self.y_new[i].abs());
            let r = h * e / scale;
            sum += r * r;
        }
        if dim == 0 {
            return 0.0;
        }
        (sum / dim as f64).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_decay_matches_closed_form() {
        let field = FnField::new(1, |_t, x: &[f64], out: &mut [f64]| out[0] = -0.5 * x[0]);
        let times: Vec<f64> = (0..=10).map(|i| i as f64).collect();
        let mut solver = DormandPrince::new(1, SolverOptions::default());
        let traj = solver.integrate(&field, &[2.0], &times, None).unwrap();

        for (i, &t) in times.iter().enumerate() {
            let exact = 2.0 * (-0.5 * t).exp();
            assert!((traj[(i, 0)] - exact).abs() < 1e-7, "t={t}: {} vs {exact}", traj[(i, 0)]);
        }
    }

    #[test]
    fn harmonic_oscillator_conserves_phase() {
        let field = FnField::new(2, |_t, x: &[f64], out: &mut [f64]| {
            out[0] = x[1];
            out[1] = -x[0];
        });
        let times = [0.0, std::f64::consts::PI, 2.0 * std::f64::consts::PI];
        let mut solver = DormandPrince::new(2, SolverOptions::default());
        let traj = solver.integrate(&field, &[1.0, 0.0], &times, None).unwrap();

        assert!((traj[(1, 0)] + 1.0).abs() < 1e-6);
        assert!((traj[(2, 0)] - 1.0).abs() < 1e-6);
        assert!(traj[(2, 1)].abs() < 1e-6);
    }

    #[test]
    fn integration_is_deterministic() {
        let field = FnField::new(1, |t, x: &[f64], out: &mut [f64]| out[0] = t.sin() - x[0]);
        let times: Vec<f64> = (0..21).map(|i| i as f64 * 0.5).collect();
        let a = DormandPrince::new(1, SolverOptions::default())
            .integrate(&field, &[0.3], &times, None)
            .unwrap();
        let b = DormandPrince::new(1, SolverOptions::default())
            .integrate(&field, &[0.3], &times, None)
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn blow_up_is_reported_not_panicked() {
        let field = FnField::new(1, |_t, x: &[f64], out: &mut [f64]| out[0] = x[0] * x[0]);
        let times = [0.0, 0.5, 2.0];
        let err = DormandPrince::new(1, SolverOptions::default())
            .integrate(&field, &[1.0], &times, None)
            .unwrap_err();
        assert!(matches!(
            err,
            SolverError::NonFinite { .. }
                | SolverError::StepSizeUnderflow { .. }
                | SolverError::StepBudget { .. }
        ));
    }

    #[test]
    fn rejects_bad_inputs() {
        let field = FnField::new(2, |_t, _x: &[f64], out: &mut [f64]| out.fill(0.0));
        let mut solver = DormandPrince::new(2, SolverOptions::default());
        assert!(matches!(
            solver.integrate(&field, &[1.0], &[0.0, 1.0], None),
            Err(SolverError::Dimension { .. })
        ));
        assert_eq!(
            solver.integrate(&field, &[1.0, 1.0], &[0.0, 0.0], None),
            Err(SolverError::InvalidGrid)
        );
    }
}
