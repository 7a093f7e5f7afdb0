//! Box-bounded minimization on top of `argmin`'s Nelder–Mead.
//!
//! Nelder–Mead is unconstrained, so the objective is evaluated at the point
//! clamped into the box and a quadratic penalty on the overshoot keeps the
//! simplex from drifting away. The reported optimum is always clamped, so
//! callers never see an out-of-bounds parameter vector.
//!
//! After the first run converges the search restarts from the best vertex with
//! a fresh (smaller) simplex. This "polish" step is cheap and removes most of
//! the premature-collapse failures Nelder–Mead is known for.

use std::time::{Duration, Instant};

use argmin::core::{CostFunction, Error, Executor, State, TerminationReason};
use argmin::solver::neldermead::NelderMead;

use crate::domain::Bounds;
use crate::error::TsaError;

const PENALTY: f64 = 1e6;

/// Settings shared by every minimization in a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptimizerOptions {
    /// Stop when the standard deviation of simplex costs drops below this.
    pub tolerance: f64,
    /// Iteration cap per Nelder–Mead run.
    pub max_iters: u64,
    /// Wall-clock limit for the whole minimization (all polish rounds).
    pub timeout: Option<Duration>,
    /// Additional restarts from the incumbent best point.
    pub polish_rounds: usize,
}

impl Default for OptimizerOptions {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            max_iters: 2000,
            timeout: None,
            polish_rounds: 2,
        }
    }
}

/// Best point found by [`minimize_bounded`].
#[derive(Debug, Clone, PartialEq)]
pub struct Minimum {
    pub params: Vec<f64>,
    pub cost: f64,
    /// `false` when the iteration cap or the time limit stopped the search.
    pub converged: bool,
    pub iterations: u64,
}

struct Penalized<'a, F> {
    objective: &'a F,
    bounds: &'a [Bounds],
}

impl<F> Penalized<'_, F>
where
    F: Fn(&[f64]) -> f64,
{
    fn eval(&self, p: &[f64]) -> f64 {
        let mut clamped = Vec::with_capacity(p.len());
        let mut overshoot = 0.0;
        for (v, b) in p.iter().zip(self.bounds) {
            let c = b.clamp(*v);
            overshoot += (v - c) * (v - c);
            clamped.push(c);
        }
        let cost = (self.objective)(&clamped) + PENALTY * overshoot;
        // Nelder–Mead sorts vertices by cost; NaN must never reach it.
        if cost.is_finite() { cost } else { f64::MAX }
    }
}

impl<F> CostFunction for Penalized<'_, F>
where
    F: Fn(&[f64]) -> f64,
{
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, p: &Self::Param) -> Result<Self::Output, Error> {
        Ok(self.eval(p))
    }
}

/// Minimize `objective` over the box `bounds`, starting from `x0`.
///
/// Non-convergence is not an error: the best point found is returned with
/// `converged = false`. Errors are reserved for inputs the solver cannot be
/// built from.
pub fn minimize_bounded<F>(
    objective: F,
    x0: &[f64],
    bounds: &[Bounds],
    opts: &OptimizerOptions,
) -> Result<Minimum, TsaError>
where
    F: Fn(&[f64]) -> f64,
{
    if x0.len() != bounds.len() {
        return Err(TsaError::Optimizer(format!(
            "start point has {} entries but {} bounds were given",
            x0.len(),
            bounds.len()
        )));
    }

    let problem = Penalized {
        objective: &objective,
        bounds,
    };
    let mut best: Vec<f64> = x0.iter().zip(bounds).map(|(v, b)| b.clamp(*v)).collect();
    let mut best_cost = problem.eval(&best);

    if best.is_empty() {
        return Ok(Minimum {
            params: best,
            cost: best_cost,
            converged: true,
            iterations: 0,
        });
    }

    let deadline = opts.timeout.map(|t| Instant::now() + t);
    let mut converged = false;
    let mut iterations = 0;
    let mut scale = 0.1;

    for _ in 0..=opts.polish_rounds {
        let remaining = match deadline {
            Some(d) => match d.checked_duration_since(Instant::now()) {
                Some(left) if !left.is_zero() => Some(left),
                _ => {
                    converged = false;
                    break;
                }
            },
            None => None,
        };

        let simplex = initial_simplex(&best, bounds, scale);
        let solver = NelderMead::new(simplex)
            .with_sd_tolerance(opts.tolerance)
            .map_err(|e| TsaError::Optimizer(e.to_string()))?;

        let problem = Penalized {
            objective: &objective,
            bounds,
        };
        let mut executor =
            Executor::new(problem, solver).configure(|state| state.max_iters(opts.max_iters));
        if let Some(left) = remaining {
            executor = executor.timeout(left);
        }
        let res = executor
            .run()
            .map_err(|e| TsaError::Optimizer(e.to_string()))?;

        let state = res.state();
        iterations += state.get_iter();
        converged = matches!(
            state.get_termination_reason(),
            Some(TerminationReason::SolverConverged | TerminationReason::TargetCostReached)
        );

        let improved = match state.get_best_param() {
            Some(p) if state.get_best_cost() < best_cost => {
                let gain = best_cost - state.get_best_cost();
                best = p.iter().zip(bounds).map(|(v, b)| b.clamp(*v)).collect();
                best_cost = state.get_best_cost();
                gain
            }
            _ => 0.0,
        };

        if !converged || improved <= opts.tolerance {
            break;
        }
        scale *= 0.5;
    }

    Ok(Minimum {
        cost: objective(&best),
        params: best,
        converged,
        iterations,
    })
}

/// `x0` plus one vertex per axis, offset by `scale` of the bound width and
/// pointed inward when the forward step would leave the box.
fn initial_simplex(x0: &[f64], bounds: &[Bounds], scale: f64) -> Vec<Vec<f64>> {
    let mut simplex = Vec::with_capacity(x0.len() + 1);
    simplex.push(x0.to_vec());
    for (i, b) in bounds.iter().enumerate() {
        let mut step = scale * b.width();
        if step == 0.0 {
            step = scale.max(1e-3);
        }
        let mut vertex = x0.to_vec();
        vertex[i] = if x0[i] + step <= b.upper {
            x0[i] + step
        } else {
            x0[i] - step
        };
        simplex.push(vertex);
    }
    simplex
}
