//! Gradient-matching objective.
//!
//! For a fixed topology the objective is the Euclidean norm, over all time
//! samples, of the difference between the family's predicted derivative and
//! the reference derivative of the target.

use crate::data::ReferenceData;
use crate::domain::Topology;
use crate::models::Dynamics;

#[derive(Clone, Copy)]
pub struct Objective<'a> {
    dynamics: &'a dyn Dynamics,
    topology: &'a Topology,
    data: &'a ReferenceData,
}

impl<'a> Objective<'a> {
    pub fn new(dynamics: &'a dyn Dynamics, topology: &'a Topology, data: &'a ReferenceData) -> Self {
        Self {
            dynamics,
            topology,
            data,
        }
    }

    pub fn num_samples(&self) -> usize {
        self.data.num_samples()
    }

    /// Residual norm at `params`. Pure and deterministic.
    pub fn distance(&self, params: &[f64]) -> f64 {
        let target = self.topology.target;
        let mut sum = 0.0;
        for (i, (state, &t)) in self.data.state_rows().iter().zip(&self.data.times).enumerate() {
            let predicted = self.dynamics.evaluate(state, t, self.topology, params);
            let r = predicted - self.data.derivatives[(i, target)];
            sum += r * r;
        }
        sum.sqrt()
    }

    /// The objective as a closure, for handing to an optimizer.
    pub fn as_fn(&self) -> impl Fn(&[f64]) -> f64 + '_ {
        move |p| self.distance(p)
    }
}
