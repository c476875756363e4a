//! Residual and cost ledger
//!
//! Pure bookkeeping written once per outer iteration and never consulted
//! by the solve loop itself; exposed read-only after `solve` returns for
//! plotting and analysis.

use serde::{Deserialize, Serialize};

/// Per-iteration residual and cost records of one solve
///
/// Residual sequences have length equal to the iteration budget; the
/// cost sequence has one extra leading entry for the seed trajectory.
/// Each residual slot holds the primal−consensus mismatch norm at the
/// last knot processed during that iteration (the terminal knot for
/// state/joint/contact, knot N−1 for control).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolveDiagnostics {
    res_x: Vec<f64>,
    res_q: Vec<f64>,
    res_u: Vec<f64>,
    res_c: Vec<f64>,
    final_cost: Vec<f64>,
}

impl SolveDiagnostics {
    pub fn new(iteration_budget: usize) -> Self {
        Self {
            res_x: vec![0.0; iteration_budget],
            res_q: vec![0.0; iteration_budget],
            res_u: vec![0.0; iteration_budget],
            res_c: vec![0.0; iteration_budget],
            final_cost: vec![0.0; iteration_budget + 1],
        }
    }

    /// Zero every record; called at `solve` entry
    pub fn reset(&mut self, iteration_budget: usize) {
        self.res_x = vec![0.0; iteration_budget];
        self.res_q = vec![0.0; iteration_budget];
        self.res_u = vec![0.0; iteration_budget];
        self.res_c = vec![0.0; iteration_budget];
        self.final_cost = vec![0.0; iteration_budget + 1];
    }

    pub(crate) fn set_residuals(&mut self, iteration: usize, x: f64, q: f64, u: f64, c: f64) {
        self.res_x[iteration] = x;
        self.res_q[iteration] = q;
        self.res_u[iteration] = u;
        self.res_c[iteration] = c;
    }

    pub(crate) fn set_terminal_residuals(&mut self, iteration: usize, x: f64, q: f64, c: f64) {
        self.res_x[iteration] = x;
        self.res_q[iteration] = q;
        self.res_c[iteration] = c;
    }

    pub(crate) fn set_cost(&mut self, slot: usize, cost: f64) {
        self.final_cost[slot] = cost;
    }

    /// State residuals, one per iteration
    pub fn res_x(&self) -> &[f64] {
        &self.res_x
    }

    /// Joint (IK consensus) residuals, one per iteration
    pub fn res_q(&self) -> &[f64] {
        &self.res_q
    }

    /// Control residuals, one per iteration
    pub fn res_u(&self) -> &[f64] {
        &self.res_u
    }

    /// Contact-feature residuals, one per iteration
    pub fn res_c(&self) -> &[f64] {
        &self.res_c
    }

    /// True cost of each iterate; slot 0 is the seed trajectory
    pub fn final_cost(&self) -> &[f64] {
        &self.final_cost
    }
}
