//! True (unpenalized) stage cost
//!
//! Evaluates the running cost of an iterate against the desired state
//! trajectory. The orchestrator uses this only for the per-iteration
//! cost ledger; all proximal/augmented terms live inside the sub-blocks.

use nalgebra::{DVector, DVectorView};
use serde::{Deserialize, Serialize};

use crate::config::StateLayout;

/// Running cost of one knot
pub trait StageCost {
    /// L(k, x_k, u_k, x_ref_k), no penalty terms
    fn stage_cost(
        &self,
        k: usize,
        x: DVectorView<'_, f64>,
        u: DVectorView<'_, f64>,
        x_ref: DVectorView<'_, f64>,
    ) -> f64;
}

/// Diagonally weighted quadratic tracking cost
///
/// L = ½ (x - x_ref)ᵀ Q (x - x_ref) + ½ uᵀ R u
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuadraticCost {
    /// Diagonal of Q, length state_dim
    pub state_weights: DVector<f64>,
    /// Diagonal of R, length control_dim
    pub control_weights: DVector<f64>,
}

impl QuadraticCost {
    pub fn new(state_weights: DVector<f64>, control_weights: DVector<f64>) -> Self {
        Self { state_weights, control_weights }
    }

    /// Uniform weights `q` on every state and `r` on every control
    pub fn uniform(layout: &StateLayout, q: f64, r: f64) -> Self {
        Self {
            state_weights: DVector::from_element(layout.state_dim(), q),
            control_weights: DVector::from_element(layout.control_dim(), r),
        }
    }
}

impl StageCost for QuadraticCost {
    fn stage_cost(
        &self,
        _k: usize,
        x: DVectorView<'_, f64>,
        u: DVectorView<'_, f64>,
        x_ref: DVectorView<'_, f64>,
    ) -> f64 {
        let mut cost = 0.0;
        for i in 0..x.len() {
            let e = x[i] - x_ref[i];
            cost += 0.5 * self.state_weights[i] * e * e;
        }
        for i in 0..u.len() {
            cost += 0.5 * self.control_weights[i] * u[i] * u[i];
        }
        cost
    }
}
