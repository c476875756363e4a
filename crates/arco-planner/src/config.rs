//! Optimizer configuration
//!
//! Configuration parameters for the consensus trajectory optimizer:
//! horizon and iteration budget, state-vector layout, saturation limits,
//! and the per-block penalty weights.

use nalgebra::{DMatrix, SVector};
use serde::{Deserialize, Serialize};

use arco_core::NUM_JOINTS;

/// Main optimizer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmmConfig {
    /// Number of control intervals N (N+1 knot points)
    pub horizon: usize,
    /// Time step between knots [s]
    pub dt: f64,
    /// Fixed number of outer consensus iterations
    ///
    /// The loop always runs this exact count; residuals are recorded but
    /// never trigger an early exit.
    pub admm_iterations: usize,
    /// Function tolerance; carried alongside the budget but never
    /// consulted, the loop always runs its full count
    pub tol_fun: f64,
    /// Gradient tolerance; carried but never consulted
    pub tol_grad: f64,
    /// State-vector layout
    pub layout: StateLayout,
}

impl Default for AdmmConfig {
    fn default() -> Self {
        Self {
            horizon: 50,
            dt: 0.01,
            admm_iterations: 5,
            tol_fun: 1e-7,
            tol_grad: 1e-7,
            layout: StateLayout::default(),
        }
    }
}

/// Layout of the full state vector
///
/// The state stacks joint positions (7), joint velocities (7), and the
/// modeled contact-force terms: `[q; qdot; f]`. The joint sub-block is
/// always the first [`NUM_JOINTS`] rows.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StateLayout {
    /// Number of contact-force state components
    pub force_dim: usize,
}

impl Default for StateLayout {
    fn default() -> Self {
        Self { force_dim: 3 }
    }
}

impl StateLayout {
    /// Full state dimension
    pub fn state_dim(&self) -> usize {
        2 * NUM_JOINTS + self.force_dim
    }

    /// Control (joint torque) dimension
    pub fn control_dim(&self) -> usize {
        NUM_JOINTS
    }

    /// Contact-feature dimension (fixed by the formulation)
    pub fn contact_dim(&self) -> usize {
        2
    }

    /// Pooled per-knot projection vector dimension
    pub fn pooled_dim(&self) -> usize {
        self.state_dim() + self.contact_dim() + self.control_dim()
    }

    /// First row of the joint-velocity sub-block
    pub fn velocity_row(&self) -> usize {
        NUM_JOINTS
    }

    /// First row of the contact-force sub-block
    pub fn force_row(&self) -> usize {
        2 * NUM_JOINTS
    }
}

/// Componentwise lower/upper bounds on state and control
///
/// Row 0 holds lower bounds, row 1 upper bounds. Immutable during a
/// solve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Saturation {
    /// 2 × state_dim state bounds
    pub state_limits: DMatrix<f64>,
    /// 2 × control_dim control bounds
    pub control_limits: DMatrix<f64>,
}

impl Saturation {
    /// Uniform bounds: joint angles ±`q_max`, velocities ±`qd_max`,
    /// force states ±`f_max`, torques ±`u_max`
    pub fn uniform(layout: &StateLayout, q_max: f64, qd_max: f64, f_max: f64, u_max: f64) -> Self {
        let s = layout.state_dim();
        let mut state_limits = DMatrix::zeros(2, s);
        for j in 0..s {
            let bound = if j < layout.velocity_row() {
                q_max
            } else if j < layout.force_row() {
                qd_max
            } else {
                f_max
            };
            state_limits[(0, j)] = -bound;
            state_limits[(1, j)] = bound;
        }

        let c = layout.control_dim();
        let mut control_limits = DMatrix::zeros(2, c);
        for j in 0..c {
            control_limits[(0, j)] = -u_max;
            control_limits[(1, j)] = u_max;
        }

        Self { state_limits, control_limits }
    }

    /// Bounds wide enough to never clip
    pub fn unbounded(layout: &StateLayout) -> Self {
        Self::uniform(layout, f64::INFINITY, f64::INFINITY, f64::INFINITY, f64::INFINITY)
    }
}

/// Per-block ADMM penalty weights (the rho vector)
///
/// Entries 0..=2 weight the dynamics block's proximal terms (state,
/// control, contact); entry 3 is the IK joint-coupling weight; entry 4
/// the contact-coupling weight. Zero entries disable the corresponding
/// proximal term.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PenaltyWeights(pub SVector<f64, 5>);

impl PenaltyWeights {
    pub fn new(rho: [f64; 5]) -> Self {
        Self(SVector::from_column_slice(&rho))
    }

    pub fn zeros() -> Self {
        Self(SVector::zeros())
    }

    /// Copy with the IK and contact coupling entries zeroed, as passed
    /// to the dynamics block each iteration
    pub fn dynamics_only(&self) -> Self {
        let mut rho = self.0;
        rho[3] = 0.0;
        rho[4] = 0.0;
        Self(rho)
    }

    /// IK joint-coupling weight
    pub fn ik_coupling(&self) -> f64 {
        self.0[3]
    }

    pub fn as_vector(&self) -> &SVector<f64, 5> {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout_dimensions() {
        let layout = StateLayout::default();
        assert_eq!(layout.state_dim(), 17);
        assert_eq!(layout.control_dim(), 7);
        assert_eq!(layout.pooled_dim(), 17 + 2 + 7);
        assert_eq!(layout.velocity_row(), 7);
        assert_eq!(layout.force_row(), 14);
    }

    #[test]
    fn test_uniform_saturation_shape() {
        let layout = StateLayout::default();
        let sat = Saturation::uniform(&layout, 3.14, 1.0, 10.0, 20.0);
        assert_eq!(sat.state_limits.shape(), (2, 17));
        assert_eq!(sat.control_limits.shape(), (2, 7));
        assert_eq!(sat.state_limits[(0, 0)], -3.14);
        assert_eq!(sat.state_limits[(1, 16)], 10.0);
        assert_eq!(sat.control_limits[(1, 3)], 20.0);
    }

    #[test]
    fn test_dynamics_only_zeroes_coupling_entries() {
        let rho = PenaltyWeights::new([0.1, 0.2, 0.3, 0.4, 0.5]);
        let ddp = rho.dynamics_only();
        assert_eq!(ddp.0[0], 0.1);
        assert_eq!(ddp.0[2], 0.3);
        assert_eq!(ddp.0[3], 0.0);
        assert_eq!(ddp.0[4], 0.0);
        assert_eq!(rho.ik_coupling(), 0.4);
    }
}
