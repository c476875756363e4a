//! Sub-solver block contracts
//!
//! The consensus orchestrator sequences two external solver blocks each
//! iteration: a trajectory optimizer over the arm dynamics and a
//! differential IK solver over the Cartesian track. Both are consumed
//! through the narrow traits below; their internals are free to warm
//! start but must not retain other cross-call state visible to the
//! orchestrator.

use nalgebra::{DMatrix, DVector};
use thiserror::Error;

use arco_core::ik::{IkError, IkTrajectorySolver};
use arco_core::kinematics::KinematicsError;
use arco_core::{JointVector, Pose};

use crate::config::PenaltyWeights;

/// Sub-block failures
///
/// The orchestrator treats these as recoverable per iteration: the
/// failure is logged and the loop continues with the last valid primal
/// for that block.
#[derive(Debug, Error)]
pub enum BlockError {
    #[error("block failed to produce a finite result: {reason}")]
    NonFinite { reason: String },
    #[error("block did not converge after {iterations} iterations")]
    NotConverged { iterations: usize },
    #[error("shape mismatch for {what}: expected {expected}, got {got}")]
    Shape {
        what: &'static str,
        expected: usize,
        got: usize,
    },
    #[error(transparent)]
    Kinematics(#[from] KinematicsError),
}

impl From<IkError> for BlockError {
    fn from(err: IkError) -> Self {
        match err {
            IkError::NonFinite { iteration } => BlockError::NonFinite {
                reason: format!("IK iterate diverged at inner iteration {iteration}"),
            },
            IkError::SingularSystem => BlockError::NonFinite {
                reason: "degenerate Jacobian system in IK".to_string(),
            },
            IkError::ShapeMismatch { what, expected, got } => {
                BlockError::Shape { what, expected, got }
            }
        }
    }
}

/// Consensus targets handed to the dynamics block, already bias-shifted
/// by the scaled duals where the formulation requires it
#[derive(Debug)]
pub struct ConsensusTargets<'a> {
    /// Contact-feature target, 2 × (N+1)
    pub contact: &'a DMatrix<f64>,
    /// State target, state_dim × (N+1)
    pub state: &'a DMatrix<f64>,
    /// Control target, control_dim × N
    pub control: &'a DMatrix<f64>,
    /// Joint target, 7 × (N+1)
    pub joint: &'a DMatrix<f64>,
}

/// One trajectory sub-problem
#[derive(Debug)]
pub struct TrajectoryProblem<'a> {
    /// Initial state x₀
    pub initial_state: &'a DVector<f64>,
    /// Warm-start control trajectory, control_dim × N
    pub initial_controls: &'a DMatrix<f64>,
    /// Desired state trajectory, state_dim × (N+1)
    pub desired_states: &'a DMatrix<f64>,
    /// Bias-shifted consensus targets
    pub targets: ConsensusTargets<'a>,
    /// Penalty weights for the proximal terms
    pub penalties: PenaltyWeights,
    /// Per-knot curvature radius of the reference path, length N+1
    pub curvature_radius: &'a DVector<f64>,
}

/// Locally optimal trajectory returned by the dynamics block
#[derive(Debug, Clone)]
pub struct TrajectorySolution {
    /// State trajectory, state_dim × (N+1)
    pub states: DMatrix<f64>,
    /// Control trajectory, control_dim × N
    pub controls: DMatrix<f64>,
    /// Cost of the returned trajectory
    pub cost: f64,
}

/// Second-order trajectory optimizer over the arm dynamics
pub trait TrajectoryBlock {
    /// Solve one biased trajectory sub-problem
    fn solve(&mut self, problem: &TrajectoryProblem<'_>) -> Result<TrajectorySolution, BlockError>;
}

/// Differential IK over the full Cartesian track
pub trait IkBlock {
    /// Fill `out` (7 × (N+1)) with a joint trajectory consistent with the
    /// Cartesian track, pulled toward `q_bias` by the IK coupling weight
    #[allow(clippy::too_many_arguments)]
    fn joint_trajectory(
        &mut self,
        cartesian_track: &[Pose],
        base_position: &JointVector,
        base_velocity: &JointVector,
        q_bias: &DMatrix<f64>,
        qd_bias: &DMatrix<f64>,
        rho: &PenaltyWeights,
        out: &mut DMatrix<f64>,
    ) -> Result<(), BlockError>;

    /// Cartesian forward-kinematics trace of the last solve, 3 × (N+1)
    fn fk_trace(&self) -> &DMatrix<f64>;
}

impl IkBlock for IkTrajectorySolver {
    fn joint_trajectory(
        &mut self,
        cartesian_track: &[Pose],
        base_position: &JointVector,
        base_velocity: &JointVector,
        q_bias: &DMatrix<f64>,
        qd_bias: &DMatrix<f64>,
        rho: &PenaltyWeights,
        out: &mut DMatrix<f64>,
    ) -> Result<(), BlockError> {
        self.solve_trajectory(
            cartesian_track,
            base_position,
            base_velocity,
            q_bias,
            qd_bias,
            rho.as_vector(),
            out,
        )?;
        Ok(())
    }

    fn fk_trace(&self) -> &DMatrix<f64> {
        IkTrajectorySolver::fk_trace(self)
    }
}
