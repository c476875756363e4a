//! First-order differential IK for a single end-effector pose
//!
//! Newton iteration on the space-frame pose error twist with damped
//! least-squares steps. Redundancy is resolved in the Jacobian null
//! space by a gradient toward the joint mid-range, and an optional
//! proximal term pulls the solution toward a consensus joint target.

use nalgebra::{Matrix6, SMatrix};
use thiserror::Error;

use crate::math::{adjoint, fk_in_space, matrix_log6, space_jacobian, trans_inv};
use crate::{JointVector, Pose, ScrewAxes, Twist, NUM_JOINTS};

/// Lower/upper joint limits, one joint per column (row 0 lower, row 1 upper)
pub type JointLimits = SMatrix<f64, 2, NUM_JOINTS>;

/// IK solver errors
#[derive(Debug, Error)]
pub enum IkError {
    #[error("non-finite joint iterate at IK iteration {iteration}")]
    NonFinite { iteration: usize },
    #[error("degenerate Jacobian system")]
    SingularSystem,
    #[error("shape mismatch for {what}: expected {expected}, got {got}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },
}

/// Tolerances and gains for the first-order IK iteration
#[derive(Debug, Clone)]
pub struct IkConfig {
    /// Angular error tolerance [rad]
    pub eomg: f64,
    /// Linear error tolerance [m]
    pub ev: f64,
    /// Maximum Newton iterations per pose
    pub max_iterations: usize,
    /// Damping of the least-squares step
    pub damping: f64,
    /// Gain of the null-space pull toward joint mid-range
    pub null_space_gain: f64,
    /// Gain scaling the rho-weighted proximal pull toward the joint bias
    pub proximal_gain: f64,
}

impl Default for IkConfig {
    fn default() -> Self {
        Self {
            eomg: 1e-5,
            ev: 1e-5,
            max_iterations: 50,
            damping: 1e-3,
            null_space_gain: 0.1,
            proximal_gain: 0.05,
        }
    }
}

/// Result of one pose solve
#[derive(Debug, Clone)]
pub struct IkSolution {
    /// Joint configuration, clamped into the joint limits
    pub joints: JointVector,
    /// Whether both error tolerances were met
    pub converged: bool,
    /// Newton iterations consumed
    pub iterations: usize,
}

/// First-order differential IK solver
#[derive(Debug, Clone)]
pub struct FirstOrderIk {
    screw_axes: ScrewAxes,
    home: Pose,
    joint_limits: JointLimits,
    q_mid: JointVector,
    q_range: JointVector,
    config: IkConfig,
}

impl FirstOrderIk {
    pub fn new(
        screw_axes: ScrewAxes,
        home: Pose,
        joint_limits: JointLimits,
        config: IkConfig,
    ) -> Self {
        let lower = joint_limits.row(0).transpose();
        let upper = joint_limits.row(1).transpose();
        let q_mid = (lower + upper) / 2.0;
        let q_range = (upper - lower).map(|r| r.max(1e-9));
        Self { screw_axes, home, joint_limits, q_mid, q_range, config }
    }

    /// Symmetric joint limits of ±π on every joint
    pub fn symmetric_limits() -> JointLimits {
        let mut limits = JointLimits::zeros();
        limits.row_mut(0).fill(-std::f64::consts::PI);
        limits.row_mut(1).fill(std::f64::consts::PI);
        limits
    }

    pub fn config(&self) -> &IkConfig {
        &self.config
    }

    pub fn screw_axes(&self) -> &ScrewAxes {
        &self.screw_axes
    }

    pub fn home(&self) -> &Pose {
        &self.home
    }

    /// Solve for a single target pose
    ///
    /// `q_bar` is the consensus joint bias; its pull is weighted by
    /// `rho_q` (the IK coupling penalty entry). With `rho_q = 0` the
    /// proximal term vanishes and this is plain redundancy-resolved IK.
    pub fn solve(
        &self,
        target: &Pose,
        theta0: &JointVector,
        q_bar: &JointVector,
        rho_q: f64,
    ) -> Result<IkSolution, IkError> {
        let mut theta = *theta0;

        for iteration in 0..self.config.max_iterations {
            let tsb = fk_in_space(&self.home, &self.screw_axes, &theta);
            let error: Twist = adjoint(&tsb) * matrix_log6(&(trans_inv(&tsb) * target));

            let ang = error.fixed_view::<3, 1>(0, 0).norm();
            let lin = error.fixed_view::<3, 1>(3, 0).norm();
            if ang < self.config.eomg && lin < self.config.ev {
                return Ok(IkSolution { joints: theta, converged: true, iterations: iteration });
            }

            let jac = space_jacobian(&self.screw_axes, &theta);

            // Damped least squares: dθ = Jᵀ (JJᵀ + λ²I)⁻¹ V
            let gram: Matrix6<f64> =
                jac * jac.transpose() + Matrix6::identity() * self.config.damping.powi(2);
            let lu = gram.lu();
            let weighted_error = lu.solve(&error).ok_or(IkError::SingularSystem)?;
            let mut step: JointVector = jac.transpose() * weighted_error;

            // Null-space redundancy resolution toward joint mid-range
            let pinv_rows = lu.solve(&jac).ok_or(IkError::SingularSystem)?;
            let null_proj =
                SMatrix::<f64, NUM_JOINTS, NUM_JOINTS>::identity() - jac.transpose() * pinv_rows;
            let mid_gradient = (self.q_mid - theta).component_div(&self.q_range);
            step += null_proj * mid_gradient * self.config.null_space_gain;

            // Proximal pull toward the consensus joint bias
            step += (q_bar - theta) * (rho_q * self.config.proximal_gain);

            theta += step;
            for j in 0..NUM_JOINTS {
                theta[j] = theta[j].clamp(self.joint_limits[(0, j)], self.joint_limits[(1, j)]);
            }

            if theta.iter().any(|v| !v.is_finite()) {
                return Err(IkError::NonFinite { iteration });
            }
        }

        Ok(IkSolution {
            joints: theta,
            converged: false,
            iterations: self.config.max_iterations,
        })
    }
}

/// Zero-bias convenience wrapper used during seeding
pub fn solve_unbiased(
    ik: &FirstOrderIk,
    target: &Pose,
    theta0: &JointVector,
) -> Result<IkSolution, IkError> {
    ik.solve(target, theta0, &JointVector::zeros(), 0.0)
}
