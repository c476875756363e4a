//! Horizon-level differential IK
//!
//! Solves one IK problem per knot of a Cartesian track, warm-starting
//! each knot from the previous solution, and retains the Cartesian
//! forward-kinematics trace of the last solve for downstream curvature
//! estimation.

use nalgebra::{DMatrix, Matrix3, SVector, Vector3};
use tracing::warn;

use crate::ik::{FirstOrderIk, IkError};
use crate::math::fk_in_space;
use crate::{JointVector, Pose, NUM_JOINTS};

/// Differential IK over a full Cartesian track
#[derive(Debug, Clone)]
pub struct IkTrajectorySolver {
    ik: FirstOrderIk,
    horizon: usize,
    fk_trace: DMatrix<f64>,
}

impl IkTrajectorySolver {
    /// `horizon` is the number of control intervals N; the solver handles
    /// N+1 knot poses per call.
    pub fn new(ik: FirstOrderIk, horizon: usize) -> Self {
        let fk_trace = DMatrix::zeros(3, horizon + 1);
        Self { ik, horizon, fk_trace }
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    /// Cartesian positions of the joint trajectory from the last solve,
    /// one 3-D point per knot
    pub fn fk_trace(&self) -> &DMatrix<f64> {
        &self.fk_trace
    }

    /// Solve IK for every knot pose, filling the caller-provided 7×(N+1)
    /// joint trajectory
    ///
    /// `q_bias` is the 7×(N+1) consensus joint bias; its pull is weighted
    /// by the IK coupling entry `rho[3]`. `qd_bias` and `base_velocity`
    /// belong to the block contract but are consumed only by the
    /// second-order solver variant; the first-order iteration uses the
    /// joint bias alone.
    #[allow(clippy::too_many_arguments)]
    pub fn solve_trajectory(
        &mut self,
        cartesian_track: &[Pose],
        base_position: &JointVector,
        _base_velocity: &JointVector,
        q_bias: &DMatrix<f64>,
        _qd_bias: &DMatrix<f64>,
        rho: &SVector<f64, 5>,
        out: &mut DMatrix<f64>,
    ) -> Result<(), IkError> {
        let knots = self.horizon + 1;
        if cartesian_track.len() != knots {
            return Err(IkError::ShapeMismatch {
                what: "cartesian track",
                expected: knots,
                got: cartesian_track.len(),
            });
        }
        if q_bias.ncols() != knots || q_bias.nrows() != NUM_JOINTS {
            return Err(IkError::ShapeMismatch {
                what: "joint bias columns",
                expected: knots,
                got: q_bias.ncols(),
            });
        }
        if out.nrows() != NUM_JOINTS || out.ncols() != knots {
            return Err(IkError::ShapeMismatch {
                what: "output joint trajectory columns",
                expected: knots,
                got: out.ncols(),
            });
        }

        let rho_q = rho[3];
        let mut seed = *base_position;
        let mut unconverged = 0usize;

        for (k, target) in cartesian_track.iter().enumerate() {
            let q_bar = JointVector::from_column_slice(q_bias.column(k).as_slice());
            let solution = self.ik.solve(target, &seed, &q_bar, rho_q)?;
            if !solution.converged {
                unconverged += 1;
            }

            out.set_column(k, &solution.joints);
            seed = solution.joints;

            let pose = fk_in_space(self.ik.home(), self.ik.screw_axes(), &solution.joints);
            self.fk_trace
                .set_column(k, &Vector3::new(pose[(0, 3)], pose[(1, 3)], pose[(2, 3)]));
        }

        if unconverged > 0 {
            warn!(unconverged, knots, "IK did not reach tolerance at every knot");
        }
        Ok(())
    }
}

/// Generate an N+1 knot Cartesian track along a Lissajous figure
///
/// The figure lies in the plane z = `z_depth` of the frame given by
/// `rotation`, with amplitudes `rx`, `ry` and angular frequencies `fx`,
/// `fy` over a total phase of `tf`. Every pose carries the constant
/// orientation `rotation`.
pub fn lissajous_track(
    rotation: &Matrix3<f64>,
    z_depth: f64,
    fx: f64,
    fy: f64,
    rx: f64,
    ry: f64,
    n: usize,
    tf: f64,
) -> Vec<Pose> {
    let mut track = Vec::with_capacity(n + 1);
    for k in 0..=n {
        let t = tf * k as f64 / n as f64;
        let point = rotation * Vector3::new(rx * (fx * t).cos(), ry * (fy * t).sin(), z_depth);

        let mut pose = Pose::identity();
        pose.fixed_view_mut::<3, 3>(0, 0).copy_from(rotation);
        pose.fixed_view_mut::<3, 1>(0, 3).copy_from(&point);
        track.push(pose);
    }
    track
}
