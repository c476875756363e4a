//! Contact-feature block
//!
//! Derives the 2-row contact-feature trajectory from the state
//! trajectory, the robot Jacobian, and the curvature of the Cartesian
//! reference path:
//!
//! - feature 0: `m ‖J(q) q̇‖² / R` — centripetal-force proxy of the
//!   end effector moving along a path of radius R
//! - feature 1: the last scalar state component (modeled contact-force
//!   state, passed through unchanged)

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use arco_core::math::curvature_profile;
use arco_core::{ArmKinematics, ScrewArm, NUM_JOINTS};

use crate::blocks::BlockError;
use crate::config::StateLayout;

/// Where the per-knot curvature radius comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CurvatureSource {
    /// Run the estimator on the reference curve, then discard its output
    /// and use radius 1 at every knot. This mirrors the validation-phase
    /// contact model and is the default.
    ConstantUnit,
    /// Use the estimated radius at every knot
    Estimated,
}

/// Contact-feature computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactFeatures {
    /// Effective end-effector mass [kg]
    pub mass: f64,
    /// Curvature radius source
    pub source: CurvatureSource,
}

impl Default for ContactFeatures {
    fn default() -> Self {
        Self { mass: 0.3, source: CurvatureSource::ConstantUnit }
    }
}

impl ContactFeatures {
    /// Contact features using the model's effective end-effector mass
    pub fn for_arm(arm: &ScrewArm) -> Self {
        Self { mass: arm.ee_mass(), ..Self::default() }
    }

    /// Per-knot curvature radii for a 3 × (N+1) Cartesian reference curve
    ///
    /// The estimator always runs; under [`CurvatureSource::ConstantUnit`]
    /// its result is replaced by 1 for every knot.
    pub fn radii(&self, reference_curve: &DMatrix<f64>) -> DVector<f64> {
        let points: Vec<_> = (0..reference_curve.ncols())
            .map(|k| reference_curve.column(k).fixed_rows::<3>(0).into_owned())
            .collect();
        let profile = curvature_profile(&points);

        match self.source {
            CurvatureSource::ConstantUnit => DVector::from_element(points.len(), 1.0),
            CurvatureSource::Estimated => profile.radius,
        }
    }

    /// Recompute the 2 × (N+1) feature trajectory from a state trajectory
    pub fn update(
        &self,
        arm: &dyn ArmKinematics,
        states: &DMatrix<f64>,
        layout: &StateLayout,
        radius: &DVector<f64>,
        out: &mut DMatrix<f64>,
    ) -> Result<(), BlockError> {
        let knots = states.ncols();
        if out.ncols() != knots || out.nrows() != layout.contact_dim() {
            return Err(BlockError::Shape {
                what: "contact feature columns",
                expected: knots,
                got: out.ncols(),
            });
        }
        if radius.len() != knots {
            return Err(BlockError::Shape {
                what: "curvature radius knots",
                expected: knots,
                got: radius.len(),
            });
        }

        for k in 0..knots {
            let column = states.column(k);
            let q = column.rows(0, NUM_JOINTS).into_owned();
            let qdot = column.rows(layout.velocity_row(), NUM_JOINTS).into_owned();

            let jacobian = arm.spatial_jacobian(q.as_slice())?;
            let speed = (jacobian * qdot).norm();

            out[(0, k)] = self.mass * speed * speed / radius[k];
            out[(1, k)] = column[layout.state_dim() - 1];
        }
        Ok(())
    }
}
