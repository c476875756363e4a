//! Robot model capability interface and screw-axis arm model
//!
//! The optimizer depends exclusively on the small [`ArmKinematics`]
//! interface: spatial Jacobian, forward kinematics, initialization.
//! Joint configurations are passed as borrowed slices whose validity is
//! scoped to the call; implementations must not retain them.

use nalgebra::{Matrix4, Vector3};
use thiserror::Error;

use crate::math::{fk_in_space, matrix_exp6, space_jacobian};
use crate::{JointVector, Pose, ScrewAxes, SpatialJacobian, Twist, NUM_JOINTS};

/// Kinematics query errors
#[derive(Debug, Error)]
pub enum KinematicsError {
    #[error("invalid joint configuration length: expected {expected}, got {got}")]
    InvalidConfiguration { expected: usize, got: usize },
    #[error("model used before initialization")]
    NotInitialized,
}

/// Capability interface of a robot model as seen by the optimizer
///
/// Implementations may be shared across optimizer instances only if the
/// queries are read-only or externally synchronized.
pub trait ArmKinematics {
    /// Prepare internal state; must be called once before any query
    fn initialize(&mut self) -> Result<(), KinematicsError>;

    /// Space-frame spatial Jacobian at the given joint configuration
    fn spatial_jacobian(&self, q: &[f64]) -> Result<SpatialJacobian, KinematicsError>;

    /// End-effector pose at the given joint configuration
    fn forward_kinematics(&self, q: &[f64]) -> Result<Pose, KinematicsError>;
}

/// Screw-axis model of a 7-DOF arm (product of exponentials)
#[derive(Debug, Clone)]
pub struct ScrewArm {
    screw_axes: ScrewAxes,
    home: Pose,
    /// Effective end-effector mass used by the contact feature [kg]
    ee_mass: f64,
    initialized: bool,
}

impl ScrewArm {
    /// Build a model from explicit screw axes and home pose
    pub fn new(screw_axes: ScrewAxes, home: Pose, ee_mass: f64) -> Self {
        Self { screw_axes, home, ee_mass, initialized: false }
    }

    /// KUKA iiwa-class 7-DOF arm
    ///
    /// Shoulder at 0.36 m, elbow at 0.78 m, wrist at 1.18 m, flange at
    /// 1.306 m above the base; rotation axes alternate z/y along the
    /// vertical at the zero configuration.
    pub fn kuka_iiwa() -> Self {
        let joint_axes: [(Vector3<f64>, Vector3<f64>); NUM_JOINTS] = [
            (Vector3::z(), Vector3::zeros()),
            (Vector3::y(), Vector3::new(0.0, 0.0, 0.36)),
            (Vector3::z(), Vector3::new(0.0, 0.0, 0.36)),
            (-Vector3::y(), Vector3::new(0.0, 0.0, 0.78)),
            (Vector3::z(), Vector3::new(0.0, 0.0, 0.78)),
            (Vector3::y(), Vector3::new(0.0, 0.0, 1.18)),
            (Vector3::z(), Vector3::new(0.0, 0.0, 1.18)),
        ];

        let mut screw_axes = ScrewAxes::zeros();
        for (i, (omega, point)) in joint_axes.iter().enumerate() {
            let v = -omega.cross(point);
            let mut col = Twist::zeros();
            col.fixed_view_mut::<3, 1>(0, 0).copy_from(omega);
            col.fixed_view_mut::<3, 1>(3, 0).copy_from(&v);
            screw_axes.set_column(i, &col);
        }

        let home = matrix_exp6(&Twist::new(0.0, 0.0, 0.0, 0.0, 0.0, 1.0), 1.306);

        Self::new(screw_axes, home, 0.3)
    }

    /// Screw axes (one 6-D axis per column, space frame)
    pub fn screw_axes(&self) -> &ScrewAxes {
        &self.screw_axes
    }

    /// Home pose M (end-effector pose at the zero configuration)
    pub fn home(&self) -> &Pose {
        &self.home
    }

    /// Effective end-effector mass [kg]
    pub fn ee_mass(&self) -> f64 {
        self.ee_mass
    }

    fn joint_vector(&self, q: &[f64]) -> Result<JointVector, KinematicsError> {
        if q.len() != NUM_JOINTS {
            return Err(KinematicsError::InvalidConfiguration {
                expected: NUM_JOINTS,
                got: q.len(),
            });
        }
        Ok(JointVector::from_column_slice(q))
    }
}

impl ArmKinematics for ScrewArm {
    fn initialize(&mut self) -> Result<(), KinematicsError> {
        self.initialized = true;
        Ok(())
    }

    fn spatial_jacobian(&self, q: &[f64]) -> Result<SpatialJacobian, KinematicsError> {
        if !self.initialized {
            return Err(KinematicsError::NotInitialized);
        }
        let theta = self.joint_vector(q)?;
        Ok(space_jacobian(&self.screw_axes, &theta))
    }

    fn forward_kinematics(&self, q: &[f64]) -> Result<Pose, KinematicsError> {
        if !self.initialized {
            return Err(KinematicsError::NotInitialized);
        }
        let theta = self.joint_vector(q)?;
        Ok(fk_in_space(&self.home, &self.screw_axes, &theta))
    }
}
