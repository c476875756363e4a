//! # ARCO Core
//!
//! Arm Consensus Optimization - Core library
//!
//! Kinematics and inverse-kinematics building blocks for a redundant
//! 7-DOF manipulator, shared by the consensus trajectory optimizer in
//! `arco-planner`.
//!
//! ## Modules
//!
//! - [`math`]: Screw-theory kinematics (product of exponentials) and
//!   discrete curvature estimation
//! - [`kinematics`]: The [`ArmKinematics`] capability interface and the
//!   concrete screw-axis arm model
//! - [`ik`]: First-order differential inverse kinematics with null-space
//!   redundancy resolution and proximal consensus bias

pub mod math;
pub mod kinematics;
pub mod ik;

// Common type aliases
use nalgebra::{Matrix4, SMatrix, SVector, Vector6};

pub use kinematics::{ArmKinematics, KinematicsError, ScrewArm};

/// Number of joints of the supported arm class
pub const NUM_JOINTS: usize = 7;

/// Joint configuration vector
pub type JointVector = SVector<f64, NUM_JOINTS>;

/// Screw axes of all joints, one 6-D axis per column, space frame
pub type ScrewAxes = SMatrix<f64, 6, NUM_JOINTS>;

/// Space-frame spatial Jacobian
pub type SpatialJacobian = SMatrix<f64, 6, NUM_JOINTS>;

/// Homogeneous 4x4 end-effector pose
pub type Pose = Matrix4<f64>;

/// 6-D spatial twist [angular; linear]
pub type Twist = Vector6<f64>;
