//! Arm kinematics module
//!
//! Defines the [`ArmKinematics`] capability interface consumed by the
//! consensus optimizer and the concrete screw-axis arm model.

mod model;

pub use model::*;
