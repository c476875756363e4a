//! Mathematical utilities for ARCO
//!
//! Implements screw-theory kinematics (exponential/logarithm maps,
//! product-of-exponentials forward kinematics, spatial Jacobian) and
//! discrete curvature estimation for 3-D reference curves.

pub mod screws;
pub mod curvature;

pub use screws::*;
pub use curvature::*;
