//! Differential inverse kinematics
//!
//! First-order IK for a redundant 7-DOF arm: damped least-squares Newton
//! steps, null-space redundancy resolution toward joint mid-range, and a
//! proximal pull toward a biased joint target for consensus coupling.

mod solver;
mod trajectory;

pub use solver::*;
pub use trajectory::*;
