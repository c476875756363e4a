//! ARCO Consensus Trajectory Planner
//!
//! Multi-block consensus trajectory optimizer for a redundant 7-DOF
//! manipulator in contact. Three primal blocks — a trajectory/dynamics
//! block, a differential-IK block, and a contact-feature block — are
//! coordinated through averaged consensus variables, a feasibility
//! projection, and scaled dual updates, over a fixed iteration budget:
//!
//! ```text
//! iterate     x, u  ← dynamics block  vs (consensus − dual)
//!             q     ← IK block        vs (consensus − dual)
//!             c     ← contact features(x)
//!             bar   ← project(pool(primal + dual))
//!             dual  ← dual + (primal − bar)
//! ```
//!
//! # Components
//!
//! - [`config`]: horizon, state layout, penalty weights, saturation
//! - [`blocks`]: primal block interfaces and error taxonomy
//! - [`cost`]: stage cost of an iterate
//! - [`contact`]: contact-feature block and curvature source
//! - [`projection`]: feasibility projection of the pooled variables
//! - [`solver`]: the consensus orchestrator
//! - [`diagnostics`]: per-iteration residual and cost ledger
//! - [`trace`]: per-iteration knot trace capture
//! - [`rendezvous`] / [`controller`]: receding-horizon wrapper

pub mod blocks;
pub mod config;
pub mod contact;
pub mod controller;
pub mod cost;
pub mod diagnostics;
pub mod projection;
pub mod rendezvous;
pub mod solver;
pub mod trace;

// Re-exports
pub use blocks::{BlockError, ConsensusTargets, IkBlock, TrajectoryBlock, TrajectoryProblem, TrajectorySolution};
pub use config::{AdmmConfig, PenaltyWeights, Saturation, StateLayout};
pub use contact::{ContactFeatures, CurvatureSource};
pub use controller::{ControlChannel, Plant, RecedingHorizonController};
pub use cost::{QuadraticCost, StageCost};
pub use diagnostics::SolveDiagnostics;
pub use projection::{BoxProjection, IdentityProjection, ProjectionBlock};
pub use rendezvous::Rendezvous;
pub use solver::{AdmmSolver, SolveError};
pub use trace::{MemoryTrace, NullTrace, TraceSink};
