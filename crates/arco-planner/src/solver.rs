//! Multi-block ADMM consensus orchestrator
//!
//! Owns all primal, consensus, and scaled dual state of the split
//! trajectory optimization and sequences the sub-blocks each outer
//! iteration:
//!
//! ```text
//! dynamics → contact features → IK → averaging → projection
//!          → dual ascent → residual/cost capture
//! ```
//!
//! The loop runs a fixed iteration budget; residuals are recorded for
//! diagnostics but never trigger an early exit. Blocks optimize against
//! the previous iteration's consensus by construction (classic ADMM
//! staleness). The terminal knot bypasses the projector: its consensus
//! column is the pooled primal+dual sum taken directly, and no control
//! or contact dual exists at that index.

use std::ops::AddAssign;

use nalgebra::{DMatrix, DVector, Vector3};
use thiserror::Error;
use tracing::{debug, info, warn};

use arco_core::{ArmKinematics, JointVector, Pose, NUM_JOINTS};

use crate::blocks::{
    BlockError, ConsensusTargets, IkBlock, TrajectoryBlock, TrajectoryProblem, TrajectorySolution,
};
use crate::config::{AdmmConfig, PenaltyWeights, Saturation, StateLayout};
use crate::contact::ContactFeatures;
use crate::cost::StageCost;
use crate::diagnostics::SolveDiagnostics;
use crate::projection::ProjectionBlock;
use crate::trace::{NullTrace, TraceSink};

/// Solve failures
#[derive(Debug, Error)]
pub enum SolveError {
    /// Input shapes disagree with the configured horizon/layout;
    /// detected at entry before any block runs
    #[error("configuration mismatch for {what}: expected {expected}, got {got}")]
    Config {
        what: &'static str,
        expected: usize,
        got: usize,
    },
    /// The seed trajectory solve produced no usable iterate
    #[error("seed trajectory solve failed: {0}")]
    Seed(#[source] BlockError),
    /// The seed IK solve produced no usable joint trajectory
    #[error("seed IK solve failed: {0}")]
    SeedIk(#[source] BlockError),
    /// Non-finite values appeared in the primal/consensus/dual state;
    /// fatal, since continuing would corrupt all later iterations
    #[error("non-finite values in {buffer} after iteration {iteration}")]
    NumericDegeneracy {
        buffer: &'static str,
        iteration: usize,
    },
    /// The final consensus re-solve failed
    #[error("final trajectory solve failed: {0}")]
    Finalize(#[source] BlockError),
}

/// Multi-block ADMM trajectory optimizer
///
/// All trajectory buffers are allocated once at construction, sized to
/// the configured horizon and layout, and remain readable after `solve`
/// returns until the next call overwrites them.
pub struct AdmmSolver {
    config: AdmmConfig,
    arm: Box<dyn ArmKinematics>,
    trajectory_block: Box<dyn TrajectoryBlock>,
    ik_block: Box<dyn IkBlock>,
    projection: Box<dyn ProjectionBlock>,
    stage_cost: Box<dyn StageCost>,
    contact: ContactFeatures,
    trace: Box<dyn TraceSink>,

    // Primal variables
    x: DMatrix<f64>,
    q: DMatrix<f64>,
    c: DMatrix<f64>,
    u: DMatrix<f64>,
    q_ik: DMatrix<f64>,

    // Consensus variables (most recent projection output)
    xbar: DMatrix<f64>,
    cbar: DMatrix<f64>,
    ubar: DMatrix<f64>,
    qbar: DMatrix<f64>,

    // Scaled duals (running primal − consensus sums)
    x_lambda: DMatrix<f64>,
    q_lambda: DMatrix<f64>,
    c_lambda: DMatrix<f64>,
    u_lambda: DMatrix<f64>,

    // Projection scratch
    pooled: DMatrix<f64>,

    // Cartesian reference curve of the seed IK and its curvature radii
    reference_curve: DMatrix<f64>,
    curvature_radius: DVector<f64>,

    diagnostics: SolveDiagnostics,
    last_solution: Option<TrajectorySolution>,
}

impl AdmmSolver {
    pub fn new(
        config: AdmmConfig,
        arm: Box<dyn ArmKinematics>,
        trajectory_block: Box<dyn TrajectoryBlock>,
        ik_block: Box<dyn IkBlock>,
        projection: Box<dyn ProjectionBlock>,
        stage_cost: Box<dyn StageCost>,
        contact: ContactFeatures,
    ) -> Self {
        let n = config.horizon;
        let layout = config.layout;
        let s = layout.state_dim();
        let c_dim = layout.contact_dim();
        let u_dim = layout.control_dim();

        Self {
            arm,
            trajectory_block,
            ik_block,
            projection,
            stage_cost,
            contact,
            trace: Box::new(NullTrace),

            x: DMatrix::zeros(s, n + 1),
            q: DMatrix::zeros(NUM_JOINTS, n + 1),
            c: DMatrix::zeros(c_dim, n + 1),
            u: DMatrix::zeros(u_dim, n),
            q_ik: DMatrix::zeros(NUM_JOINTS, n + 1),

            xbar: DMatrix::zeros(s, n + 1),
            cbar: DMatrix::zeros(c_dim, n + 1),
            ubar: DMatrix::zeros(u_dim, n),
            qbar: DMatrix::zeros(NUM_JOINTS, n + 1),

            x_lambda: DMatrix::zeros(s, n + 1),
            q_lambda: DMatrix::zeros(NUM_JOINTS, n + 1),
            c_lambda: DMatrix::zeros(c_dim, n + 1),
            u_lambda: DMatrix::zeros(u_dim, n),

            pooled: DMatrix::zeros(layout.pooled_dim(), n),

            reference_curve: DMatrix::zeros(3, n + 1),
            curvature_radius: DVector::from_element(n + 1, 1.0),

            diagnostics: SolveDiagnostics::new(config.admm_iterations),
            last_solution: None,
            config,
        }
    }

    /// Replace the trace sink (defaults to [`NullTrace`])
    pub fn set_trace_sink(&mut self, trace: Box<dyn TraceSink>) {
        self.trace = trace;
    }

    pub fn config(&self) -> &AdmmConfig {
        &self.config
    }

    /// Residual and cost ledger of the last solve
    pub fn diagnostics(&self) -> &SolveDiagnostics {
        &self.diagnostics
    }

    /// Trajectory returned by the last solve, if any
    pub fn last_trajectory(&self) -> Option<&TrajectorySolution> {
        self.last_solution.as_ref()
    }

    /// State consensus, state_dim × (N+1)
    pub fn consensus_state(&self) -> &DMatrix<f64> {
        &self.xbar
    }

    /// Contact consensus, 2 × (N+1)
    pub fn consensus_contact(&self) -> &DMatrix<f64> {
        &self.cbar
    }

    /// Control consensus, control_dim × N
    pub fn consensus_control(&self) -> &DMatrix<f64> {
        &self.ubar
    }

    /// Joint consensus, 7 × (N+1)
    pub fn consensus_joint(&self) -> &DMatrix<f64> {
        &self.qbar
    }

    /// Scaled state dual
    pub fn dual_state(&self) -> &DMatrix<f64> {
        &self.x_lambda
    }

    /// Scaled joint dual
    pub fn dual_joint(&self) -> &DMatrix<f64> {
        &self.q_lambda
    }

    /// Scaled contact dual
    pub fn dual_contact(&self) -> &DMatrix<f64> {
        &self.c_lambda
    }

    /// Scaled control dual
    pub fn dual_control(&self) -> &DMatrix<f64> {
        &self.u_lambda
    }

    /// Run the full consensus solve
    ///
    /// Returns the trajectory of a final dynamics re-solve against the
    /// converged consensus (not the raw last iterate), which smooths
    /// against dual oscillation at the cost of one extra block solve.
    pub fn solve(
        &mut self,
        initial_state: &DVector<f64>,
        initial_control: &DMatrix<f64>,
        desired_states: &DMatrix<f64>,
        cartesian_track: &[Pose],
        rho: &PenaltyWeights,
        limits: &Saturation,
    ) -> Result<TrajectorySolution, SolveError> {
        self.validate_shapes(initial_state, initial_control, desired_states, cartesian_track, limits)?;

        let n = self.config.horizon;
        let layout = self.config.layout;
        let budget = self.config.admm_iterations;

        // Fresh consensus/dual/ledger state for this solve
        self.xbar.fill(0.0);
        self.cbar.fill(0.0);
        self.ubar.fill(0.0);
        self.qbar.fill(0.0);
        self.x_lambda.fill(0.0);
        self.q_lambda.fill(0.0);
        self.c_lambda.fill(0.0);
        self.u_lambda.fill(0.0);
        self.diagnostics.reset(budget);

        // ---------------- Seed trajectory ----------------
        let seed = self
            .trajectory_block
            .solve(&TrajectoryProblem {
                initial_state,
                initial_controls: initial_control,
                desired_states,
                targets: ConsensusTargets {
                    contact: &self.cbar,
                    state: &self.xbar,
                    control: &self.ubar,
                    joint: &self.qbar,
                },
                penalties: *rho,
                curvature_radius: &self.curvature_radius,
            })
            .and_then(|solution| {
                self.solution_shapes(&solution)?;
                Ok(solution)
            })
            .map_err(SolveError::Seed)?;
        self.x.copy_from(&seed.states);
        self.u.copy_from(&seed.controls);
        self.diagnostics.set_cost(0, seed.cost);

        // ---------------- Seed IK & contact ----------------
        let base_position = joint_column(&self.x, 0);
        let base_velocity = velocity_column(&self.x, 0, &layout);
        let q_bias = self.xbar.rows(0, NUM_JOINTS).into_owned();
        self.ik_block
            .joint_trajectory(
                cartesian_track,
                &base_position,
                &base_velocity,
                &q_bias,
                &q_bias,
                &PenaltyWeights::zeros(),
                &mut self.q_ik,
            )
            .map_err(SolveError::SeedIk)?;

        self.reference_curve.copy_from(self.ik_block.fk_trace());
        self.curvature_radius = self.contact.radii(&self.reference_curve);

        if let Err(err) =
            self.contact
                .update(self.arm.as_ref(), &self.x, &layout, &self.curvature_radius, &mut self.c)
        {
            warn!(error = %err, "contact feature seed failed; features stay zero");
        }

        self.qbar.copy_from(&self.q_ik);
        self.cbar.copy_from(&self.c);
        self.xbar.rows_mut(0, NUM_JOINTS).copy_from(&self.q_ik);
        self.ubar.fill(0.0);

        self.capture_trace(0);

        info!(horizon = n, iterations = budget, "starting consensus iterations");

        // ---------------- Outer loop, fixed budget ----------------
        for iteration in 0..budget {
            debug!(iteration = iteration + 1, "ADMM iteration");

            // (a) Dynamics block against the stale consensus, coupling
            // penalties zeroed for this call
            let c_target = &self.cbar - &self.c_lambda;
            let x_target = &self.xbar - &self.x_lambda;
            let u_target = &self.ubar - &self.u_lambda;
            let q_target = &self.qbar - &self.q_lambda;
            match self.trajectory_block.solve(&TrajectoryProblem {
                initial_state,
                initial_controls: &self.u.clone(),
                desired_states,
                targets: ConsensusTargets {
                    contact: &c_target,
                    state: &x_target,
                    control: &u_target,
                    joint: &q_target,
                },
                penalties: rho.dynamics_only(),
                curvature_radius: &self.curvature_radius,
            }) {
                Ok(solution) => match self.solution_shapes(&solution) {
                    Ok(()) => {
                        self.x.copy_from(&solution.states);
                        self.u.copy_from(&solution.controls);
                    }
                    Err(err) => {
                        warn!(iteration, error = %err, "dynamics block returned bad shapes; keeping last iterate");
                    }
                },
                Err(err) => {
                    warn!(iteration, error = %err, "dynamics block failed; keeping last iterate");
                }
            }
            self.q.copy_from(&self.x.rows(0, NUM_JOINTS));

            // (b) Contact features from the fresh state
            if let Err(err) =
                self.contact
                    .update(self.arm.as_ref(), &self.x, &layout, &self.curvature_radius, &mut self.c)
            {
                warn!(iteration, error = %err, "contact block failed; keeping last features");
            }

            // (c) IK block: joint rows biased by the joint dual, velocity
            // rows taken from the consensus as-is
            let q_bias = self.xbar.rows(0, NUM_JOINTS) - &self.q_lambda;
            let qd_bias = self.xbar.rows(layout.velocity_row(), NUM_JOINTS).into_owned();
            let base_position = joint_column(&self.x, 0);
            let base_velocity = velocity_column(&self.x, 0, &layout);
            if let Err(err) = self.ik_block.joint_trajectory(
                cartesian_track,
                &base_position,
                &base_velocity,
                &q_bias,
                &qd_bias,
                rho,
                &mut self.q_ik,
            ) {
                warn!(iteration, error = %err, "IK block failed; keeping last joint trajectory");
            }

            // (d) Consensus averaging of the two joint copies; the
            // averaged dual feeds only the projection input
            let q_avg = (&self.q + &self.q_ik) / 2.0;
            let joint_dual_avg = (&self.q_lambda + self.x_lambda.rows(0, NUM_JOINTS)) / 2.0;

            // (e) Pooled projection input per knot: primal + dual, joint
            // rows replaced by the averaged pair
            let mut x_pool = &self.x + &self.x_lambda;
            x_pool.rows_mut(0, NUM_JOINTS).copy_from(&(&q_avg + &joint_dual_avg));
            let c_pool = &self.c + &self.c_lambda;
            let u_pool = &self.u + &self.u_lambda;

            let s = layout.state_dim();
            let contact_end = s + layout.contact_dim();
            for j in 0..n {
                self.pooled.view_mut((0, j), (s, 1)).copy_from(&x_pool.column(j));
                self.pooled
                    .view_mut((s, j), (layout.contact_dim(), 1))
                    .copy_from(&c_pool.column(j));
                self.pooled
                    .view_mut((contact_end, j), (layout.control_dim(), 1))
                    .copy_from(&u_pool.column(j));
            }
            let projected = self.projection.project(&self.pooled, limits, &layout);

            // (f) Slice consensus and ascend the duals, knots 0..N-1
            for j in 0..n {
                self.xbar.column_mut(j).copy_from(&projected.view((0, j), (s, 1)));
                self.cbar
                    .column_mut(j)
                    .copy_from(&projected.view((s, j), (layout.contact_dim(), 1)));
                self.ubar
                    .column_mut(j)
                    .copy_from(&projected.view((contact_end, j), (layout.control_dim(), 1)));

                let c_gap = self.c.column(j) - self.cbar.column(j);
                let x_gap = self.x.column(j) - self.xbar.column(j);
                let u_gap = self.u.column(j) - self.ubar.column(j);
                let q_gap = self.q_ik.column(j) - self.xbar.view((0, j), (NUM_JOINTS, 1));

                self.c_lambda.column_mut(j).add_assign(&c_gap);
                self.x_lambda.column_mut(j).add_assign(&x_gap);
                self.u_lambda.column_mut(j).add_assign(&u_gap);
                self.q_lambda.column_mut(j).add_assign(&q_gap);

                // Overwritten every knot: only the last processed knot
                // survives in the ledger
                self.diagnostics.set_residuals(
                    iteration,
                    x_gap.norm(),
                    q_gap.norm(),
                    u_gap.norm(),
                    c_gap.norm(),
                );
            }

            // Terminal knot: pooled value taken directly, no projector;
            // no control or contact dual exists at this index
            self.xbar.column_mut(n).copy_from(&x_pool.column(n));
            let x_gap = self.x.column(n) - self.xbar.column(n);
            let q_gap = self.q_ik.column(n) - self.xbar.view((0, n), (NUM_JOINTS, 1));
            self.x_lambda.column_mut(n).add_assign(&x_gap);
            self.q_lambda.column_mut(n).add_assign(&q_gap);

            let c_gap_terminal = self.c.column(n) - self.cbar.column(n);
            self.diagnostics.set_terminal_residuals(
                iteration,
                x_gap.norm(),
                q_gap.norm(),
                c_gap_terminal.norm(),
            );

            // (h) True cost of the iterate, no penalty terms
            let mut cost = 0.0;
            for k in 0..n {
                cost += self.stage_cost.stage_cost(
                    k,
                    self.x.column(k),
                    self.u.column(k),
                    desired_states.column(k),
                );
            }
            self.diagnostics.set_cost(iteration + 1, cost);

            // (i) Degeneracy scan: a non-finite consensus would silently
            // corrupt every later iteration
            self.check_finite(iteration)?;

            self.capture_trace(iteration + 1);
        }

        // ---------------- Final consensus re-solve ----------------
        let solution = self
            .trajectory_block
            .solve(&TrajectoryProblem {
                initial_state,
                initial_controls: &self.u.clone(),
                desired_states,
                targets: ConsensusTargets {
                    contact: &self.cbar,
                    state: &self.xbar,
                    control: &self.ubar,
                    joint: &self.qbar,
                },
                penalties: *rho,
                curvature_radius: &self.curvature_radius,
            })
            .and_then(|solution| {
                self.solution_shapes(&solution)?;
                Ok(solution)
            })
            .map_err(SolveError::Finalize)?;

        self.x.copy_from(&solution.states);
        self.u.copy_from(&solution.controls);
        self.last_solution = Some(solution.clone());

        info!(final_cost = solution.cost, "consensus solve finished");
        Ok(solution)
    }

    fn validate_shapes(
        &self,
        initial_state: &DVector<f64>,
        initial_control: &DMatrix<f64>,
        desired_states: &DMatrix<f64>,
        cartesian_track: &[Pose],
        limits: &Saturation,
    ) -> Result<(), SolveError> {
        let n = self.config.horizon;
        let layout = &self.config.layout;

        let checks: [(&'static str, usize, usize); 8] = [
            ("initial state length", layout.state_dim(), initial_state.len()),
            ("initial control rows", layout.control_dim(), initial_control.nrows()),
            ("initial control columns", n, initial_control.ncols()),
            ("desired state rows", layout.state_dim(), desired_states.nrows()),
            ("desired state columns", n + 1, desired_states.ncols()),
            ("cartesian track knots", n + 1, cartesian_track.len()),
            ("state limit columns", layout.state_dim(), limits.state_limits.ncols()),
            ("control limit columns", layout.control_dim(), limits.control_limits.ncols()),
        ];
        for (what, expected, got) in checks {
            if expected != got {
                return Err(SolveError::Config { what, expected, got });
            }
        }
        Ok(())
    }

    fn solution_shapes(&self, solution: &TrajectorySolution) -> Result<(), BlockError> {
        let n = self.config.horizon;
        let layout = &self.config.layout;
        if solution.states.nrows() != layout.state_dim() || solution.states.ncols() != n + 1 {
            return Err(BlockError::Shape {
                what: "trajectory block state columns",
                expected: n + 1,
                got: solution.states.ncols(),
            });
        }
        if solution.controls.nrows() != layout.control_dim() || solution.controls.ncols() != n {
            return Err(BlockError::Shape {
                what: "trajectory block control columns",
                expected: n,
                got: solution.controls.ncols(),
            });
        }
        Ok(())
    }

    fn check_finite(&self, iteration: usize) -> Result<(), SolveError> {
        let buffers: [(&'static str, &DMatrix<f64>); 11] = [
            ("primal state", &self.x),
            ("primal control", &self.u),
            ("primal contact", &self.c),
            ("state consensus", &self.xbar),
            ("contact consensus", &self.cbar),
            ("control consensus", &self.ubar),
            ("joint consensus", &self.qbar),
            ("state dual", &self.x_lambda),
            ("joint dual", &self.q_lambda),
            ("contact dual", &self.c_lambda),
            ("control dual", &self.u_lambda),
        ];
        for (buffer, matrix) in buffers {
            if matrix.iter().any(|v| !v.is_finite()) {
                return Err(SolveError::NumericDegeneracy { buffer, iteration });
            }
        }
        Ok(())
    }

    /// Record the Cartesian pose and force state of every knot; skipped
    /// entirely when the sink is disabled
    fn capture_trace(&mut self, iteration: usize) {
        if !self.trace.enabled() {
            return;
        }
        let layout = &self.config.layout;
        for k in 0..=self.config.horizon {
            let q = joint_column(&self.x, k);
            let position = match self.arm.forward_kinematics(q.as_slice()) {
                Ok(pose) => Vector3::new(pose[(0, 3)], pose[(1, 3)], pose[(2, 3)]),
                Err(_) => Vector3::zeros(),
            };
            let mut force = Vector3::zeros();
            for i in 0..layout.force_dim.min(3) {
                force[i] = self.x[(layout.force_row() + i, k)];
            }
            self.trace.record(iteration, k, &position, &force);
        }
    }
}

fn joint_column(states: &DMatrix<f64>, k: usize) -> JointVector {
    JointVector::from_iterator(states.column(k).rows(0, NUM_JOINTS).iter().copied())
}

fn velocity_column(states: &DMatrix<f64>, k: usize, layout: &StateLayout) -> JointVector {
    JointVector::from_iterator(
        states
            .column(k)
            .rows(layout.velocity_row(), NUM_JOINTS)
            .iter()
            .copied(),
    )
}
