//! End-to-end properties of the consensus orchestrator
//!
//! Uses echo stubs for the sub-blocks so every property is checked
//! against exact arithmetic rather than solver heuristics: the dynamics
//! block returns the desired trajectory verbatim, the IK block echoes
//! its joint bias, and projections are either identity or constant.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use approx::assert_relative_eq;
use nalgebra::{DMatrix, DVector, Vector3};

use arco_core::kinematics::KinematicsError;
use arco_core::{ArmKinematics, JointVector, Pose, SpatialJacobian, NUM_JOINTS};
use arco_planner::controller::{run_actuation_loop, ControllerError};
use arco_planner::{
    AdmmConfig, AdmmSolver, BlockError, ContactFeatures, ControlChannel, IdentityProjection,
    IkBlock, PenaltyWeights, Plant, ProjectionBlock, QuadraticCost, RecedingHorizonController,
    Rendezvous, Saturation, SolveError, StateLayout, TraceSink, TrajectoryBlock,
    TrajectoryProblem, TrajectorySolution,
};

/// Flat arm: identity pose, zero Jacobian, so the centripetal contact
/// feature is exactly zero at every knot
struct StubArm;

impl ArmKinematics for StubArm {
    fn initialize(&mut self) -> Result<(), KinematicsError> {
        Ok(())
    }

    fn spatial_jacobian(&self, _q: &[f64]) -> Result<SpatialJacobian, KinematicsError> {
        Ok(SpatialJacobian::zeros())
    }

    fn forward_kinematics(&self, _q: &[f64]) -> Result<Pose, KinematicsError> {
        Ok(Pose::identity())
    }
}

/// Returns the desired states verbatim and a constant control trajectory
struct EchoTrajectory {
    control_value: f64,
    calls: Arc<AtomicUsize>,
    /// Velocity-row value of the first desired column, one per call
    seen_windows: Arc<Mutex<Vec<f64>>>,
}

impl EchoTrajectory {
    fn new(control_value: f64) -> Self {
        Self {
            control_value,
            calls: Arc::new(AtomicUsize::new(0)),
            seen_windows: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl TrajectoryBlock for EchoTrajectory {
    fn solve(&mut self, problem: &TrajectoryProblem<'_>) -> Result<TrajectorySolution, BlockError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_windows
            .lock()
            .unwrap()
            .push(problem.desired_states[(NUM_JOINTS, 0)]);
        Ok(TrajectorySolution {
            states: problem.desired_states.clone(),
            controls: DMatrix::from_element(
                problem.initial_controls.nrows(),
                problem.initial_controls.ncols(),
                self.control_value,
            ),
            cost: 0.0,
        })
    }
}

/// Fails on every call with index in `fail_from..fail_to` (0 = seed)
struct FlakyTrajectory {
    inner: EchoTrajectory,
    call: usize,
    fail_from: usize,
    fail_to: usize,
}

impl TrajectoryBlock for FlakyTrajectory {
    fn solve(&mut self, problem: &TrajectoryProblem<'_>) -> Result<TrajectorySolution, BlockError> {
        let call = self.call;
        self.call += 1;
        if call >= self.fail_from && call < self.fail_to {
            return Err(BlockError::NotConverged { iterations: 10 });
        }
        self.inner.solve(problem)
    }
}

/// Returns NaN states from every call
struct NanTrajectory;

impl TrajectoryBlock for NanTrajectory {
    fn solve(&mut self, problem: &TrajectoryProblem<'_>) -> Result<TrajectorySolution, BlockError> {
        Ok(TrajectorySolution {
            states: DMatrix::from_element(
                problem.desired_states.nrows(),
                problem.desired_states.ncols(),
                f64::NAN,
            ),
            controls: problem.initial_controls.clone(),
            cost: 0.0,
        })
    }
}

/// Echoes the joint bias as the IK answer
struct EchoIk {
    trace: DMatrix<f64>,
}

impl EchoIk {
    fn new(horizon: usize) -> Self {
        Self { trace: DMatrix::zeros(3, horizon + 1) }
    }
}

impl IkBlock for EchoIk {
    fn joint_trajectory(
        &mut self,
        _cartesian_track: &[Pose],
        _base_position: &JointVector,
        _base_velocity: &JointVector,
        q_bias: &DMatrix<f64>,
        _qd_bias: &DMatrix<f64>,
        _rho: &PenaltyWeights,
        out: &mut DMatrix<f64>,
    ) -> Result<(), BlockError> {
        out.copy_from(q_bias);
        Ok(())
    }

    fn fk_trace(&self) -> &DMatrix<f64> {
        &self.trace
    }
}

/// IK block that poisons its first (seeding) call with NaN and answers
/// zero afterwards
struct NanSeedIk {
    calls: usize,
    trace: DMatrix<f64>,
}

impl IkBlock for NanSeedIk {
    fn joint_trajectory(
        &mut self,
        _cartesian_track: &[Pose],
        _base_position: &JointVector,
        _base_velocity: &JointVector,
        _q_bias: &DMatrix<f64>,
        _qd_bias: &DMatrix<f64>,
        _rho: &PenaltyWeights,
        out: &mut DMatrix<f64>,
    ) -> Result<(), BlockError> {
        out.fill(if self.calls == 0 { f64::NAN } else { 0.0 });
        self.calls += 1;
        Ok(())
    }

    fn fk_trace(&self) -> &DMatrix<f64> {
        &self.trace
    }
}

/// Shared-handle sink collecting (iteration, knot, force.x) triples
#[derive(Clone)]
struct RecordingTrace {
    records: Arc<Mutex<Vec<(usize, usize, f64)>>>,
}

impl TraceSink for RecordingTrace {
    fn record(&mut self, iteration: usize, knot: usize, _position: &Vector3<f64>, force: &Vector3<f64>) {
        self.records.lock().unwrap().push((iteration, knot, force[0]));
    }
}

/// Replaces every pooled entry with a sentinel value
struct ConstantProjection(f64);

impl ProjectionBlock for ConstantProjection {
    fn project(
        &self,
        pooled: &DMatrix<f64>,
        _limits: &Saturation,
        _layout: &StateLayout,
    ) -> DMatrix<f64> {
        DMatrix::from_element(pooled.nrows(), pooled.ncols(), self.0)
    }
}

fn config(horizon: usize, iterations: usize) -> AdmmConfig {
    AdmmConfig { horizon, admm_iterations: iterations, ..AdmmConfig::default() }
}

fn build_solver(
    cfg: AdmmConfig,
    trajectory: Box<dyn TrajectoryBlock>,
    projection: Box<dyn ProjectionBlock>,
) -> AdmmSolver {
    let ik = Box::new(EchoIk::new(cfg.horizon));
    build_solver_with_ik(cfg, trajectory, ik, projection)
}

fn build_solver_with_ik(
    cfg: AdmmConfig,
    trajectory: Box<dyn TrajectoryBlock>,
    ik: Box<dyn IkBlock>,
    projection: Box<dyn ProjectionBlock>,
) -> AdmmSolver {
    let layout = cfg.layout;
    AdmmSolver::new(
        cfg,
        Box::new(StubArm),
        trajectory,
        ik,
        projection,
        Box::new(QuadraticCost::uniform(&layout, 1.0, 2.0)),
        ContactFeatures::default(),
    )
}

/// Desired trajectory with zero joint rows (so both joint copies agree at
/// zero), distinct velocity-row values per knot, and a zero final state
/// component (so the pass-through contact feature is zero)
fn desired(layout: &StateLayout, horizon: usize) -> DMatrix<f64> {
    DMatrix::from_fn(layout.state_dim(), horizon + 1, |i, j| {
        if (layout.velocity_row()..layout.force_row()).contains(&i) {
            0.1 * (j as f64 + 1.0) + 0.01 * i as f64
        } else if i >= layout.force_row() && i < layout.state_dim() - 1 {
            0.05
        } else {
            0.0
        }
    })
}

fn track(knots: usize) -> Vec<Pose> {
    vec![Pose::identity(); knots]
}

fn rho() -> PenaltyWeights {
    PenaltyWeights::new([1.0, 1.0, 0.1, 0.2, 0.3])
}

#[test]
fn test_buffer_shapes_after_solve() {
    let n = 4;
    let cfg = config(n, 2);
    let layout = cfg.layout;
    let mut solver = build_solver(cfg, Box::new(EchoTrajectory::new(0.0)), Box::new(IdentityProjection));

    let d = desired(&layout, n);
    let x0 = d.column(0).into_owned();
    let u0 = DMatrix::zeros(layout.control_dim(), n);
    let limits = Saturation::unbounded(&layout);

    let solution = solver.solve(&x0, &u0, &d, &track(n + 1), &rho(), &limits).unwrap();

    assert_eq!(solution.states.shape(), (17, n + 1));
    assert_eq!(solution.controls.shape(), (7, n));
    assert_eq!(solver.consensus_state().shape(), (17, n + 1));
    assert_eq!(solver.consensus_contact().shape(), (2, n + 1));
    assert_eq!(solver.consensus_control().shape(), (7, n));
    assert_eq!(solver.consensus_joint().shape(), (7, n + 1));
    assert_eq!(solver.dual_state().shape(), (17, n + 1));
    assert_eq!(solver.dual_joint().shape(), (7, n + 1));
    assert_eq!(solver.dual_contact().shape(), (2, n + 1));
    assert_eq!(solver.dual_control().shape(), (7, n));
}

#[test]
fn test_ledger_lengths_match_budget() {
    let n = 2;
    let budget = 3;
    let cfg = config(n, budget);
    let layout = cfg.layout;
    let mut solver = build_solver(cfg, Box::new(EchoTrajectory::new(0.0)), Box::new(IdentityProjection));

    let d = desired(&layout, n);
    let x0 = d.column(0).into_owned();
    let u0 = DMatrix::zeros(layout.control_dim(), n);
    solver
        .solve(&x0, &u0, &d, &track(n + 1), &rho(), &Saturation::unbounded(&layout))
        .unwrap();

    let diag = solver.diagnostics();
    assert_eq!(diag.res_x().len(), budget);
    assert_eq!(diag.res_q().len(), budget);
    assert_eq!(diag.res_u().len(), budget);
    assert_eq!(diag.res_c().len(), budget);
    assert_eq!(diag.final_cost().len(), budget + 1);
}

#[test]
fn test_echo_blocks_reach_fixed_point() {
    let n = 2;
    let cfg = config(n, 3);
    let layout = cfg.layout;
    let mut solver = build_solver(cfg, Box::new(EchoTrajectory::new(0.5)), Box::new(IdentityProjection));

    let d = desired(&layout, n);
    let x0 = d.column(0).into_owned();
    let u0 = DMatrix::zeros(layout.control_dim(), n);
    solver
        .solve(&x0, &u0, &d, &track(n + 1), &rho(), &Saturation::unbounded(&layout))
        .unwrap();

    // Every primal already satisfies its consensus, so no dual moves
    assert_relative_eq!(solver.dual_state().norm(), 0.0);
    assert_relative_eq!(solver.dual_joint().norm(), 0.0);
    assert_relative_eq!(solver.dual_contact().norm(), 0.0);
    assert_relative_eq!(solver.dual_control().norm(), 0.0);

    // And the state consensus equals the echoed trajectory at every knot
    assert_relative_eq!(solver.consensus_state(), &d, epsilon = 1e-12);

    let diag = solver.diagnostics();
    assert!(diag.res_x().iter().all(|&r| r == 0.0));

    // Seed slot comes from the block; later slots are the true quadratic
    // cost of the unchanged trajectory: per knot ½·2·(7·0.25) = 1.75
    assert_relative_eq!(diag.final_cost()[0], 0.0);
    for slot in 1..diag.final_cost().len() {
        assert_relative_eq!(diag.final_cost()[slot], 3.5, epsilon = 1e-12);
    }
}

#[test]
fn test_terminal_knot_bypasses_projection() {
    let n = 3;
    let cfg = config(n, 1);
    let layout = cfg.layout;
    let sentinel = 777.0;
    let mut solver =
        build_solver(cfg, Box::new(EchoTrajectory::new(0.5)), Box::new(ConstantProjection(sentinel)));

    let d = desired(&layout, n);
    let x0 = d.column(0).into_owned();
    let u0 = DMatrix::zeros(layout.control_dim(), n);
    solver
        .solve(&x0, &u0, &d, &track(n + 1), &rho(), &Saturation::unbounded(&layout))
        .unwrap();

    // Knots 0..N-1 carry the projector's sentinel
    for j in 0..n {
        assert_relative_eq!(solver.consensus_state()[(0, j)], sentinel);
        assert_relative_eq!(solver.consensus_control()[(0, j)], sentinel);
        assert_relative_eq!(solver.consensus_contact()[(0, j)], sentinel);
    }

    // The terminal column is the pooled primal+dual sum, never projected
    assert_relative_eq!(
        solver.consensus_state().column(n).into_owned(),
        d.column(n).into_owned(),
        epsilon = 1e-12
    );
    // Whose dual ascent then cancels it back to zero
    assert_relative_eq!(solver.dual_state().column(n).norm(), 0.0);
    assert_relative_eq!(solver.dual_joint().column(n).norm(), 0.0);
}

#[test]
fn test_dual_telescoping_and_residual_overwrite() {
    let n = 2;
    let budget = 3;
    let cfg = config(n, budget);
    let layout = cfg.layout;
    let mut solver =
        build_solver(cfg, Box::new(EchoTrajectory::new(0.5)), Box::new(ConstantProjection(0.0)));

    let d = desired(&layout, n);
    let x0 = d.column(0).into_owned();
    let u0 = DMatrix::zeros(layout.control_dim(), n);
    solver
        .solve(&x0, &u0, &d, &track(n + 1), &rho(), &Saturation::unbounded(&layout))
        .unwrap();

    // Consensus stays zero on knots 0..N-1, so each iteration adds the
    // full primal: dual = budget · primal
    for j in 0..n {
        assert_relative_eq!(
            solver.dual_state().column(j).into_owned(),
            budget as f64 * d.column(j).into_owned(),
            epsilon = 1e-12
        );
        for i in 0..layout.control_dim() {
            assert_relative_eq!(solver.dual_control()[(i, j)], budget as f64 * 0.5, epsilon = 1e-12);
        }
    }

    // The ledger slot holds only the last processed knot: the terminal
    // state gap (zero) overwrites the nonzero interior gaps, while the
    // control slot keeps knot N-1
    let diag = solver.diagnostics();
    for t in 0..budget {
        assert_relative_eq!(diag.res_x()[t], 0.0);
        assert_relative_eq!(diag.res_u()[t], 0.5 * (layout.control_dim() as f64).sqrt(), epsilon = 1e-12);
    }
}

#[test]
fn test_duals_reset_at_solve_entry() {
    let n = 2;
    let cfg = config(n, 2);
    let layout = cfg.layout;
    let mut solver =
        build_solver(cfg, Box::new(EchoTrajectory::new(0.5)), Box::new(ConstantProjection(0.0)));

    let d = desired(&layout, n);
    let x0 = d.column(0).into_owned();
    let u0 = DMatrix::zeros(layout.control_dim(), n);
    let limits = Saturation::unbounded(&layout);

    solver.solve(&x0, &u0, &d, &track(n + 1), &rho(), &limits).unwrap();
    let first = solver.dual_state().clone();
    assert!(first.norm() > 0.0);

    // A second solve starts from zero duals, not the accumulated ones
    solver.solve(&x0, &u0, &d, &track(n + 1), &rho(), &limits).unwrap();
    assert_relative_eq!(solver.dual_state(), &first, epsilon = 1e-12);
}

#[test]
fn test_shape_mismatch_fails_before_any_block_runs() {
    let n = 2;
    let cfg = config(n, 1);
    let layout = cfg.layout;
    let echo = EchoTrajectory::new(0.0);
    let calls = Arc::clone(&echo.calls);
    let mut solver = build_solver(cfg, Box::new(echo), Box::new(IdentityProjection));

    let d = desired(&layout, n);
    let bad_x0 = DVector::zeros(layout.state_dim() - 1);
    let u0 = DMatrix::zeros(layout.control_dim(), n);

    let err = solver
        .solve(&bad_x0, &u0, &d, &track(n + 1), &rho(), &Saturation::unbounded(&layout))
        .unwrap_err();
    assert!(matches!(err, SolveError::Config { what: "initial state length", .. }));
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    // Wrong track length is caught the same way
    let x0 = d.column(0).into_owned();
    let err = solver
        .solve(&x0, &u0, &d, &track(n), &rho(), &Saturation::unbounded(&layout))
        .unwrap_err();
    assert!(matches!(err, SolveError::Config { what: "cartesian track knots", .. }));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_non_finite_iterate_aborts() {
    let n = 2;
    let cfg = config(n, 3);
    let layout = cfg.layout;
    let mut solver = build_solver(cfg, Box::new(NanTrajectory), Box::new(IdentityProjection));

    let d = desired(&layout, n);
    let x0 = d.column(0).into_owned();
    let u0 = DMatrix::zeros(layout.control_dim(), n);

    let err = solver
        .solve(&x0, &u0, &d, &track(n + 1), &rho(), &Saturation::unbounded(&layout))
        .unwrap_err();
    assert!(matches!(err, SolveError::NumericDegeneracy { iteration: 0, .. }));
}

#[test]
fn test_trace_sink_sees_every_knot_and_iteration() {
    let n = 3;
    let budget = 2;
    let cfg = config(n, budget);
    let layout = cfg.layout;
    let mut solver = build_solver(cfg, Box::new(EchoTrajectory::new(0.0)), Box::new(IdentityProjection));

    let records = Arc::new(Mutex::new(Vec::new()));
    solver.set_trace_sink(Box::new(RecordingTrace { records: Arc::clone(&records) }));

    // Distinctive force value at the terminal knot; the echo block keeps
    // the primal state equal to the desired trajectory, so it shows up
    // in every capture
    let mut d = desired(&layout, n);
    d[(layout.force_row(), n)] = 9.25;
    let x0 = d.column(0).into_owned();
    let u0 = DMatrix::zeros(layout.control_dim(), n);
    solver
        .solve(&x0, &u0, &d, &track(n + 1), &rho(), &Saturation::unbounded(&layout))
        .unwrap();

    let records = records.lock().unwrap();
    // Seed capture plus one per iteration, each covering every knot
    assert_eq!(records.len(), (budget + 1) * (n + 1));
    for iteration in 0..=budget {
        for knot in 0..=n {
            assert!(records.contains(&(iteration, knot, d[(layout.force_row(), knot)])));
        }
    }
    let terminal_hits = records.iter().filter(|&&(_, knot, f)| knot == n && f == 9.25).count();
    assert_eq!(terminal_hits, budget + 1);
}

#[test]
fn test_non_finite_seed_consensus_detected() {
    let n = 2;
    let cfg = config(n, 1);
    let layout = cfg.layout;
    let ik = Box::new(NanSeedIk { calls: 0, trace: DMatrix::zeros(3, n + 1) });
    let mut solver =
        build_solver_with_ik(cfg, Box::new(EchoTrajectory::new(0.0)), ik, Box::new(IdentityProjection));

    let d = desired(&layout, n);
    let x0 = d.column(0).into_owned();
    let u0 = DMatrix::zeros(layout.control_dim(), n);

    // The poisoned seed lands in the joint consensus, which the loop
    // never rewrites; the degeneracy scan must still catch it
    let err = solver
        .solve(&x0, &u0, &d, &track(n + 1), &rho(), &Saturation::unbounded(&layout))
        .unwrap_err();
    assert!(matches!(
        err,
        SolveError::NumericDegeneracy { buffer: "joint consensus", iteration: 0 }
    ));
}

#[test]
fn test_failing_block_is_skipped_not_fatal() {
    let n = 2;
    let budget = 2;
    let cfg = config(n, budget);
    let layout = cfg.layout;

    // Seed (call 0) and finalize (call budget+1) succeed; every loop
    // call fails and the orchestrator keeps the seed iterate
    let flaky = FlakyTrajectory {
        inner: EchoTrajectory::new(0.5),
        call: 0,
        fail_from: 1,
        fail_to: budget + 1,
    };
    let calls = Arc::clone(&flaky.inner.calls);
    let mut solver = build_solver(cfg, Box::new(flaky), Box::new(IdentityProjection));

    let d = desired(&layout, n);
    let x0 = d.column(0).into_owned();
    let u0 = DMatrix::zeros(layout.control_dim(), n);

    let solution = solver
        .solve(&x0, &u0, &d, &track(n + 1), &rho(), &Saturation::unbounded(&layout))
        .unwrap();
    assert_relative_eq!(&solution.states, &d, epsilon = 1e-12);
    // Successful calls: seed + finalize
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_receding_horizon_slides_and_hands_off() {
    let n = 2;
    let steps = 2;
    let cfg = config(n, 1);
    let layout = cfg.layout;

    let echo = EchoTrajectory::new(0.5);
    let seen = Arc::clone(&echo.seen_windows);
    let solver = build_solver(cfg, Box::new(echo), Box::new(IdentityProjection));

    // Full run covers steps·1 + N + 1 knots
    let d = desired(&layout, steps + n);
    let x0 = d.column(0).into_owned();
    let u0 = DMatrix::zeros(layout.control_dim(), n);

    struct CountingPlant {
        counter: f64,
    }

    impl Plant for CountingPlant {
        fn apply_control(&mut self, _control: &DVector<f64>) {}

        fn observe_state(&mut self) -> DVector<f64> {
            self.counter += 1.0;
            DVector::from_element(17, self.counter)
        }
    }

    let channel: Arc<ControlChannel> = Arc::new(Rendezvous::new());
    let worker = {
        let channel = Arc::clone(&channel);
        thread::spawn(move || {
            let mut plant = CountingPlant { counter: 0.0 };
            run_actuation_loop(&mut plant, &channel, 1);
        })
    };

    let mut controller = RecedingHorizonController::new(solver, 1);
    let executed = controller
        .run(
            &x0,
            &u0,
            &d,
            &track(steps + n + 1),
            &rho(),
            &Saturation::unbounded(&layout),
            steps,
            &channel,
        )
        .unwrap();
    worker.join().unwrap();

    // One column per applied sample plus the initial state
    assert_eq!(executed.shape(), (17, steps + 1));
    assert_relative_eq!(executed.column(0).into_owned(), x0, epsilon = 1e-12);
    assert_relative_eq!(executed[(0, 1)], 1.0);
    assert_relative_eq!(executed[(0, 2)], 2.0);

    // Each MPC step sees the reference window slid by samples_per_step:
    // three block calls per step (seed, one iteration, finalize), first
    // step anchored at knot 0, second at knot 1
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 3 * steps);
    for call in 0..3 {
        assert_relative_eq!(seen[call], d[(NUM_JOINTS, 0)]);
        assert_relative_eq!(seen[3 + call], d[(NUM_JOINTS, 1)]);
    }
}

#[test]
fn test_controller_rejects_short_track() {
    let n = 2;
    let cfg = config(n, 1);
    let layout = cfg.layout;
    let solver = build_solver(cfg, Box::new(EchoTrajectory::new(0.0)), Box::new(IdentityProjection));

    let d = desired(&layout, n);
    let x0 = d.column(0).into_owned();
    let u0 = DMatrix::zeros(layout.control_dim(), n);
    let channel: ControlChannel = Rendezvous::new();

    let mut controller = RecedingHorizonController::new(solver, 1);
    let err = controller
        .run(
            &x0,
            &u0,
            &d,
            &track(n + 1),
            &rho(),
            &Saturation::unbounded(&layout),
            2,
            &channel,
        )
        .unwrap_err();
    assert!(matches!(err, ControllerError::TrackExhausted { needed: 5, available: 3 }));
}

#[test]
fn test_controller_closes_channel_on_error() {
    let n = 2;
    let cfg = config(n, 1);
    let layout = cfg.layout;
    let solver = build_solver(cfg, Box::new(EchoTrajectory::new(0.0)), Box::new(IdentityProjection));

    // A state of the wrong dimension makes the first solve fail; the
    // channel must be closed anyway or the actuation side would block
    // on take_command forever
    let d = DMatrix::zeros(layout.state_dim() - 1, n + 2);
    let x0 = DVector::zeros(layout.state_dim() - 1);
    let u0 = DMatrix::zeros(layout.control_dim(), n);
    let channel: ControlChannel = Rendezvous::new();

    let mut controller = RecedingHorizonController::new(solver, 1);
    let err = controller
        .run(
            &x0,
            &u0,
            &d,
            &track(n + 2),
            &rho(),
            &Saturation::unbounded(&layout),
            1,
            &channel,
        )
        .unwrap_err();
    assert!(matches!(err, ControllerError::Solve(SolveError::Config { .. })));
    assert!(channel.is_closed());
    assert!(channel.take_command().is_none());
}
