//! Receding-horizon wrapper around the consensus solver
//!
//! Runs the optimizer in MPC fashion: each step re-solves the full
//! horizon from the latest measured state, hands the resulting control
//! trajectory to the actuation thread through a [`Rendezvous`], waits
//! for `samples_per_step` fresh state measurements, then slides the
//! reference window forward by the same amount. The consensus solver
//! itself stays single-threaded and unaware of this wrapper.

use nalgebra::{DMatrix, DVector};
use thiserror::Error;
use tracing::debug;

use arco_core::Pose;

use crate::config::{PenaltyWeights, Saturation};
use crate::rendezvous::Rendezvous;
use crate::solver::{AdmmSolver, SolveError};

/// Command slot carries a control trajectory, state slot one measurement
pub type ControlChannel = Rendezvous<DMatrix<f64>, DVector<f64>>;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Solve(#[from] SolveError),
    #[error("reference track too short: need {needed} knots, have {available}")]
    TrackExhausted { needed: usize, available: usize },
    #[error("actuation channel closed at MPC step {step}")]
    ChannelClosed { step: usize },
    #[error("plant published a state of dimension {got}, expected {expected}")]
    StateDimension { expected: usize, got: usize },
}

/// Actuation side of the receding-horizon loop
pub trait Plant {
    /// Apply one control sample for one sampling period
    fn apply_control(&mut self, control: &DVector<f64>);

    /// Measure the state after the last applied control
    fn observe_state(&mut self) -> DVector<f64>;
}

/// Actuation-thread body: consume control trajectories, apply the first
/// `samples_per_step` samples of each, and publish one measured state
/// per applied sample. Returns when the channel closes.
pub fn run_actuation_loop<P: Plant>(plant: &mut P, channel: &ControlChannel, samples_per_step: usize) {
    while let Some(controls) = channel.take_command() {
        if controls.ncols() == 0 {
            continue;
        }
        let last = controls.ncols() - 1;
        for k in 0..samples_per_step {
            let control = controls.column(k.min(last)).into_owned();
            plant.apply_control(&control);
            if !channel.publish_state(plant.observe_state()) {
                return;
            }
        }
    }
}

/// MPC driver owning the consensus solver
pub struct RecedingHorizonController {
    solver: AdmmSolver,
    samples_per_step: usize,
}

impl RecedingHorizonController {
    pub fn new(solver: AdmmSolver, samples_per_step: usize) -> Self {
        Self { solver, samples_per_step: samples_per_step.max(1) }
    }

    pub fn solver(&self) -> &AdmmSolver {
        &self.solver
    }

    /// Run `steps` MPC steps against the plant on the other side of
    /// `channel`. The channel is closed when this returns, on success
    /// and on error alike, so the actuation loop always terminates.
    ///
    /// `desired_states` and `cartesian_track` span the whole run: at
    /// step i the solver sees the window starting at knot
    /// `i * samples_per_step`, so both must cover
    /// `steps * samples_per_step + horizon + 1` knots. Every step is
    /// warm-started from the same `initial_controls`, matching the
    /// original controller rather than sliding the previous solution.
    ///
    /// Returns the executed state log, one column per applied sample
    /// with the initial state in column 0.
    pub fn run(
        &mut self,
        initial_state: &DVector<f64>,
        initial_controls: &DMatrix<f64>,
        desired_states: &DMatrix<f64>,
        cartesian_track: &[Pose],
        rho: &PenaltyWeights,
        limits: &Saturation,
        steps: usize,
        channel: &ControlChannel,
    ) -> Result<DMatrix<f64>, ControllerError> {
        let result = self.run_steps(
            initial_state,
            initial_controls,
            desired_states,
            cartesian_track,
            rho,
            limits,
            steps,
            channel,
        );
        channel.close();
        result
    }

    #[allow(clippy::too_many_arguments)]
    fn run_steps(
        &mut self,
        initial_state: &DVector<f64>,
        initial_controls: &DMatrix<f64>,
        desired_states: &DMatrix<f64>,
        cartesian_track: &[Pose],
        rho: &PenaltyWeights,
        limits: &Saturation,
        steps: usize,
        channel: &ControlChannel,
    ) -> Result<DMatrix<f64>, ControllerError> {
        let n = self.solver.config().horizon;
        let m = self.samples_per_step;
        let needed = steps * m + n + 1;
        if desired_states.ncols() < needed {
            return Err(ControllerError::TrackExhausted { needed, available: desired_states.ncols() });
        }
        if cartesian_track.len() < needed {
            return Err(ControllerError::TrackExhausted { needed, available: cartesian_track.len() });
        }

        let state_dim = desired_states.nrows();
        let mut executed = DMatrix::zeros(state_dim, steps * m + 1);
        executed.column_mut(0).copy_from(initial_state);
        let mut x = initial_state.clone();

        for step in 0..steps {
            let offset = step * m;
            let window_states = desired_states.columns(offset, n + 1).into_owned();
            let window_track = &cartesian_track[offset..offset + n + 1];

            let solution =
                self.solver.solve(&x, initial_controls, &window_states, window_track, rho, limits)?;
            debug!(step, cost = solution.cost, "handing control trajectory to actuation");

            if !channel.offer_command(solution.controls.clone()) {
                return Err(ControllerError::ChannelClosed { step });
            }

            for k in 0..m {
                let state =
                    channel.await_state().ok_or(ControllerError::ChannelClosed { step })?;
                if state.len() != state_dim {
                    return Err(ControllerError::StateDimension {
                        expected: state_dim,
                        got: state.len(),
                    });
                }
                executed.column_mut(offset + k + 1).copy_from(&state);
                x = state;
            }
        }

        Ok(executed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    struct ScriptedPlant {
        applied: Vec<DVector<f64>>,
        counter: f64,
    }

    impl Plant for ScriptedPlant {
        fn apply_control(&mut self, control: &DVector<f64>) {
            self.applied.push(control.clone());
        }

        fn observe_state(&mut self) -> DVector<f64> {
            self.counter += 1.0;
            DVector::from_element(2, self.counter)
        }
    }

    #[test]
    fn test_actuation_loop_one_state_per_sample() {
        let channel: Arc<ControlChannel> = Arc::new(Rendezvous::new());
        let worker = {
            let channel = Arc::clone(&channel);
            thread::spawn(move || {
                let mut plant = ScriptedPlant { applied: Vec::new(), counter: 0.0 };
                run_actuation_loop(&mut plant, &channel, 2);
                plant
            })
        };

        let mut controls = DMatrix::zeros(1, 3);
        controls[(0, 0)] = 0.5;
        controls[(0, 1)] = -0.5;
        assert!(channel.offer_command(controls));

        assert_eq!(channel.await_state().unwrap()[0], 1.0);
        assert_eq!(channel.await_state().unwrap()[0], 2.0);

        channel.close();
        let plant = worker.join().unwrap();
        assert_eq!(plant.applied.len(), 2);
        assert_eq!(plant.applied[0][0], 0.5);
        assert_eq!(plant.applied[1][0], -0.5);
    }

    #[test]
    fn test_actuation_loop_repeats_last_sample_when_short() {
        let channel: Arc<ControlChannel> = Arc::new(Rendezvous::new());
        let worker = {
            let channel = Arc::clone(&channel);
            thread::spawn(move || {
                let mut plant = ScriptedPlant { applied: Vec::new(), counter: 0.0 };
                run_actuation_loop(&mut plant, &channel, 3);
                plant
            })
        };

        assert!(channel.offer_command(DMatrix::from_element(1, 1, 2.0)));
        for _ in 0..3 {
            assert!(channel.await_state().is_some());
        }

        channel.close();
        let plant = worker.join().unwrap();
        assert!(plant.applied.iter().all(|u| u[0] == 2.0));
        assert_eq!(plant.applied.len(), 3);
    }
}
