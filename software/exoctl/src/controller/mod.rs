//! Position controller and its per-step pipeline

mod controller_state;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::ControlError;
use crate::calc::{
    self, ActuatorCommand, DesiredAcceleration, JointErrorTracker, JointTorques, PidState,
    PidTerms, TorqueAllocator, TorqueVectors,
};
use crate::config::ControllerConfig;
use crate::context::ControllerCtx;
use crate::recorder::{self, Recorder};
use crate::system::{Actuation, MechanicalSystem};

use controller_state::ControllerState;

/// Everything computed during one step
#[derive(Clone, Debug, PartialEq)]
pub struct StepOutput {
    /// Simulation time of the state the step was computed from [s]
    pub time_s: f64,

    /// Measured angle of each joint [rad]
    pub positions: Vec<f64>,

    pub terms: Vec<PidTerms>,
    pub acceleration: DesiredAcceleration,
    pub torques: TorqueVectors,

    /// Torque components reduced to each joint's slots
    pub joint_torques: JointTorques,

    /// Commands written to the actuation interface, in joint order
    pub commands: Vec<ActuatorCommand>,
}

impl StepOutput {
    /// Diagnostic row in the order given by `recorder::column_names`
    pub fn telemetry_row(&self) -> Vec<f64> {
        let mut row = Vec::with_capacity(5 * self.positions.len() + 1);
        row.extend(self.terms.iter().map(|t| t.error));
        row.extend_from_slice(&self.positions);
        row.extend_from_slice(&self.joint_torques.dynamics);
        row.extend_from_slice(&self.joint_torques.coriolis);
        row.extend_from_slice(&self.joint_torques.gravity);
        row.push(self.time_s);
        row
    }
}

/// Drives each configured joint toward its reference angle with gravity and
/// Coriolis/centrifugal compensation.
///
/// The mechanical model and the actuation interface belong to the simulation host
/// and are lent to the controller for each call. The controller owns its gains,
/// references, and per-joint error state.
///
/// Lifecycle: `new` → `add_recorder`* → `init` → `step`* → `terminate`.
/// The configuration and recorders serialize; runtime state does not, and is rebuilt by `init`.
#[derive(Serialize, Deserialize)]
pub struct PositionController {
    config: ControllerConfig,
    recorders: BTreeMap<String, Box<dyn Recorder>>,

    #[serde(skip)]
    state: Option<ControllerState>,
}

impl PositionController {
    /// # Errors
    /// * `ControlError::Configuration` if the config does not validate
    pub fn new(config: ControllerConfig) -> Result<Self, ControlError> {
        config.validate()?;
        Ok(Self {
            config,
            recorders: BTreeMap::new(),
            state: None,
        })
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Register a telemetry recorder. Takes effect at the next `init`.
    pub fn add_recorder(
        &mut self,
        name: &str,
        recorder: Box<dyn Recorder>,
    ) -> Result<(), ControlError> {
        if self.recorders.contains_key(name) {
            return Err(ControlError::Configuration(format!(
                "Recorder name `{name}` is duplicated"
            )));
        }
        self.recorders.insert(name.to_owned(), recorder);
        Ok(())
    }

    /// Names of the columns of each telemetry row
    pub fn column_names(&self) -> Vec<String> {
        let joints: Vec<String> = self.config.joints.iter().map(|j| j.name.clone()).collect();
        recorder::column_names(&joints)
    }

    /// Resolve every identifier against the mechanical model, seed the
    /// per-joint error state, and start the recorders.
    ///
    /// Calling `init` again restarts the run from fresh error state.
    ///
    /// # Errors
    /// * `ControlError::Configuration` if the config is invalid, the model's DOF differ
    ///   from the config, a coordinate or actuator does not exist, or a rated force is
    ///   zero, near zero, or non-finite
    ///
    /// A recorder that fails to initialize is disabled for the run with a warning;
    /// it does not fail `init`.
    pub fn init<S: MechanicalSystem + ?Sized>(
        &mut self,
        ctx: &ControllerCtx,
        system: &S,
    ) -> Result<(), ControlError> {
        // Shut down any previous run first
        self.terminate();

        let config = &self.config;
        config.validate()?;

        if system.dof() != config.dof {
            return Err(ControlError::Configuration(format!(
                "Mechanical model has {} DOF but the controller is configured for {}",
                system.dof(),
                config.dof
            )));
        }

        let mut actuators = Vec::with_capacity(config.joints.len());
        for joint in config.joints.iter() {
            system.joint_angle(&joint.coordinate).map_err(|e| {
                ControlError::Configuration(format!(
                    "Joint `{}` coordinate `{}` does not resolve: {e}",
                    joint.name, joint.coordinate
                ))
            })?;

            let rated_force = system.actuator_rated_force(&joint.actuator).ok_or_else(|| {
                ControlError::Configuration(format!(
                    "Joint `{}` actuator `{}` does not exist",
                    joint.name, joint.actuator
                ))
            })?;
            debug!(
                "Joint `{}`: reference {} rad, actuator `{}` rated {rated_force}",
                joint.name, joint.reference, joint.actuator
            );
            actuators.push((joint.actuator.clone(), rated_force));
        }
        let allocator = TorqueAllocator::new(actuators)?;

        let topology = config.topology()?;
        let trackers = config
            .joints
            .iter()
            .map(|j| JointErrorTracker::new(j.reference, config.dt_s))
            .collect();

        let column_names = self.column_names();
        let mut active_recorders = Vec::new();
        for (name, recorder) in self.recorders.iter_mut() {
            match recorder.init(ctx, &column_names) {
                Ok(()) => active_recorders.push(name.clone()),
                Err(e) => warn!("Recorder `{name}` failed to initialize and is disabled: {e}"),
            }
        }

        self.state = Some(ControllerState {
            topology,
            gains: config.joints.iter().map(|j| j.gains).collect(),
            coordinates: config.joints.iter().map(|j| j.coordinate.clone()).collect(),
            trackers,
            allocator,
            active_recorders,
            recorder_faults: BTreeMap::new(),
        });

        info!(
            "Initialized position controller with {} joints over {} DOF at dt = {} s",
            config.joints.len(),
            config.dof,
            config.dt_s
        );

        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    /// Run the control law once against the model's current state and write
    /// one control value per actuator.
    ///
    /// The model is borrowed for the whole step, so every query sees the same state.
    /// A failed query leaves both the error state and the actuators untouched.
    /// A failed write stops at that actuator: actuators earlier in joint order keep
    /// this step's values, later ones keep the previous step's, and the error state
    /// is left as it was before the step.
    ///
    /// # Errors
    /// * `ControlError::NotInitialized` if `init` has not succeeded
    /// * `ControlError::StateQuery` if the model fails a query or returns malformed data
    /// * `ControlError::Actuation` if writing a control value fails
    ///
    /// Telemetry failures are counted and never returned.
    pub fn step<S, A>(&mut self, system: &S, actuation: &mut A) -> Result<StepOutput, ControlError>
    where
        S: MechanicalSystem + ?Sized,
        A: Actuation + ?Sized,
    {
        let state = self.state.as_mut().ok_or(ControlError::NotInitialized)?;

        let time_s = system.time();

        let positions = state
            .coordinates
            .iter()
            .map(|c| {
                system
                    .joint_angle(c)
                    .map_err(|e| ControlError::state_query("joint angle", e))
                    .and_then(|x| {
                        if x.is_finite() {
                            Ok(x)
                        } else {
                            Err(ControlError::state_query(
                                "joint angle",
                                format!("coordinate `{c}` returned {x}"),
                            ))
                        }
                    })
            })
            .collect::<Result<Vec<f64>, ControlError>>()?;

        // Error state is only committed once every query and write has succeeded
        let mut trackers = state.trackers.clone();
        let terms: Vec<PidTerms> = trackers
            .iter_mut()
            .zip(positions.iter())
            .map(|(tracker, &x)| tracker.update(x))
            .collect();

        let acceleration = calc::synthesize(&state.topology, &state.gains, &terms);
        let torques = calc::compensate(system, &acceleration.generalized)?;

        let commands = state.allocator.allocate(&state.topology, &torques);

        for cmd in commands.iter() {
            actuation
                .set_actuator_control(&cmd.actuator, cmd.control)
                .map_err(|msg| ControlError::Actuation {
                    actuator: cmd.actuator.clone(),
                    msg,
                })?;
        }
        state.trackers = trackers;

        let output = StepOutput {
            time_s,
            positions,
            terms,
            joint_torques: torques.per_joint(&state.topology),
            acceleration,
            torques,
            commands,
        };
        trace!("t = {time_s}: controls {:?}", output.commands);

        if !state.active_recorders.is_empty() {
            let row = output.telemetry_row();
            for name in state.active_recorders.clone() {
                let result = match self.recorders.get_mut(&name) {
                    Some(recorder) => recorder.consume(row.clone()),
                    None => Err("Recorder is no longer registered".to_owned()),
                };
                if let Err(e) = result {
                    state.note_recorder_fault(&name, &e);
                }
            }
        }

        Ok(output)
    }

    /// Forget every joint's previous error. The next step is seeded as on the first.
    pub fn reset(&mut self) {
        if let Some(state) = self.state.as_mut() {
            state.trackers.iter_mut().for_each(JointErrorTracker::reset);
        }
    }

    /// Per-joint error state, in joint order. Empty before `init`.
    pub fn pid_states(&self) -> Vec<PidState> {
        self.state
            .as_ref()
            .map(|s| s.trackers.iter().map(|t| t.state()).collect())
            .unwrap_or_default()
    }

    /// Telemetry faults swallowed during the current run
    pub fn telemetry_faults(&self) -> u64 {
        self.state
            .as_ref()
            .map(|s| s.telemetry_faults())
            .unwrap_or(0)
    }

    /// Stop the run: flush and shut down recorders and drop runtime state.
    /// Recorder errors are logged, not returned.
    pub fn terminate(&mut self) {
        let Some(state) = self.state.take() else {
            return;
        };

        for name in state.active_recorders.iter() {
            if let Some(recorder) = self.recorders.get_mut(name) {
                if let Err(e) = recorder.terminate() {
                    warn!("Recorder `{name}` failed to terminate: {e}");
                }
            }
        }

        let faults = state.telemetry_faults();
        if faults > 0 {
            warn!("Run ended with {faults} swallowed telemetry faults");
        }
        info!("Terminated position controller");
    }
}

impl Drop for PositionController {
    fn drop(&mut self) {
        self.terminate();
    }
}
