//! Per-actuator torque allocation and normalization

use super::{Topology, TorqueVectors};
use crate::ControlError;

/// Rated forces at or below this magnitude are rejected
pub const MIN_RATED_FORCE: f64 = 1e-9;

/// Final command for one actuator
#[derive(Clone, Debug, PartialEq)]
pub struct ActuatorCommand {
    pub actuator: String,

    /// `dynamics + coriolis - gravity`, summed over the joint's slots [N*m]
    pub torque: f64,

    /// `torque / rated_force`, the value written to the actuation interface
    pub control: f64,
}

/// Normalizes per-joint torques by the rated force of the actuator driving each joint.
///
/// Actuators are held in joint order.
#[derive(Clone, Debug)]
pub struct TorqueAllocator {
    actuators: Vec<(String, f64)>,
}

impl TorqueAllocator {
    /// # Errors
    /// * `ControlError::Configuration` if any rated force is non-finite or
    ///   not larger in magnitude than `MIN_RATED_FORCE`
    pub fn new(actuators: Vec<(String, f64)>) -> Result<Self, ControlError> {
        for (name, rated_force) in actuators.iter() {
            if !rated_force.is_finite() || rated_force.abs() <= MIN_RATED_FORCE {
                return Err(ControlError::Configuration(format!(
                    "Actuator `{name}` has unusable rated force {rated_force}"
                )));
            }
        }
        Ok(Self { actuators })
    }

    pub fn rated_force(&self, joint: usize) -> f64 {
        self.actuators[joint].1
    }

    /// One command per actuator, in joint order
    pub fn allocate(&self, topology: &Topology, torques: &TorqueVectors) -> Vec<ActuatorCommand> {
        debug_assert_eq!(topology.n_joints(), self.actuators.len());
        topology
            .gather(&torques.net())
            .into_iter()
            .zip(self.actuators.iter())
            .map(|(torque, (actuator, rated_force))| ActuatorCommand {
                actuator: actuator.clone(),
                torque,
                control: torque / rated_force,
            })
            .collect()
    }
}
