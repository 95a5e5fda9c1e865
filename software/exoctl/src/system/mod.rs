//! Capability interfaces to the mechanical model and actuators owned by the simulation host.
//!
//! The controller never holds on to either; the host lends them for each call.
//! Failures at these seams are reported as plain strings and wrapped by the
//! controller into a `ControlError` naming the query that failed.

use std::collections::BTreeMap;

use nalgebra::DVector;

pub mod mockup;
pub use mockup::MockupSystem;

/// Read-only view of the mechanical model at the current state
pub trait MechanicalSystem {
    /// Number of generalized coordinates in the kinematic chain
    fn dof(&self) -> usize;

    /// Simulation time of the current state [s]
    fn time(&self) -> f64;

    /// Measured angle of a coordinate [rad]
    fn joint_angle(&self, coordinate: &str) -> Result<f64, String>;

    /// `M(q) * acceleration`
    fn multiply_by_mass_matrix(&self, acceleration: &DVector<f64>) -> Result<DVector<f64>, String>;

    /// Generalized force equivalent of gravity acting on every body
    fn gravity_generalized_force(&self) -> Result<DVector<f64>, String>;

    /// Velocity-dependent generalized force with no applied or constraint forces
    fn velocity_generalized_force(&self) -> Result<DVector<f64>, String>;

    /// Maximum output of an actuator, if the actuator exists
    fn actuator_rated_force(&self, actuator: &str) -> Option<f64>;
}

/// Sink for per-actuator control values
pub trait Actuation {
    fn set_actuator_control(&mut self, actuator: &str, value: f64) -> Result<(), String>;
}

/// A fixed set of named actuator controls, all starting at zero.
///
/// Writes to actuators outside the set are rejected.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ActuatorControls {
    values: BTreeMap<String, f64>,
}

impl ActuatorControls {
    pub fn new<I, S>(actuators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values: actuators.into_iter().map(|a| (a.into(), 0.0)).collect(),
        }
    }

    pub fn get(&self, actuator: &str) -> Option<f64> {
        self.values.get(actuator).copied()
    }

    pub fn values(&self) -> &BTreeMap<String, f64> {
        &self.values
    }
}

impl Actuation for ActuatorControls {
    fn set_actuator_control(&mut self, actuator: &str, value: f64) -> Result<(), String> {
        match self.values.get_mut(actuator) {
            Some(v) => {
                *v = value;
                Ok(())
            }
            None => Err(format!("Unknown actuator `{actuator}`")),
        }
    }
}
