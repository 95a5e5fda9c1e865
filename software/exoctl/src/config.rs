//! Construction-time controller configuration.
//!
//! Everything here is immutable once a `PositionController` is built from it.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ControlError;
use crate::calc::Topology;

/// Fixed control period assumed by the PID terms, in seconds.
///
/// This is not derived from the host's actual step size; if the host steps at a
/// different rate, the effective derivative and integral gains change with it.
pub const DEFAULT_DT_S: f64 = 0.033;

/// Proportional, derivative (velocity), and integral gains for one joint
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct PidGains {
    pub kp: f64,
    pub kv: f64,
    pub ki: f64,
}

impl PidGains {
    pub fn new(kp: f64, kv: f64, ki: f64) -> Self {
        Self { kp, kv, ki }
    }

    fn is_finite(&self) -> bool {
        self.kp.is_finite() && self.kv.is_finite() && self.ki.is_finite()
    }
}

/// One generalized-coordinate slot driven by a joint, with its coupling weight
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct DofWeight {
    pub index: usize,
    #[serde(default = "unit_weight")]
    pub weight: f64,
}

fn unit_weight() -> f64 {
    1.0
}

impl DofWeight {
    /// A slot that moves one-to-one with the joint
    pub fn unit(index: usize) -> Self {
        Self { index, weight: 1.0 }
    }
}

/// A controlled joint: where to read it, what drives it, where it wants to be,
/// and which slots of the kinematic chain it spans.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct JointConfig {
    /// Short label used in telemetry column names
    pub name: String,

    /// Identifier used to look up the measured angle in the mechanical model
    pub coordinate: String,

    /// Identifier of the actuator that drives this joint
    pub actuator: String,

    /// Target angle [rad]
    pub reference: f64,

    pub gains: PidGains,

    /// Generalized-coordinate slots this joint drives
    pub slots: Vec<DofWeight>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ControllerConfig {
    /// Fixed control period [s]
    pub dt_s: f64,

    /// Degrees of freedom of the kinematic chain
    pub dof: usize,

    pub joints: Vec<JointConfig>,
}

impl ControllerConfig {
    /// The three-joint exoskeleton on a seven-slot symmetric chain.
    ///
    /// `references` and `gains` are ordered hip, knee, ankle.
    /// Hip drives slots {0, 6}, knee drives {1, 2, 5}, ankle drives {3, 4}.
    pub fn reference_exoskeleton(references: [f64; 3], gains: [PidGains; 3]) -> Self {
        let joint = |name: &str, coordinate: &str, actuator: &str, i: usize, slots: &[usize]| {
            JointConfig {
                name: name.to_owned(),
                coordinate: coordinate.to_owned(),
                actuator: actuator.to_owned(),
                reference: references[i],
                gains: gains[i],
                slots: slots.iter().copied().map(DofWeight::unit).collect(),
            }
        };

        Self {
            dt_s: DEFAULT_DT_S,
            dof: 7,
            joints: vec![
                joint("hip", "exoHipJoint_coord", "exoHipActuator_r", 0, &[0, 6]),
                joint("knee", "kneeJoint_r_coord", "exoKneeActuator_r", 1, &[1, 2, 5]),
                joint("ankle", "ankleJoint_r_coord", "exoAnkleActuator_r", 2, &[3, 4]),
            ],
        }
    }

    /// The joint-to-slot table, in joint order.
    ///
    /// # Errors
    /// * `ControlError::Configuration` if a slot is out of range, has an invalid weight,
    ///   or is claimed by more than one joint, or if a joint drives no slot
    pub fn topology(&self) -> Result<Topology, ControlError> {
        Topology::new(self.dof, self.joints.iter().map(|j| j.slots.clone()).collect())
    }

    /// Check everything that can be checked without a mechanical model
    pub fn validate(&self) -> Result<(), ControlError> {
        let fault = |msg: String| Err(ControlError::Configuration(msg));

        if !(self.dt_s.is_finite() && self.dt_s > 0.0) {
            return fault(format!("Control period must be finite and > 0, got {}", self.dt_s));
        }
        if self.joints.is_empty() {
            return fault("At least one joint must be configured".into());
        }

        let mut names = BTreeSet::new();
        let mut actuators = BTreeSet::new();
        for joint in self.joints.iter() {
            let name = &joint.name;
            if !names.insert(name.as_str()) {
                return fault(format!("Joint name `{name}` is duplicated"));
            }
            if !actuators.insert(joint.actuator.as_str()) {
                return fault(format!(
                    "Actuator `{}` is assigned to more than one joint",
                    joint.actuator
                ));
            }
            if !joint.reference.is_finite() {
                return fault(format!("Joint `{name}` has a non-finite reference angle"));
            }
            if !joint.gains.is_finite() {
                return fault(format!("Joint `{name}` has non-finite gains"));
            }
        }

        self.topology()?;

        Ok(())
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ControlError> {
        let content = fs::read_to_string(path)?;
        let config: ControllerConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ControlError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}
