//! Calculations that are run at each control step.
//!
//! The pipeline, leaf to root:
//! `pid` (per-joint error terms) → `acceleration` (spread over the chain via `topology`)
//! → `dynamics` (mass-matrix, gravity, and velocity-dependent torques)
//! → `allocation` (per-actuator normalized commands).

pub mod acceleration;
pub mod allocation;
pub mod dynamics;
pub mod pid;
pub mod topology;

pub use acceleration::{DesiredAcceleration, synthesize};
pub use allocation::{ActuatorCommand, MIN_RATED_FORCE, TorqueAllocator};
pub use dynamics::{JointTorques, TorqueVectors, compensate};
pub use pid::{JointErrorTracker, PidState, PidTerms, pid_terms};
pub use topology::Topology;
