//! Joint-space position control for multi-joint exoskeletons.
//!
//! Each step, per-joint PID outputs are spread over the kinematic chain as a desired
//! generalized acceleration, projected through the mass matrix, compensated for gravity
//! and Coriolis/centrifugal forces, and normalized into one control signal per actuator.

pub mod calc;
pub mod config;
pub mod context;
pub mod controller;
pub mod error;
pub mod logging;
pub mod recorder;
pub mod system;

pub use config::{ControllerConfig, DofWeight, JointConfig, PidGains};
pub use context::ControllerCtx;
pub use controller::{PositionController, StepOutput};
pub use error::ControlError;
pub use recorder::{CsvRecorder, DecimationRecorder, LatestRowRecorder, Recorder};
pub use system::{Actuation, ActuatorControls, MechanicalSystem, MockupSystem};
