//! Inverse-dynamics and compensation torques from the mechanical model.
//!
//! All three queries take `&S`, so the model cannot be advanced between them
//! and they observe the same state snapshot.

use nalgebra::DVector;

use super::Topology;
use crate::ControlError;
use crate::system::MechanicalSystem;

/// Torques for one step, one entry per generalized-coordinate slot
#[derive(Clone, Debug, PartialEq)]
pub struct TorqueVectors {
    /// `M(q) * a_des`
    pub dynamics: DVector<f64>,

    /// Generalized force equivalent of gravity on every body
    pub gravity: DVector<f64>,

    /// Velocity-dependent (Coriolis/centrifugal) generalized force
    pub coriolis: DVector<f64>,
}

impl TorqueVectors {
    /// `dynamics + coriolis - gravity` for each slot
    pub fn net(&self) -> DVector<f64> {
        &self.dynamics + &self.coriolis - &self.gravity
    }

    /// Sum each component over the slots of each joint
    pub fn per_joint(&self, topology: &Topology) -> JointTorques {
        JointTorques {
            dynamics: topology.gather(&self.dynamics),
            coriolis: topology.gather(&self.coriolis),
            gravity: topology.gather(&self.gravity),
        }
    }
}

/// Torque components reduced to one value per joint
#[derive(Clone, Debug, Default, PartialEq)]
pub struct JointTorques {
    pub dynamics: Vec<f64>,
    pub coriolis: Vec<f64>,
    pub gravity: Vec<f64>,
}

/// Query the model for the torque needed to realize `acceleration`
/// and for the gravity and velocity-dependent forces at the current state.
///
/// # Errors
/// * `ControlError::StateQuery` if a query fails, or returns a vector of the wrong
///   length or with non-finite entries
pub fn compensate<S: MechanicalSystem + ?Sized>(
    system: &S,
    acceleration: &DVector<f64>,
) -> Result<TorqueVectors, ControlError> {
    let dof = acceleration.len();

    const MASS: &str = "mass matrix multiply";
    const GRAVITY: &str = "gravity generalized force";
    const VELOCITY: &str = "velocity generalized force";

    let dynamics = system
        .multiply_by_mass_matrix(acceleration)
        .map_err(|e| ControlError::state_query(MASS, e))?;
    let gravity = system
        .gravity_generalized_force()
        .map_err(|e| ControlError::state_query(GRAVITY, e))?;
    let coriolis = system
        .velocity_generalized_force()
        .map_err(|e| ControlError::state_query(VELOCITY, e))?;

    Ok(TorqueVectors {
        dynamics: checked(MASS, dynamics, dof)?,
        gravity: checked(GRAVITY, gravity, dof)?,
        coriolis: checked(VELOCITY, coriolis, dof)?,
    })
}

fn checked(
    query: &'static str,
    v: DVector<f64>,
    dof: usize,
) -> Result<DVector<f64>, ControlError> {
    if v.len() != dof {
        return Err(ControlError::state_query(
            query,
            format!("returned {} entries, expected {dof}", v.len()),
        ));
    }
    if let Some(i) = v.iter().position(|x| !x.is_finite()) {
        return Err(ControlError::state_query(
            query,
            format!("returned non-finite value {} in slot {i}", v[i]),
        ));
    }
    Ok(v)
}
