//! Software-defined mechanical model backed by fixed matrices.
//!
//! Stands in for a full multibody model when exercising the controller without a
//! simulation host. The mass matrix, gravity force, and velocity force are whatever
//! was last set; nothing is integrated.

use std::collections::BTreeMap;

use nalgebra::{DMatrix, DVector};

use super::MechanicalSystem;

#[derive(Clone, Debug)]
pub struct MockupSystem {
    mass_matrix: DMatrix<f64>,
    gravity: DVector<f64>,
    coriolis: DVector<f64>,
    coordinates: BTreeMap<String, f64>,
    rated_forces: BTreeMap<String, f64>,
    time_s: f64,
}

impl MockupSystem {
    /// A model with the given square mass matrix and zero gravity/velocity forces
    pub fn new(mass_matrix: DMatrix<f64>) -> Self {
        let dof = mass_matrix.nrows();
        assert!(mass_matrix.is_square(), "Mass matrix must be square");
        Self {
            mass_matrix,
            gravity: DVector::zeros(dof),
            coriolis: DVector::zeros(dof),
            coordinates: BTreeMap::new(),
            rated_forces: BTreeMap::new(),
            time_s: 0.0,
        }
    }

    /// Seven-slot leg-plus-exoskeleton chain with the reference coordinate and
    /// actuator names, all joints at zero, and 100 N*m rated actuators.
    pub fn reference_exoskeleton() -> Self {
        // Symmetric, diagonally dominant, with nearest-neighbor coupling
        let diag = [1.2, 0.8, 0.5, 0.2, 0.2, 0.8, 1.2];
        let mass_matrix = DMatrix::from_fn(7, 7, |i, j| match i.abs_diff(j) {
            0 => diag[i],
            1 => 0.05,
            _ => 0.0,
        });

        let mut system = Self::new(mass_matrix)
            .with_coordinate("exoHipJoint_coord", 0.0)
            .with_coordinate("kneeJoint_r_coord", 0.0)
            .with_coordinate("ankleJoint_r_coord", 0.0)
            .with_actuator("exoHipActuator_r", 100.0)
            .with_actuator("exoKneeActuator_r", 100.0)
            .with_actuator("exoAnkleActuator_r", 100.0);
        system.gravity = DVector::from_vec(vec![-4.1, -2.3, -1.1, -0.3, -0.3, -2.3, -4.1]);
        system.coriolis = DVector::from_vec(vec![0.02, 0.01, 0.005, 0.001, 0.001, 0.01, 0.02]);
        system
    }

    pub fn with_coordinate(mut self, name: &str, angle: f64) -> Self {
        self.coordinates.insert(name.to_owned(), angle);
        self
    }

    pub fn with_actuator(mut self, name: &str, rated_force: f64) -> Self {
        self.rated_forces.insert(name.to_owned(), rated_force);
        self
    }

    pub fn mass_matrix(&self) -> &DMatrix<f64> {
        &self.mass_matrix
    }

    pub fn gravity(&self) -> &DVector<f64> {
        &self.gravity
    }

    pub fn coriolis(&self) -> &DVector<f64> {
        &self.coriolis
    }

    /// Set the angle of an existing or new coordinate
    pub fn set_joint_angle(&mut self, name: &str, angle: f64) {
        self.coordinates.insert(name.to_owned(), angle);
    }

    /// Make a coordinate unavailable
    pub fn remove_coordinate(&mut self, name: &str) -> Option<f64> {
        self.coordinates.remove(name)
    }

    pub fn set_time(&mut self, time_s: f64) {
        self.time_s = time_s;
    }

    pub fn set_gravity(&mut self, gravity: DVector<f64>) {
        self.gravity = gravity;
    }

    pub fn set_coriolis(&mut self, coriolis: DVector<f64>) {
        self.coriolis = coriolis;
    }
}

impl MechanicalSystem for MockupSystem {
    fn dof(&self) -> usize {
        self.mass_matrix.nrows()
    }

    fn time(&self) -> f64 {
        self.time_s
    }

    fn joint_angle(&self, coordinate: &str) -> Result<f64, String> {
        self.coordinates
            .get(coordinate)
            .copied()
            .ok_or_else(|| format!("No coordinate named `{coordinate}`"))
    }

    fn multiply_by_mass_matrix(&self, acceleration: &DVector<f64>) -> Result<DVector<f64>, String> {
        if acceleration.len() != self.dof() {
            return Err(format!(
                "Acceleration has {} entries, model has {} DOF",
                acceleration.len(),
                self.dof()
            ));
        }
        Ok(&self.mass_matrix * acceleration)
    }

    fn gravity_generalized_force(&self) -> Result<DVector<f64>, String> {
        Ok(self.gravity.clone())
    }

    fn velocity_generalized_force(&self) -> Result<DVector<f64>, String> {
        Ok(self.coriolis.clone())
    }

    fn actuator_rated_force(&self, actuator: &str) -> Option<f64> {
        self.rated_forces.get(actuator).copied()
    }
}
