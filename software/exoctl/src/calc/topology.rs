//! Mapping between controlled joints and generalized-coordinate slots.
//!
//! A joint may span several slots of the kinematic chain (a mirrored pair, or a
//! coupled DOF driven by the same joint). The same table is used in both directions:
//! `spread` takes per-joint values onto the chain, and `gather` takes per-slot values
//! back to per-joint sums, so allocation is the transpose of synthesis.

use std::collections::BTreeSet;

use nalgebra::{DMatrix, DVector};

use crate::ControlError;
use crate::config::DofWeight;

#[derive(Clone, Debug, PartialEq)]
pub struct Topology {
    dof: usize,
    joints: Vec<Vec<DofWeight>>,
}

impl Topology {
    /// Build and check a table of `joints[j] = [(slot, weight), ...]`.
    ///
    /// Every slot index must be inside the chain, every weight finite and non-zero,
    /// and no slot may be driven by more than one joint.
    pub fn new(dof: usize, joints: Vec<Vec<DofWeight>>) -> Result<Self, ControlError> {
        let mut claimed = BTreeSet::new();
        for (j, slots) in joints.iter().enumerate() {
            if slots.is_empty() {
                return Err(ControlError::Configuration(format!(
                    "Joint {j} does not drive any slot"
                )));
            }
            for slot in slots {
                if slot.index >= dof {
                    return Err(ControlError::Configuration(format!(
                        "Joint {j} maps to slot {} but the chain has {dof} DOF",
                        slot.index
                    )));
                }
                if !(slot.weight.is_finite() && slot.weight != 0.0) {
                    return Err(ControlError::Configuration(format!(
                        "Joint {j} has invalid weight {} on slot {}",
                        slot.weight, slot.index
                    )));
                }
                if !claimed.insert(slot.index) {
                    return Err(ControlError::Configuration(format!(
                        "Slot {} is driven by more than one joint",
                        slot.index
                    )));
                }
            }
        }

        Ok(Self { dof, joints })
    }

    pub fn dof(&self) -> usize {
        self.dof
    }

    pub fn n_joints(&self) -> usize {
        self.joints.len()
    }

    pub fn slots(&self, joint: usize) -> &[DofWeight] {
        &self.joints[joint]
    }

    /// Per-joint values onto the chain. Slots not driven by any joint are zero.
    pub fn spread(&self, joint_values: &[f64]) -> DVector<f64> {
        debug_assert_eq!(joint_values.len(), self.joints.len());
        let mut out = DVector::zeros(self.dof);
        for (slots, &value) in self.joints.iter().zip(joint_values) {
            for slot in slots {
                out[slot.index] = slot.weight * value;
            }
        }
        out
    }

    /// Weighted per-joint sums of slot values
    pub fn gather(&self, slot_values: &DVector<f64>) -> Vec<f64> {
        debug_assert_eq!(slot_values.len(), self.dof);
        self.joints
            .iter()
            .map(|slots| {
                slots
                    .iter()
                    .map(|slot| slot.weight * slot_values[slot.index])
                    .sum()
            })
            .collect()
    }

    /// The `dof x n_joints` matrix `B` with `spread(u) = B u` and `gather(v) = B^T v`
    pub fn matrix(&self) -> DMatrix<f64> {
        let mut b = DMatrix::zeros(self.dof, self.joints.len());
        for (j, slots) in self.joints.iter().enumerate() {
            for slot in slots {
                b[(slot.index, j)] = slot.weight;
            }
        }
        b
    }
}
