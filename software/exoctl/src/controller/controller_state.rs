//! Runtime state built by `init` and dropped by `terminate`

use std::collections::BTreeMap;

use tracing::warn;

use crate::calc::{JointErrorTracker, Topology, TorqueAllocator};
use crate::config::PidGains;

/// Report the first fault of each recorder, then every this-many after that
const FAULT_REPORT_INTERVAL: u64 = 1000;

/// Everything the controller needs between steps that is not configuration
pub(super) struct ControllerState {
    pub topology: Topology,
    pub gains: Vec<PidGains>,
    pub coordinates: Vec<String>,

    /// One per joint, persisted for the whole run
    pub trackers: Vec<JointErrorTracker>,

    pub allocator: TorqueAllocator,

    /// Names of recorders that initialized successfully
    pub active_recorders: Vec<String>,

    /// Swallowed telemetry faults per recorder
    pub recorder_faults: BTreeMap<String, u64>,
}

impl ControllerState {
    /// Count a telemetry fault without letting it reach the control path
    pub fn note_recorder_fault(&mut self, name: &str, msg: &str) {
        let count = self.recorder_faults.entry(name.to_owned()).or_insert(0);
        *count += 1;
        if *count == 1 || *count % FAULT_REPORT_INTERVAL == 0 {
            warn!("Recorder `{name}` failed ({count} faults so far): {msg}");
        }
    }

    pub fn telemetry_faults(&self) -> u64 {
        self.recorder_faults.values().sum()
    }
}
