use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::context::ControllerCtx;

use super::Recorder;

/// One recorded row with its column names
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct LatestRow {
    pub column_names: Vec<String>,
    pub values: Vec<f64>,
}

impl LatestRow {
    /// Look up a value by column name
    pub fn get(&self, column: &str) -> Option<f64> {
        self.column_names
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.values.get(i).copied())
    }
}

/// Cloneable handle for reading the latest row from another thread.
#[derive(Clone, Default)]
pub struct LatestRowHandle {
    inner: Arc<RwLock<Arc<LatestRow>>>,
}

impl LatestRowHandle {
    /// Clone the latest snapshot
    pub fn latest(&self) -> Arc<LatestRow> {
        match self.inner.read() {
            Ok(r) => Arc::clone(&*r),
            Err(poisoned) => {
                // Rows are swapped whole, so the stored one is still intact
                warn!("Latest row lock poisoned; returning the last stored row");
                Arc::clone(&*poisoned.into_inner())
            }
        }
    }

    fn store(&self, row: LatestRow) -> Result<(), String> {
        let mut w = self
            .inner
            .write()
            .map_err(|_| "Latest row lock poisoned".to_owned())?;
        *w = Arc::new(row);
        Ok(())
    }
}

/// Recorder that always keeps the latest row available via a shared handle.
#[derive(Serialize, Deserialize, Default)]
pub struct LatestRowRecorder {
    #[serde(skip)]
    handle: LatestRowHandle,

    #[serde(skip)]
    column_names: Vec<String>,
}

impl LatestRowRecorder {
    pub fn new() -> (Self, LatestRowHandle) {
        let recorder = Self::default();
        let handle = recorder.handle.clone();
        (recorder, handle)
    }

    /// Get another handle to this recorder's latest row
    pub fn handle(&self) -> LatestRowHandle {
        self.handle.clone()
    }
}

#[typetag::serde]
impl Recorder for LatestRowRecorder {
    fn init(&mut self, _ctx: &ControllerCtx, column_names: &[String]) -> Result<(), String> {
        self.column_names = column_names.to_vec();

        // Placeholder row with the right shape so readers can rely on it
        self.handle.store(LatestRow {
            column_names: self.column_names.clone(),
            values: vec![f64::NAN; column_names.len()],
        })
    }

    fn consume(&mut self, values: Vec<f64>) -> Result<(), String> {
        if values.len() != self.column_names.len() {
            return Err(format!(
                "Row has {} values for {} columns",
                values.len(),
                self.column_names.len()
            ));
        }
        self.handle.store(LatestRow {
            column_names: self.column_names.clone(),
            values,
        })
    }

    fn terminate(&mut self) -> Result<(), String> {
        self.column_names.clear();
        Ok(())
    }
}
