//! Information about the current operation
//! that may be used by the controller's recorders.

use std::default::Default;
use std::path::PathBuf;
use std::time::SystemTime;

use chrono::{DateTime, Utc};

use serde::{Deserialize, Serialize};

/// Operation context shared with telemetry recorders
#[derive(Serialize, Deserialize, Clone, Debug)]
#[non_exhaustive]
pub struct ControllerCtx {
    /// A name for this controller op,
    /// which will be used as the name of each recorder's output file
    /// and must be compatible with that use.
    pub op_name: String,

    /// A directory to find file inputs and place outputs.
    pub op_dir: PathBuf,

    /// A last-resort escape hatch for sideloading
    /// (likely json-encoded) user context that is not yet implemented
    /// as a standalone field.
    pub user_ctx: Vec<String>,
}

impl ControllerCtx {
    pub fn new(op_name: impl Into<String>, op_dir: impl Into<PathBuf>) -> Self {
        Self {
            op_name: op_name.into(),
            op_dir: op_dir.into(),
            user_ctx: Vec::new(),
        }
    }
}

impl Default for ControllerCtx {
    fn default() -> Self {
        // Use current time with seconds as op name and use working directory as op dir,
        // replacing characters in the name that would be invalid on Windows.
        let op_name = DateTime::<Utc>::from(SystemTime::now())
            .to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
            .replace(":", "");
        Self {
            op_name,
            op_dir: std::fs::canonicalize("./").unwrap_or_default(),
            user_ctx: Vec::new(),
        }
    }
}
