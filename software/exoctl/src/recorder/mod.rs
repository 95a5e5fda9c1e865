//! Recorders receive per-step diagnostic rows from the controller
//! for offline analysis or live inspection.
//!
//! Recording is best-effort. A recorder error never reaches the control path;
//! the controller counts it and moves on.

use serde::{Deserialize, Serialize};

mod csv;
pub use csv::CsvRecorder;
mod decimation;
pub use decimation::DecimationRecorder;
mod latest;
pub use latest::{LatestRow, LatestRowHandle, LatestRowRecorder};

use crate::context::ControllerCtx;

/// A telemetry plugin that receives diagnostic rows from the controller
/// one step at a time.
#[typetag::serde(tag = "type")]
pub trait Recorder: Send + Sync {
    /// Set up the recorder at the start of a run
    fn init(&mut self, ctx: &ControllerCtx, column_names: &[String]) -> Result<(), String>;

    /// Ingest one row, ordered like the column names given at init.
    ///
    /// Must not block on I/O.
    fn consume(&mut self, values: Vec<f64>) -> Result<(), String>;

    /// Flush, shut down, and reset internal state for the next run
    fn terminate(&mut self) -> Result<(), String>;
}

/// Which per-joint quantity a block of columns holds
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Column {
    Error,
    Position,
    Dynamics,
    Coriolis,
    Gravity,
}

impl Column {
    /// Block order within a row
    pub const ALL: [Column; 5] = [
        Column::Error,
        Column::Position,
        Column::Dynamics,
        Column::Coriolis,
        Column::Gravity,
    ];

    fn suffix(&self) -> &'static str {
        match self {
            Column::Error => "error",
            Column::Position => "position",
            Column::Dynamics => "dynamics",
            Column::Coriolis => "coriolis",
            Column::Gravity => "gravity",
        }
    }
}

/// Name of the trailing simulation-time column
pub const TIME_COLUMN: &str = "time";

/// Column names for a row: one block per quantity with one entry per joint,
/// then the simulation time. Three joints give 16 columns.
pub fn column_names(joint_names: &[String]) -> Vec<String> {
    let mut names = Vec::with_capacity(Column::ALL.len() * joint_names.len() + 1);
    for column in Column::ALL {
        for joint in joint_names {
            names.push(format!("{joint}.{}", column.suffix()));
        }
    }
    names.push(TIME_COLUMN.to_owned());
    names
}

/// Generate CSV header row given some column names
pub fn csv_header(column_names: &[String]) -> String {
    let mut header = column_names.join(",");
    header.push('\n');
    header
}

/// Format a CSV row in which every value has the same width
pub fn csv_row_fixed_width(stringbuf: &mut String, values: &[f64]) {
    stringbuf.clear();
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            stringbuf.push(',');
        }
        stringbuf.push_str(&fmt_f64(*v));
    }
    stringbuf.push('\n');
}

/// Fixed-width scientific formatting of float values,
/// with explicit sign on both mantissa and a zero-padded exponent
pub fn fmt_f64(num: f64) -> String {
    let precision = 17;
    let exp_digits = 3;
    let width = precision + exp_digits + 5;

    let sign = if num.is_sign_positive() { "+" } else { "" };
    let sci = format!("{sign}{num:.precision$e}");

    // Infinities and NaN have no exponent to pad
    let Some((mantissa, exp)) = sci.split_once('e') else {
        return format!("{sci:>width$}");
    };
    let (exp_sign, exp_value) = match exp.strip_prefix('-') {
        Some(rest) => ('-', rest),
        None => ('+', exp),
    };

    format!("{:>width$}", format!("{mantissa}e{exp_sign}{exp_value:0>exp_digits$}"))
}
