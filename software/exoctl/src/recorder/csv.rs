//! A plain-text CSV telemetry target with fixed-width row formatting.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use crossbeam::channel::{Sender, TrySendError, bounded};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::context::ControllerCtx;

use super::{Recorder, csv_header, csv_row_fixed_width};

/// Default number of rows that may be queued for the writer thread
pub const DEFAULT_BUFFER_ROWS: usize = 4096;

/// A plain-text CSV telemetry target written to `<op_dir>/<op_name>.csv`.
///
/// Each value in a row is formatted to the same width, so every line of a run
/// has the same length and a given step can be found by arithmetic on the file offset
/// rather than by reading the whole file.
///
/// Writes to disk on a separate thread to avoid blocking the control loop.
/// Rows are handed over through a bounded queue; if the writer falls behind and
/// the queue is full, the row is dropped and `consume` reports an error.
/// Once a write to disk has failed, every later row is refused the same way.
#[derive(Serialize, Deserialize)]
pub struct CsvRecorder {
    /// Capacity of the queue between the control loop and the writer thread
    buffer_rows: usize,

    #[serde(skip)]
    worker: Option<WorkerHandle>,
}

impl Default for CsvRecorder {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_ROWS)
    }
}

impl CsvRecorder {
    pub fn new(buffer_rows: usize) -> Self {
        Self {
            buffer_rows: buffer_rows.max(1),
            worker: None,
        }
    }

    /// Path of the file being written, if running
    pub fn path(&self) -> Option<&Path> {
        self.worker.as_ref().map(|w| w.path.as_path())
    }
}

#[typetag::serde]
impl Recorder for CsvRecorder {
    fn init(&mut self, ctx: &ControllerCtx, column_names: &[String]) -> Result<(), String> {
        // Shut down any existing worker so its file is complete
        self.terminate()?;

        let path = ctx.op_dir.join(format!("{}.csv", ctx.op_name));
        let header = csv_header(column_names);
        self.worker = Some(WorkerHandle::new(path, &header, self.buffer_rows)?);

        Ok(())
    }

    fn consume(&mut self, values: Vec<f64>) -> Result<(), String> {
        let worker = self
            .worker
            .as_ref()
            .ok_or("CsvRecorder must be initialized before consuming data")?;

        if worker.failed.load(Ordering::Relaxed) {
            return Err(format!("CSV writer failed on {:?}; row dropped", worker.path));
        }
        worker.tx.try_send(values).map_err(|e| match e {
            TrySendError::Full(_) => "CSV writer queue is full; row dropped".to_owned(),
            TrySendError::Disconnected(_) => "CSV writer thread has exited".to_owned(),
        })
    }

    fn terminate(&mut self) -> Result<(), String> {
        match self.worker.take() {
            Some(worker) => worker.join(),
            None => Ok(()),
        }
    }
}

struct WorkerHandle {
    tx: Sender<Vec<f64>>,
    thread: JoinHandle<Result<(), String>>,
    path: PathBuf,

    /// Set by the writer thread after its first failed write
    failed: Arc<AtomicBool>,
}

impl WorkerHandle {
    fn new(path: PathBuf, header: &str, capacity: usize) -> Result<Self, String> {
        let file = File::create(&path)
            .map_err(|e| format!("Failed to create CSV file {path:?}: {e}"))?;
        let mut writer = BufWriter::new(file);
        writer
            .write_all(header.as_bytes())
            .map_err(|e| format!("Failed to write CSV header to {path:?}: {e}"))?;

        let (tx, rx) = bounded::<Vec<f64>>(capacity);
        let thread_path = path.clone();
        let failed = Arc::new(AtomicBool::new(false));
        let thread_failed = Arc::clone(&failed);
        let thread = thread::Builder::new()
            .name("exoctl-csv".into())
            .spawn(move || {
                // Single-line buffer that keeps the largest line length seen,
                // so reallocations should happen rarely if ever
                let mut stringbuf = String::new();
                let mut failure: Option<String> = None;

                // Runs until every sender has been dropped
                for values in rx.iter() {
                    if failure.is_some() {
                        continue;
                    }
                    csv_row_fixed_width(&mut stringbuf, &values);
                    if let Err(e) = writer.write_all(stringbuf.as_bytes()) {
                        error!("CSV recorder failed writing to {thread_path:?}: {e}");
                        failure = Some(format!("Failed writing to {thread_path:?}: {e}"));
                        thread_failed.store(true, Ordering::Relaxed);
                    }
                }

                if let Err(e) = writer.flush() {
                    return Err(format!("Failed to flush {thread_path:?}: {e}"));
                }
                match failure {
                    Some(msg) => Err(msg),
                    None => Ok(()),
                }
            })
            .map_err(|e| format!("Failed to spawn CSV writer thread: {e}"))?;

        info!("Recording telemetry to {path:?}");

        Ok(Self {
            tx,
            thread,
            path,
            failed,
        })
    }

    /// Close the queue and wait for the writer to drain it
    fn join(self) -> Result<(), String> {
        let Self { tx, thread, .. } = self;
        drop(tx);
        thread
            .join()
            .map_err(|_| "CSV writer thread panicked".to_owned())?
    }
}
