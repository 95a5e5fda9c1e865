//! Terminal and per-run file logging through a global `tracing` subscriber.

use std::{
    fs::{self, File, OpenOptions},
    path::{Path, PathBuf},
    sync::{Mutex, OnceLock},
};

use tracing::info;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{
    EnvFilter, Registry, fmt, layer::SubscriberExt, reload, util::SubscriberInitExt,
};

use crate::context::ControllerCtx;

/// Filter used when `RUST_LOG` is unset or invalid
const DEFAULT_FILTER: &str = "info";

type RunFileLayer = fmt::Layer<
    Registry,
    fmt::format::DefaultFields,
    fmt::format::Format<fmt::format::Full, fmt::time::ChronoUtc>,
    NonBlocking,
>;

static LOG_TARGETS: OnceLock<LogTargets> = OnceLock::new();

/// Writer threads behind the installed subscriber.
/// They flush when dropped, so they live for the rest of the process.
struct LogTargets {
    _stdout: Mutex<WorkerGuard>,
    run_file: Mutex<WorkerGuard>,

    /// Swaps the file layer when a new run starts
    run_file_reload: reload::Handle<RunFileLayer, Registry>,
}

impl LogTargets {
    fn switch_run_file(&self, logfile: File) -> Result<(), String> {
        let (writer, new_guard) = tracing_appender::non_blocking(logfile);

        let mut guard = self
            .run_file
            .lock()
            .map_err(|_| "Run log guard lock poisoned".to_owned())?;
        self.run_file_reload
            .modify(|layer| *layer = run_file_layer(writer))
            .map_err(|e| format!("Failed to switch run log file: {e}"))?;

        // Dropping the old guard flushes the previous run's file
        *guard = new_guard;
        Ok(())
    }
}

fn run_file_layer(writer: NonBlocking) -> RunFileLayer {
    fmt::layer::<Registry>()
        .with_timer(fmt::time::ChronoUtc::rfc_3339())
        .with_writer(writer)
        .with_ansi(false)
}

/// Path of the log file for a run: `<op_dir>/logs/<op_name>.log`
pub fn log_path(op_dir: &Path, op_name: &str) -> PathBuf {
    op_dir.join("logs").join(format!("{op_name}.log"))
}

/// Log to the terminal and to `<op_dir>/logs/<op_name>.log`.
///
/// The level filter comes from `RUST_LOG`, defaulting to `info`.
/// The first call installs the global subscriber; later calls point the
/// file output at the new run and leave the terminal output alone.
/// Existing log files are appended to.
pub fn init_logging(op_dir: &Path, op_name: &str) -> Result<PathBuf, String> {
    let path = log_path(op_dir, op_name);
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .map_err(|e| format!("Failed to create log directory {dir:?}: {e}"))?;
    }
    let logfile = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| format!("Failed to open log file {path:?}: {e}"))?;

    if let Some(targets) = LOG_TARGETS.get() {
        targets.switch_run_file(logfile)?;
        info!("Logging to {path:?}");
        return Ok(path);
    }

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))
        .map_err(|e| format!("Failed to build log filter: {e}"))?;

    let (stdout_writer, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    let stdout_layer = fmt::layer()
        .with_timer(fmt::time::ChronoUtc::rfc_3339())
        .with_writer(stdout_writer)
        .with_target(false);

    let (file_writer, file_guard) = tracing_appender::non_blocking(logfile);
    let (file_layer, run_file_reload) = reload::Layer::new(run_file_layer(file_writer));

    tracing_subscriber::registry()
        .with(file_layer)
        .with(filter)
        .with(stdout_layer)
        .try_init()
        .map_err(|e| format!("Failed to install log subscriber: {e}"))?;

    let _ = LOG_TARGETS.set(LogTargets {
        _stdout: Mutex::new(stdout_guard),
        run_file: Mutex::new(file_guard),
        run_file_reload,
    });
    info!("Logging to {path:?}");

    Ok(path)
}

/// `init_logging` for the run a context describes
pub fn init_run_logging(ctx: &ControllerCtx) -> Result<PathBuf, String> {
    init_logging(&ctx.op_dir, &ctx.op_name)
}
