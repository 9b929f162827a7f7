use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Default filter when `RUST_LOG` is unset. Targets of both crates start
/// with `taskpilot`.
const DEFAULT_FILTER: &str = "warn,taskpilot=info";

/// `~/.cache/taskpilot/logs` or the platform equivalent.
pub fn default_log_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("taskpilot")
        .join("logs")
}

/// Route diagnostics to a daily rolling file. The terminal belongs to the
/// UI, so nothing is written to stdout or stderr.
///
/// Keep the returned guard alive until exit or buffered lines are lost.
pub fn init_tracing(log_dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("failed to create log directory {}", log_dir.display()))?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let file_appender = tracing_appender::rolling::daily(log_dir, "taskpilot.log");
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(true)
        .with_level(true)
        .with_ansi(false);

    // try_init so a second call (tests) does not panic
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .try_init();

    Ok(guard)
}
