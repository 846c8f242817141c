//! Shared tracing bootstrap for the binaries that depend on this crate with
//! the `tracing-init` feature (`cli`, `telegram-bot`): a rolling file appender
//! plus an `EnvFilter` read from `RUST_LOG` (default `info`).

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Initializes a global tracing subscriber that writes to a daily-rolling
/// file under `log_dir/<app_name>.log`. The returned `WorkerGuard` must be
/// kept alive for the process lifetime (drop it and the writer stops
/// flushing).
pub fn init_tracing(app_name: &str, log_dir: &Path) -> std::io::Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)?;
    let file_appender = tracing_appender::rolling::daily(log_dir, format!("{app_name}.log"));
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking)
        .with_ansi(false)
        .init();

    Ok(guard)
}
