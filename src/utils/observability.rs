use std::fs::create_dir_all;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;

use crate::LogConfig;
use crate::Result;
use crate::StorageError;

/// Installs the global tracing subscriber for one process.
///
/// Logs go to stdout, filtered by `RUST_LOG` (default `info`). With
/// `log_to_file` they are also written through a non-blocking appender to
/// `<log_dir>/<service>.log`; keep the returned guard alive until exit so
/// buffered lines are flushed.
pub fn init_observability(
    service: &str,
    log: &LogConfig,
) -> Result<Option<WorkerGuard>> {
    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_filter(env_filter());

    if !log.log_to_file {
        tracing_subscriber::registry().with(stdout_layer).init();
        return Ok(None);
    }

    create_dir_all(&log.log_dir).map_err(|source| StorageError::PathError {
        path: log.log_dir.clone(),
        source,
    })?;
    let appender = tracing_appender::rolling::never(Path::new(&log.log_dir), format!("{service}.log"));
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(non_blocking)
        .with_filter(env_filter());

    tracing_subscriber::registry().with(stdout_layer).with(file_layer).init();
    Ok(Some(guard))
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}
