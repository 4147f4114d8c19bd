//! Tracing subscriber setup.
//!
//! Console output is always enabled. When a log directory is configured, a
//! daily-rolling file layer is added through `tracing-appender`.

use std::path::PathBuf;

use chrono::Local;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::Writer, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// File name prefix for rolled log files.
pub const LOG_FILE_PREFIX: &str = "servicemesh-api.log";

/// Timer that renders timestamps in the server's local timezone.
#[derive(Debug, Clone, Copy)]
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = Local::now();
        write!(w, "{}", now.format("%Y-%m-%dT%H:%M:%S%.3f%:z"))
    }
}

/// Default filter directive for a `LOG_LEVEL` value.
///
/// sqlx statement logging stays at `warn` unless the level is `trace`.
pub fn default_filter(level: &str) -> String {
    let sqlx_level = if level.eq_ignore_ascii_case("trace") {
        "trace"
    } else {
        "warn"
    };
    format!(
        "servicemesh_api={level},tower_http={level},sqlx={sqlx_level},reqwest=warn,hyper=warn"
    )
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `level`. Keep the returned guard alive for the
/// lifetime of the process so buffered file output is flushed.
pub fn init_logging(level: &str, log_dir: Option<&str>) -> crate::Result<Option<WorkerGuard>> {
    let filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_filter(level)))
            .map_err(|e| crate::Error::config(format!("Invalid log level '{}': {}", level, e)))?;

    let console = fmt::layer().with_ansi(true).with_timer(LocalTimer);

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let path = PathBuf::from(dir);
            std::fs::create_dir_all(&path)?;
            let appender = tracing_appender::rolling::daily(&path, LOG_FILE_PREFIX);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_timer(LocalTimer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .try_init()
        .map_err(|e| {
            crate::Error::Other(format!("Failed to set global default subscriber: {}", e))
        })?;

    Ok(guard)
}
