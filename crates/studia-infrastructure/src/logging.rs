//! Tracing subscriber setup.

use studia_core::config::LoggingConfig;
use studia_core::error::{Result, StudiaError};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::paths::StudiaPaths;

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` overrides `config.level`. When `file_output` is set, events
/// are also written to a daily rolling file in the logs directory; the
/// returned guard must be kept alive for the file writer to flush.
pub fn init_logging(config: &LoggingConfig, paths: &StudiaPaths) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| StudiaError::config(format!("invalid log level '{}': {}", config.level, e)))?;

    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    if config.file_output {
        let logs_dir = paths
            .logs_dir()
            .map_err(|e| StudiaError::config(e.to_string()))?;
        std::fs::create_dir_all(&logs_dir)?;

        let appender = tracing_appender::rolling::daily(&logs_dir, "studia.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let file_layer = fmt::layer().with_writer(writer).with_ansi(false);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .try_init()
            .map_err(|e| StudiaError::internal(e.to_string()))?;

        tracing::info!("[Logging] Writing logs to {:?}", logs_dir);
        return Ok(Some(guard));
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .try_init()
        .map_err(|e| StudiaError::internal(e.to_string()))?;

    Ok(None)
}
