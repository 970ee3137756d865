//! Tracing subscriber setup: stderr output plus an optional log file.

use std::{fs, path::Path};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

use crate::config::{LogFormat, LoggingConfig};

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TelemetryError {
    /// `LOG_LEVEL` is not a valid filter directive.
    #[error("invalid log level {level:?}: {reason}")]
    InvalidLevel { level: String, reason: String },

    /// The log file directory could not be created.
    #[error("cannot create log directory {path}: {source}")]
    LogDir {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A global subscriber was already installed.
    #[error("tracing subscriber already initialized: {0}")]
    AlreadyInitialized(String),
}

/// Keeps the non-blocking file writer flushing until dropped.
#[must_use = "dropping the guard stops file logging"]
pub struct TelemetryGuard {
    _file: Option<WorkerGuard>,
}

/// Install the global subscriber.
///
/// `RUST_LOG` overrides `config.level` when set. When `file_logging` is on,
/// records are also appended to `config.file_path`.
///
/// # Errors
/// Returns [`TelemetryError`] if the level is invalid, the log directory cannot
/// be created, or a subscriber is already installed.
pub fn init(config: &LoggingConfig, file_logging: bool) -> Result<TelemetryGuard, TelemetryError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level).map_err(|e| TelemetryError::InvalidLevel {
            level: config.level.clone(),
            reason: e.to_string(),
        })?,
    };

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    layers.push(stderr_layer(config.format));

    let mut file_guard = None;
    if file_logging {
        let (layer, guard) = file_layer(&config.file_path, config.format)?;
        layers.push(layer);
        file_guard = Some(guard);
    }
    layers.push(Box::new(filter));

    Registry::default()
        .with(layers)
        .try_init()
        .map_err(|e| TelemetryError::AlreadyInitialized(e.to_string()))?;

    Ok(TelemetryGuard { _file: file_guard })
}

fn stderr_layer(format: LogFormat) -> Box<dyn Layer<Registry> + Send + Sync> {
    match format {
        LogFormat::Compact => Box::new(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(std::io::stderr)
                .with_target(true),
        ),
        LogFormat::Json => Box::new(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_target(true),
        ),
    }
}

fn file_layer(
    path: &Path,
    format: LogFormat,
) -> Result<(Box<dyn Layer<Registry> + Send + Sync>, WorkerGuard), TelemetryError> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    fs::create_dir_all(dir).map_err(|source| TelemetryError::LogDir {
        path: dir.display().to_string(),
        source,
    })?;
    let file_name = path.file_name().map_or_else(|| "app.log".into(), ToOwned::to_owned);

    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let layer: Box<dyn Layer<Registry> + Send + Sync> = match format {
        LogFormat::Compact => Box::new(
            tracing_subscriber::fmt::layer().compact().with_ansi(false).with_writer(writer),
        ),
        LogFormat::Json => Box::new(tracing_subscriber::fmt::layer().json().with_writer(writer)),
    };
    Ok((layer, guard))
}
