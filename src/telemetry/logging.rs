//! Logging configuration and initialization
//!
//! Structured logging with tracing: a compact or JSON console layer plus an
//! optional non-blocking file layer.

use std::path::PathBuf;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*, Layer, Registry};
use tracing_appender::non_blocking::WorkerGuard;

/// Environment variable overriding the log filter
pub const LOG_ENV: &str = "IMMERSIVE_VIEWER_LOG";
/// Environment variable selecting the output format ("json")
pub const LOG_FORMAT_ENV: &str = "IMMERSIVE_VIEWER_LOG_FORMAT";
/// File used when file logging is on and no path is configured
const DEFAULT_LOG_FILE: &str = "immersive_viewer.log";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Enable console output (default: true)
    pub console_enabled: bool,
    /// Enable file logging (default: false)
    pub file_enabled: bool,
    /// Log file path (default: `immersive_viewer.log` in the working directory)
    pub file_path: Option<PathBuf>,
    /// Use JSON format for console logs (default: false)
    pub json_format: bool,
    /// Default log level filter (default: "info")
    pub default_level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            console_enabled: true,
            file_enabled: false,
            file_path: None,
            json_format: false,
            default_level: "info".to_string(),
        }
    }
}

/// Errors raised while installing the subscriber
#[derive(Debug, thiserror::Error)]
pub enum LogInitError {
    #[error("Cannot create log file {path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("A global subscriber is already installed: {0}")]
    AlreadyInitialized(#[from] tracing_subscriber::util::TryInitError),
}

/// Initialize the logging system with the given configuration
///
/// Returns a guard that must be kept alive for the duration of the program
/// so the file writer is flushed on exit.
///
/// # Environment Variables
///
/// - `IMMERSIVE_VIEWER_LOG`: Set log level filter (e.g., "debug", "info,immersive_viewer::video=trace")
/// - `IMMERSIVE_VIEWER_LOG_FORMAT`: Set to "json" for JSON console output
///
/// # Example
///
/// ```no_run
/// use immersive_viewer::telemetry::{init_logging, LogConfig};
///
/// let config = LogConfig::default();
/// let _guard = init_logging(&config).expect("Failed to initialize logging");
/// // Keep _guard alive for the program duration
/// ```
pub fn init_logging(config: &LogConfig) -> Result<Option<WorkerGuard>, LogInitError> {
    let env_filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_env("RUST_LOG"))
        .unwrap_or_else(|_| EnvFilter::new(&config.default_level));

    let use_json = json_requested(std::env::var(LOG_FORMAT_ENV).ok().as_deref(), config.json_format);

    let mut layers: Vec<BoxedLayer> = Vec::new();
    let mut file_guard: Option<WorkerGuard> = None;

    if config.console_enabled {
        layers.push(console_layer(use_json));
    }

    if config.file_enabled {
        let log_path = config.file_path.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE));
        let file = std::fs::File::create(&log_path).map_err(|source| LogInitError::File {
            path: log_path.clone(),
            source,
        })?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        file_guard = Some(guard);

        layers.push(
            fmt::layer()
                .with_writer(non_blocking)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_ansi(false)
                .boxed(),
        );

        eprintln!("Logging to file: {}", log_path.display());
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init()?;

    tracing::info!(
        target: "immersive_viewer",
        version = env!("CARGO_PKG_VERSION"),
        json_format = use_json,
        file_enabled = config.file_enabled,
        "Logging initialized"
    );

    Ok(file_guard)
}

fn console_layer(json: bool) -> BoxedLayer {
    if json {
        fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .compact()
            .boxed()
    }
}

/// Whether JSON output is selected, the environment value taking precedence
fn json_requested(env_value: Option<&str>, configured: bool) -> bool {
    env_value.map(|v| v.eq_ignore_ascii_case("json")).unwrap_or(configured)
}

// Re-export WorkerGuard so callers can store it
pub use tracing_appender::non_blocking::WorkerGuard as LogGuard;
