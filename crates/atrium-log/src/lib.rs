//! Structured logging for the Atrium server.
//!
//! Installs a `tracing` subscriber with console output (uptime timestamps,
//! module paths, thread names) and, optionally, a JSON file layer for
//! post-mortem analysis. The filter honours `RUST_LOG` first, then the
//! configured level.

use std::fs::File;
use std::path::{Path, PathBuf};

use atrium_config::Config;
use tracing::Subscriber;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "info";
const LOG_FILE: &str = "atrium.log";

/// Initialize the tracing subscriber.
///
/// * `log_dir` - Directory for the JSON log file; ignored unless `json_file` is set
/// * `json_file` - Also write JSON records to `<log_dir>/atrium.log`
/// * `config` - Optional configuration supplying the level directive
///
/// # Examples
///
/// ```no_run
/// use atrium_config::Config;
/// use atrium_log::init_logging;
///
/// let config = Config::default();
/// init_logging(None, false, Some(&config));
/// ```
pub fn init_logging(log_dir: Option<&Path>, json_file: bool, config: Option<&Config>) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(config)));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(true) // I/O workers are named
        .with_level(true)
        .with_timer(fmt::time::uptime());

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    if json_file
        && let Some(log_dir) = log_dir
        && std::fs::create_dir_all(log_dir).is_ok()
        && let Ok(log_file) = File::create(log_file_path(log_dir))
    {
        subscriber.with(json_layer(log_file)).init();
        return;
    }

    subscriber.init();
}

/// One JSON object per event, written to `file`.
fn json_layer<S>(file: File) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(file)
        .with_ansi(false)
        .with_target(true)
        .with_timer(fmt::time::uptime())
        .json()
}

/// Initialize logging from a loaded [`Config`], using its `log` section.
pub fn init_from_config(config: &Config) {
    init_logging(
        config.log.directory.as_deref(),
        config.log.json_file,
        Some(config),
    );
}

/// The filter directive to use when `RUST_LOG` is unset.
pub fn filter_directive(config: Option<&Config>) -> String {
    match config {
        Some(config) if !config.log.level.trim().is_empty() => config.log.level.clone(),
        _ => DEFAULT_FILTER.to_string(),
    }
}

/// Path of the JSON log file inside `log_dir`.
pub fn log_file_path(log_dir: &Path) -> PathBuf {
    log_dir.join(LOG_FILE)
}

/// Create an `EnvFilter` with the default filter string.
pub fn default_env_filter() -> EnvFilter {
    EnvFilter::new(DEFAULT_FILTER)
}
