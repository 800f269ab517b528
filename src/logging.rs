//! Structured logging for jockey.
//!
//! Reconciliation passes log share transitions, mount attempts and helper
//! failures through `tracing`. Output goes to stderr by verbosity and,
//! optionally, to a log file that always records debug detail so a
//! long-running `jockey run` can be diagnosed after the fact.

use std::path::Path;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

/// Log verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Warnings and errors only
    #[default]
    Quiet,
    /// Normal logging (info level)
    Normal,
    /// Verbose logging (debug level)
    Verbose,
    /// Very verbose logging (trace level)
    Trace,
}

impl Verbosity {
    /// Get the tracing level filter for this verbosity.
    pub fn as_level_filter(&self) -> LevelFilter {
        match self {
            Verbosity::Quiet => LevelFilter::WARN,
            Verbosity::Normal => LevelFilter::INFO,
            Verbosity::Verbose => LevelFilter::DEBUG,
            Verbosity::Trace => LevelFilter::TRACE,
        }
    }

    /// Get the tracing level for this verbosity.
    pub fn as_level(&self) -> Level {
        match self {
            Verbosity::Quiet => Level::WARN,
            Verbosity::Normal => Level::INFO,
            Verbosity::Verbose => Level::DEBUG,
            Verbosity::Trace => Level::TRACE,
        }
    }
}

impl From<u8> for Verbosity {
    /// Map a `-v` count onto a verbosity level.
    fn from(count: u8) -> Self {
        match count {
            0 => Verbosity::Quiet,
            1 => Verbosity::Normal,
            2 => Verbosity::Verbose,
            _ => Verbosity::Trace,
        }
    }
}

/// Configuration for the logging system.
#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    /// Verbosity level for stderr output.
    pub verbosity: Verbosity,
    /// Optional path to log file.
    pub log_file: Option<String>,
}

/// Guard that must be kept alive for the duration of logging.
///
/// When this guard is dropped, the logging system will flush pending logs.
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

impl LogGuard {
    fn new(file_guard: Option<WorkerGuard>) -> Self {
        Self {
            _file_guard: file_guard,
        }
    }
}

/// Split a log file path into the directory the appender writes to and the
/// file name inside it.
fn split_log_path(log_file: &str) -> (&Path, &str) {
    let path = Path::new(log_file);
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("jockey.log");
    (dir, name)
}

/// Install the global subscriber.
///
/// Keep the returned guard alive until exit, otherwise buffered file output
/// is lost. `RUST_LOG` overrides the verbosity-derived default directive.
pub fn init_logging(config: &LogConfig) -> LogGuard {
    // The file records debug detail, so the global filter must let it through
    let default_level = if config.log_file.is_some() {
        config.verbosity.as_level_filter().max(LevelFilter::DEBUG)
    } else {
        config.verbosity.as_level_filter()
    };
    let env_filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    let mut file_guard = None;
    let file_layer = config.log_file.as_deref().map(|log_file| {
        let (dir, name) = split_log_path(log_file);
        let (writer, guard) =
            tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
        file_guard = Some(guard);

        fmt::layer()
            .with_ansi(false)
            .with_target(true)
            .with_timer(fmt::time::uptime())
            .with_writer(writer)
            .with_filter(LevelFilter::DEBUG)
    });

    let stderr_layer = fmt::layer()
        .with_target(false)
        .with_timer(fmt::time::uptime())
        .with_writer(std::io::stderr)
        .with_filter(config.verbosity.as_level_filter());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    LogGuard::new(file_guard)
}
