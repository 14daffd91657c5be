//! Logging setup for applications embedding lsmdb
//!
//! The engine reports through `tracing`: opens, closes and checkpoints at
//! `info`, flushes, merges and recovery at `debug`, dropped log groups at
//! `warn`. This module installs a subscriber for them, writing to stdout,
//! a daily-rolling file, or both.

use lsmdb_core::{Error, Result};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log output destination
#[derive(Debug, Clone)]
pub enum LogOutput {
    /// Output to stdout
    Stdout,
    /// Output to a file with daily rotation
    File(PathBuf),
    /// Output to both stdout and file
    Both(PathBuf),
}

/// Log format style
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, human-readable
    Pretty,
    /// Single-line
    Compact,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Filter directive, e.g. `info` or `lsmdb_storage=debug`.
    /// `RUST_LOG` takes precedence when set.
    pub level: String,
    pub output: LogOutput,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            output: LogOutput::Stdout,
            format: LogFormat::Compact,
        }
    }
}

impl LogConfig {
    pub fn info() -> Self {
        Self::default()
    }

    pub fn debug() -> Self {
        Self::default().with_level("debug")
    }

    pub fn warn() -> Self {
        Self::default().with_level("warn")
    }

    /// Set log output to file with rotation
    pub fn with_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.output = LogOutput::File(path.into());
        self
    }

    /// Set log output to both stdout and file
    pub fn with_both<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.output = LogOutput::Both(path.into());
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level<S: Into<String>>(mut self, level: S) -> Self {
        self.level = level.into();
        self
    }

    fn filter(&self) -> Result<EnvFilter> {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.level))
            .map_err(|e| Error::Config(format!("invalid log filter '{}': {}", self.level, e)))
    }

    /// Installs the global subscriber.
    ///
    /// File output returns a guard that must stay alive for buffered lines
    /// to be written. A bad filter or a second initialization is reported
    /// as [`Error::Config`].
    ///
    /// ```rust,no_run
    /// use lsmdb::logging::LogConfig;
    ///
    /// let _guard = LogConfig::debug().with_file("logs/lsmdb.log").init()?;
    /// # Ok::<(), lsmdb::Error>(())
    /// ```
    pub fn init(self) -> Result<Option<WorkerGuard>> {
        let filter = self.filter()?;
        let already = |e: tracing_subscriber::util::TryInitError| {
            Error::Config(format!("logging already initialized: {}", e))
        };
        let pretty = self.format == LogFormat::Pretty;

        match self.output {
            LogOutput::Stdout => {
                let registry = tracing_subscriber::registry().with(filter);
                if pretty {
                    registry.with(fmt::layer().pretty()).try_init()
                } else {
                    registry.with(fmt::layer().compact()).try_init()
                }
                .map_err(already)?;
                Ok(None)
            }
            LogOutput::File(path) => {
                let (writer, guard) = tracing_appender::non_blocking(rolling_file(&path));
                let registry = tracing_subscriber::registry().with(filter);
                if pretty {
                    registry
                        .with(fmt::layer().with_writer(writer).with_ansi(false).pretty())
                        .try_init()
                } else {
                    registry
                        .with(fmt::layer().with_writer(writer).with_ansi(false).compact())
                        .try_init()
                }
                .map_err(already)?;
                Ok(Some(guard))
            }
            LogOutput::Both(path) => {
                let (writer, guard) = tracing_appender::non_blocking(rolling_file(&path));
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().compact())
                    .with(fmt::layer().with_writer(writer).with_ansi(false).compact())
                    .try_init()
                    .map_err(already)?;
                Ok(Some(guard))
            }
        }
    }
}

fn rolling_file(path: &Path) -> tracing_appender::rolling::RollingFileAppender {
    tracing_appender::rolling::daily(
        path.parent().unwrap_or_else(|| Path::new(".")),
        path.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("lsmdb.log"),
    )
}
