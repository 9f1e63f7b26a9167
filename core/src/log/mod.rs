//! Tracing setup for the slicer.
//!
//! Events go to stderr and to a rolling file under the per-user data directory. [`init`] installs
//! the subscriber once; later calls return the handle of the first installation.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::SystemTime;

use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use tracing_appender::rolling::Rotation;
use tracing_log::AsLog;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, util::SubscriberInitExt};

use crate::config::{APP_NAME, APP_ORGANISATION, APP_QUALIFIER};

/// Filter directives are read from the first of these that is set.
pub const FILTER_ENV_VARS: [&str; 2] = ["SHOTSLICE_LOG", "RUST_LOG"];

static LOG_HANDLE: OnceLock<LogHandle> = OnceLock::new();

pub use tracing_subscriber::filter::LevelFilter as LogLevel;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum LogRolling {
    Hourly,
    Daily,
    Never,
}

impl From<LogRolling> for Rotation {
    fn from(value: LogRolling) -> Self {
        match value {
            LogRolling::Hourly => Rotation::HOURLY,
            LogRolling::Daily => Rotation::DAILY,
            LogRolling::Never => Rotation::NEVER,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub directory: PathBuf,
    /// Log files are named `<prefix>.<date>.log`.
    pub file_prefix: String,
    /// Rolled files to keep; `None` keeps everything.
    pub retention: Option<usize>,
    pub file_level: LogLevel,
    pub console_level: LogLevel,
    /// Forward records of the `log` crate (emitted by dependencies) into tracing.
    pub capture_log: bool,
    pub env_filter: Option<String>,
    pub rolling: LogRolling,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            directory: default_log_directory(),
            file_prefix: APP_NAME.to_string(),
            retention: Some(7),
            file_level: LogLevel::DEBUG,
            console_level: LogLevel::WARN,
            capture_log: true,
            env_filter: filter_from_env(),
            rolling: LogRolling::Daily,
        }
    }
}

impl LogConfig {
    pub fn with_directory<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.directory = path.into();
        self
    }

    pub fn with_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.file_prefix = prefix.into();
        self
    }

    /// Console verbosity from a `-v` count: 0 warn, 1 info, 2 debug, 3+ trace.
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.console_level = match verbosity {
            0 => LogLevel::WARN,
            1 => LogLevel::INFO,
            2 => LogLevel::DEBUG,
            _ => LogLevel::TRACE,
        };
        self
    }
}

/// Keeps the file writer flushing until dropped at process exit.
#[derive(Debug)]
pub struct LogHandle {
    _guard: tracing_appender::non_blocking::WorkerGuard,
    directory: PathBuf,
    file_prefix: String,
}

impl LogHandle {
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn file_prefix(&self) -> &str {
        &self.file_prefix
    }
}

pub fn init(config: LogConfig) -> Result<&'static LogHandle> {
    if let Some(handle) = LOG_HANDLE.get() {
        return Ok(handle);
    }

    let handle = setup(config)?;
    // A concurrent initialiser may have won; either way a handle is installed now.
    let _ = LOG_HANDLE.set(handle);
    LOG_HANDLE.get().ok_or_else(|| anyhow!("log handle missing after initialisation"))
}

fn setup(config: LogConfig) -> Result<LogHandle> {
    if config.capture_log {
        let max = config.file_level.max(config.console_level);
        let _ = tracing_log::LogTracer::builder().with_max_level(to_log_level(max)).init();
    }

    fs::create_dir_all(&config.directory)
        .with_context(|| format!("creating log directory {}", config.directory.display()))?;

    if let Some(retention) = config.retention.filter(|keep| *keep > 0) {
        prune_old_logs(&config.directory, &config.file_prefix, retention)
            .context("pruning old log files")?;
    }

    let appender = tracing_appender::rolling::Builder::new()
        .rotation(config.rolling.into())
        .filename_prefix(&config.file_prefix)
        .filename_suffix("log")
        .build(&config.directory)
        .context("creating rolling log appender")?;
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let directive = config
        .env_filter
        .filter(|directive| !directive.trim().is_empty())
        .unwrap_or_else(|| "shotslice_core=debug,shotslice=debug,info".to_string());
    let env_filter = EnvFilter::try_new(&directive)
        .with_context(|| format!("parsing log filter `{directive}`"))?;

    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(file_writer)
        .with_target(true)
        .with_filter(config.file_level);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .without_time()
        .with_filter(config.console_level);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|err| anyhow!(err))?;

    Ok(LogHandle { _guard: guard, directory: config.directory, file_prefix: config.file_prefix })
}

fn filter_from_env() -> Option<String> {
    FILTER_ENV_VARS
        .iter()
        .find_map(|var| std::env::var(var).ok())
        .filter(|directive| !directive.trim().is_empty())
}

fn to_log_level(level: LogLevel) -> log::LevelFilter {
    level.as_log()
}

fn prune_old_logs(dir: &Path, prefix: &str, retention: usize) -> Result<()> {
    let mut files: Vec<(PathBuf, SystemTime)> = fs::read_dir(dir)
        .with_context(|| format!("reading log directory {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let meta = entry.metadata().ok().filter(|meta| meta.is_file())?;
            let path = entry.path();
            let stem = path.file_stem().and_then(OsStr::to_str)?;
            if !stem.starts_with(prefix) {
                return None;
            }
            Some((path, meta.modified().unwrap_or(SystemTime::UNIX_EPOCH)))
        })
        .collect();

    if files.len() <= retention {
        return Ok(());
    }

    files.sort_by_key(|(_, modified)| *modified);
    let excess = files.len() - retention;
    for (path, _) in files.into_iter().take(excess) {
        let _ = fs::remove_file(&path);
    }
    Ok(())
}

fn default_log_directory() -> PathBuf {
    ProjectDirs::from(APP_QUALIFIER, APP_ORGANISATION, APP_NAME)
        .map(|dirs| dirs.data_dir().join("logs"))
        .unwrap_or_else(|| std::env::temp_dir().join("shotslice-logs"))
}
