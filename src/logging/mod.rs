//! Tracing subscriber setup
//!
//! The library itself only emits `tracing` events; binaries and tests call one
//! of the `init_*` functions to install a subscriber. Initialization happens
//! at most once per process. Console output goes to stderr.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Standard tracing filter (e.g. "warn,hipops=debug"), wins over the level below
//! - `HIPOPS_LOG_LEVEL`: error, warn, info, debug or trace
//! - `HIPOPS_LOG_FORMAT`: "human" or "json"
//! - `HIPOPS_LOG_FILE`: Also append JSON lines to this file

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use once_cell::sync::OnceCell;
use thiserror::Error;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

static TRACING_INITIALIZED: OnceCell<()> = OnceCell::new();

const LOG_LEVEL_ENV: &str = "HIPOPS_LOG_LEVEL";
const LOG_FORMAT_ENV: &str = "HIPOPS_LOG_FORMAT";
const LOG_FILE_ENV: &str = "HIPOPS_LOG_FILE";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log level: {0}")]
    InvalidLogLevel(String),

    #[error("invalid log format: {0}")]
    InvalidLogFormat(String),

    #[error("failed to open log file {path}: {reason}")]
    FileOpenFailed { path: PathBuf, reason: String },

    /// Another subscriber was installed first, outside this module
    #[error("failed to install subscriber: {0}")]
    InstallFailed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Error,
    #[default]
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl FromStr for LogLevel {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(LoggingError::InvalidLogLevel(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Human,
    Json,
}

impl FromStr for LogFormat {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "human" | "pretty" => Ok(LogFormat::Human),
            "json" => Ok(LogFormat::Json),
            _ => Err(LoggingError::InvalidLogFormat(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    /// Emit an event when each span closes (operator runs are spans)
    pub with_span_events: bool,
    pub log_file: Option<PathBuf>,
}

impl LoggingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_span_events(mut self, with_span_events: bool) -> Self {
        self.with_span_events = with_span_events;
        self
    }

    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    /// Configuration from the `HIPOPS_LOG_*` variables. Unset variables keep
    /// their defaults; malformed ones are errors.
    pub fn from_env() -> Result<Self, LoggingError> {
        let mut config = Self::new();
        if let Ok(level) = std::env::var(LOG_LEVEL_ENV) {
            config.level = level.parse()?;
        }
        if let Ok(format) = std::env::var(LOG_FORMAT_ENV) {
            config.format = format.parse()?;
        }
        if let Ok(file) = std::env::var(LOG_FILE_ENV) {
            config = config.with_log_file(file);
        }
        Ok(config)
    }
}

/// Initialize from the environment, ignoring malformed settings
pub fn init_logging_default() {
    let config = LoggingConfig::from_env().unwrap_or_default();
    let _ = init_with_config(&config);
}

/// Install a subscriber for `config` unless one was already installed.
pub fn init_with_config(config: &LoggingConfig) -> Result<(), LoggingError> {
    let mut result = Ok(());
    TRACING_INITIALIZED.get_or_init(|| {
        result = install(config);
    });
    result
}

pub fn is_initialized() -> bool {
    TRACING_INITIALIZED.get().is_some()
}

fn span_events(enabled: bool) -> FmtSpan {
    if enabled {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    }
}

fn open_log_file(path: &Path) -> Result<File, LoggingError> {
    let open_failed = |e: std::io::Error| LoggingError::FileOpenFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(open_failed)?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(open_failed)
}

fn install(config: &LoggingConfig) -> Result<(), LoggingError> {
    let filter = build_env_filter(config.level)?;

    let console = match config.format {
        LogFormat::Human => fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_span_events(span_events(config.with_span_events))
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_span_events(span_events(config.with_span_events))
            .boxed(),
    };

    // The file always gets JSON lines
    let file_layer = match &config.log_file {
        Some(path) => Some(
            fmt::layer()
                .json()
                .with_writer(open_log_file(path)?)
                .with_ansi(false)
                .with_file(true)
                .with_line_number(true)
                .with_span_events(span_events(config.with_span_events))
                .boxed(),
        ),
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .try_init()
        .map_err(|e| LoggingError::InstallFailed(e.to_string()))
}

/// `RUST_LOG` if set, otherwise the configured level
fn build_env_filter(level: LogLevel) -> Result<EnvFilter, LoggingError> {
    match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directives) => {
            EnvFilter::try_new(directives).map_err(|e| LoggingError::InvalidLogLevel(e.to_string()))
        }
        Err(_) => Ok(EnvFilter::new(level.as_filter_str())),
    }
}
