//! Logging setup
//!
//! Installs a `tracing-subscriber` registry once per process. Console output
//! is human-readable or JSON; an optional log file always receives JSON.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: standard tracing filter (e.g. "info,fpgaforge::session=trace")
//! - `FPGAFORGE_LOG_LEVEL`: simple level (error, warn, info, debug, trace)
//! - `FPGAFORGE_LOG_FORMAT`: console format ("human" or "json")
//! - `FPGAFORGE_LOG_FILE`: optional JSON log file

use once_cell::sync::OnceCell;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

static TRACING_INITIALIZED: OnceCell<()> = OnceCell::new();

const LOG_LEVEL_ENV: &str = "FPGAFORGE_LOG_LEVEL";
const LOG_FORMAT_ENV: &str = "FPGAFORGE_LOG_FORMAT";
const LOG_FILE_ENV: &str = "FPGAFORGE_LOG_FILE";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter: {0}")]
    InvalidLogLevel(String),

    #[error("failed to create log directory: {0}")]
    DirectoryCreationFailed(String),

    #[error("failed to open log file: {0}")]
    FileOpenFailed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "error" => Some(LogLevel::Error),
            "warn" | "warning" => Some(LogLevel::Warn),
            "info" => Some(LogLevel::Info),
            "debug" => Some(LogLevel::Debug),
            "trace" => Some(LogLevel::Trace),
            _ => None,
        }
    }

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

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Human,
    Json,
}

impl LogFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "human" | "pretty" | "console" => Some(LogFormat::Human),
            "json" | "structured" => Some(LogFormat::Json),
            _ => None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    /// Include file/line in console output
    pub with_file_info: bool,
    /// Emit span close events (useful to time pipeline phases)
    pub with_span_events: bool,
    pub log_file: Option<PathBuf>,
}

impl LoggingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `FPGAFORGE_LOG_*`; unset or unparsable values keep the defaults
    pub fn from_env() -> Self {
        let mut config = LoggingConfig::new();
        if let Some(level) = std::env::var(LOG_LEVEL_ENV).ok().and_then(|s| LogLevel::parse(&s)) {
            config.level = level;
        }
        if let Some(format) = std::env::var(LOG_FORMAT_ENV).ok().and_then(|s| LogFormat::parse(&s)) {
            config.format = format;
        }
        config.log_file = std::env::var(LOG_FILE_ENV)
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);
        config
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_file_info(mut self, with_file_info: bool) -> Self {
        self.with_file_info = with_file_info;
        self
    }

    pub fn with_span_events(mut self, with_span_events: bool) -> Self {
        self.with_span_events = with_span_events;
        self
    }

    pub fn with_log_file(mut self, path: PathBuf) -> Self {
        self.log_file = Some(path);
        self
    }
}

/// Initialize logging from the environment, ignoring failures
///
/// Idempotent; only the first call installs a subscriber.
pub fn init_logging_default() {
    if let Err(e) = init_logging_from_env() {
        eprintln!("fpgaforge: logging disabled: {}", e);
    }
}

/// Initialize logging from `RUST_LOG` / `FPGAFORGE_LOG_*`
pub fn init_logging_from_env() -> Result<(), LoggingError> {
    init_with_config(&LoggingConfig::from_env())
}

/// Initialize logging with an explicit configuration
///
/// Idempotent. An error is only reported by the call that tried to install
/// the subscriber.
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

fn install(config: &LoggingConfig) -> Result<(), LoggingError> {
    let env_filter = build_env_filter(config.level)?;
    let spans = span_events(config.with_span_events);

    let (json_console, human_console) = match config.format {
        LogFormat::Json => (
            Some(
                fmt::layer()
                    .json()
                    .with_target(false)
                    .with_file(config.with_file_info)
                    .with_line_number(config.with_file_info)
                    .with_span_events(spans.clone()),
            ),
            None,
        ),
        LogFormat::Human => (
            None,
            Some(
                fmt::layer()
                    .with_target(true)
                    .with_file(config.with_file_info)
                    .with_line_number(config.with_file_info)
                    .with_span_events(spans.clone()),
            ),
        ),
    };

    let file_layer = match &config.log_file {
        Some(path) => Some(
            fmt::layer()
                .json()
                .with_writer(Mutex::new(open_log_file(path)?))
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_ansi(false)
                .with_span_events(spans),
        ),
        None => None,
    };

    // Another subscriber may already be installed by the host application.
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(json_console)
        .with(human_console)
        .with(file_layer)
        .try_init();

    Ok(())
}

fn span_events(enabled: bool) -> FmtSpan {
    if enabled {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    }
}

fn open_log_file(path: &Path) -> Result<File, LoggingError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| LoggingError::DirectoryCreationFailed(e.to_string()))?;
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| LoggingError::FileOpenFailed(format!("{}: {}", path.display(), e)))
}

/// `RUST_LOG` first, then `FPGAFORGE_LOG_LEVEL`, then the configured level
fn build_env_filter(default_level: LogLevel) -> Result<EnvFilter, LoggingError> {
    if let Ok(rust_log) = std::env::var("RUST_LOG") {
        return EnvFilter::try_new(rust_log)
            .map_err(|e| LoggingError::InvalidLogLevel(e.to_string()));
    }

    let level = std::env::var(LOG_LEVEL_ENV)
        .ok()
        .and_then(|s| LogLevel::parse(&s))
        .unwrap_or(default_level);
    Ok(EnvFilter::new(level.as_filter_str()))
}
