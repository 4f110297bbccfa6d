//! Structured logging for sandpile simulations
//!
//! # Features
//!
//! - **JSONL Output**: Structured JSON lines for log aggregation (default)
//! - **Run Context**: Attribute log entries to the sweep task that produced them
//! - **File Output**: Daily/hourly/no rotation via tracing-appender
//!
//! Console logs go to stderr so that record output on stdout stays clean.
//!
//! # Quick Start
//!
//! ```ignore
//! use sandpile_logging::{SandpileSubscriberBuilder, LogConfig};
//!
//! // Simple setup with defaults (JSONL to stderr)
//! let _guard = SandpileSubscriberBuilder::new().init()?;
//!
//! // Long sweep: JSONL to ./logs/sandpile.log, nothing on the console
//! let _guard = SandpileSubscriberBuilder::new()
//!     .with_config(LogConfig::batch("./logs".into()))
//!     .init()?;
//! ```

pub mod config;
pub mod context;
pub mod layers;

pub use config::{ConsoleConfig, FileConfig, JsonlConfig, LogConfig, RotationStrategy};
pub use context::{RunContextData, RunContextGuard, run_span};

use std::fs::{self, File};

use thiserror::Error;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, Layer, Registry, layer::SubscriberExt, util::SubscriberInitExt,
};

/// Errors raised while installing the subscriber
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Failed to prepare log file: {0}")]
    Io(#[from] std::io::Error),

    #[error("A global subscriber is already installed: {0}")]
    AlreadyInitialized(String),
}

/// Builder for configuring and initializing the logging subscriber
pub struct SandpileSubscriberBuilder {
    config: LogConfig,
}

impl SandpileSubscriberBuilder {
    /// Create a new subscriber builder with default configuration
    pub fn new() -> Self {
        Self {
            config: LogConfig::default(),
        }
    }

    /// Use a specific configuration
    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the default log level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.default_level = level.into();
        self
    }

    /// Enable or disable console output
    pub fn with_console(mut self, enabled: bool) -> Self {
        self.config.console.enabled = enabled;
        self
    }

    /// Configure file output
    pub fn with_file_output(mut self, config: FileConfig) -> Self {
        self.config.file = Some(config);
        self
    }

    /// The configuration this builder will install
    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Initialize the subscriber globally
    ///
    /// The returned guard flushes file output when dropped and must be kept
    /// alive for the duration of the program.
    pub fn init(self) -> Result<Option<WorkerGuard>, LoggingError> {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&self.config.default_level));

        let mut outputs: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
        let mut guard = None;

        if self.config.console.enabled {
            if self.config.console.pretty {
                outputs.push(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(true)
                        .with_target(true)
                        .with_writer(std::io::stderr)
                        .boxed(),
                );
            } else {
                outputs.push(layers::jsonl_layer(std::io::stderr, &self.config.jsonl));
            }
        }

        if let Some(file_config) = &self.config.file {
            let (writer, file_guard) = create_file_writer(file_config)?;
            guard = Some(file_guard);
            outputs.push(layers::jsonl_layer(writer, &self.config.jsonl));
        }

        Registry::default()
            .with(outputs)
            .with(layers::RunContextLayer::new())
            .with(env_filter)
            .try_init()
            .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

        Ok(guard)
    }
}

impl Default for SandpileSubscriberBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Open the file writer for the configured rotation
///
/// `Never` truncates a single file; the rolling strategies append.
fn create_file_writer(file_config: &FileConfig) -> Result<(NonBlocking, WorkerGuard), LoggingError> {
    fs::create_dir_all(&file_config.directory)?;
    let writer = match file_config.rotation {
        RotationStrategy::Never => {
            let file_path = file_config
                .directory
                .join(format!("{}.log", file_config.prefix));
            tracing_appender::non_blocking(File::create(file_path)?)
        }
        RotationStrategy::Daily => tracing_appender::non_blocking(RollingFileAppender::new(
            Rotation::DAILY,
            &file_config.directory,
            &file_config.prefix,
        )),
        RotationStrategy::Hourly => tracing_appender::non_blocking(RollingFileAppender::new(
            Rotation::HOURLY,
            &file_config.directory,
            &file_config.prefix,
        )),
    };
    Ok(writer)
}

/// Install warning-level console logging for tests (ignores double init)
pub fn init_testing() {
    let _ = SandpileSubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .init();
}
