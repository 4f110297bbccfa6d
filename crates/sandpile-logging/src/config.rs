//! Configuration types for the logging system

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Main logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default log level (`RUST_LOG` wins when set)
    pub default_level: String,
    pub console: ConsoleConfig,
    /// JSONL log file, in addition to or instead of the console
    pub file: Option<FileConfig>,
    pub jsonl: JsonlConfig,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            default_level: "info".to_string(),
            console: ConsoleConfig::default(),
            file: None,
            jsonl: JsonlConfig::default(),
        }
    }
}

impl LogConfig {
    /// Long sweeps: everything goes to `<log_dir>/sandpile.log`, console stays quiet
    ///
    /// Thread names are included so lines can be matched to sweep workers.
    pub fn batch(log_dir: PathBuf) -> Self {
        Self {
            console: ConsoleConfig {
                enabled: false,
                pretty: false,
            },
            file: Some(FileConfig {
                directory: log_dir,
                ..FileConfig::default()
            }),
            jsonl: JsonlConfig {
                include_thread_info: true,
                ..JsonlConfig::default()
            },
            ..Self::default()
        }
    }

    /// Test runs: warnings only
    pub fn testing() -> Self {
        Self {
            default_level: "warn".to_string(),
            ..Self::default()
        }
    }
}

/// Console (stderr) output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub enabled: bool,
    /// Human-readable colored lines instead of JSONL
    pub pretty: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            pretty: false,
        }
    }
}

impl ConsoleConfig {
    pub fn pretty() -> Self {
        Self {
            enabled: true,
            pretty: true,
        }
    }
}

/// File output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    pub directory: PathBuf,
    pub prefix: String,
    pub rotation: RotationStrategy,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./logs"),
            prefix: "sandpile".to_string(),
            rotation: RotationStrategy::Never,
        }
    }
}

/// When the log file rolls over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RotationStrategy {
    Daily,
    Hourly,
    /// One file per invocation, truncated at startup
    #[default]
    Never,
}

/// Extra JSONL fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonlConfig {
    pub include_thread_info: bool,
    /// Source file and line of each event
    pub include_location: bool,
}

impl Default for JsonlConfig {
    fn default() -> Self {
        Self {
            include_thread_info: false,
            include_location: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert_eq!(config.default_level, "info");
        assert!(config.console.enabled);
        assert!(!config.console.pretty);
        assert!(config.file.is_none());
    }

    #[test]
    fn test_batch_config() {
        let config = LogConfig::batch(PathBuf::from("/tmp/sandpile-logs"));
        assert!(!config.console.enabled);
        let file = config.file.unwrap();
        assert_eq!(file.directory, PathBuf::from("/tmp/sandpile-logs"));
        assert_eq!(file.rotation, RotationStrategy::Never);
        assert!(config.jsonl.include_thread_info);
    }

    #[test]
    fn test_partial_config_deserializes() {
        let config: LogConfig = serde_json::from_str(
            r#"{"default_level": "trace", "console": {"pretty": true},
                "file": {"directory": "out", "prefix": "p", "rotation": "hourly"}}"#,
        )
        .unwrap();
        assert_eq!(config.default_level, "trace");
        assert_eq!(config.console, ConsoleConfig::pretty());
        assert_eq!(config.file.unwrap().rotation, RotationStrategy::Hourly);
        assert!(config.jsonl.include_location);
    }
}
