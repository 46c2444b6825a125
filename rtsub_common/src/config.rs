//! Configuration loading traits and types.
//!
//! Every rtsub binary reads a single TOML file. Application structs embed
//! [`SharedConfig`] and get loading for free through the blanket
//! [`ConfigLoader`] implementation.
//!
//! # Usage
//!
//! ```rust,no_run
//! use rtsub_common::config::{ConfigError, ConfigLoader, SharedConfig};
//! use serde::Deserialize;
//! use std::path::Path;
//!
//! #[derive(Debug, Deserialize)]
//! struct ToolConfig {
//!     shared: SharedConfig,
//!     rate_hz: u32,
//! }
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = ToolConfig::load(Path::new("tool.toml"))?;
//!     println!("{} @ {} Hz", config.shared.service_name, config.rate_hz);
//!     Ok(())
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Error type for configuration loading and validation.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log verbosity, lowercase in TOML.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose, detailed tracing information.
    Trace,
    /// Debug information useful during development.
    Debug,
    /// General information about application operation.
    #[default]
    Info,
    /// Warning messages for potentially problematic situations.
    Warn,
    /// Error messages for serious problems.
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub const fn as_directive(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Common fields embedded in every application config.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// log_level = "debug"
/// service_name = "rtsub-receiver-01"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SharedConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Application instance identifier.
    pub service_name: String,
}

impl SharedConfig {
    /// Shared section with the given service name and the default log level.
    pub fn named(service_name: &str) -> Self {
        Self {
            log_level: LogLevel::default(),
            service_name: service_name.to_string(),
        }
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if `service_name` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Loading of any deserializable config type from a TOML file.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if reading or TOML parsing fails
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from an in-memory TOML string.
    fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn log_level_defaults_to_info() {
        assert_eq!(LogLevel::default(), LogLevel::Info);
        assert_eq!(LogLevel::default().as_directive(), "info");
    }

    #[test]
    fn log_level_parses_lowercase() {
        #[derive(Debug, Deserialize)]
        struct Wrapper {
            level: LogLevel,
        }

        let cases = [
            ("trace", LogLevel::Trace),
            ("debug", LogLevel::Debug),
            ("info", LogLevel::Info),
            ("warn", LogLevel::Warn),
            ("error", LogLevel::Error),
        ];
        for (text, expected) in cases {
            let parsed = Wrapper::from_toml(&format!("level = \"{text}\"")).unwrap();
            assert_eq!(parsed.level, expected);
            assert_eq!(expected.as_directive(), text);
        }
    }

    #[test]
    fn shared_config_rejects_blank_service_name() {
        let config = SharedConfig::named("   ");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
        assert!(SharedConfig::named("rtsub").validate().is_ok());
    }

    #[test]
    fn loader_reports_missing_file() {
        #[allow(dead_code)]
        #[derive(Debug, Deserialize)]
        struct Cfg {
            value: String,
        }

        let result = Cfg::load(Path::new("/nonexistent/rtsub/config.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound)));
    }

    #[test]
    fn loader_reports_parse_error() {
        #[allow(dead_code)]
        #[derive(Debug, Deserialize)]
        struct Cfg {
            value: String,
        }

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "value = [unterminated").unwrap();

        let result = Cfg::load(file.path());
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn loader_reads_shared_section() {
        #[derive(Debug, Deserialize)]
        struct Cfg {
            shared: SharedConfig,
            rate_hz: u32,
        }

        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"rate_hz = 100

[shared]
log_level = "debug"
service_name = "rtsub-test"
"#
        )
        .unwrap();
        file.flush().unwrap();

        let config = Cfg::load(file.path()).unwrap();
        assert_eq!(config.shared.log_level, LogLevel::Debug);
        assert_eq!(config.shared.service_name, "rtsub-test");
        assert_eq!(config.rate_hz, 100);
    }

    #[test]
    fn shared_section_rejects_unknown_fields() {
        #[allow(dead_code)]
        #[derive(Debug, Deserialize)]
        struct Cfg {
            shared: SharedConfig,
        }

        let result = Cfg::from_toml(
            r#"[shared]
service_name = "x"
colour = "blue"
"#,
        );
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }
}
