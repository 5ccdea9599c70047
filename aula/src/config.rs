//! Server configuration
//!
//! Layered loading: defaults, then an optional `config.yaml`, then
//! environment variables (`AULA_SERVER__HTTP_PORT`, etc.) on top.

use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use aula_sfu::SfuConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub sfu: SfuConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub http_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            http_port: 8080,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "pretty"
    pub file_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_path: None,
        }
    }
}

impl Config {
    /// Load configuration with priority: environment variables over
    /// config file over defaults.
    pub fn load(config_file: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_file {
            if Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("AULA")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        Self::load(Some(path))
    }

    #[must_use]
    pub fn http_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.http_port)
    }

    /// Collect every misconfiguration instead of stopping at the first.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.server.host.is_empty() {
            errors.push("server.host must not be empty".to_string());
        }
        if self.server.http_port == 0 {
            errors.push("server.http_port must not be 0".to_string());
        }
        match self.logging.format.as_str() {
            "json" | "pretty" => {}
            other => errors.push(format!(
                "logging.format must be \"json\" or \"pretty\", got \"{other}\""
            )),
        }
        if let Err(sfu_errors) = self.sfu.validate() {
            errors.extend(sfu_errors);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Resolve the config file path: env var override, then CWD, then the
/// conventional container mount.
#[must_use]
pub fn resolve_config_path() -> Option<String> {
    std::env::var("AULA_CONFIG_PATH")
        .ok()
        .filter(|p| Path::new(p).exists())
        .or_else(|| {
            let cwd = "config.yaml";
            Path::new(cwd).exists().then(|| cwd.to_string())
        })
        .or_else(|| {
            let mounted = "/config/config.yaml";
            Path::new(mounted).exists().then(|| mounted.to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.http_address(), "0.0.0.0:8080");
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let config = Config {
            server: ServerConfig {
                host: String::new(),
                http_port: 0,
            },
            logging: LoggingConfig {
                format: "xml".to_string(),
                ..LoggingConfig::default()
            },
            sfu: SfuConfig::default(),
        };
        let errors = config.validate().expect_err("invalid config");
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_invalid_sfu_ports_rejected() {
        let config = Config {
            sfu: SfuConfig {
                rtc_min_port: 50000,
                rtc_max_port: 40000,
                ..SfuConfig::default()
            },
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
