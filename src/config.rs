//! Query layer configuration
//!
//! Page size bounds and query logging. Loaded from defaults, a JSON file,
//! or `RESULTS_QUERY_*` environment variables.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::observability::{log_event_with_fields, Event, Logger, Severity};

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid value for {name}: {value}")]
    InvalidVariable { name: String, value: String },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Query layer configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Smallest accepted page size (default: 0)
    #[serde(default = "default_min_page_size")]
    pub min_page_size: i32,

    /// Largest accepted page size (default: 10000)
    #[serde(default = "default_max_page_size")]
    pub max_page_size: i32,

    /// Page size used when a request asks for 0 (default: 50)
    #[serde(default = "default_page_size")]
    pub default_page_size: i32,

    /// Log generated SQL at TRACE (default: false)
    #[serde(default)]
    pub log_queries: bool,
}

fn default_min_page_size() -> i32 {
    0
}

fn default_max_page_size() -> i32 {
    10_000
}

fn default_page_size() -> i32 {
    50
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            min_page_size: default_min_page_size(),
            max_page_size: default_max_page_size(),
            default_page_size: default_page_size(),
            log_queries: false,
        }
    }
}

const ENV_PREFIX: &str = "RESULTS_QUERY_";

impl QueryConfig {
    /// Defaults overridden by any `RESULTS_QUERY_*` variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| std::env::var(format!("{}{}", ENV_PREFIX, name)).ok())
    }

    fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let int = |name: &str, value: String| {
            value
                .trim()
                .parse::<i32>()
                .map_err(|_| ConfigError::InvalidVariable {
                    name: format!("{}{}", ENV_PREFIX, name),
                    value,
                })
        };

        if let Some(v) = lookup("MIN_PAGE_SIZE") {
            config.min_page_size = int("MIN_PAGE_SIZE", v)?;
        }
        if let Some(v) = lookup("MAX_PAGE_SIZE") {
            config.max_page_size = int("MAX_PAGE_SIZE", v)?;
        }
        if let Some(v) = lookup("DEFAULT_PAGE_SIZE") {
            config.default_page_size = int("DEFAULT_PAGE_SIZE", v)?;
        }
        if let Some(v) = lookup("LOG_QUERIES") {
            config.log_queries = match v.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" | "" => false,
                _ => {
                    return Err(ConfigError::InvalidVariable {
                        name: format!("{}LOG_QUERIES", ENV_PREFIX),
                        value: v,
                    })
                }
            };
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: display.clone(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: display.clone(),
            source,
        })?;
        config.validate()?;
        log_event_with_fields(Event::ConfigLoaded, &[("path", &display)]);
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_page_size < 0 {
            return Err(ConfigError::Invalid(format!(
                "min_page_size must not be negative, got {}",
                self.min_page_size
            )));
        }
        if self.min_page_size > self.max_page_size {
            return Err(ConfigError::Invalid(format!(
                "min_page_size {} exceeds max_page_size {}",
                self.min_page_size, self.max_page_size
            )));
        }
        if self.default_page_size < 1 || self.default_page_size > self.max_page_size {
            return Err(ConfigError::Invalid(format!(
                "default_page_size must be in [1, {}], got {}",
                self.max_page_size, self.default_page_size
            )));
        }
        Ok(())
    }

    /// Apply process-wide settings (log threshold)
    pub fn apply(&self) {
        if self.log_queries {
            Logger::set_min_severity(Severity::Trace);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = QueryConfig::default();
        assert_eq!(config.min_page_size, 0);
        assert_eq!(config.max_page_size, 10_000);
        assert_eq!(config.default_page_size, 50);
        assert!(!config.log_queries);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_vars() {
        let config = QueryConfig::from_vars(vars(&[
            ("MAX_PAGE_SIZE", "200"),
            ("DEFAULT_PAGE_SIZE", "20"),
            ("LOG_QUERIES", "true"),
        ]))
        .unwrap();
        assert_eq!(config.max_page_size, 200);
        assert_eq!(config.default_page_size, 20);
        assert!(config.log_queries);
    }

    #[test]
    fn test_from_vars_rejects_garbage() {
        let err = QueryConfig::from_vars(vars(&[("MAX_PAGE_SIZE", "lots")])).unwrap_err();
        assert!(err.to_string().contains("RESULTS_QUERY_MAX_PAGE_SIZE"));
        assert!(QueryConfig::from_vars(vars(&[("LOG_QUERIES", "maybe")])).is_err());
    }

    #[test]
    fn test_validate_bounds() {
        let config = QueryConfig {
            default_page_size: 20_000,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = QueryConfig {
            min_page_size: 10,
            max_page_size: 5,
            default_page_size: 5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_json_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{\"max_page_size\": 500}}").unwrap();
        let config = QueryConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.max_page_size, 500);
        assert_eq!(config.default_page_size, 50);
    }

    #[test]
    fn test_from_json_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(matches!(
            QueryConfig::from_json_file(&missing),
            Err(ConfigError::Io { .. })
        ));

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "not json").unwrap();
        assert!(matches!(
            QueryConfig::from_json_file(&bad),
            Err(ConfigError::Parse { .. })
        ));
    }
}
