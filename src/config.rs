use crate::upstream::UpstreamConfig;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_UPSTREAM_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_MAX_PAYLOAD_SIZE: usize = 10 * 1024 * 1024;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for field '{field}': {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required field: {field}")]
    MissingRequired { field: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Relay server configuration
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Bind address
    pub host: String,
    /// Bind port
    pub port: u16,
    /// Credential presented to the upstream API
    pub api_key: String,
    /// Chat-completions endpoint
    pub upstream_url: String,
    /// Model name sent with every request
    pub model: String,
    /// Upstream request timeout in seconds
    pub request_timeout_secs: u64,
    /// Maximum accepted request body in bytes
    pub max_payload_size: usize,
    /// Log level (None = info)
    pub log_level: Option<String>,
    /// Headers checked for a caller-supplied request id
    pub request_id_headers: Vec<String>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            api_key: String::new(),
            upstream_url: DEFAULT_UPSTREAM_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            request_timeout_secs: 120,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            log_level: None,
            request_id_headers: vec!["x-request-id".to_string(), "x-correlation-id".to_string()],
        }
    }
}

impl RelayConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "api_key".to_string(),
            });
        }

        if self.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "port".to_string(),
                value: self.port.to_string(),
                reason: "Port must be > 0".to_string(),
            });
        }

        if !self.upstream_url.starts_with("http://") && !self.upstream_url.starts_with("https://")
        {
            return Err(ConfigError::InvalidValue {
                field: "upstream_url".to_string(),
                value: self.upstream_url.clone(),
                reason: "URL must start with http:// or https://".to_string(),
            });
        }

        if self.model.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "model".to_string(),
            });
        }

        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_secs".to_string(),
                value: self.request_timeout_secs.to_string(),
                reason: "Must be > 0".to_string(),
            });
        }

        if self.max_payload_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_payload_size".to_string(),
                value: self.max_payload_size.to_string(),
                reason: "Must be > 0".to_string(),
            });
        }

        if let Some(level) = &self.log_level {
            if level.parse::<log::LevelFilter>().is_err() {
                return Err(ConfigError::InvalidValue {
                    field: "log_level".to_string(),
                    value: level.clone(),
                    reason: "Must be one of off, error, warn, info, debug, trace".to_string(),
                });
            }
        }

        Ok(())
    }

    pub fn upstream_config(&self) -> UpstreamConfig {
        UpstreamConfig {
            url: self.upstream_url.clone(),
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            timeout_secs: self.request_timeout_secs,
        }
    }
}

/// Loads `KEY=value` pairs into the process environment before the CLI is parsed.
///
/// `None` searches `.env` from the working directory upwards. Variables that are
/// already set win over the file. Returns the file that was loaded, if any.
pub fn load_env_file(path: Option<&Path>) -> Option<PathBuf> {
    match path {
        Some(path) => dotenvy::from_path(path).ok().map(|_| path.to_path_buf()),
        None => dotenvy::dotenv().ok(),
    }
}
