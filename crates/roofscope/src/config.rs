//! Client configuration for the analysis backend endpoints and timing knobs.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

fn default_poll_interval_ms() -> u64 {
    2500
}

fn default_max_poll_attempts() -> u32 {
    40
}

fn default_confirm_tick_ms() -> u64 {
    200
}

fn default_confirm_ceiling_ms() -> u64 {
    90_000
}

/// Endpoints and timing configuration for one analysis client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the analysis REST API.
    pub api_base_url: String,

    /// WebSocket endpoint for push status updates. When absent the client
    /// runs on metadata polling alone.
    #[serde(default)]
    pub status_socket_url: Option<String>,

    /// Interval between metadata polls while a workflow is running.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Maximum number of metadata polls before the run times out.
    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,

    /// Tick interval while waiting for a background run at confirmation time.
    #[serde(default = "default_confirm_tick_ms")]
    pub confirm_tick_ms: u64,

    /// Ceiling on the confirmation wait before giving up.
    #[serde(default = "default_confirm_ceiling_ms")]
    pub confirm_ceiling_ms: u64,
}

impl ClientConfig {
    /// Configuration with default timing for the given API base URL.
    pub fn for_base_url(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            status_socket_url: None,
            poll_interval_ms: default_poll_interval_ms(),
            max_poll_attempts: default_max_poll_attempts(),
            confirm_tick_ms: default_confirm_tick_ms(),
            confirm_ceiling_ms: default_confirm_ceiling_ms(),
        }
    }
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ClientConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<ClientConfig, ConfigError> {
    let config: ClientConfig = serde_json::from_str(content)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_config(config: &ClientConfig) -> Result<(), ConfigError> {
    if config.api_base_url.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "api_base_url must not be empty".to_string(),
        });
    }

    if let Some(socket_url) = &config.status_socket_url {
        if socket_url.trim().is_empty() {
            return Err(ConfigError::Validation {
                message: "status_socket_url must not be empty when set".to_string(),
            });
        }
    }

    if config.poll_interval_ms == 0 {
        return Err(ConfigError::Validation {
            message: "poll_interval_ms must be greater than zero".to_string(),
        });
    }

    if config.max_poll_attempts == 0 {
        return Err(ConfigError::Validation {
            message: "max_poll_attempts must be greater than zero".to_string(),
        });
    }

    if config.confirm_tick_ms == 0 {
        return Err(ConfigError::Validation {
            message: "confirm_tick_ms must be greater than zero".to_string(),
        });
    }

    Ok(())
}
