//! Environment configuration, read once at startup.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use chat_backend_sidecar::{DEFAULT_SIDECAR_BASE_URL, SIDECAR_BACKEND_ID};
use thiserror::Error;
use url::Url;

pub const BACKEND_ENV_VAR: &str = "CHAT_CLIENT_BACKEND";
pub const SIDECAR_URL_ENV_VAR: &str = "CHAT_CLIENT_SIDECAR_URL";
pub const SPAWN_SIDECAR_ENV_VAR: &str = "CHAT_CLIENT_SPAWN_SIDECAR";
pub const SIDECAR_ROOT_ENV_VAR: &str = "CHAT_CLIENT_SIDECAR_ROOT";
pub const REQUEST_TIMEOUT_ENV_VAR: &str = "CHAT_CLIENT_REQUEST_TIMEOUT_SEC";
pub const LOG_ENV_VAR: &str = "CHAT_CLIENT_LOG";

pub const DEFAULT_BACKEND_ID: &str = SIDECAR_BACKEND_ID;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("CHAT_CLIENT_REQUEST_TIMEOUT_SEC must be a positive number of seconds, got '{value}'")]
    InvalidTimeout { value: String },

    #[error("CHAT_CLIENT_SIDECAR_URL '{url}' is not a usable sidecar URL: {reason}")]
    InvalidSidecarUrl { url: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub backend_id: String,
    pub sidecar_url: String,
    pub spawn_sidecar: bool,
    pub sidecar_root: Option<PathBuf>,
    pub request_timeout: Option<Duration>,
    pub log_filter: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend_id: DEFAULT_BACKEND_ID.to_string(),
            sidecar_url: DEFAULT_SIDECAR_BASE_URL.to_string(),
            spawn_sidecar: false,
            sidecar_root: None,
            request_timeout: None,
            log_filter: None,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let sidecar_url = env_string_opt(SIDECAR_URL_ENV_VAR).unwrap_or(defaults.sidecar_url);
        sidecar_port(&sidecar_url)?;

        Ok(Self {
            backend_id: env_string_opt(BACKEND_ENV_VAR).unwrap_or(defaults.backend_id),
            sidecar_url,
            spawn_sidecar: env_flag(SPAWN_SIDECAR_ENV_VAR),
            sidecar_root: env_string_opt(SIDECAR_ROOT_ENV_VAR).map(PathBuf::from),
            request_timeout: env_string_opt(REQUEST_TIMEOUT_ENV_VAR)
                .map(|value| parse_timeout(&value))
                .transpose()?,
            log_filter: env_string_opt(LOG_ENV_VAR),
        })
    }

    /// Port a spawned sidecar should listen on.
    pub fn sidecar_port(&self) -> Result<u16, ConfigError> {
        sidecar_port(&self.sidecar_url)
    }
}

fn sidecar_port(raw: &str) -> Result<u16, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidSidecarUrl {
        url: raw.to_string(),
        reason: reason.to_string(),
    };

    let url = Url::parse(raw.trim()).map_err(|error| invalid(&error.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host"));
    }
    url.port_or_known_default()
        .ok_or_else(|| invalid("missing port"))
}

fn parse_timeout(value: &str) -> Result<Duration, ConfigError> {
    let invalid = || ConfigError::InvalidTimeout {
        value: value.to_string(),
    };
    let seconds: f64 = value.trim().parse().map_err(|_| invalid())?;
    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(invalid());
    }
    Duration::try_from_secs_f64(seconds).map_err(|_| invalid())
}

fn env_flag(key: &str) -> bool {
    env::var(key).map(|value| value.trim() == "1").unwrap_or(false)
}

fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        let value = value.trim();
        if value.is_empty() {
            None
        } else {
            Some(value.to_string())
        }
    })
}
