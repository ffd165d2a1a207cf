// Copyright 2026 The Sentinel Project
// SPDX-License-Identifier: Apache-2.0

use super::defaults::DEFAULT_BACKEND_URL;
use super::error::ConfigError;
use super::interpolation::resolve_variables;
use super::raw;
use super::source::ConfigSource;
use super::types::*;

/// Environment variables consulted for the backend address, in order.
const BACKEND_URL_VARS: &[&str] = &["SENTINEL_BACKEND_URL", "BACKEND_URL"];

/// Load and validate a sentinel config from the given source.
///
/// Steps:
/// 1. Read raw YAML from source (an empty document yields defaults)
/// 2. Parse YAML into raw deserialization types
/// 3. Validate the version key and numeric limits
/// 4. Resolve variable interpolation in string fields
/// 5. Resolve the backend address (environment wins over the file)
pub fn load_config(source: &dyn ConfigSource) -> Result<Config, ConfigError> {
    let raw_yaml = source.read().map_err(|e| ConfigError::Read {
        origin: source.origin(),
        source: e,
    })?;

    let raw: raw::RawConfig = if raw_yaml.trim().is_empty() {
        raw::RawConfig::default()
    } else {
        serde_yaml::from_str(&raw_yaml).map_err(|e| ConfigError::Parse {
            origin: source.origin(),
            source: e,
        })?
    };

    if let Some(version) = raw.sentinel.as_deref() {
        if version != "v1" {
            return Err(ConfigError::invalid(
                "sentinel",
                format!("unsupported config version \"{version}\", expected \"v1\""),
            ));
        }
    }

    let backend = build_backend_config(raw.backend)?;
    let server = build_server_config(raw.server)?;

    Ok(Config { backend, server })
}

impl Config {
    /// Defaults with the backend address taken from the environment.
    /// Used when no config file is given.
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.backend.base_url = resolve_backend_url(None);
        config
    }
}

/// Resolve the backend base address.
///
/// Order: `SENTINEL_BACKEND_URL`, `BACKEND_URL`, the configured value, then
/// the local default. Trailing slashes are removed.
pub fn resolve_backend_url(configured: Option<&str>) -> String {
    resolve_backend_url_from(|name| std::env::var(name).ok(), configured)
}

fn resolve_backend_url_from<F>(lookup: F, configured: Option<&str>) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let from_env = BACKEND_URL_VARS
        .iter()
        .filter_map(|name| lookup(name))
        .find(|value| !value.trim().is_empty());

    let url = from_env
        .or_else(|| configured.map(str::to_string))
        .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());

    url.trim().trim_end_matches('/').to_string()
}

fn build_backend_config(raw: Option<raw::RawBackendConfig>) -> Result<BackendConfig, ConfigError> {
    let defaults = BackendConfig::default();
    let raw = match raw {
        Some(r) => r,
        None => {
            return Ok(BackendConfig {
                base_url: resolve_backend_url(None),
                ..defaults
            })
        }
    };

    let configured = raw.base_url.as_deref().map(resolve_variables).transpose()?;
    if let Some(url) = configured.as_deref() {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::invalid(
                "backend.base_url",
                format!("\"{url}\" must start with http:// or https://"),
            ));
        }
    }

    let timeout_ms = positive("backend.timeout_ms", raw.timeout_ms, defaults.timeout_ms)?;
    let connect_timeout_ms = positive(
        "backend.connect_timeout_ms",
        raw.connect_timeout_ms,
        defaults.connect_timeout_ms,
    )?;
    let read_timeout_ms = positive(
        "backend.read_timeout_ms",
        raw.read_timeout_ms,
        defaults.read_timeout_ms,
    )?;

    Ok(BackendConfig {
        base_url: resolve_backend_url(configured.as_deref()),
        timeout_ms,
        connect_timeout_ms,
        read_timeout_ms,
    })
}

/// The configured value or the default; zero is rejected.
fn positive<T>(key: &'static str, value: Option<T>, default: T) -> Result<T, ConfigError>
where
    T: Copy + PartialEq + Default,
{
    let value = value.unwrap_or(default);
    if value == T::default() {
        return Err(ConfigError::invalid(key, "must be greater than zero"));
    }
    Ok(value)
}

fn build_server_config(raw: Option<raw::RawServerConfig>) -> Result<ServerConfig, ConfigError> {
    let defaults = ServerConfig::default();
    let raw = match raw {
        Some(r) => r,
        None => return Ok(defaults),
    };

    let cors_origins = match raw.cors_origins {
        Some(origins) => origins
            .iter()
            .map(|o| resolve_variables(o))
            .collect::<Result<Vec<_>, _>>()?,
        None => defaults.cors_origins,
    };

    let max_request_bytes = positive(
        "server.max_request_bytes",
        raw.max_request_bytes,
        defaults.max_request_bytes,
    )?;

    Ok(ServerConfig {
        port: raw.port.unwrap_or(defaults.port),
        cors_origins,
        max_request_bytes,
    })
}
