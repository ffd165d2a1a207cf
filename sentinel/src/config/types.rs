// Copyright 2026 The Sentinel Project
// SPDX-License-Identifier: Apache-2.0

use super::defaults::{
    DEFAULT_BACKEND_URL, DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_CORS_ORIGINS,
    DEFAULT_MAX_REQUEST_BYTES, DEFAULT_PORT, DEFAULT_READ_TIMEOUT_MS, DEFAULT_TIMEOUT_MS,
};

/// Top-level parsed and validated relay config.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Config {
    pub backend: BackendConfig,
    pub server: ServerConfig,
}

/// Where and how the relay reaches the question-answering backend.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendConfig {
    /// Base address without a trailing slash, e.g. `http://127.0.0.1:8000`.
    pub base_url: String,
    /// Total timeout for blocking forwards.
    pub timeout_ms: u64,
    pub connect_timeout_ms: u64,
    /// Idle limit between reads; bounds a silent backend on streamed routes.
    pub read_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub port: u16,
    /// Allowed CORS origins. Empty or `*` allows any origin.
    pub cors_origins: Vec<String>,
    /// Largest accepted inbound request body.
    pub max_request_bytes: usize,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BACKEND_URL.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            cors_origins: DEFAULT_CORS_ORIGINS.iter().map(|s| s.to_string()).collect(),
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
        }
    }
}
