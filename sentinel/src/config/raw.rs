// Copyright 2026 The Sentinel Project
// SPDX-License-Identifier: Apache-2.0

// Raw YAML deserialization types (internal)
// Every key is optional; defaults and validation are applied by the loader.

use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    pub sentinel: Option<String>,
    pub backend: Option<RawBackendConfig>,
    pub server: Option<RawServerConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawBackendConfig {
    pub base_url: Option<String>,
    pub timeout_ms: Option<u64>,
    pub connect_timeout_ms: Option<u64>,
    pub read_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawServerConfig {
    pub port: Option<u16>,
    pub cors_origins: Option<Vec<String>>,
    pub max_request_bytes: Option<usize>,
}
