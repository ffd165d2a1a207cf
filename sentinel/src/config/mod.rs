// Copyright 2026 The Sentinel Project
// SPDX-License-Identifier: Apache-2.0

// Relay configuration
//
// Loads the optional sentinel.yaml, resolves ${VAR} interpolation, validates
// values, and resolves the backend base address from the environment.

mod defaults;
mod error;
mod interpolation;
mod loader;
mod raw;
mod source;
mod types;

pub use defaults::{
    DEFAULT_BACKEND_URL, DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_CORS_ORIGINS,
    DEFAULT_MAX_REQUEST_BYTES, DEFAULT_PORT, DEFAULT_READ_TIMEOUT_MS, DEFAULT_TIMEOUT_MS,
};
pub use error::ConfigError;
pub use loader::{load_config, resolve_backend_url};
pub use source::{ConfigSource, FileSource, StringSource};
pub use types::{BackendConfig, Config, ServerConfig};
