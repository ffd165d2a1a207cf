// Copyright 2026 The Sentinel Project
// SPDX-License-Identifier: Apache-2.0

/// Config loading failures. Each names where the problem is: the source for
/// read and parse errors, the key for invalid values.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {origin}: {source}")]
    Read {
        origin: String,
        source: std::io::Error,
    },

    #[error("invalid YAML in config {origin}: {source}")]
    Parse {
        origin: String,
        source: serde_yaml::Error,
    },

    #[error("invalid {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("undefined variable ${{{name}}} in config (not set in environment)")]
    UndefinedVariable { name: String },
}

impl ConfigError {
    pub(super) fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            key,
            reason: reason.into(),
        }
    }
}
