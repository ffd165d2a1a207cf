// Copyright 2026 The Sentinel Project
// SPDX-License-Identifier: Apache-2.0

use std::path::{Path, PathBuf};

/// Where relay config YAML is read from.
pub trait ConfigSource {
    /// Names the source in error messages, e.g. the file path.
    fn origin(&self) -> String;

    fn read(&self) -> std::io::Result<String>;
}

/// A `sentinel.yaml` on disk, as named by `--config` or `SENTINEL_CONFIG`.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigSource for FileSource {
    fn origin(&self) -> String {
        self.path.display().to_string()
    }

    fn read(&self) -> std::io::Result<String> {
        std::fs::read_to_string(&self.path)
    }
}

/// Inline YAML.
#[derive(Debug, Clone)]
pub struct StringSource {
    yaml: String,
}

impl StringSource {
    pub fn new(yaml: impl Into<String>) -> Self {
        Self { yaml: yaml.into() }
    }
}

impl ConfigSource for StringSource {
    fn origin(&self) -> String {
        "<inline>".to_string()
    }

    fn read(&self) -> std::io::Result<String> {
        Ok(self.yaml.clone())
    }
}
