// Copyright 2026 The Sentinel Project
// SPDX-License-Identifier: Apache-2.0

/// Backend address used when neither the environment nor the config file
/// names one.
pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8000";

/// Timeout for the blocking `/ask` forward. Streamed forwards have no total
/// timeout, only the connect and read timeouts.
pub const DEFAULT_TIMEOUT_MS: u64 = 120_000;

pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;

/// Longest silence tolerated while waiting for response headers or the next
/// body chunk.
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 60_000;

pub const DEFAULT_PORT: u16 = 9810;

/// Browser front-end origins allowed by default.
pub const DEFAULT_CORS_ORIGINS: &[&str] = &["http://localhost:3000", "http://127.0.0.1:3000"];

pub const DEFAULT_MAX_REQUEST_BYTES: usize = 64 * 1024;
