// Copyright 2026 The Sentinel Project
// SPDX-License-Identifier: Apache-2.0

pub mod backend;
pub mod client;
pub mod config;
pub mod relay;
pub mod session;
pub mod stream;
pub mod transcript;
