// Copyright 2026 The Sentinel Project
// SPDX-License-Identifier: Apache-2.0

// Backend forwarding over reqwest
//
// Streamed routes hand back the response as soon as headers arrive, with the
// body still attached to the backend connection, and are bounded only by the
// idle read timeout. Blocking routes read the full body under the total
// timeout.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::HeaderValue;
use futures_util::TryStreamExt;
use std::time::Duration;

use crate::config::BackendConfig;
use crate::relay::{Backend, RelayError, RelayRequest, RelayResponse, Route};

/// Forwards questions to the backend over HTTP.
pub struct ReqwestBackend {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl ReqwestBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .read_timeout(Duration::from_millis(config.read_timeout_ms))
            .build()?;
        Ok(Self::with_client(client, config))
    }

    /// Use an existing client. Only the base URL and blocking timeout are
    /// taken from `config`; connect and read timeouts are the client's.
    pub fn with_client(client: reqwest::Client, config: &BackendConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }

    pub fn url(&self, route: Route) -> String {
        format!("{}{}", self.base_url, route.path())
    }
}

fn map_send_error(e: reqwest::Error) -> RelayError {
    if e.is_timeout() {
        RelayError::UpstreamTimeout(e.to_string())
    } else {
        RelayError::UpstreamFailure(e.to_string())
    }
}

#[async_trait]
impl Backend for ReqwestBackend {
    async fn forward(&self, route: Route, request: RelayRequest) -> Result<RelayResponse, RelayError> {
        let mut req = self
            .client
            .post(self.url(route))
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .header("x-request-id", request.request_id.as_str())
            .body(request.body);

        // A total timeout would cut long answers off mid-stream
        if !route.is_streaming() {
            req = req.timeout(self.timeout);
        }

        let resp = req.send().await.map_err(map_send_error)?;

        let status = resp.status();
        let headers = resp.headers().clone();

        let body = if route.is_streaming() {
            let stream = resp.bytes_stream().map_err(std::io::Error::other);
            Body::from_stream(stream)
        } else {
            let bytes = resp.bytes().await.map_err(map_send_error)?;
            Body::from(bytes)
        };

        Ok(RelayResponse {
            status,
            headers,
            body,
        })
    }
}
