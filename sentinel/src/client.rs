// Copyright 2026 The Sentinel Project
// SPDX-License-Identifier: Apache-2.0

// Relay client
//
// Opens streamed answers for the chat session and fetches blocking answers.
// Works against the relay or directly against a backend; both expose the
// same `/ask` and `/ask-stream` contract.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{Stream, TryStreamExt};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::time::Duration;

use crate::relay::Route;

/// Raw body chunks of a streamed answer.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

/// Failures between the client and the relay.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("could not reach the server: {0}")]
    Connect(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("server returned HTTP {status}")]
    Status { status: StatusCode, body: String },

    #[error("response has no body")]
    MissingBody,

    #[error("connection lost while reading the answer: {0}")]
    Read(String),

    #[error("unexpected response: {0}")]
    Decode(String),
}

impl TransportError {
    fn from_send(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout(e.to_string())
        } else {
            TransportError::Connect(e.to_string())
        }
    }
}

/// Opens a streamed answer for a question.
#[async_trait]
pub trait StreamSource: Send + Sync {
    /// Resolves once the response headers are in; the body is read
    /// incrementally from the returned stream. Dropping the stream releases
    /// the connection.
    async fn open(&self, question: &str) -> Result<ByteStream, TransportError>;
}

#[derive(Debug, Serialize)]
struct AskBody<'a> {
    question: &'a str,
}

/// Blocking answer document.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AskResponse {
    #[serde(default)]
    pub question: Option<String>,
    pub answer: String,
    #[serde(default)]
    pub sources: Vec<Source>,
    #[serde(default)]
    pub metadata: Option<AnswerMetadata>,
}

/// A retrieved passage the answer cites.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Source {
    pub chunk_id: Option<String>,
    pub page: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AnswerMetadata {
    pub model: Option<String>,
    pub chunks_used: Option<u32>,
    pub latency_ms: Option<u64>,
}

/// HTTP client for the relay.
#[derive(Debug, Clone)]
pub struct RelayClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl RelayClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, timeout)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }

    fn url(&self, route: Route) -> String {
        format!("{}{}", self.base_url, route.path())
    }

    /// Ask and wait for the complete answer.
    pub async fn ask(&self, question: &str) -> Result<AskResponse, TransportError> {
        let resp = self
            .client
            .post(self.url(Route::Ask))
            .json(&AskBody { question })
            .timeout(self.timeout)
            .send()
            .await
            .map_err(TransportError::from_send)?;

        let resp = check_status(resp).await?;
        let body = resp
            .bytes()
            .await
            .map_err(|e| TransportError::Read(e.to_string()))?;
        serde_json::from_slice(&body).map_err(|e| TransportError::Decode(e.to_string()))
    }
}

/// Turn a non-success response into `TransportError::Status`, keeping a
/// best-effort copy of the body for diagnostics.
async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, TransportError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(TransportError::Status { status, body })
}

#[async_trait]
impl StreamSource for RelayClient {
    async fn open(&self, question: &str) -> Result<ByteStream, TransportError> {
        let resp = self
            .client
            .post(self.url(Route::AskStream))
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(&AskBody { question })
            .send()
            .await
            .map_err(TransportError::from_send)?;

        let resp = check_status(resp).await?;
        if resp.status() == StatusCode::NO_CONTENT {
            return Err(TransportError::MissingBody);
        }

        let stream = resp
            .bytes_stream()
            .map_err(|e| TransportError::Read(e.to_string()));
        Ok(Box::pin(stream))
    }
}
