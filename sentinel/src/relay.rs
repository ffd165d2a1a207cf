// Copyright 2026 The Sentinel Project
// SPDX-License-Identifier: Apache-2.0

// HTTP relay
//
// Responsibilities:
// - Validate inbound `{ "question": ... }` bodies
// - Forward to the backend via the injected `Backend` trait
// - Stream `/ask-stream` bodies through unmodified, as an event stream
// - Return `/ask` bodies as one unit with the backend status preserved
// - Health endpoint

use axum::body::Body;
use axum::extract::State;
use axum::http::header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use futures_util::Stream;
use http_body_util::LengthLimitError;
use serde::Deserialize;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use uuid::Uuid;

use crate::config::ServerConfig;

// ---------------------------------------------------------------------------
// Domain types
// ---------------------------------------------------------------------------

/// Backend endpoint a request is relayed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Blocking question answering, one JSON document back.
    Ask,
    /// Streamed question answering, `data:` lines back.
    AskStream,
}

impl Route {
    /// Path on both the relay and the backend.
    pub fn path(self) -> &'static str {
        match self {
            Route::Ask => "/ask",
            Route::AskStream => "/ask-stream",
        }
    }

    pub fn is_streaming(self) -> bool {
        matches!(self, Route::AskStream)
    }
}

/// Inbound question body. Only used for validation; the raw bytes are
/// what gets forwarded.
#[derive(Debug, Clone, Deserialize)]
pub struct AskRequest {
    pub question: String,
}

/// Validated request handed to the backend.
#[derive(Debug, Clone)]
pub struct RelayRequest {
    pub request_id: String,
    pub body: Bytes,
}

/// Backend response. `body` may still be streaming.
#[derive(Debug)]
pub struct RelayResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Body,
}

/// Errors produced by the relay itself. Backend statuses are never
/// translated into these.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("upstream request failed: {0}")]
    UpstreamFailure(String),

    #[error("upstream request timed out: {0}")]
    UpstreamTimeout(String),

    #[error("request body is not valid JSON: {0}")]
    MalformedJson(String),

    #[error("request body is empty")]
    EmptyBody,

    #[error("request body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    #[error("failed to read request body: {0}")]
    UnreadableBody(String),
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let (status, public_message) = match &self {
            RelayError::UpstreamFailure(_) => {
                (StatusCode::BAD_GATEWAY, "upstream request failed".to_string())
            }
            RelayError::UpstreamTimeout(_) => (
                StatusCode::GATEWAY_TIMEOUT,
                "upstream request timed out".to_string(),
            ),
            RelayError::MalformedJson(_) => (
                StatusCode::BAD_REQUEST,
                "request body is not valid JSON".to_string(),
            ),
            RelayError::EmptyBody => (StatusCode::BAD_REQUEST, "request body is empty".to_string()),
            RelayError::BodyTooLarge { .. } => (StatusCode::PAYLOAD_TOO_LARGE, self.to_string()),
            RelayError::UnreadableBody(_) => (
                StatusCode::BAD_REQUEST,
                "failed to read request body".to_string(),
            ),
        };
        (status, public_message).into_response()
    }
}

// ---------------------------------------------------------------------------
// Trait: Backend (dependency injection point)
// ---------------------------------------------------------------------------

/// Forwards validated questions to the question-answering backend.
///
/// For `Route::AskStream` implementations must return as soon as the
/// backend's status and headers are known, with the body still streaming.
#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    async fn forward(&self, route: Route, request: RelayRequest) -> Result<RelayResponse, RelayError>;
}

// ---------------------------------------------------------------------------
// Request validation
// ---------------------------------------------------------------------------

/// Check that `body` is a JSON object with a string `question`.
pub fn validate_ask_body(body: &[u8]) -> Result<AskRequest, RelayError> {
    if body.is_empty() {
        return Err(RelayError::EmptyBody);
    }
    serde_json::from_slice::<AskRequest>(body).map_err(|e| RelayError::MalformedJson(e.to_string()))
}

// ---------------------------------------------------------------------------
// Shared application state
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn Backend>,
    pub max_request_bytes: usize,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /health -> 200 {"status":"ok"}
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// POST /ask-stream: relay the backend's byte stream as it arrives.
pub async fn ask_stream(State(state): State<AppState>, request: Request<Body>) -> Response {
    relay(&state, Route::AskStream, request).await
}

/// POST /ask: relay the backend's full answer as one body.
pub async fn ask(State(state): State<AppState>, request: Request<Body>) -> Response {
    relay(&state, Route::Ask, request).await
}

async fn relay(state: &AppState, route: Route, request: Request<Body>) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let started = Instant::now();

    let body = match read_body(request, state.max_request_bytes).await {
        Ok(b) => b,
        Err(e) => {
            tracing::warn!(request_id = %request_id, route = route.path(), error = %e, "rejected request");
            return e.into_response();
        }
    };
    let ask = match validate_ask_body(&body) {
        Ok(a) => a,
        Err(e) => {
            tracing::warn!(request_id = %request_id, route = route.path(), error = %e, "rejected request");
            return e.into_response();
        }
    };

    tracing::info!(
        request_id = %request_id,
        route = route.path(),
        question_chars = ask.question.chars().count(),
        "relaying question"
    );

    let relay_req = RelayRequest {
        request_id: request_id.clone(),
        body,
    };

    let upstream = match state.backend.forward(route, relay_req).await {
        Ok(r) => r,
        Err(e) => {
            tracing::error!(
                request_id = %request_id,
                route = route.path(),
                error = %e,
                latency_ms = started.elapsed().as_millis() as u64,
                "backend unreachable"
            );
            return e.into_response();
        }
    };

    tracing::info!(
        request_id = %request_id,
        route = route.path(),
        status = upstream.status.as_u16(),
        latency_ms = started.elapsed().as_millis() as u64,
        "backend responded"
    );

    if route.is_streaming() {
        stream_response(upstream, request_id, started)
    } else {
        full_response(upstream)
    }
}

async fn read_body(request: Request<Body>, limit: usize) -> Result<Bytes, RelayError> {
    let declared = request
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared.is_some_and(|len| len > limit) {
        return Err(RelayError::BodyTooLarge { limit });
    }

    axum::body::to_bytes(request.into_body(), limit)
        .await
        .map_err(|e| {
            if exceeds_limit(&e) {
                RelayError::BodyTooLarge { limit }
            } else {
                RelayError::UnreadableBody(e.to_string())
            }
        })
}

/// True when a body read failed on the length limit rather than on I/O.
fn exceeds_limit(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if e.is::<LengthLimitError>() {
            return true;
        }
        current = e.source();
    }
    false
}

/// Build the client response for a streamed answer.
///
/// The body is passed through chunk by chunk. Success responses are declared
/// as an event stream; failure responses keep the backend's content type.
fn stream_response(upstream: RelayResponse, request_id: String, started: Instant) -> Response {
    let metered = MeteredStream::new(upstream.body.into_data_stream(), request_id, started);
    let mut response = Response::new(Body::from_stream(metered));
    *response.status_mut() = upstream.status;

    let headers = response.headers_mut();
    if upstream.status.is_success() {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
    } else if let Some(content_type) = upstream.headers.get(CONTENT_TYPE) {
        headers.insert(CONTENT_TYPE, content_type.clone());
    }
    response
}

fn full_response(upstream: RelayResponse) -> Response {
    let content_type = upstream
        .headers
        .get(CONTENT_TYPE)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static("application/json"));

    let mut response = Response::new(upstream.body);
    *response.status_mut() = upstream.status;
    response.headers_mut().insert(CONTENT_TYPE, content_type);
    response
}

// ---------------------------------------------------------------------------
// Metered body stream
// ---------------------------------------------------------------------------

/// Passes chunks through untouched while counting bytes. Dropping it before
/// the end (client went away) drops the backend stream with it.
struct MeteredStream<S> {
    inner: S,
    request_id: String,
    started: Instant,
    bytes: usize,
    chunks: usize,
    finished: bool,
}

impl<S> MeteredStream<S> {
    fn new(inner: S, request_id: String, started: Instant) -> Self {
        Self {
            inner,
            request_id,
            started,
            bytes: 0,
            chunks: 0,
            finished: false,
        }
    }
}

impl<S, E> Stream for MeteredStream<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    type Item = Result<Bytes, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.bytes += chunk.len();
                this.chunks += 1;
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                this.finished = true;
                tracing::warn!(
                    request_id = %this.request_id,
                    bytes = this.bytes,
                    error = %e,
                    "backend stream failed mid-body"
                );
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                if !this.finished {
                    this.finished = true;
                    tracing::info!(
                        request_id = %this.request_id,
                        bytes = this.bytes,
                        chunks = this.chunks,
                        latency_ms = this.started.elapsed().as_millis() as u64,
                        "stream relayed"
                    );
                }
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<S> Drop for MeteredStream<S> {
    fn drop(&mut self) {
        if !self.finished {
            tracing::info!(
                request_id = %self.request_id,
                bytes = self.bytes,
                chunks = self.chunks,
                "client disconnected mid-stream, releasing backend stream"
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Router construction
// ---------------------------------------------------------------------------

/// CORS layer for the configured browser origins. An empty list or `*`
/// allows any origin.
pub fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if config.cors_origins.is_empty() || config.cors_origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(AllowOrigin::list(origins))
    }
}

/// Build the relay router. The backend is injected.
pub fn build_router(backend: Arc<dyn Backend>, config: &ServerConfig) -> Router {
    let state = AppState {
        backend,
        max_request_bytes: config.max_request_bytes,
    };

    Router::new()
        .route("/health", get(health))
        .route(Route::Ask.path(), post(ask))
        .route(Route::AskStream.path(), post(ask_stream))
        .layer(build_cors_layer(config))
        .with_state(state)
}

impl RelayResponse {
    pub fn from_bytes(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Body::from(body.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
