// Copyright 2026 The Sentinel Project
// SPDX-License-Identifier: Apache-2.0

// Chat session: transcript plus the streaming operation state machine.
//
// IDLE -> SENDING -> STREAMING -> COMPLETED | FAILED
//
// One task owns the session and drives at most one operation at a time.
// Observers follow along through a watch channel that is updated once per
// processed chunk, so a partially applied chunk is never visible.

use futures_util::StreamExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::client::{StreamSource, TransportError};
use crate::stream::{Frame, FrameParser};
use crate::transcript::{Message, MessageId, Transcript};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

// ---------------------------------------------------------------------------
// Session state types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationState {
    /// No operation has run yet.
    Idle,
    /// Request dispatched, response headers not in yet.
    Sending,
    /// Body chunks arriving.
    Streaming,
    /// Last operation ended on the sentinel, a clean end, a cancel, or was
    /// abandoned.
    Completed,
    /// Last operation hit a transport failure.
    Failed,
}

impl OperationState {
    /// True while an operation owns the in-flight message.
    pub fn is_active(self) -> bool {
        matches!(self, OperationState::Sending | OperationState::Streaming)
    }
}

/// How a finished operation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Failed(TransportError),
    /// Stopped by the caller's cancellation token.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("an answer is already streaming (state: {0:?})")]
    Busy(OperationState),

    #[error("operation for {0} does not belong to this session")]
    ForeignOperation(MessageId),
}

/// Exclusive right to fill one assistant message. Only `ChatSession::begin`
/// creates one, and `ChatSession::run` consumes it.
///
/// Dropping an operation, or the `run` future driving it, abandons it: the
/// session seals the partial message and accepts the next question.
#[derive(Debug)]
#[must_use = "an operation keeps the session busy until it is run or dropped"]
pub struct Operation {
    session: u64,
    assistant: MessageId,
    question: String,
    alive: Arc<()>,
}

impl Operation {
    pub fn message_id(&self) -> MessageId {
        self.assistant
    }

    pub fn question(&self) -> &str {
        &self.question
    }
}

/// Snapshot published to observers.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptView {
    pub state: OperationState,
    pub messages: Vec<Message>,
}

/// Human-readable note appended to a message whose stream failed.
pub fn failure_notice(err: &TransportError) -> String {
    format!("[answer interrupted: {err}]")
}

// ---------------------------------------------------------------------------
// ChatSession
// ---------------------------------------------------------------------------

/// The message an operation is filling, plus a handle that dies with the
/// operation.
struct InFlight {
    id: MessageId,
    alive: Weak<()>,
}

pub struct ChatSession {
    id: u64,
    transcript: Transcript,
    state: OperationState,
    in_flight: Option<InFlight>,
    updates: watch::Sender<TranscriptView>,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSession {
    pub fn new() -> Self {
        let (updates, _) = watch::channel(TranscriptView {
            state: OperationState::Idle,
            messages: Vec::new(),
        });
        Self {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            transcript: Transcript::new(),
            state: OperationState::Idle,
            in_flight: None,
            updates,
        }
    }

    /// Follow transcript changes, e.g. to render them.
    pub fn subscribe(&self) -> watch::Receiver<TranscriptView> {
        self.updates.subscribe()
    }

    pub fn state(&self) -> OperationState {
        self.state
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// The assistant message currently being filled, if any.
    pub fn in_flight(&self) -> Option<MessageId> {
        self.in_flight.as_ref().map(|f| f.id)
    }

    /// Close out an operation whose `Operation` or `run` future was dropped.
    /// The partial text is kept and sealed and the state becomes COMPLETED.
    /// Returns whether anything was reclaimed. `begin` calls this itself.
    pub fn reclaim_abandoned(&mut self) -> bool {
        let id = match &self.in_flight {
            Some(f) if f.alive.strong_count() == 0 => f.id,
            _ => return false,
        };
        tracing::warn!(message = %id, state = ?self.state, "operation abandoned, sealing partial answer");
        self.finish(id, Outcome::Cancelled);
        true
    }

    /// Append the question and an empty assistant message, and move to
    /// SENDING. Rejected while another operation is active.
    pub fn begin(&mut self, question: impl Into<String>) -> Result<Operation, SessionError> {
        self.reclaim_abandoned();
        if self.state.is_active() {
            tracing::debug!(state = ?self.state, "send rejected, operation in progress");
            return Err(SessionError::Busy(self.state));
        }

        let question = question.into();
        self.transcript.push_user(question.clone());
        let assistant = self.transcript.push_assistant_placeholder();
        let alive = Arc::new(());
        self.in_flight = Some(InFlight {
            id: assistant,
            alive: Arc::downgrade(&alive),
        });
        self.state = OperationState::Sending;
        self.publish();

        Ok(Operation {
            session: self.id,
            assistant,
            question,
            alive,
        })
    }

    /// Ask a question and stream the answer into the transcript.
    pub async fn send(
        &mut self,
        source: &dyn StreamSource,
        question: impl Into<String>,
    ) -> Result<Outcome, SessionError> {
        self.send_with_cancel(source, question, &CancellationToken::new())
            .await
    }

    /// Like `send`, stopping early when `cancel` fires.
    pub async fn send_with_cancel(
        &mut self,
        source: &dyn StreamSource,
        question: impl Into<String>,
        cancel: &CancellationToken,
    ) -> Result<Outcome, SessionError> {
        let op = self.begin(question)?;
        self.run(op, source, cancel).await
    }

    /// Drive an operation to its end.
    ///
    /// Transport problems are recorded in the transcript and returned as
    /// `Outcome::Failed`. The only error is an operation begun on another
    /// session, which is rejected without touching this transcript.
    pub async fn run(
        &mut self,
        op: Operation,
        source: &dyn StreamSource,
        cancel: &CancellationToken,
    ) -> Result<Outcome, SessionError> {
        if op.session != self.id || self.in_flight() != Some(op.assistant) {
            tracing::warn!(message = %op.assistant, "rejecting operation from another session");
            return Err(SessionError::ForeignOperation(op.assistant));
        }
        Ok(self.drive(&op, source, cancel).await)
    }

    async fn drive(
        &mut self,
        op: &Operation,
        source: &dyn StreamSource,
        cancel: &CancellationToken,
    ) -> Outcome {
        let id = op.assistant;

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => return self.finish(id, Outcome::Cancelled),
            opened = source.open(&op.question) => opened,
        };
        let mut stream = match opened {
            Ok(s) => s,
            Err(e) => return self.finish(id, Outcome::Failed(e)),
        };

        self.state = OperationState::Streaming;
        self.publish();

        let mut parser = FrameParser::new();
        let mut bytes = 0usize;
        let mut deltas = 0usize;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    drop(stream);
                    tracing::debug!(message = %id, bytes, deltas, "stream cancelled");
                    return self.finish(id, Outcome::Cancelled);
                }
                next = stream.next() => next,
            };

            let chunk = match next {
                Some(Ok(chunk)) => chunk,
                Some(Err(e)) => {
                    drop(stream);
                    return self.finish(id, Outcome::Failed(e));
                }
                None => {
                    let leftover = parser.finish();
                    if !leftover.is_empty() {
                        tracing::debug!(
                            message = %id,
                            line_bytes = leftover.line_bytes,
                            undecoded_bytes = leftover.undecoded_bytes,
                            "discarding unterminated tail at end of stream"
                        );
                    }
                    tracing::debug!(message = %id, bytes, deltas, "stream ended without sentinel");
                    return self.finish(id, Outcome::Completed);
                }
            };

            bytes += chunk.len();
            let mut added = String::new();
            for frame in parser.push(&chunk) {
                if let Frame::Delta(text) = frame {
                    deltas += 1;
                    if self.apply(id, &text) {
                        added.push_str(&text);
                    }
                }
            }
            self.publish_text(id, &added);

            if parser.is_terminated() {
                drop(stream);
                tracing::debug!(message = %id, bytes, deltas, "sentinel received");
                return self.finish(id, Outcome::Completed);
            }
        }
    }

    fn apply(&mut self, id: MessageId, delta: &str) -> bool {
        match self.transcript.append(id, delta) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(message = %id, error = %e, "dropping delta");
                false
            }
        }
    }

    fn finish(&mut self, id: MessageId, outcome: Outcome) -> Outcome {
        match &outcome {
            Outcome::Completed | Outcome::Cancelled => {
                self.state = OperationState::Completed;
            }
            Outcome::Failed(err) => {
                let has_text = self
                    .transcript
                    .get(id)
                    .is_some_and(|m| !m.text().is_empty());
                let notice = failure_notice(err);
                let notice = if has_text {
                    format!("\n\n{notice}")
                } else {
                    notice
                };
                self.apply(id, &notice);
                self.state = OperationState::Failed;
                tracing::warn!(message = %id, error = %err, "answer stream failed");
            }
        }

        if let Err(e) = self.transcript.seal(id) {
            tracing::warn!(message = %id, error = %e, "could not seal message");
        }
        self.in_flight = None;
        self.publish();
        outcome
    }

    /// Replace the published snapshot. Used on structural changes.
    fn publish(&self) {
        self.updates.send_replace(TranscriptView {
            state: self.state,
            messages: self.transcript.messages().to_vec(),
        });
    }

    /// Extend the in-flight message in the published snapshot. Costs the
    /// length of `added`, not of the transcript.
    fn publish_text(&self, id: MessageId, added: &str) {
        let state = self.state;
        self.updates.send_modify(|view| {
            view.state = state;
            if let Ok(i) = view.messages.binary_search_by_key(&id, |m| m.id()) {
                view.messages[i].push_text(added);
            }
        });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ByteStream;
    use crate::transcript::Role;
    use async_trait::async_trait;
    use bytes::Bytes;
    use reqwest::StatusCode;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio_stream::wrappers::ReceiverStream;

    // -----------------------------------------------------------------------
    // Test doubles
    // -----------------------------------------------------------------------

    /// Serves a fixed list of chunks, then ends the stream.
    struct ChunkSource {
        chunks: Vec<Bytes>,
    }

    impl ChunkSource {
        fn split(input: &str, size: usize) -> Self {
            Self {
                chunks: input
                    .as_bytes()
                    .chunks(size)
                    .map(Bytes::copy_from_slice)
                    .collect(),
            }
        }
    }

    #[async_trait]
    impl StreamSource for ChunkSource {
        async fn open(&self, _question: &str) -> Result<ByteStream, TransportError> {
            let items: Vec<Result<Bytes, TransportError>> =
                self.chunks.iter().cloned().map(Ok).collect();
            Ok(Box::pin(tokio_stream::iter(items)))
        }
    }

    /// Serves whatever the test pushes into the channel; lets the test see
    /// when the session drops the stream.
    struct ChannelSource {
        rx: Mutex<Option<mpsc::Receiver<Result<Bytes, TransportError>>>>,
    }

    fn channel_source(capacity: usize) -> (mpsc::Sender<Result<Bytes, TransportError>>, ChannelSource) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            tx,
            ChannelSource {
                rx: Mutex::new(Some(rx)),
            },
        )
    }

    #[async_trait]
    impl StreamSource for ChannelSource {
        async fn open(&self, _question: &str) -> Result<ByteStream, TransportError> {
            let rx = self.rx.lock().unwrap().take().expect("channel source opened twice");
            Ok(Box::pin(ReceiverStream::new(rx)))
        }
    }

    struct FailingSource(TransportError);

    #[async_trait]
    impl StreamSource for FailingSource {
        async fn open(&self, _question: &str) -> Result<ByteStream, TransportError> {
            Err(self.0.clone())
        }
    }

    /// Never answers; the request stays in SENDING.
    struct HangingSource;

    #[async_trait]
    impl StreamSource for HangingSource {
        async fn open(&self, _question: &str) -> Result<ByteStream, TransportError> {
            std::future::pending().await
        }
    }

    fn answer_text(session: &ChatSession) -> &str {
        session.transcript().last().unwrap().text()
    }

    const ANSWER_STREAM: &str = "data: The answer\ndata:  is 42.\ndata:[END]\n";

    // -----------------------------------------------------------------------
    // Completion
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn end_to_end_answer_for_any_chunking() {
        for size in 1..=ANSWER_STREAM.len() {
            let mut session = ChatSession::new();
            let outcome = session
                .send(&ChunkSource::split(ANSWER_STREAM, size), "What is the answer?")
                .await
                .unwrap();

            assert_eq!(outcome, Outcome::Completed);
            assert_eq!(session.state(), OperationState::Completed);
            assert_eq!(answer_text(&session), "The answer is 42.", "chunk size {size}");
        }
    }

    #[tokio::test]
    async fn transcript_holds_question_then_sealed_answer() {
        let mut session = ChatSession::new();
        session
            .send(&ChunkSource::split(ANSWER_STREAM, 7), "What is the answer?")
            .await
            .unwrap();

        let messages = session.transcript().messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role(), Role::User);
        assert_eq!(messages[0].text(), "What is the answer?");
        assert_eq!(messages[1].role(), Role::Assistant);
        assert!(messages[1].is_sealed());
        assert_eq!(session.in_flight(), None);
    }

    #[tokio::test]
    async fn natural_end_without_sentinel_completes() {
        let mut session = ChatSession::new();
        let source = ChunkSource::split("data: partial answer\ndata:\ndata: unterminated", 4);
        let outcome = session.send(&source, "q").await.unwrap();

        assert_eq!(outcome, Outcome::Completed);
        assert_eq!(answer_text(&session), "partial answer\n");
    }

    #[tokio::test]
    async fn empty_stream_completes_with_empty_answer() {
        let mut session = ChatSession::new();
        let outcome = session.send(&ChunkSource { chunks: vec![] }, "q").await.unwrap();
        assert_eq!(outcome, Outcome::Completed);
        assert_eq!(answer_text(&session), "");
    }

    #[tokio::test]
    async fn sentinel_releases_stream_and_ignores_later_bytes() {
        let (tx, source) = channel_source(8);
        tx.send(Ok(Bytes::from_static(b"data: kept\ndata:[END]\n"))).await.unwrap();
        tx.send(Ok(Bytes::from_static(b"data: after\n"))).await.unwrap();

        let mut session = ChatSession::new();
        let outcome = session.send(&source, "q").await.unwrap();

        assert_eq!(outcome, Outcome::Completed);
        assert_eq!(answer_text(&session), "kept");
        assert!(tx.is_closed(), "stream handle should be released on the sentinel");
    }

    // -----------------------------------------------------------------------
    // Failure
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn http_500_fails_with_notice_and_no_error() {
        let mut session = ChatSession::new();
        let source = FailingSource(TransportError::Status {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: String::new(),
        });

        let outcome = session.send(&source, "q").await.unwrap();

        assert!(matches!(outcome, Outcome::Failed(TransportError::Status { .. })));
        assert_eq!(session.state(), OperationState::Failed);
        let text = answer_text(&session);
        assert!(text.starts_with("[answer interrupted:"), "got {text:?}");
        assert!(text.contains("500"));
    }

    #[tokio::test]
    async fn mid_stream_failure_keeps_partial_text_and_appends_notice() {
        let (tx, source) = channel_source(8);
        tx.send(Ok(Bytes::from_static(b"data: The answer\n"))).await.unwrap();
        tx.send(Err(TransportError::Read("connection reset".into()))).await.unwrap();

        let mut session = ChatSession::new();
        let outcome = session.send(&source, "q").await.unwrap();

        assert_eq!(outcome, Outcome::Failed(TransportError::Read("connection reset".into())));
        assert_eq!(
            answer_text(&session),
            "The answer\n\n[answer interrupted: connection lost while reading the answer: connection reset]"
        );
        assert!(session.transcript().last().unwrap().is_sealed());
    }

    #[tokio::test]
    async fn new_send_allowed_after_failure() {
        let mut session = ChatSession::new();
        session
            .send(&FailingSource(TransportError::Connect("refused".into())), "first")
            .await
            .unwrap();
        assert_eq!(session.state(), OperationState::Failed);

        let outcome = session
            .send(&ChunkSource::split(ANSWER_STREAM, 5), "second")
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Completed);
        assert_eq!(session.transcript().len(), 4);
        assert!(session.transcript().messages()[1].text().contains("refused"));
        assert_eq!(answer_text(&session), "The answer is 42.");
    }

    // -----------------------------------------------------------------------
    // Single active operation
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn second_send_rejected_while_operation_active() {
        let mut session = ChatSession::new();
        let op = session.begin("first").unwrap();
        assert_eq!(session.state(), OperationState::Sending);
        assert_eq!(session.in_flight(), Some(op.message_id()));

        assert_eq!(
            session.begin("second").unwrap_err(),
            SessionError::Busy(OperationState::Sending)
        );
        let rejected = session.send(&ChunkSource::split(ANSWER_STREAM, 3), "third").await;
        assert!(rejected.is_err());
        assert_eq!(session.transcript().len(), 2, "rejected sends must not touch the transcript");

        let outcome = session
            .run(op, &ChunkSource::split(ANSWER_STREAM, 3), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Completed);
        assert_eq!(answer_text(&session), "The answer is 42.");
    }

    #[tokio::test]
    async fn sequential_operations_fill_their_own_messages() {
        let mut session = ChatSession::new();
        session
            .send(&ChunkSource::split("data: one\ndata:[END]\n", 2), "a")
            .await
            .unwrap();
        session
            .send(&ChunkSource::split("data: two\ndata:[END]\n", 2), "b")
            .await
            .unwrap();

        let texts: Vec<&str> = session.transcript().messages().iter().map(|m| m.text()).collect();
        assert_eq!(texts, vec!["a", "one", "b", "two"]);
    }

    // -----------------------------------------------------------------------
    // Cancellation
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn cancel_after_first_delta_releases_stream() {
        let (tx, source) = channel_source(8);
        let source = Arc::new(source);
        let cancel = CancellationToken::new();

        let mut session = ChatSession::new();
        let mut view = session.subscribe();
        let op = session.begin("q").unwrap();

        let task = {
            let source = source.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                let outcome = session.run(op, source.as_ref(), &cancel).await.unwrap();
                (session, outcome)
            })
        };

        tx.send(Ok(Bytes::from_static(b"data: first\n"))).await.unwrap();
        view.wait_for(|v| v.messages.last().is_some_and(|m| m.text() == "first"))
            .await
            .unwrap();
        cancel.cancel();

        let (session, outcome) = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("run should return promptly after cancel")
            .unwrap();

        assert_eq!(outcome, Outcome::Cancelled);
        assert_eq!(session.state(), OperationState::Completed);
        assert_eq!(answer_text(&session), "first");
        assert!(tx.is_closed(), "stream handle should be released on cancel");
    }

    #[tokio::test]
    async fn cancel_while_sending_returns_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut session = ChatSession::new();
        let outcome = session
            .send_with_cancel(&HangingSource, "q", &cancel)
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Cancelled);
        assert_eq!(answer_text(&session), "");
        assert_eq!(session.in_flight(), None);
    }

    // -----------------------------------------------------------------------
    // Observers
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn observers_see_state_transitions_and_growing_text() {
        let (tx, source) = channel_source(8);
        let source = Arc::new(source);

        let mut session = ChatSession::new();
        let mut view = session.subscribe();
        assert_eq!(view.borrow().state, OperationState::Idle);

        let op = session.begin("q").unwrap();
        assert_eq!(view.borrow_and_update().state, OperationState::Sending);

        let task = {
            let source = source.clone();
            tokio::spawn(async move {
                session
                    .run(op, source.as_ref(), &CancellationToken::new())
                    .await
                    .unwrap()
            })
        };

        tx.send(Ok(Bytes::from_static(b"data: The answer\ndata:  is"))).await.unwrap();
        let seen = view
            .wait_for(|v| v.state == OperationState::Streaming && v.messages[1].text() == "The answer")
            .await
            .unwrap()
            .clone();
        assert!(!seen.messages[1].is_sealed());

        tx.send(Ok(Bytes::from_static(b" 42.\ndata:[END]\n"))).await.unwrap();
        assert_eq!(task.await.unwrap(), Outcome::Completed);

        let last = view.borrow_and_update().clone();
        assert_eq!(last.state, OperationState::Completed);
        assert_eq!(last.messages[1].text(), "The answer is 42.");
    }

    #[tokio::test]
    async fn snapshots_track_transcript_for_byte_sized_chunks() {
        let (tx, source) = channel_source(64);
        let source = Arc::new(source);

        let mut session = ChatSession::new();
        session
            .send(&ChunkSource::split("data: earlier\ndata:[END]\n", 4), "first")
            .await
            .unwrap();
        let mut view = session.subscribe();
        let op = session.begin("second").unwrap();

        let task = {
            let source = source.clone();
            tokio::spawn(async move {
                let outcome = session
                    .run(op, source.as_ref(), &CancellationToken::new())
                    .await
                    .unwrap();
                (session, outcome)
            })
        };

        let input = "data: Größe 🦀\ndata:\ndata:  ok\n";
        for byte in input.as_bytes() {
            tx.send(Ok(Bytes::copy_from_slice(&[*byte]))).await.unwrap();
        }
        let seen = view
            .wait_for(|v| v.messages[3].text() == "Größe 🦀\n ok")
            .await
            .unwrap()
            .clone();
        assert_eq!(seen.messages[1].text(), "earlier");
        assert_eq!(seen.state, OperationState::Streaming);

        tx.send(Ok(Bytes::from_static(b"data:[END]\n"))).await.unwrap();
        let (session, outcome) = task.await.unwrap();
        assert_eq!(outcome, Outcome::Completed);
        assert_eq!(view.borrow().messages, session.transcript().messages());
    }

    // -----------------------------------------------------------------------
    // Operation ownership
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn operation_from_another_session_is_rejected() {
        let mut a = ChatSession::new();
        let mut b = ChatSession::new();
        let op_a = a.begin("question for A").unwrap();
        let op_b = b.begin("question for B").unwrap();
        assert_eq!(op_a.message_id(), op_b.message_id());

        let source = ChunkSource::split("data: meant for A\ndata:[END]\n", 6);
        let err = b.run(op_a, &source, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, SessionError::ForeignOperation(_)));
        assert_eq!(answer_text(&b), "", "B's answer must not receive A's deltas");
        assert_eq!(b.state(), OperationState::Sending);

        let outcome = b.run(op_b, &source, &CancellationToken::new()).await.unwrap();
        assert_eq!(outcome, Outcome::Completed);
        assert_eq!(answer_text(&b), "meant for A");

        // A's operation was consumed by the rejected run, so A is free again
        let op = a.begin("again").unwrap();
        assert!(a.transcript().messages()[1].is_sealed());
        assert_eq!(a.in_flight(), Some(op.message_id()));
    }

    #[tokio::test]
    async fn dropped_operation_is_reclaimed_on_next_begin() {
        let mut session = ChatSession::new();
        let op = session.begin("q").unwrap();
        drop(op);
        assert_eq!(session.state(), OperationState::Sending);

        let next = session.begin("next").unwrap();
        assert_eq!(session.state(), OperationState::Sending);
        assert_eq!(session.in_flight(), Some(next.message_id()));
        assert!(session.transcript().messages()[1].is_sealed());
        assert_eq!(session.transcript().len(), 4);
    }

    #[tokio::test]
    async fn aborted_run_is_reclaimed_and_releases_stream() {
        let (tx, source) = channel_source(8);
        tx.send(Ok(Bytes::from_static(b"data: partial\n"))).await.unwrap();

        let mut session = ChatSession::new();
        let op = session.begin("q").unwrap();
        let aborted = tokio::time::timeout(
            Duration::from_millis(100),
            session.run(op, &source, &CancellationToken::new()),
        )
        .await;
        assert!(aborted.is_err(), "run should still be waiting for more chunks");
        assert!(tx.is_closed(), "dropping the run future releases the stream");
        assert_eq!(session.state(), OperationState::Streaming);

        assert!(session.reclaim_abandoned());
        assert_eq!(session.state(), OperationState::Completed);
        assert_eq!(answer_text(&session), "partial");
        assert!(session.transcript().last().unwrap().is_sealed());
        assert!(!session.reclaim_abandoned());

        let outcome = session
            .send(&ChunkSource::split(ANSWER_STREAM, 9), "again")
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Completed);
        assert_eq!(answer_text(&session), "The answer is 42.");
    }

    #[test]
    fn failure_notice_names_reason() {
        assert_eq!(
            failure_notice(&TransportError::MissingBody),
            "[answer interrupted: response has no body]"
        );
    }

    #[test]
    fn active_states() {
        assert!(OperationState::Sending.is_active());
        assert!(OperationState::Streaming.is_active());
        assert!(!OperationState::Idle.is_active());
        assert!(!OperationState::Completed.is_active());
        assert!(!OperationState::Failed.is_active());
    }
}
