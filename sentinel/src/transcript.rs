// Copyright 2026 The Sentinel Project
// SPDX-License-Identifier: Apache-2.0

// Conversation transcript
//
// An ordered, append-only list of messages. The only mutation allowed after
// insertion is appending text to an assistant message that has not been
// sealed yet. Messages are addressed by `MessageId` handles that are resolved
// at mutation time, never by cached positions.

use serde::Serialize;
use std::fmt;

/// The role of a message participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Stable handle to a message in a `Transcript`.
///
/// Identifiers are assigned monotonically per transcript, so they also sort
/// in insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct MessageId(u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "msg-{}", self.0)
    }
}

/// A single message in the conversation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    id: MessageId,
    role: Role,
    text: String,
    /// Sealed messages reject further appends.
    #[serde(skip)]
    sealed: bool,
}

impl Message {
    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Extend a published copy of this message.
    pub(crate) fn push_text(&mut self, delta: &str) {
        self.text.push_str(delta);
    }
}

/// Errors from addressing or mutating transcript messages.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TranscriptError {
    #[error("no message with id {0}")]
    UnknownMessage(MessageId),

    #[error("message {0} is sealed")]
    Sealed(MessageId),

    #[error("message {0} is not an assistant message")]
    NotAssistant(MessageId),
}

#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<Message>,
    next_id: u64,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a user message. User messages are sealed on insertion.
    pub fn push_user(&mut self, text: impl Into<String>) -> MessageId {
        self.push(Role::User, text.into(), true)
    }

    /// Append an empty assistant message to be filled by deltas.
    pub fn push_assistant_placeholder(&mut self) -> MessageId {
        self.push(Role::Assistant, String::new(), false)
    }

    fn push(&mut self, role: Role, text: String, sealed: bool) -> MessageId {
        let id = MessageId(self.next_id);
        self.next_id += 1;
        self.messages.push(Message {
            id,
            role,
            text,
            sealed,
        });
        id
    }

    /// Append a text delta to an unsealed assistant message.
    pub fn append(&mut self, id: MessageId, delta: &str) -> Result<(), TranscriptError> {
        let message = self.get_mut(id)?;
        if message.role != Role::Assistant {
            return Err(TranscriptError::NotAssistant(id));
        }
        if message.sealed {
            return Err(TranscriptError::Sealed(id));
        }
        message.text.push_str(delta);
        Ok(())
    }

    /// Make a message immutable. Sealing twice is a no-op.
    pub fn seal(&mut self, id: MessageId) -> Result<(), TranscriptError> {
        self.get_mut(id)?.sealed = true;
        Ok(())
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.position(id).map(|i| &self.messages[i])
    }

    fn get_mut(&mut self, id: MessageId) -> Result<&mut Message, TranscriptError> {
        let index = self
            .position(id)
            .ok_or(TranscriptError::UnknownMessage(id))?;
        Ok(&mut self.messages[index])
    }

    fn position(&self, id: MessageId) -> Option<usize> {
        self.messages.binary_search_by_key(&id, |m| m.id).ok()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
