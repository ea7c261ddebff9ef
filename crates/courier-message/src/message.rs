//! Messages and reusable message buffers.
//!
//! A [`Message`] is read once: its body can be consumed a single time, after
//! which only the headers remain available. Callers that need to inspect a
//! message repeatedly copy it into a [`MessageBuffer`] and create throwaway
//! messages from it.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum::Display;
use url::Url;

use crate::error::MessageError;
use crate::fault::MessageFault;
use crate::header::HeaderElement;
use crate::headers::MessageHeaders;
use crate::version::MessageVersion;

/// Payload of a message.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MessageBody {
    /// No body content.
    Empty,
    /// Structured operation payload.
    Payload(serde_json::Value),
    /// Protocol fault.
    Fault(MessageFault),
}

/// Lifecycle state of a [`Message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum MessageState {
    /// The body has not been touched.
    Created,
    /// The body has been consumed.
    Read,
    /// The body has been moved into a buffer.
    Copied,
    /// The message has been closed.
    Closed,
}

/// A SOAP-style message.
#[derive(Debug)]
pub struct Message {
    version: MessageVersion,
    headers: MessageHeaders,
    body: Option<MessageBody>,
    state: MessageState,
}

impl Message {
    /// Creates a message with the given body and no headers.
    #[must_use]
    pub fn new(version: MessageVersion, body: MessageBody) -> Self {
        Self::from_parts(version, MessageHeaders::new(), body)
    }

    /// Creates a message from pre-built headers and body.
    #[must_use]
    pub const fn from_parts(
        version: MessageVersion,
        headers: MessageHeaders,
        body: MessageBody,
    ) -> Self {
        Self {
            version,
            headers,
            body: Some(body),
            state: MessageState::Created,
        }
    }

    /// Creates a fault message.
    #[must_use]
    pub fn fault(version: MessageVersion, fault: MessageFault, action: Option<String>) -> Self {
        Self::new(version, MessageBody::Fault(fault)).with_action(action)
    }

    /// Sets the action header.
    #[must_use]
    pub fn with_action(mut self, action: impl Into<Option<String>>) -> Self {
        self.headers.set_action(action.into());
        self
    }

    /// Sets the `To` header.
    #[must_use]
    pub fn with_to(mut self, to: Url) -> Self {
        self.headers.set_to(Some(to));
        self
    }

    /// Sets the message identifier.
    #[must_use]
    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.headers.set_message_id(Some(message_id.into()));
        self
    }

    /// Appends an out-of-band header.
    #[must_use]
    pub fn with_header(mut self, header: HeaderElement) -> Self {
        self.headers.push(header);
        self
    }

    /// Message version.
    #[must_use]
    pub const fn version(&self) -> MessageVersion {
        self.version
    }

    /// Message headers.
    #[must_use]
    pub const fn headers(&self) -> &MessageHeaders {
        &self.headers
    }

    /// Mutable message headers.
    pub const fn headers_mut(&mut self) -> &mut MessageHeaders {
        &mut self.headers
    }

    /// Action header, if present.
    #[must_use]
    pub fn action(&self) -> Option<&str> {
        self.headers.action()
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> MessageState {
        self.state
    }

    /// Returns `true` when the body holds a fault. Does not consume the body.
    #[must_use]
    pub const fn is_fault(&self) -> bool {
        matches!(self.body, Some(MessageBody::Fault(_)))
    }

    /// Returns `true` when the body holds nothing. Does not consume the body.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self.body, Some(MessageBody::Empty))
    }

    /// Borrows the fault body without consuming it.
    #[must_use]
    pub const fn peek_fault(&self) -> Option<&MessageFault> {
        match &self.body {
            Some(MessageBody::Fault(fault)) => Some(fault),
            _ => None,
        }
    }

    /// Consumes a payload body. An empty body reads as JSON `null`.
    ///
    /// # Errors
    ///
    /// Returns [`MessageError::BodyUnavailable`] when the body was already
    /// consumed and [`MessageError::UnexpectedBody`] when it holds a fault.
    pub fn read_payload(&mut self) -> Result<serde_json::Value, MessageError> {
        match self.take_body()? {
            MessageBody::Empty => Ok(serde_json::Value::Null),
            MessageBody::Payload(value) => Ok(value),
            MessageBody::Fault(_) => Err(MessageError::UnexpectedBody {
                expected: "payload",
            }),
        }
    }

    /// Consumes a fault body.
    ///
    /// # Errors
    ///
    /// Returns [`MessageError::BodyUnavailable`] when the body was already
    /// consumed and [`MessageError::UnexpectedBody`] when it is not a fault.
    pub fn read_fault(&mut self) -> Result<MessageFault, MessageError> {
        match self.take_body()? {
            MessageBody::Fault(fault) => Ok(fault),
            MessageBody::Empty | MessageBody::Payload(_) => {
                Err(MessageError::UnexpectedBody { expected: "fault" })
            }
        }
    }

    /// Moves the message into a reusable buffer.
    ///
    /// # Errors
    ///
    /// Returns [`MessageError::BodyUnavailable`] when the body was already
    /// consumed.
    pub fn create_buffer(&mut self) -> Result<MessageBuffer, MessageError> {
        let body = self.take_body()?;
        self.state = MessageState::Copied;
        Ok(MessageBuffer {
            content: Arc::new(BufferedContent {
                version: self.version,
                headers: self.headers.clone(),
                body,
            }),
        })
    }

    /// Closes the message, discarding any unread body.
    pub fn close(&mut self) {
        self.body = None;
        self.state = MessageState::Closed;
    }

    fn take_body(&mut self) -> Result<MessageBody, MessageError> {
        if self.state != MessageState::Created {
            return Err(MessageError::BodyUnavailable { state: self.state });
        }
        let body = self
            .body
            .take()
            .ok_or(MessageError::BodyUnavailable { state: self.state })?;
        self.state = MessageState::Read;
        Ok(body)
    }
}

#[derive(Debug)]
struct BufferedContent {
    version: MessageVersion,
    headers: MessageHeaders,
    body: MessageBody,
}

/// Immutable copy of a message from which fresh messages can be created.
#[derive(Debug, Clone)]
pub struct MessageBuffer {
    content: Arc<BufferedContent>,
}

impl MessageBuffer {
    /// Creates a new, unread message from the buffer.
    #[must_use]
    pub fn create_message(&self) -> Message {
        Message::from_parts(
            self.content.version,
            self.content.headers.clone(),
            self.content.body.clone(),
        )
    }

    /// Version of the buffered message.
    #[must_use]
    pub fn version(&self) -> MessageVersion {
        self.content.version
    }

    /// Headers of the buffered message.
    #[must_use]
    pub fn headers(&self) -> &MessageHeaders {
        &self.content.headers
    }
}
