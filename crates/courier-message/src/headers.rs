//! Addressing and out-of-band message headers.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::header::HeaderElement;

/// Headers carried by a message.
///
/// The addressing headers the dispatcher routes on (`Action`, `To`,
/// `MessageID`, `RelatesTo`, `ReplyTo`) are held as typed fields. Every other
/// header is kept verbatim as an element tree, in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct MessageHeaders {
    action: Option<String>,
    to: Option<Url>,
    message_id: Option<String>,
    relates_to: Option<String>,
    reply_to: Option<Url>,
    extra: Vec<HeaderElement>,
}

impl MessageHeaders {
    /// Creates an empty header collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Action URI, if present.
    #[must_use]
    pub fn action(&self) -> Option<&str> {
        self.action.as_deref()
    }

    /// Replaces the action URI.
    pub fn set_action(&mut self, action: Option<String>) {
        self.action = action;
    }

    /// Destination address, if present.
    #[must_use]
    pub const fn to(&self) -> Option<&Url> {
        self.to.as_ref()
    }

    /// Replaces the destination address.
    pub fn set_to(&mut self, to: Option<Url>) {
        self.to = to;
    }

    /// Message identifier, if present.
    #[must_use]
    pub fn message_id(&self) -> Option<&str> {
        self.message_id.as_deref()
    }

    /// Replaces the message identifier.
    pub fn set_message_id(&mut self, message_id: Option<String>) {
        self.message_id = message_id;
    }

    /// Identifier of the request this message answers, if any.
    #[must_use]
    pub fn relates_to(&self) -> Option<&str> {
        self.relates_to.as_deref()
    }

    /// Replaces the correlation identifier.
    pub fn set_relates_to(&mut self, relates_to: Option<String>) {
        self.relates_to = relates_to;
    }

    /// Reply address, if present.
    #[must_use]
    pub const fn reply_to(&self) -> Option<&Url> {
        self.reply_to.as_ref()
    }

    /// Replaces the reply address.
    pub fn set_reply_to(&mut self, reply_to: Option<Url>) {
        self.reply_to = reply_to;
    }

    /// Out-of-band headers in arrival order.
    #[must_use]
    pub fn extra(&self) -> &[HeaderElement] {
        &self.extra
    }

    /// Appends an out-of-band header.
    pub fn push(&mut self, header: HeaderElement) {
        self.extra.push(header);
    }

    /// Finds the first out-of-band header with the given qualified name.
    #[must_use]
    pub fn find(&self, local: &str, namespace: &str) -> Option<&HeaderElement> {
        self.extra
            .iter()
            .find(|header| header.name().is(local, namespace))
    }

    /// Number of out-of-band headers.
    #[must_use]
    pub fn extra_len(&self) -> usize {
        self.extra.len()
    }
}
