//! Errors raised while reading or copying messages.

use thiserror::Error;

use crate::message::MessageState;

/// Errors arising from message state transitions.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MessageError {
    /// The body was requested after the message had been read, copied or
    /// closed.
    #[error("message body is not readable in state {state}")]
    BodyUnavailable {
        /// State the message was in when the body was requested.
        state: MessageState,
    },

    /// The body does not hold the shape the caller asked for.
    #[error("message body is not a {expected}")]
    UnexpectedBody {
        /// Shape the caller expected (for example `payload` or `fault`).
        expected: &'static str,
    },

    /// A header value could not be interpreted.
    #[error("invalid header '{name}': {message}")]
    InvalidHeader {
        /// Local name of the header.
        name: String,
        /// Description of the problem.
        message: String,
    },
}

impl MessageError {
    /// Builds an invalid-header error.
    #[must_use]
    pub fn invalid_header(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidHeader {
            name: name.into(),
            message: message.into(),
        }
    }
}
