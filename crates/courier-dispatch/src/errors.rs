//! Error types for request dispatch.
//!
//! [`ServiceError`] covers everything that can go wrong while one call moves
//! through the pipeline; each value is converted into a fault reply by
//! [`crate::fault::ErrorBehavior`]. [`DispatchError`] covers failures the
//! pipeline cannot turn into a reply: broken error handlers, poisoned
//! locks, and misuse of the dispatcher API.

use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;

use courier_filters::FilterError;
use courier_message::MessageError;
use thiserror::Error;

use crate::fault::FaultException;

/// Boxed error returned by user-supplied collaborators.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Errors raised by service code and by the per-call pipeline.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum ServiceError {
    /// Typed protocol fault, serialised as declared.
    #[error("fault: {}", .0.reason().text())]
    Fault(Box<FaultException>),

    /// Caller is not allowed to perform the operation.
    #[error("access denied: {message}")]
    Security {
        /// Generic reason; details stay in the logs.
        message: String,
    },

    /// Caller's credentials could not be authenticated.
    #[error("authentication failed: {message}")]
    Authentication {
        /// Generic reason; details stay in the logs.
        message: String,
    },

    /// Operation was cancelled before it completed.
    #[error("operation was canceled")]
    Canceled,

    /// Dispatcher was configured inconsistently for this call.
    #[error("configuration error: {message}")]
    Configuration {
        /// What was inconsistent.
        message: String,
    },

    /// Request body could not be mapped onto the operation's parameters.
    #[error("failed to deserialize request for '{operation}': {message}")]
    Deserialization {
        /// Operation whose parameters were being read.
        operation: String,
        /// Decoder's description of the mismatch.
        message: String,
    },

    /// Message body was in the wrong state or shape.
    #[error("message error: {0}")]
    Message(#[from] MessageError),

    /// Infrastructure failure surfaced while processing the call.
    #[error("dispatch error: {0}")]
    Dispatch(#[source] Arc<DispatchError>),

    /// Error raised by the service implementation itself.
    #[error("{message}")]
    Application {
        /// Description reported to the caller when detail is enabled.
        message: String,
        /// Underlying cause, if any.
        #[source]
        source: Option<Arc<dyn StdError + Send + Sync>>,
    },
}

impl ServiceError {
    /// Creates a security error.
    #[must_use]
    pub fn security(message: impl Into<String>) -> Self {
        Self::Security {
            message: message.into(),
        }
    }

    /// Creates an authentication error.
    #[must_use]
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a deserialization error.
    #[must_use]
    pub fn deserialization(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Deserialization {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Creates an application error with no underlying source.
    #[must_use]
    pub fn application(message: impl Into<String>) -> Self {
        Self::Application {
            message: message.into(),
            source: None,
        }
    }

    /// Wraps an arbitrary error raised by service code.
    #[must_use]
    pub fn from_source(source: impl StdError + Send + Sync + 'static) -> Self {
        Self::Application {
            message: source.to_string(),
            source: Some(Arc::new(source)),
        }
    }

    /// Short name of the variant, used in exception detail payloads.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Fault(_) => "fault",
            Self::Security { .. } => "security",
            Self::Authentication { .. } => "authentication",
            Self::Canceled => "canceled",
            Self::Configuration { .. } => "configuration",
            Self::Deserialization { .. } => "deserialization",
            Self::Message(_) => "message",
            Self::Dispatch(_) => "dispatch",
            Self::Application { .. } => "application",
        }
    }

    /// Typed fault carried by this error, if any.
    #[must_use]
    pub fn as_fault(&self) -> Option<&FaultException> {
        match self {
            Self::Fault(fault) => Some(fault),
            _ => None,
        }
    }
}

impl From<FaultException> for ServiceError {
    fn from(fault: FaultException) -> Self {
        Self::Fault(Box::new(fault))
    }
}

impl From<DispatchError> for ServiceError {
    fn from(error: DispatchError) -> Self {
        Self::Dispatch(Arc::new(error))
    }
}

/// Errors that escape the fault pipeline or reject a dispatcher operation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DispatchError {
    /// An error handler failed while processing another error.
    #[error("error handler '{handler}' failed: {source}")]
    ErrorHandlerFailed {
        /// Name of the failing handler.
        handler: String,
        /// Error the handler returned.
        #[source]
        source: BoxError,
    },

    /// Endpoint configuration was changed after it was attached.
    #[error("endpoint '{address}' is attached to a channel dispatcher and cannot be modified")]
    EndpointAttached {
        /// Address of the attached endpoint.
        address: String,
    },

    /// Endpoint was not attached to this channel dispatcher.
    #[error("endpoint '{address}' is not attached to this channel dispatcher")]
    EndpointNotAttached {
        /// Address of the endpoint that was not found.
        address: String,
    },

    /// Waiting for the instance lock took longer than the configured bound.
    #[error("timed out after {waited:?} waiting for the instance lock")]
    InstanceLockTimeout {
        /// Bound that elapsed.
        waited: Duration,
    },

    /// Operation was registered twice under the same name.
    #[error("operation '{name}' is already registered")]
    DuplicateOperation {
        /// Name already in use.
        name: String,
    },

    /// Operation lookup by name failed.
    #[error("operation '{name}' is not registered")]
    UnknownOperation {
        /// Name that was looked up.
        name: String,
    },

    /// Filter table rejected an update or found an ambiguous match.
    #[error(transparent)]
    Filter(#[from] FilterError),

    /// Internal error (e.g., lock poisoned).
    #[error("internal error: {message}")]
    Internal {
        /// Description of the failure.
        message: String,
    },
}

impl DispatchError {
    /// Creates an error-handler failure.
    #[must_use]
    pub fn handler_failed(handler: impl Into<String>, source: BoxError) -> Self {
        Self::ErrorHandlerFailed {
            handler: handler.into(),
            source,
        }
    }

    /// Creates an attached-endpoint error.
    #[must_use]
    pub fn endpoint_attached(address: impl Into<String>) -> Self {
        Self::EndpointAttached {
            address: address.into(),
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Creates an internal error describing a poisoned lock.
    #[must_use]
    pub fn poisoned(what: &str) -> Self {
        Self::internal(format!("{what} lock poisoned"))
    }

    /// Returns `true` for an ambiguous filter match.
    #[must_use]
    pub const fn is_ambiguous(&self) -> bool {
        matches!(
            self,
            Self::Filter(FilterError::MultipleFiltersMatched { .. })
        )
    }
}
