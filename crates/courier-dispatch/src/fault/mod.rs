//! Fault construction and the two-phase error pipeline.
//!
//! Every [`ServiceError`] raised while processing a call ends up here.
//! [`ErrorBehavior::provide_fault`] turns it into a fault [`Message`] and
//! [`ErrorBehavior::handle_error`] lets registered [`ErrorHandler`]s observe
//! it. A reply is always produced: when nothing else recognises the error a
//! generic `InternalServiceFault` is synthesised and flagged as unhandled.

mod behavior;

use std::error::Error as StdError;

use courier_message::{
    ADDRESSING10_NAMESPACE, FaultCode, FaultReason, Message, MessageFault, MessageVersion, Url,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{BoxError, ServiceError};

pub use self::behavior::ErrorBehavior;

/// Namespace of codes minted by the dispatcher itself.
pub const DISPATCHER_NAMESPACE: &str =
    "http://schemas.microsoft.com/net/2005/12/windowscommunicationfoundation/dispatcher";

/// Namespace of WS-Security fault codes.
pub const SECURITY_NAMESPACE: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd";

/// Sub-code of the last-resort fault.
pub const INTERNAL_SERVICE_FAULT_CODE: &str = "InternalServiceFault";
/// Sub-code used when no operation handles the request action.
pub const ACTION_NOT_SUPPORTED_CODE: &str = "ActionNotSupported";
/// Sub-code used when no endpoint listens at the request address.
pub const DESTINATION_UNREACHABLE_CODE: &str = "DestinationUnreachable";
/// Sub-code used when an endpoint matched the address but not the contract.
pub const CONTRACT_FILTER_MISMATCH_CODE: &str = "ContractFilterMismatch";
/// Sub-code used when authorization rejects a call.
pub const ACCESS_DENIED_CODE: &str = "AccessDenied";
/// Sub-code used when authentication rejects a call.
pub const AUTHENTICATION_FAILED_CODE: &str = "FailedAuthentication";

/// Reason attached to the last-resort fault when detail is withheld.
pub const INTERNAL_ERROR_REASON: &str =
    "The server was unable to process the request due to an internal error.";
const ACCESS_DENIED_REASON: &str = "Access is denied.";
const AUTHENTICATION_FAILED_REASON: &str =
    "The security token could not be authenticated or authorized.";

/// Typed protocol fault raised by service code or the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultException {
    code: FaultCode,
    reason: FaultReason,
    action: Option<String>,
    detail: Option<Value>,
}

impl FaultException {
    /// Creates a fault with the given code and reason.
    #[must_use]
    pub const fn new(code: FaultCode, reason: FaultReason) -> Self {
        Self {
            code,
            reason,
            action: None,
            detail: None,
        }
    }

    /// Sets the action of the fault message.
    #[must_use]
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    /// Attaches a detail payload.
    #[must_use]
    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = Some(detail);
        self
    }

    /// Caller is not allowed to perform the operation.
    #[must_use]
    pub fn access_denied() -> Self {
        Self::new(
            FaultCode::sender(Some(FaultCode::new(ACCESS_DENIED_CODE, DISPATCHER_NAMESPACE))),
            FaultReason::new(ACCESS_DENIED_REASON),
        )
    }

    /// Caller's credentials were rejected.
    #[must_use]
    pub fn authentication_failed() -> Self {
        Self::new(
            FaultCode::sender(Some(FaultCode::new(
                AUTHENTICATION_FAILED_CODE,
                SECURITY_NAMESPACE,
            ))),
            FaultReason::new(AUTHENTICATION_FAILED_REASON),
        )
    }

    /// No operation on the endpoint handles `action`.
    #[must_use]
    pub fn action_not_supported(action: Option<&str>) -> Self {
        let action = action.unwrap_or_default();
        Self::new(
            FaultCode::sender(Some(FaultCode::new(
                ACTION_NOT_SUPPORTED_CODE,
                ADDRESSING10_NAMESPACE,
            ))),
            FaultReason::new(format!(
                "The message with Action '{action}' cannot be processed at the receiver."
            )),
        )
    }

    /// No endpoint listens at `to`.
    #[must_use]
    pub fn destination_unreachable(to: Option<&Url>) -> Self {
        let to = to.map(Url::as_str).unwrap_or_default();
        Self::new(
            FaultCode::sender(Some(FaultCode::new(
                DESTINATION_UNREACHABLE_CODE,
                ADDRESSING10_NAMESPACE,
            ))),
            FaultReason::new(format!(
                "The message with To '{to}' cannot be processed at the receiver."
            )),
        )
    }

    /// An endpoint listens at the address but its contract rejects `action`.
    #[must_use]
    pub fn contract_filter_mismatch(action: Option<&str>) -> Self {
        let action = action.unwrap_or_default();
        Self::new(
            FaultCode::sender(Some(FaultCode::new(
                CONTRACT_FILTER_MISMATCH_CODE,
                DISPATCHER_NAMESPACE,
            ))),
            FaultReason::new(format!(
                "The message with Action '{action}' does not match the contract of the \
                 receiving endpoint."
            )),
        )
    }

    /// Generic internal fault.
    #[must_use]
    pub fn internal_service_fault(reason: impl Into<String>) -> Self {
        Self::new(
            FaultCode::receiver(Some(FaultCode::new(
                INTERNAL_SERVICE_FAULT_CODE,
                DISPATCHER_NAMESPACE,
            ))),
            FaultReason::new(reason),
        )
    }

    /// Fault code.
    #[must_use]
    pub const fn code(&self) -> &FaultCode {
        &self.code
    }

    /// Fault reason.
    #[must_use]
    pub const fn reason(&self) -> &FaultReason {
        &self.reason
    }

    /// Action of the fault message, if set.
    #[must_use]
    pub fn action(&self) -> Option<&str> {
        self.action.as_deref()
    }

    /// Detail payload, if any.
    #[must_use]
    pub const fn detail(&self) -> Option<&Value> {
        self.detail.as_ref()
    }

    /// Returns `true` when the code carries the last-resort sub-code.
    #[must_use]
    pub fn is_internal_service_fault(&self) -> bool {
        self.code
            .contains(INTERNAL_SERVICE_FAULT_CODE, DISPATCHER_NAMESPACE)
    }

    /// Builds the fault body.
    #[must_use]
    pub fn to_message_fault(&self) -> MessageFault {
        let mut fault = MessageFault::new(self.code.clone(), self.reason.clone());
        if let Some(detail) = &self.detail {
            fault = fault.with_detail(detail.clone());
        }
        fault
    }

    /// Builds the fault message. The action is left unset when the fault
    /// declares none so the pipeline can apply its default.
    #[must_use]
    pub fn create_message(&self, version: MessageVersion) -> Message {
        Message::fault(version, self.to_message_fault(), self.action.clone())
    }
}

/// Serialisable description of an error and its source chain.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ExceptionDetail {
    /// Classification of the error.
    pub kind: String,
    /// Display text of the error.
    pub message: String,
    /// Detail of the error's source, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inner: Option<Box<ExceptionDetail>>,
}

impl ExceptionDetail {
    /// Describes `error` and every source beneath it.
    #[must_use]
    pub fn new(kind: impl Into<String>, error: &(dyn StdError + 'static)) -> Self {
        let mut chain = Vec::new();
        let mut source = error.source();
        while let Some(current) = source {
            chain.push(current.to_string());
            source = current.source();
        }
        let inner = chain.into_iter().rev().fold(None, |inner, message| {
            Some(Box::new(Self {
                kind: "source".to_owned(),
                message,
                inner,
            }))
        });
        Self {
            kind: kind.into(),
            message: error.to_string(),
            inner,
        }
    }

    /// Describes a service error.
    #[must_use]
    pub fn from_service_error(error: &ServiceError) -> Self {
        Self::new(error.kind(), error)
    }

    /// JSON form of the detail.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Fault being assembled for one failed call.
#[derive(Debug)]
pub struct ErrorHandlerFaultInfo {
    /// Fault message produced so far.
    pub fault: Option<Message>,
    /// Set when the fault is the generic last-resort fault, meaning no
    /// component recognised the error.
    pub is_considered_unhandled: bool,
    default_fault_action: String,
}

impl ErrorHandlerFaultInfo {
    /// Creates an empty fault record.
    #[must_use]
    pub fn new(default_fault_action: impl Into<String>) -> Self {
        Self {
            fault: None,
            is_considered_unhandled: false,
            default_fault_action: default_fault_action.into(),
        }
    }

    /// Action applied to a fault message that does not set its own.
    #[must_use]
    pub fn default_fault_action(&self) -> &str {
        &self.default_fault_action
    }
}

/// Converts well-known errors into fault messages ahead of the typed-fault
/// rules.
pub trait FaultConverter: Send + Sync {
    /// Returns a fault message for `error`, or `None` to decline.
    fn try_create_fault_message(
        &self,
        error: &ServiceError,
        version: MessageVersion,
    ) -> Option<Message>;
}

/// User-registered observer of call failures.
///
/// Handlers run in registration order. Returning an error from either method
/// aborts the pipeline with [`crate::DispatchError::ErrorHandlerFailed`].
pub trait ErrorHandler: Send + Sync {
    /// Name reported when the handler fails.
    fn name(&self) -> String {
        std::any::type_name::<Self>().to_owned()
    }

    /// May replace or clear the fault produced for `error`.
    ///
    /// # Errors
    ///
    /// Any error is escalated rather than converted into a fault.
    fn provide_fault(
        &self,
        error: &ServiceError,
        version: MessageVersion,
        fault: &mut Option<Message>,
    ) -> Result<(), BoxError>;

    /// Observes `error`, returning `true` when the handler dealt with it.
    ///
    /// # Errors
    ///
    /// Any error is escalated rather than converted into a fault.
    fn handle_error(&self, error: &ServiceError) -> Result<bool, BoxError>;
}

#[cfg(test)]
mod tests;
