//! Two-phase fault pipeline.

use std::sync::Arc;

use courier_message::{FaultCode, FaultReason, Message, MessageFault, MessageVersion};
use tracing::{debug, warn};

use super::{
    DISPATCHER_NAMESPACE, ErrorHandler, ErrorHandlerFaultInfo, ExceptionDetail, FaultConverter,
    FaultException, INTERNAL_ERROR_REASON, INTERNAL_SERVICE_FAULT_CODE,
};
use crate::errors::{DispatchError, ServiceError};

const FAULT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::fault");

/// Error handlers and fault policy for one runtime or channel.
#[derive(Clone)]
pub struct ErrorBehavior {
    handlers: Vec<Arc<dyn ErrorHandler>>,
    converter: Option<Arc<dyn FaultConverter>>,
    include_exception_detail: bool,
    message_version: MessageVersion,
}

impl std::fmt::Debug for ErrorBehavior {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorBehavior")
            .field("handlers", &self.handlers.len())
            .field("converter", &self.converter.is_some())
            .field("include_exception_detail", &self.include_exception_detail)
            .field("message_version", &self.message_version)
            .finish()
    }
}

impl ErrorBehavior {
    /// Creates a behaviour with no handlers or converter.
    #[must_use]
    pub const fn new(message_version: MessageVersion, include_exception_detail: bool) -> Self {
        Self {
            handlers: Vec::new(),
            converter: None,
            include_exception_detail,
            message_version,
        }
    }

    /// Appends an error handler.
    #[must_use]
    pub fn with_handler(mut self, handler: Arc<dyn ErrorHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Appends several error handlers, preserving their order.
    #[must_use]
    pub fn with_handlers(
        mut self,
        handlers: impl IntoIterator<Item = Arc<dyn ErrorHandler>>,
    ) -> Self {
        self.handlers.extend(handlers);
        self
    }

    /// Sets the converter consulted before any other rule.
    #[must_use]
    pub fn with_converter(mut self, converter: Arc<dyn FaultConverter>) -> Self {
        self.converter = Some(converter);
        self
    }

    /// Message version faults are produced in.
    #[must_use]
    pub const fn message_version(&self) -> MessageVersion {
        self.message_version
    }

    /// Whether faults carry full error detail.
    #[must_use]
    pub const fn include_exception_detail(&self) -> bool {
        self.include_exception_detail
    }

    /// Builds the fault message for `error` into `info`.
    ///
    /// The converter is tried first, then typed faults and security errors
    /// are serialised, then every handler may rewrite the result. If no
    /// fault exists afterwards a last-resort internal fault is synthesised
    /// and `info` is marked unhandled. The default fault action is applied
    /// to a fault without one.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::ErrorHandlerFailed`] when a handler fails.
    pub fn provide_fault(
        &self,
        error: &ServiceError,
        info: &mut ErrorHandlerFaultInfo,
    ) -> Result<(), DispatchError> {
        let version = self.message_version;
        if info.fault.is_none() {
            info.fault = self
                .converter
                .as_ref()
                .and_then(|converter| converter.try_create_fault_message(error, version));
        }
        if info.fault.is_none() {
            info.fault = Self::well_known_fault(error).map(|fault| fault.create_message(version));
        }

        for handler in &self.handlers {
            handler
                .provide_fault(error, version, &mut info.fault)
                .map_err(|source| DispatchError::handler_failed(handler.name(), source))?;
        }

        let fault = info.fault.take().unwrap_or_else(|| {
            info.is_considered_unhandled = true;
            self.last_resort_fault(error)
        });
        let internal = fault.peek_fault().is_some_and(|body| {
            body.code()
                .contains(INTERNAL_SERVICE_FAULT_CODE, DISPATCHER_NAMESPACE)
        });
        if internal {
            info.is_considered_unhandled = true;
        }
        let fault = if fault.action().is_none() {
            let action = info.default_fault_action().to_owned();
            fault.with_action(action)
        } else {
            fault
        };
        debug!(
            target: FAULT_TARGET,
            kind = error.kind(),
            action = fault.action(),
            unhandled = info.is_considered_unhandled,
            "fault provided"
        );
        info.fault = Some(fault);
        Ok(())
    }

    /// Lets every handler observe `error`.
    ///
    /// Returns `true` when any handler reports the error handled or when a
    /// fault other than the last-resort fault was produced.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::ErrorHandlerFailed`] when a handler fails.
    pub fn handle_error(
        &self,
        error: &ServiceError,
        info: &ErrorHandlerFaultInfo,
    ) -> Result<bool, DispatchError> {
        let mut handled = false;
        for handler in &self.handlers {
            handled |= handler
                .handle_error(error)
                .map_err(|source| DispatchError::handler_failed(handler.name(), source))?;
        }
        let recognised = info.fault.is_some() && !info.is_considered_unhandled;
        if !(handled || recognised) {
            warn!(target: FAULT_TARGET, %error, "unhandled error");
        }
        Ok(handled || recognised)
    }

    /// Runs both phases and returns the finished fault record with the
    /// result of [`Self::handle_error`].
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::ErrorHandlerFailed`] when a handler fails.
    pub fn process(
        &self,
        error: &ServiceError,
    ) -> Result<(ErrorHandlerFaultInfo, bool), DispatchError> {
        let mut info = ErrorHandlerFaultInfo::new(self.message_version.default_fault_action());
        self.provide_fault(error, &mut info)?;
        let handled = self.handle_error(error, &info)?;
        Ok((info, handled))
    }

    fn well_known_fault(error: &ServiceError) -> Option<FaultException> {
        match error {
            ServiceError::Fault(fault) => Some(fault.as_ref().clone()),
            ServiceError::Security { .. } => Some(FaultException::access_denied()),
            ServiceError::Authentication { .. } => Some(FaultException::authentication_failed()),
            _ => None,
        }
    }

    fn last_resort_fault(&self, error: &ServiceError) -> Message {
        let code = FaultCode::receiver(Some(FaultCode::new(
            INTERNAL_SERVICE_FAULT_CODE,
            DISPATCHER_NAMESPACE,
        )));
        let fault = if self.include_exception_detail {
            MessageFault::new(code, FaultReason::new(error.to_string()))
                .with_detail(ExceptionDetail::from_service_error(error).to_value())
        } else {
            MessageFault::new(code, FaultReason::new(INTERNAL_ERROR_REASON))
        };
        Message::fault(self.message_version, fault, None)
    }
}
