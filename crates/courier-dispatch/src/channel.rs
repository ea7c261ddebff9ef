//! Entry point for messages arriving on a channel.
//!
//! A [`ChannelDispatcher`] owns the endpoints reachable through one
//! listener. [`ChannelDispatcher::dispatch`] resolves each message to an
//! endpoint and hands it to that endpoint's runtime, or answers with a
//! fault when no endpoint can take it.

use std::sync::Arc;

use courier_config::Config;
use courier_message::{Message, MessageVersion, Url};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::endpoint::{EndpointDispatcher, EndpointDispatcherTable};
use crate::errors::{DispatchError, ServiceError};
use crate::fault::{ErrorBehavior, ErrorHandler, FaultException};
use crate::health::HealthReporter;
use crate::runtime::correlate;

const CHANNEL_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::channel");

/// What the transport knows about the channel a message arrived on.
#[derive(Debug, Clone, Default)]
pub struct ChannelContext {
    session_id: Option<String>,
    listen_uri: Option<Url>,
    cancellation: CancellationToken,
}

impl ChannelContext {
    /// Context for a sessionless channel.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the session the channel carries.
    #[must_use]
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Sets the URI the channel listens on.
    #[must_use]
    pub fn with_listen_uri(mut self, listen_uri: Url) -> Self {
        self.listen_uri = Some(listen_uri);
        self
    }

    /// Sets the token that fires when the channel goes away. Calls receive
    /// child tokens of it.
    #[must_use]
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Session the channel carries.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// URI the channel listens on.
    #[must_use]
    pub const fn listen_uri(&self) -> Option<&Url> {
        self.listen_uri.as_ref()
    }

    /// Token that fires when the channel goes away.
    #[must_use]
    pub const fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }
}

/// Result of dispatching one message.
#[derive(Debug, Default)]
pub struct DispatchOutcome {
    /// Message to send back, if any. One-way calls never have one.
    pub reply: Option<Message>,
    /// Error the call failed with.
    pub error: Option<ServiceError>,
    /// `true` when the transport should abort the channel because the
    /// failure was not handled.
    pub abort_channel: bool,
}

/// Routes messages from one channel to the attached endpoints.
pub struct ChannelDispatcher {
    endpoints: EndpointDispatcherTable,
    error_behavior: ErrorBehavior,
    message_version: MessageVersion,
    reporter: Arc<dyn HealthReporter>,
}

impl std::fmt::Debug for ChannelDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelDispatcher")
            .field("endpoints", &self.endpoints)
            .field("message_version", &self.message_version)
            .finish_non_exhaustive()
    }
}

impl ChannelDispatcher {
    /// Creates a dispatcher speaking `message_version`.
    #[must_use]
    pub fn new(
        config: &Config,
        message_version: MessageVersion,
        reporter: Arc<dyn HealthReporter>,
    ) -> Self {
        Self {
            endpoints: EndpointDispatcherTable::new(config.endpoint_table_threshold),
            error_behavior: ErrorBehavior::new(
                message_version,
                config.include_exception_detail_in_faults,
            ),
            message_version,
            reporter,
        }
    }

    /// Adds an error handler for failures that happen before a message
    /// reaches an endpoint.
    #[must_use]
    pub fn with_error_handler(mut self, handler: Arc<dyn ErrorHandler>) -> Self {
        self.error_behavior = self.error_behavior.with_handler(handler);
        self
    }

    /// Message version of the channel.
    #[must_use]
    pub const fn message_version(&self) -> MessageVersion {
        self.message_version
    }

    /// Attached endpoints.
    #[must_use]
    pub const fn endpoints(&self) -> &EndpointDispatcherTable {
        &self.endpoints
    }

    /// Attaches `endpoint`. Its filters are frozen until it is detached.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::EndpointAttached`] when the endpoint is
    /// already attached, or [`DispatchError::Filter`] when its filter
    /// cannot be registered.
    pub fn attach(&self, endpoint: &Arc<EndpointDispatcher>) -> Result<(), DispatchError> {
        endpoint.mark_attached()?;
        if let Err(error) = self.endpoints.add(Arc::clone(endpoint)) {
            endpoint.mark_detached();
            return Err(error);
        }
        endpoint.runtime().bind_message_version(self.message_version);
        self.reporter
            .endpoint_attached(endpoint.address().uri(), endpoint.contract_name());
        Ok(())
    }

    /// Detaches `endpoint`, unfreezing its filters.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::EndpointNotAttached`] when the endpoint is
    /// not attached here.
    pub fn detach(&self, endpoint: &Arc<EndpointDispatcher>) -> Result<(), DispatchError> {
        self.endpoints.remove(endpoint)?;
        endpoint.mark_detached();
        self.reporter
            .endpoint_detached(endpoint.address().uri(), endpoint.contract_name());
        Ok(())
    }

    /// Serves one message.
    ///
    /// A message no endpoint accepts is answered with a
    /// `DestinationUnreachable` fault, or a `ContractFilterMismatch` fault
    /// when an endpoint's address matched but its contract did not. A
    /// message several endpoints accept equally gets an internal fault.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] when endpoint lookup or the fault pipeline
    /// fails outright.
    pub async fn dispatch(
        &self,
        message: Message,
        channel: &ChannelContext,
    ) -> Result<DispatchOutcome, DispatchError> {
        let lookup = match self.endpoints.lookup(&message) {
            Ok(lookup) => lookup,
            Err(error) if error.is_ambiguous() => {
                return self.reject(&message, ServiceError::from(error));
            }
            Err(error) => return Err(error),
        };
        let Some(endpoint) = lookup.endpoint else {
            let fault = if lookup.address_matched {
                FaultException::contract_filter_mismatch(message.action())
            } else {
                FaultException::destination_unreachable(message.headers().to())
            };
            return self.reject(&message, fault.into());
        };
        debug!(
            target: CHANNEL_TARGET,
            endpoint = endpoint.address().uri().as_str(),
            action = message.action(),
            "message routed"
        );
        let outcome = endpoint.runtime().snapshot().dispatch(message, channel).await?;
        if outcome.abort_channel {
            self.report_fault(outcome.error.as_ref());
        }
        Ok(outcome)
    }

    fn reject(
        &self,
        request: &Message,
        error: ServiceError,
    ) -> Result<DispatchOutcome, DispatchError> {
        debug!(target: CHANNEL_TARGET, %error, "message rejected");
        let (mut info, handled) = self.error_behavior.process(&error)?;
        let reply = info
            .fault
            .take()
            .map(|fault| correlate(fault, request.headers()));
        if !handled {
            self.report_fault(Some(&error));
        }
        Ok(DispatchOutcome {
            reply,
            error: Some(error),
            abort_channel: !handled,
        })
    }

    fn report_fault(&self, error: Option<&ServiceError>) {
        if let Some(error) = error {
            self.reporter.channel_faulted(error);
        }
    }
}
