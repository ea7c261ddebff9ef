//! Per-call view handed to service code.

use std::sync::Arc;

use courier_message::{MessageHeaders, Url};
use tokio_util::sync::CancellationToken;

use crate::concurrency::InstanceLock;
use crate::errors::DispatchError;
use crate::instance::InstanceContext;
use crate::security::AuthorizationPolicy;

/// What service code can see about the call it is serving.
#[derive(Debug, Clone)]
pub struct OperationContext {
    operation: String,
    request_headers: MessageHeaders,
    session_id: Option<String>,
    listen_uri: Option<Url>,
    policies: Arc<[AuthorizationPolicy]>,
    instance_context: Option<Arc<InstanceContext>>,
    lock: Option<Arc<InstanceLock>>,
    cancellation: CancellationToken,
}

impl OperationContext {
    /// Creates a context for `operation` with the request's headers.
    #[must_use]
    pub fn new(operation: impl Into<String>, request_headers: MessageHeaders) -> Self {
        Self {
            operation: operation.into(),
            request_headers,
            session_id: None,
            listen_uri: None,
            policies: Arc::from(Vec::new()),
            instance_context: None,
            lock: None,
            cancellation: CancellationToken::new(),
        }
    }

    /// Sets the session the call arrived on.
    #[must_use]
    pub fn with_session_id(mut self, session_id: Option<String>) -> Self {
        self.session_id = session_id;
        self
    }

    /// Sets the URI the channel listens on.
    #[must_use]
    pub fn with_listen_uri(mut self, listen_uri: Option<Url>) -> Self {
        self.listen_uri = listen_uri;
        self
    }

    /// Sets the policies established by authentication.
    #[must_use]
    pub fn with_policies(mut self, policies: Vec<AuthorizationPolicy>) -> Self {
        self.policies = Arc::from(policies);
        self
    }

    /// Sets the token that cancels the call.
    #[must_use]
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub(crate) fn with_instance(
        mut self,
        instance_context: Arc<InstanceContext>,
        lock: Arc<InstanceLock>,
    ) -> Self {
        self.instance_context = Some(instance_context);
        self.lock = Some(lock);
        self
    }

    /// Name of the operation being served.
    #[must_use]
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Headers of the request message.
    #[must_use]
    pub const fn request_headers(&self) -> &MessageHeaders {
        &self.request_headers
    }

    /// Session the call arrived on.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// URI the channel listens on.
    #[must_use]
    pub const fn listen_uri(&self) -> Option<&Url> {
        self.listen_uri.as_ref()
    }

    /// Policies established by authentication.
    #[must_use]
    pub fn authorization_policies(&self) -> &[AuthorizationPolicy] {
        &self.policies
    }

    /// Instance context serving the call, once one has been acquired.
    #[must_use]
    pub const fn instance_context(&self) -> Option<&Arc<InstanceContext>> {
        self.instance_context.as_ref()
    }

    /// Token that fires when the call is cancelled.
    #[must_use]
    pub const fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Returns `true` once cancellation has been requested.
    #[must_use]
    pub fn is_cancellation_requested(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Runs `call` as a call-out from the service.
    ///
    /// Under reentrant concurrency the instance lock is released while
    /// `call` runs, letting other calls use the instance, and reacquired
    /// ahead of new inbound calls once it finishes.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] when the lock cannot be reacquired.
    pub async fn call_out<F>(&self, call: F) -> Result<F::Output, DispatchError>
    where
        F: Future,
    {
        let Some(lock) = &self.lock else {
            return Ok(call.await);
        };
        lock.call_out(call).await
    }
}
