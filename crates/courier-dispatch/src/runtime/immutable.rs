//! The call pipeline, run against a frozen configuration.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use courier_message::{Message, MessageBody};
use tracing::debug;

use super::RUNTIME_TARGET;
use super::operation::DispatchOperation;
use super::rpc::MessageRpc;
use super::selector::OperationSelector;
use crate::channel::{ChannelContext, DispatchOutcome};
use crate::concurrency::ConcurrencyBehavior;
use crate::context::OperationContext;
use crate::errors::{DispatchError, ServiceError};
use crate::fault::ErrorBehavior;
use crate::instance::{InstanceContextManager, InstanceContextProvider, InstanceProvider};
use crate::security::{ServiceAuthenticationManager, ServiceAuthorizationManager};

/// Snapshot of a [`super::DispatchRuntime`] that serves calls.
pub struct ImmutableDispatchRuntime {
    pub(super) concurrency: ConcurrencyBehavior,
    pub(super) instance_context_provider: Arc<InstanceContextProvider>,
    pub(super) instance_provider: Arc<dyn InstanceProvider>,
    pub(super) instance_contexts: Arc<InstanceContextManager>,
    pub(super) authentication: Arc<dyn ServiceAuthenticationManager>,
    pub(super) authorization: Arc<dyn ServiceAuthorizationManager>,
    pub(super) operations: HashMap<String, Arc<DispatchOperation>>,
    pub(super) selector: Arc<dyn OperationSelector>,
    pub(super) unhandled: Arc<DispatchOperation>,
    pub(super) error_behavior: ErrorBehavior,
}

impl fmt::Debug for ImmutableDispatchRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImmutableDispatchRuntime")
            .field("concurrency", &self.concurrency)
            .field("instance_context_provider", &self.instance_context_provider)
            .field("operations", &self.operations.len())
            .field("error_behavior", &self.error_behavior)
            .finish_non_exhaustive()
    }
}

impl ImmutableDispatchRuntime {
    /// Concurrency policy of the snapshot.
    #[must_use]
    pub const fn concurrency(&self) -> ConcurrencyBehavior {
        self.concurrency
    }

    /// Error pipeline of the snapshot.
    #[must_use]
    pub const fn error_behavior(&self) -> &ErrorBehavior {
        &self.error_behavior
    }

    /// Registered operation by name.
    #[must_use]
    pub fn operation(&self, name: &str) -> Option<&Arc<DispatchOperation>> {
        self.operations.get(name)
    }

    /// Operation that will serve `message`.
    #[must_use]
    pub fn select_operation(&self, message: &Message) -> Arc<DispatchOperation> {
        self.selector
            .select_operation(message)
            .and_then(|name| self.operations.get(&name))
            .map_or_else(|| Arc::clone(&self.unhandled), Arc::clone)
    }

    /// Serves one call.
    ///
    /// Every failure inside the pipeline becomes a fault reply. The outcome
    /// asks for the channel to be aborted when no error handler took
    /// responsibility for the failure.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] only when the fault pipeline itself fails.
    pub async fn dispatch(
        &self,
        message: Message,
        channel: &ChannelContext,
    ) -> Result<DispatchOutcome, DispatchError> {
        debug!(target: RUNTIME_TARGET, action = message.action(), "dispatching message");
        let mut rpc = MessageRpc::new(message);
        let served = self.process(&mut rpc, channel).await;
        let finished = self.finish(&mut rpc).map_err(ServiceError::from);
        match served.and(finished) {
            Ok(()) => Ok(rpc.into_outcome(false)),
            Err(error) => self.fail(rpc, error),
        }
    }

    async fn process(
        &self,
        rpc: &mut MessageRpc,
        channel: &ChannelContext,
    ) -> Result<(), ServiceError> {
        let listen_uri = channel.listen_uri();
        let policies = self
            .authentication
            .authenticate(Vec::new(), listen_uri, &mut rpc.request)
            .map_err(|error| ServiceError::authentication(error.to_string()))?;

        let operation = self.select_operation(&rpc.request);
        rpc.operation = Some(Arc::clone(&operation));
        debug!(target: RUNTIME_TARGET, operation = operation.name(), "operation selected");

        let context = OperationContext::new(operation.name(), rpc.request.headers().clone())
            .with_session_id(channel.session_id().map(str::to_owned))
            .with_listen_uri(listen_uri.cloned())
            .with_policies(policies)
            .with_cancellation(channel.cancellation_token().child_token());
        match self.authorization.check_access(&context, &mut rpc.request) {
            Ok(true) => {}
            Ok(false) => {
                return Err(ServiceError::security(format!(
                    "access to '{}' denied",
                    operation.name()
                )));
            }
            Err(error) => return Err(ServiceError::security(error.to_string())),
        }

        let instance_context = self.instance_context_provider.acquire(
            &rpc.request,
            channel,
            &self.instance_provider,
            &self.instance_contexts,
        )?;
        rpc.instance_context = Some(Arc::clone(&instance_context));
        let lock = self.concurrency.lock_instance(&instance_context).await?;
        rpc.lock = Some(Arc::clone(&lock));
        let context = context.with_instance(Arc::clone(&instance_context), lock);

        if operation.release_instance_mode().releases_before_call() {
            instance_context.release_service_instance()?;
        }
        let instance = instance_context.get_service_instance(Some(&rpc.request))?;

        let invoker = operation.invoker();
        let mut inputs = invoker.allocate_inputs();
        if operation.deserialize_request() {
            operation
                .formatter()
                .deserialize_request(&mut rpc.request, &mut inputs)?;
        }
        let outcome = invoker.invoke(context, instance, inputs).await?;

        if operation.is_one_way() {
            return Ok(());
        }
        let version = rpc.request.version();
        let reply = if operation.serialize_reply() {
            operation.formatter().serialize_reply(version, &outcome)?
        } else {
            Message::new(version, MessageBody::Empty)
        };
        rpc.reply = Some(reply.with_action(operation.reply_action_for(rpc.request.action())));
        Ok(())
    }

    /// Releases what the call acquired. Every step runs even when an
    /// earlier one fails; the first failure is reported.
    fn finish(&self, rpc: &mut MessageRpc) -> Result<(), DispatchError> {
        let released = match (&rpc.operation, &rpc.instance_context) {
            (Some(operation), Some(context))
                if operation.release_instance_mode().releases_after_call() =>
            {
                context.release_service_instance()
            }
            _ => Ok(()),
        };
        let unlocked = rpc.lock.take().map_or(Ok(()), |lock| lock.release());
        let completed = rpc.instance_context.as_ref().map_or(Ok(()), |context| {
            self.instance_context_provider
                .complete(context, &self.instance_contexts)
        });
        released.and(unlocked).and(completed)
    }

    fn fail(
        &self,
        mut rpc: MessageRpc,
        error: ServiceError,
    ) -> Result<DispatchOutcome, DispatchError> {
        let error = match (error, &rpc.operation) {
            (ServiceError::Fault(fault), Some(operation)) => {
                ServiceError::from(operation.apply_fault_contract(*fault))
            }
            (error, _) => error,
        };
        debug!(target: RUNTIME_TARGET, kind = error.kind(), %error, "call failed");
        let (info, handled) = self.error_behavior.process(&error)?;
        rpc.reply = None;
        rpc.error = Some(error);
        rpc.fault_info = Some(info);
        Ok(rpc.into_outcome(!handled))
    }
}
