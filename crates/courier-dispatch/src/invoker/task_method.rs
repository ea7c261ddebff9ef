//! Invoker for async methods.

use std::any::{Any, type_name};
use std::fmt;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use once_cell::race::OnceBox;
use serde_json::Value;
use tracing::{debug, trace};

use super::{
    INVOKER_TARGET, InvocationOutcome, MethodDelegate, MethodResult, MethodSignature,
    OperationInvoker,
};
use crate::context::OperationContext;
use crate::errors::ServiceError;
use crate::fault::FaultException;
use crate::instance::ServiceInstance;

type MethodFuture = BoxFuture<'static, Result<MethodResult, ServiceError>>;
type TaskMethod<S> = dyn Fn(Arc<S>, OperationContext, Vec<Value>) -> MethodFuture + Send + Sync;

/// Invokes an async closure over a service of type `S`.
///
/// The returned future resolves to [`ServiceError::Canceled`] as soon as the
/// call's cancellation token fires. A security error raised by the method
/// is replaced by the generic access-denied fault; every other error is
/// passed through unchanged.
pub struct TaskMethodInvoker<S> {
    signature: MethodSignature,
    method: Box<TaskMethod<S>>,
    delegate: OnceBox<MethodDelegate>,
}

impl<S> fmt::Debug for TaskMethodInvoker<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskMethodInvoker")
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

impl<S: Any + Send + Sync> TaskMethodInvoker<S> {
    /// Wraps `method`, which must honour `signature`.
    #[must_use]
    pub fn new<F, Fut>(signature: MethodSignature, method: F) -> Self
    where
        F: Fn(Arc<S>, OperationContext, Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<MethodResult, ServiceError>> + Send + 'static,
    {
        Self {
            signature,
            method: Box::new(move |service, context, inputs| {
                method(service, context, inputs).boxed()
            }),
            delegate: OnceBox::new(),
        }
    }

    /// Signature the invoker was built with.
    #[must_use]
    pub const fn signature(&self) -> &MethodSignature {
        &self.signature
    }

    fn delegate(&self) -> MethodDelegate {
        *self
            .delegate
            .get_or_init(|| Box::new(MethodDelegate::for_signature(&self.signature)))
    }
}

impl<S: Any + Send + Sync> OperationInvoker for TaskMethodInvoker<S> {
    fn allocate_inputs(&self) -> Vec<Value> {
        vec![Value::Null; self.delegate().input_count()]
    }

    fn is_synchronous(&self) -> bool {
        false
    }

    fn invoke(
        &self,
        context: OperationContext,
        instance: ServiceInstance,
        inputs: Vec<Value>,
    ) -> BoxFuture<'static, Result<InvocationOutcome, ServiceError>> {
        let delegate = self.delegate();
        let method = self.signature.name().to_owned();
        if let Err(error) = delegate.check_inputs(&method, &inputs) {
            return futures::future::ready(Err(error)).boxed();
        }
        let Ok(service) = Arc::downcast::<S>(instance) else {
            let error = ServiceError::configuration(format!(
                "service instance is not a {}",
                type_name::<S>()
            ));
            return futures::future::ready(Err(error)).boxed();
        };
        let cancellation = context.cancellation_token().clone();
        trace!(target: INVOKER_TARGET, method = %method, "invoking async method");
        let call = (self.method)(service, context, inputs);
        async move {
            let result = tokio::select! {
                biased;
                () = cancellation.cancelled() => Err(ServiceError::Canceled),
                result = call => result,
            };
            let result = match result {
                Err(ServiceError::Security { message }) => {
                    debug!(target: INVOKER_TARGET, method = %method, %message, "access denied");
                    return Err(FaultException::access_denied().into());
                }
                other => other?,
            };
            delegate.outcome(&method, result)
        }
        .boxed()
    }
}
