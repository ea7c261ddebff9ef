//! Invoker for plain synchronous methods.

use std::any::{Any, type_name};
use std::fmt;

use futures::FutureExt;
use futures::future::{self, BoxFuture};
use once_cell::race::OnceBox;
use serde_json::Value;
use tracing::trace;

use super::{
    INVOKER_TARGET, InvocationOutcome, MethodDelegate, MethodResult, MethodSignature,
    OperationInvoker,
};
use crate::context::OperationContext;
use crate::errors::ServiceError;
use crate::instance::ServiceInstance;

type SyncMethod<S> =
    dyn Fn(&S, &OperationContext, Vec<Value>) -> Result<MethodResult, ServiceError> + Send + Sync;

/// Invokes a closure over a service of type `S` and completes at once.
pub struct SyncMethodInvoker<S> {
    signature: MethodSignature,
    method: Box<SyncMethod<S>>,
    delegate: OnceBox<MethodDelegate>,
}

impl<S> fmt::Debug for SyncMethodInvoker<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncMethodInvoker")
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

impl<S: Any + Send + Sync> SyncMethodInvoker<S> {
    /// Wraps `method`, which must honour `signature`.
    #[must_use]
    pub fn new<F>(signature: MethodSignature, method: F) -> Self
    where
        F: Fn(&S, &OperationContext, Vec<Value>) -> Result<MethodResult, ServiceError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            signature,
            method: Box::new(method),
            delegate: OnceBox::new(),
        }
    }

    /// Signature the invoker was built with.
    #[must_use]
    pub const fn signature(&self) -> &MethodSignature {
        &self.signature
    }

    fn delegate(&self) -> &MethodDelegate {
        self.delegate
            .get_or_init(|| Box::new(MethodDelegate::for_signature(&self.signature)))
    }

    fn call(
        &self,
        context: &OperationContext,
        instance: &ServiceInstance,
        inputs: Vec<Value>,
    ) -> Result<InvocationOutcome, ServiceError> {
        let delegate = self.delegate();
        let method = self.signature.name();
        delegate.check_inputs(method, &inputs)?;
        let service: &(dyn Any + Send + Sync) = instance.as_ref();
        let Some(service) = service.downcast_ref::<S>() else {
            return Err(ServiceError::configuration(format!(
                "service instance is not a {}",
                type_name::<S>()
            )));
        };
        trace!(target: INVOKER_TARGET, method, "invoking synchronous method");
        let result = (self.method)(service, context, inputs)?;
        delegate.outcome(method, result)
    }
}

impl<S: Any + Send + Sync> OperationInvoker for SyncMethodInvoker<S> {
    fn allocate_inputs(&self) -> Vec<Value> {
        vec![Value::Null; self.delegate().input_count()]
    }

    fn is_synchronous(&self) -> bool {
        true
    }

    fn invoke(
        &self,
        context: OperationContext,
        instance: ServiceInstance,
        inputs: Vec<Value>,
    ) -> BoxFuture<'static, Result<InvocationOutcome, ServiceError>> {
        future::ready(self.call(&context, &instance, inputs)).boxed()
    }
}
