//! Operation that answers actions no other operation claims.

use std::sync::Arc;

use futures::FutureExt;
use futures::future::{self, BoxFuture};
use serde_json::Value;

use super::formatter::JsonObjectFormatter;
use super::operation::DispatchOperation;
use crate::context::OperationContext;
use crate::errors::ServiceError;
use crate::fault::FaultException;
use crate::instance::ServiceInstance;
use crate::invoker::{InvocationOutcome, MethodSignature, OperationInvoker};

/// Name of the built-in unhandled operation.
pub const UNHANDLED_OPERATION: &str = "Unhandled";

/// Invoker that rejects every call with an action-not-supported fault.
#[derive(Debug, Default, Clone, Copy)]
pub struct ActionNotSupportedInvoker;

impl OperationInvoker for ActionNotSupportedInvoker {
    fn allocate_inputs(&self) -> Vec<Value> {
        Vec::new()
    }

    fn is_synchronous(&self) -> bool {
        true
    }

    fn invoke(
        &self,
        context: OperationContext,
        _instance: ServiceInstance,
        _inputs: Vec<Value>,
    ) -> BoxFuture<'static, Result<InvocationOutcome, ServiceError>> {
        let fault = FaultException::action_not_supported(context.request_headers().action());
        future::ready(Err(fault.into())).boxed()
    }
}

pub(crate) fn unhandled_operation() -> DispatchOperation {
    let formatter = JsonObjectFormatter::for_signature(&MethodSignature::new(UNHANDLED_OPERATION));
    DispatchOperation::new(
        UNHANDLED_OPERATION,
        None,
        Arc::new(formatter),
        Arc::new(ActionNotSupportedInvoker),
    )
    .with_deserialize_request(false)
}
