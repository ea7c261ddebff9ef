//! Small ledger service the routing scenarios dispatch to.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use serde_json::Value;

use crate::errors::{DispatchError, ServiceError};
use crate::instance::FactoryInstanceProvider;
use crate::invoker::{MethodResult, MethodSignature, Parameter, SyncMethodInvoker};
use crate::runtime::{DispatchOperation, DispatchRuntime, JsonObjectFormatter};

/// Action of the ledger's only operation.
pub const ADD_ACTION: &str = "urn:ledger/Add";

#[derive(Debug, Default)]
struct Ledger {
    total: AtomicI64,
}

/// Registers the ledger service and its `Add` operation on `runtime`.
pub fn ledger_runtime(runtime: &DispatchRuntime) -> Result<(), DispatchError> {
    let signature = MethodSignature::new("Add")
        .with_parameter(Parameter::input("amount"))
        .returning();
    let formatter = JsonObjectFormatter::for_signature(&signature);
    let invoker = SyncMethodInvoker::new(signature, |ledger: &Ledger, _, inputs| {
        let amount = inputs
            .first()
            .and_then(Value::as_i64)
            .ok_or_else(|| ServiceError::application("amount must be an integer"))?;
        Ok(MethodResult::new(
            ledger.total.fetch_add(amount, Ordering::SeqCst) + amount,
        ))
    });
    runtime.set_instance_provider(Arc::new(FactoryInstanceProvider::new(Ledger::default)));
    runtime.add_operation(DispatchOperation::new(
        "Add",
        Some(ADD_ACTION.to_owned()),
        Arc::new(formatter),
        Arc::new(invoker),
    ))
}
