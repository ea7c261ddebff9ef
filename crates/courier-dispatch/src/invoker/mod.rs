//! Invocation of service methods.
//!
//! An [`OperationInvoker`] receives the deserialised inputs of a call and
//! runs the target method, returning its result and output parameters.
//! [`SyncMethodInvoker`] wraps a plain closure and completes immediately;
//! [`TaskMethodInvoker`] wraps an async closure and honours the call's
//! cancellation token.

mod sync_method;
mod task_method;

use futures::future::BoxFuture;
use serde_json::Value;
use strum::Display;

use crate::context::OperationContext;
use crate::errors::ServiceError;
use crate::instance::ServiceInstance;

pub use self::sync_method::SyncMethodInvoker;
pub use self::task_method::TaskMethodInvoker;

pub(crate) const INVOKER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::invoker");

/// Direction of a method parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ParameterDirection {
    /// Supplied by the caller.
    In,
    /// Produced by the method.
    Out,
    /// Supplied by the caller and produced by the method.
    InOut,
}

impl ParameterDirection {
    const fn is_input(self) -> bool {
        matches!(self, Self::In | Self::InOut)
    }

    const fn is_output(self) -> bool {
        matches!(self, Self::Out | Self::InOut)
    }
}

/// Declared parameter of a service method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    name: String,
    direction: ParameterDirection,
}

impl Parameter {
    /// Input parameter.
    #[must_use]
    pub fn input(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            direction: ParameterDirection::In,
        }
    }

    /// Output parameter.
    #[must_use]
    pub fn output(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            direction: ParameterDirection::Out,
        }
    }

    /// Parameter that is both read and written.
    #[must_use]
    pub fn in_out(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            direction: ParameterDirection::InOut,
        }
    }

    /// Parameter name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parameter direction.
    #[must_use]
    pub const fn direction(&self) -> ParameterDirection {
        self.direction
    }
}

/// Declared shape of a service method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSignature {
    name: String,
    parameters: Vec<Parameter>,
    returns_value: bool,
}

impl MethodSignature {
    /// Method returning nothing and taking no parameters.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            returns_value: false,
        }
    }

    /// Appends a parameter.
    #[must_use]
    pub fn with_parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Declares that the method returns a value.
    #[must_use]
    pub const fn returning(mut self) -> Self {
        self.returns_value = true;
        self
    }

    /// Method name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared parameters in order.
    #[must_use]
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Names of the parameters the caller supplies, in order.
    pub fn input_names(&self) -> impl Iterator<Item = &str> {
        self.parameters
            .iter()
            .filter(|parameter| parameter.direction.is_input())
            .map(Parameter::name)
    }

    /// Names of the parameters the method produces, in order.
    pub fn output_names(&self) -> impl Iterator<Item = &str> {
        self.parameters
            .iter()
            .filter(|parameter| parameter.direction.is_output())
            .map(Parameter::name)
    }

    /// Returns `true` when the method returns a value.
    #[must_use]
    pub const fn returns_value(&self) -> bool {
        self.returns_value
    }
}

/// Arity of a method, derived once from its signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodDelegate {
    input_count: usize,
    output_count: usize,
    returns_value: bool,
}

impl MethodDelegate {
    /// Derives the delegate for `signature`.
    #[must_use]
    pub fn for_signature(signature: &MethodSignature) -> Self {
        Self {
            input_count: signature.input_names().count(),
            output_count: signature.output_names().count(),
            returns_value: signature.returns_value(),
        }
    }

    /// Number of inputs the method takes.
    #[must_use]
    pub const fn input_count(&self) -> usize {
        self.input_count
    }

    /// Number of outputs the method produces.
    #[must_use]
    pub const fn output_count(&self) -> usize {
        self.output_count
    }

    fn check_inputs(&self, method: &str, inputs: &[Value]) -> Result<(), ServiceError> {
        if inputs.len() == self.input_count {
            Ok(())
        } else {
            Err(ServiceError::configuration(format!(
                "method '{method}' takes {} inputs but {} were supplied",
                self.input_count,
                inputs.len()
            )))
        }
    }

    fn outcome(
        &self,
        method: &str,
        result: MethodResult,
    ) -> Result<InvocationOutcome, ServiceError> {
        if result.outputs.len() != self.output_count {
            return Err(ServiceError::configuration(format!(
                "method '{method}' declares {} outputs but produced {}",
                self.output_count,
                result.outputs.len()
            )));
        }
        Ok(InvocationOutcome {
            return_value: if self.returns_value {
                result.value
            } else {
                Value::Null
            },
            outputs: result.outputs,
        })
    }
}

/// What a service method hands back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MethodResult {
    value: Value,
    outputs: Vec<Value>,
}

impl MethodResult {
    /// Result of a method returning `value`.
    #[must_use]
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            outputs: Vec::new(),
        }
    }

    /// Result of a method returning nothing.
    #[must_use]
    pub fn void() -> Self {
        Self::default()
    }

    /// Appends an output parameter value.
    #[must_use]
    pub fn with_output(mut self, value: impl Into<Value>) -> Self {
        self.outputs.push(value.into());
        self
    }
}

/// Return value and outputs of a completed invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvocationOutcome {
    /// Value returned by the method, `null` for methods returning nothing.
    pub return_value: Value,
    /// Output parameter values in declaration order.
    pub outputs: Vec<Value>,
}

/// Runs the method behind one operation.
pub trait OperationInvoker: Send + Sync {
    /// Input slots the formatter fills before invocation.
    fn allocate_inputs(&self) -> Vec<Value>;

    /// Returns `true` when [`Self::invoke`] completes without suspending.
    fn is_synchronous(&self) -> bool;

    /// Invokes the method on `instance`.
    ///
    /// Outputs are only returned on success.
    fn invoke(
        &self,
        context: OperationContext,
        instance: ServiceInstance,
        inputs: Vec<Value>,
    ) -> BoxFuture<'static, Result<InvocationOutcome, ServiceError>>;
}
