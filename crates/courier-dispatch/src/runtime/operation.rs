//! Operation descriptions held by a dispatch runtime.

use std::fmt;
use std::sync::Arc;

use strum::{Display, EnumString};

use super::formatter::MessageFormatter;
use crate::fault::FaultException;
use crate::invoker::OperationInvoker;

/// When an operation hands its service instance back to the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ReleaseInstanceMode {
    /// The instance is kept for later calls.
    #[default]
    None,
    /// The held instance is released before the call, so the call gets a
    /// fresh one.
    BeforeCall,
    /// The instance is released once the call completes.
    AfterCall,
    /// Both of the above.
    BeforeAndAfterCall,
}

impl ReleaseInstanceMode {
    /// Derives the mode from the two release flags.
    #[must_use]
    pub const fn from_flags(before_call: bool, after_call: bool) -> Self {
        match (before_call, after_call) {
            (false, false) => Self::None,
            (true, false) => Self::BeforeCall,
            (false, true) => Self::AfterCall,
            (true, true) => Self::BeforeAndAfterCall,
        }
    }

    /// Returns `true` when the instance is released before the call.
    #[must_use]
    pub const fn releases_before_call(self) -> bool {
        matches!(self, Self::BeforeCall | Self::BeforeAndAfterCall)
    }

    /// Returns `true` when the instance is released after the call.
    #[must_use]
    pub const fn releases_after_call(self) -> bool {
        matches!(self, Self::AfterCall | Self::BeforeAndAfterCall)
    }
}

/// Whether an operation runs under the caller's identity.
///
/// Carried for hosts that implement impersonation; the dispatcher itself
/// does not act on it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ImpersonationOption {
    /// The operation never impersonates.
    #[default]
    NotAllowed,
    /// Impersonation is permitted when the host enables it.
    Allowed,
    /// The operation must impersonate the caller.
    Required,
}

/// Typed fault an operation declares it may raise.
///
/// A [`FaultException`] whose code carries the contract's name and
/// namespace, and that has no action of its own, is sent with the
/// contract's action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultContract {
    name: String,
    namespace: String,
    action: String,
}

impl FaultContract {
    /// Declares a contract.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            action: action.into(),
        }
    }

    /// Fault code name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fault code namespace.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Action faults under this contract are sent with.
    #[must_use]
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Returns `true` when `fault` falls under the contract.
    #[must_use]
    pub fn covers(&self, fault: &FaultException) -> bool {
        fault.code().contains(&self.name, &self.namespace)
    }
}

/// One operation of a contract: how to recognise, decode, run and answer
/// a call.
#[derive(Clone)]
pub struct DispatchOperation {
    name: String,
    action: Option<String>,
    reply_action: Option<String>,
    formatter: Arc<dyn MessageFormatter>,
    invoker: Arc<dyn OperationInvoker>,
    fault_contracts: Vec<FaultContract>,
    impersonation: ImpersonationOption,
    is_one_way: bool,
    release_instance_before_call: bool,
    release_instance_after_call: bool,
    deserialize_request: bool,
    serialize_reply: bool,
}

impl fmt::Debug for DispatchOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchOperation")
            .field("name", &self.name)
            .field("action", &self.action)
            .field("reply_action", &self.reply_action)
            .field("is_one_way", &self.is_one_way)
            .field("release_instance_mode", &self.release_instance_mode())
            .finish_non_exhaustive()
    }
}

impl DispatchOperation {
    /// Creates a request/reply operation.
    ///
    /// An action of `"*"` makes the operation catch every action no other
    /// operation claims.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        action: Option<String>,
        formatter: Arc<dyn MessageFormatter>,
        invoker: Arc<dyn OperationInvoker>,
    ) -> Self {
        Self {
            name: name.into(),
            action,
            reply_action: None,
            formatter,
            invoker,
            fault_contracts: Vec::new(),
            impersonation: ImpersonationOption::default(),
            is_one_way: false,
            release_instance_before_call: false,
            release_instance_after_call: false,
            deserialize_request: true,
            serialize_reply: true,
        }
    }

    /// Sets the action replies are sent with.
    #[must_use]
    pub fn with_reply_action(mut self, reply_action: impl Into<String>) -> Self {
        self.reply_action = Some(reply_action.into());
        self
    }

    /// Marks the operation one-way: it never produces a reply, not even a
    /// fault.
    #[must_use]
    pub const fn one_way(mut self) -> Self {
        self.is_one_way = true;
        self
    }

    /// Declares a typed fault.
    #[must_use]
    pub fn with_fault_contract(mut self, contract: FaultContract) -> Self {
        self.fault_contracts.push(contract);
        self
    }

    /// Sets the impersonation option.
    #[must_use]
    pub const fn with_impersonation(mut self, impersonation: ImpersonationOption) -> Self {
        self.impersonation = impersonation;
        self
    }

    /// Sets both release flags from `mode`.
    #[must_use]
    pub const fn with_release_instance_mode(mut self, mode: ReleaseInstanceMode) -> Self {
        self.release_instance_before_call = mode.releases_before_call();
        self.release_instance_after_call = mode.releases_after_call();
        self
    }

    /// Sets whether the request body is decoded before invocation.
    #[must_use]
    pub const fn with_deserialize_request(mut self, enabled: bool) -> Self {
        self.deserialize_request = enabled;
        self
    }

    /// Sets whether the result is encoded into the reply body.
    #[must_use]
    pub const fn with_serialize_reply(mut self, enabled: bool) -> Self {
        self.serialize_reply = enabled;
        self
    }

    /// Replaces the invoker.
    pub fn set_invoker(&mut self, invoker: Arc<dyn OperationInvoker>) {
        self.invoker = invoker;
    }

    /// Replaces the formatter.
    pub fn set_formatter(&mut self, formatter: Arc<dyn MessageFormatter>) {
        self.formatter = formatter;
    }

    /// Sets the release-before-call flag.
    pub const fn set_release_instance_before_call(&mut self, enabled: bool) {
        self.release_instance_before_call = enabled;
    }

    /// Sets the release-after-call flag.
    pub const fn set_release_instance_after_call(&mut self, enabled: bool) {
        self.release_instance_after_call = enabled;
    }

    /// Operation name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Action the operation answers to.
    #[must_use]
    pub fn action(&self) -> Option<&str> {
        self.action.as_deref()
    }

    /// Action a reply to `request_action` is sent with.
    ///
    /// Defaults to the request action suffixed with `Response`.
    #[must_use]
    pub fn reply_action_for(&self, request_action: Option<&str>) -> Option<String> {
        self.reply_action
            .clone()
            .or_else(|| request_action.map(|action| format!("{action}Response")))
    }

    /// Body codec.
    #[must_use]
    pub fn formatter(&self) -> &Arc<dyn MessageFormatter> {
        &self.formatter
    }

    /// Method runner.
    #[must_use]
    pub fn invoker(&self) -> &Arc<dyn OperationInvoker> {
        &self.invoker
    }

    /// Declared typed faults.
    #[must_use]
    pub fn fault_contracts(&self) -> &[FaultContract] {
        &self.fault_contracts
    }

    /// Impersonation option.
    #[must_use]
    pub const fn impersonation(&self) -> ImpersonationOption {
        self.impersonation
    }

    /// Returns `true` for a one-way operation.
    #[must_use]
    pub const fn is_one_way(&self) -> bool {
        self.is_one_way
    }

    /// Combined release flags.
    #[must_use]
    pub const fn release_instance_mode(&self) -> ReleaseInstanceMode {
        ReleaseInstanceMode::from_flags(
            self.release_instance_before_call,
            self.release_instance_after_call,
        )
    }

    /// Returns `true` when the request body is decoded.
    #[must_use]
    pub const fn deserialize_request(&self) -> bool {
        self.deserialize_request
    }

    /// Returns `true` when the result is encoded into the reply.
    #[must_use]
    pub const fn serialize_reply(&self) -> bool {
        self.serialize_reply
    }

    /// Gives a typed fault without an action the action of the first
    /// contract covering it.
    pub(crate) fn apply_fault_contract(&self, fault: FaultException) -> FaultException {
        if fault.action().is_some() {
            return fault;
        }
        if let Some(contract) = self.fault_contracts.iter().find(|c| c.covers(&fault)) {
            return fault.with_action(contract.action());
        }
        fault
    }
}
