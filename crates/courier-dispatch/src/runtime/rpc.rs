//! State carried through one call.

use std::sync::Arc;

use courier_message::{Message, MessageHeaders};

use super::operation::DispatchOperation;
use crate::channel::DispatchOutcome;
use crate::concurrency::InstanceLock;
use crate::errors::ServiceError;
use crate::fault::ErrorHandlerFaultInfo;
use crate::instance::InstanceContext;

/// Everything the pipeline learns about a call while serving it.
#[derive(Debug)]
pub(crate) struct MessageRpc {
    pub(crate) request: Message,
    pub(crate) operation: Option<Arc<DispatchOperation>>,
    pub(crate) instance_context: Option<Arc<InstanceContext>>,
    pub(crate) lock: Option<Arc<InstanceLock>>,
    pub(crate) error: Option<ServiceError>,
    pub(crate) fault_info: Option<ErrorHandlerFaultInfo>,
    pub(crate) reply: Option<Message>,
}

impl MessageRpc {
    pub(crate) const fn new(request: Message) -> Self {
        Self {
            request,
            operation: None,
            instance_context: None,
            lock: None,
            error: None,
            fault_info: None,
            reply: None,
        }
    }

    /// Returns `true` when no reply may be sent, not even a fault.
    pub(crate) fn is_one_way(&self) -> bool {
        self.operation
            .as_ref()
            .is_some_and(|operation| operation.is_one_way())
    }

    /// Finishes the call. A fault replaces any reply, and one-way calls
    /// answer nothing.
    pub(crate) fn into_outcome(self, abort_channel: bool) -> DispatchOutcome {
        let one_way = self.is_one_way();
        let fault = self.fault_info.and_then(|info| info.fault);
        let reply = fault
            .or(self.reply)
            .filter(|_| !one_way)
            .map(|reply| correlate(reply, self.request.headers()));
        DispatchOutcome {
            reply,
            error: self.error,
            abort_channel,
        }
    }
}

/// Points `reply` at the request it answers.
pub(crate) fn correlate(mut reply: Message, request: &MessageHeaders) -> Message {
    if let Some(message_id) = request.message_id() {
        reply
            .headers_mut()
            .set_relates_to(Some(message_id.to_owned()));
    }
    reply
}
