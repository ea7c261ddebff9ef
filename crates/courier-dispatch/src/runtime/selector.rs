//! Choosing the operation that serves a message.

use std::collections::HashMap;

use courier_message::Message;

use super::operation::DispatchOperation;

/// Action that makes an operation catch every unclaimed action.
pub const WILDCARD_ACTION: &str = "*";

/// Picks the operation for an inbound message by name.
///
/// Returning `None`, or a name the runtime does not know, routes the
/// message to the unhandled operation.
pub trait OperationSelector: Send + Sync {
    /// Name of the operation that should serve `message`.
    fn select_operation(&self, message: &Message) -> Option<String>;
}

/// Default selector: exact match on the action header, then the wildcard
/// operation if one exists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionOperationSelector {
    by_action: HashMap<String, String>,
    wildcard: Option<String>,
}

impl ActionOperationSelector {
    /// Indexes `operations` by action. Operations without an action are
    /// never selected.
    pub fn new<'a>(operations: impl IntoIterator<Item = &'a DispatchOperation>) -> Self {
        let mut selector = Self::default();
        for operation in operations {
            match operation.action() {
                Some(WILDCARD_ACTION) => selector.wildcard = Some(operation.name().to_owned()),
                Some(action) => {
                    selector
                        .by_action
                        .insert(action.to_owned(), operation.name().to_owned());
                }
                None => {}
            }
        }
        selector
    }
}

impl OperationSelector for ActionOperationSelector {
    fn select_operation(&self, message: &Message) -> Option<String> {
        let action = message.action().unwrap_or_default();
        self.by_action
            .get(action)
            .or(self.wildcard.as_ref())
            .cloned()
    }
}
