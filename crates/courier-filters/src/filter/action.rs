//! Action-header filter.

use std::collections::BTreeSet;

use courier_message::Message;

use crate::error::FilterError;

/// Matches messages whose action is one of a fixed set.
///
/// A message without an action header is treated as having the empty action,
/// so it only matches when `""` is in the set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionFilter {
    actions: BTreeSet<String>,
}

impl ActionFilter {
    /// Builds a filter from a list of actions. Duplicates collapse.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::EmptyActions`] when `actions` is empty.
    pub fn new<I, S>(actions: I) -> Result<Self, FilterError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let actions: BTreeSet<String> = actions.into_iter().map(Into::into).collect();
        if actions.is_empty() {
            return Err(FilterError::EmptyActions);
        }
        Ok(Self { actions })
    }

    /// The distinct actions, in sorted order.
    pub fn actions(&self) -> impl Iterator<Item = &str> {
        self.actions.iter().map(String::as_str)
    }

    /// Number of distinct actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Always `false`; construction rejects empty sets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Returns `true` when `action` is in the set.
    #[must_use]
    pub fn contains(&self, action: &str) -> bool {
        self.actions.contains(action)
    }

    /// Returns `true` when the message's action is in the set.
    #[must_use]
    pub fn matches(&self, message: &Message) -> bool {
        self.contains(message.action().unwrap_or_default())
    }
}
