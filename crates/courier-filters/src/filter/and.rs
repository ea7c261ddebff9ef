//! Conjunction of two filters.

use std::sync::Arc;

use courier_message::Message;

use super::MessageFilter;

/// Result of [`AndFilter::matches_with_address_flag`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AndMatch {
    /// Both children matched.
    pub matched: bool,
    /// The first (address) child matched, whatever the second did.
    pub address_matched: bool,
}

/// Matches when both children match.
///
/// Endpoint filters put the address filter first and the contract filter
/// second, so the first child's result tells a contract mismatch apart from a
/// message sent to the wrong address.
#[derive(Debug, Clone)]
pub struct AndFilter {
    first: Arc<MessageFilter>,
    second: Arc<MessageFilter>,
}

impl AndFilter {
    /// Combines two filters.
    #[must_use]
    pub const fn new(first: Arc<MessageFilter>, second: Arc<MessageFilter>) -> Self {
        Self { first, second }
    }

    /// The first child.
    #[must_use]
    pub const fn first(&self) -> &Arc<MessageFilter> {
        &self.first
    }

    /// The second child.
    #[must_use]
    pub const fn second(&self) -> &Arc<MessageFilter> {
        &self.second
    }

    /// Returns `true` when both children match.
    #[must_use]
    pub fn matches(&self, message: &Message) -> bool {
        self.first.matches(message) && self.second.matches(message)
    }

    /// Matches and reports the first child's result separately.
    #[must_use]
    pub fn matches_with_address_flag(&self, message: &Message) -> AndMatch {
        let address_matched = self.first.matches(message);
        AndMatch {
            matched: address_matched && self.second.matches(message),
            address_matched,
        }
    }
}
