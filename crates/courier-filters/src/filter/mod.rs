//! Message filters.
//!
//! A [`MessageFilter`] is an immutable predicate over a message's headers.
//! Matching never touches the body, so a filter can be applied to a message
//! that is later dispatched. Filters are shared as `Arc<MessageFilter>`
//! handles and tables identify them by handle, not by value.

mod action;
mod address;
mod and;
mod header;

use std::fmt;
use std::sync::Arc;

use courier_message::{Message, MessageBuffer};

pub use self::action::ActionFilter;
pub use self::address::{EndpointAddressFilter, PrefixEndpointAddressFilter};
pub use self::and::{AndFilter, AndMatch};
pub use self::header::HeaderFilter;

/// User-defined filter predicate.
pub trait CustomFilter: fmt::Debug + Send + Sync {
    /// Returns `true` when the message satisfies the predicate.
    fn matches(&self, message: &Message) -> bool;
}

/// A routing predicate.
#[derive(Debug, Clone)]
pub enum MessageFilter {
    /// Matches every message.
    MatchAll,
    /// Matches no message.
    MatchNone,
    /// Matches on the action header.
    Action(ActionFilter),
    /// Matches when both children match.
    And(AndFilter),
    /// Matches on the destination address and required headers.
    EndpointAddress(EndpointAddressFilter),
    /// Matches on a destination address prefix and required headers.
    PrefixEndpointAddress(PrefixEndpointAddressFilter),
    /// Matches on the presence of an out-of-band header.
    Header(HeaderFilter),
    /// Application-defined predicate.
    Custom(Arc<dyn CustomFilter>),
}

impl MessageFilter {
    /// Wraps the filter in a shared handle.
    #[must_use]
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Returns `true` when the message satisfies the filter.
    #[must_use]
    pub fn matches(&self, message: &Message) -> bool {
        match self {
            Self::MatchAll => true,
            Self::MatchNone => false,
            Self::Action(filter) => filter.matches(message),
            Self::And(filter) => filter.matches(message),
            Self::EndpointAddress(filter) => filter.matches(message),
            Self::PrefixEndpointAddress(filter) => filter.matches(message),
            Self::Header(filter) => filter.matches(message),
            Self::Custom(filter) => filter.matches(message),
        }
    }

    /// Matches against a throwaway message created from the buffer.
    #[must_use]
    pub fn matches_buffer(&self, buffer: &MessageBuffer) -> bool {
        self.matches(&buffer.create_message())
    }

    /// Matches and reports whether the address half matched.
    ///
    /// For an [`AndFilter`] the address half is the first child. Every other
    /// filter is treated as a pure address filter.
    #[must_use]
    pub fn matches_with_address_flag(&self, message: &Message) -> AndMatch {
        match self {
            Self::And(filter) => filter.matches_with_address_flag(message),
            other => {
                let matched = other.matches(message);
                AndMatch {
                    matched,
                    address_matched: matched,
                }
            }
        }
    }

    /// Short variant name, used in diagnostics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::MatchAll => "match-all",
            Self::MatchNone => "match-none",
            Self::Action(_) => "action",
            Self::And(_) => "and",
            Self::EndpointAddress(_) => "endpoint-address",
            Self::PrefixEndpointAddress(_) => "prefix-endpoint-address",
            Self::Header(_) => "header",
            Self::Custom(_) => "custom",
        }
    }
}

impl From<ActionFilter> for MessageFilter {
    fn from(filter: ActionFilter) -> Self {
        Self::Action(filter)
    }
}

impl From<AndFilter> for MessageFilter {
    fn from(filter: AndFilter) -> Self {
        Self::And(filter)
    }
}

impl From<EndpointAddressFilter> for MessageFilter {
    fn from(filter: EndpointAddressFilter) -> Self {
        Self::EndpointAddress(filter)
    }
}

impl From<PrefixEndpointAddressFilter> for MessageFilter {
    fn from(filter: PrefixEndpointAddressFilter) -> Self {
        Self::PrefixEndpointAddress(filter)
    }
}

impl From<HeaderFilter> for MessageFilter {
    fn from(filter: HeaderFilter) -> Self {
        Self::Header(filter)
    }
}

#[cfg(test)]
mod tests;
