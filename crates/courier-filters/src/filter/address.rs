//! Destination-address filters.

use std::sync::Arc;

use courier_message::{EndpointAddress, Message, MessageHeaders};

use crate::error::FilterError;
use crate::processor::{HeaderLookup, ProcessorPool};
use crate::uri::UriComparer;

/// Matches messages sent to an exact endpoint address.
///
/// The `To` header must equal the address URI under the filter's
/// [`UriComparer`], and the message must carry exactly the required headers
/// of the address (see [`crate::processor`]).
#[derive(Debug, Clone)]
pub struct EndpointAddressFilter {
    address: EndpointAddress,
    comparer: UriComparer,
    key: String,
    lookup: HeaderLookup,
    pool: Arc<ProcessorPool>,
}

impl EndpointAddressFilter {
    /// Builds a filter; `include_host_name` selects the comparer.
    #[must_use]
    pub fn new(address: EndpointAddress, include_host_name: bool) -> Self {
        let comparer = if include_host_name {
            UriComparer::HOST_INCLUSIVE
        } else {
            UriComparer::HOST_AGNOSTIC
        };
        Self::with_comparer(address, comparer)
    }

    /// Builds a filter with an explicit comparer.
    #[must_use]
    pub fn with_comparer(address: EndpointAddress, comparer: UriComparer) -> Self {
        let key = comparer.key(address.uri());
        let lookup = HeaderLookup::new(address.headers());
        Self {
            address,
            comparer,
            key,
            lookup,
            pool: ProcessorPool::shared(),
        }
    }

    /// Uses `pool` for header matching instead of the shared pool.
    #[must_use]
    pub fn with_pool(mut self, pool: Arc<ProcessorPool>) -> Self {
        self.pool = pool;
        self
    }

    /// The endpoint address.
    #[must_use]
    pub const fn address(&self) -> &EndpointAddress {
        &self.address
    }

    /// The URI comparer.
    #[must_use]
    pub const fn comparer(&self) -> UriComparer {
        self.comparer
    }

    /// Normalised URI key, used by hashed address tables.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns `true` when the message targets this address.
    #[must_use]
    pub fn matches(&self, message: &Message) -> bool {
        let Some(to) = message.headers().to() else {
            return false;
        };
        self.comparer.key(to) == self.key && self.matches_headers(message.headers())
    }

    pub(crate) fn matches_headers(&self, headers: &MessageHeaders) -> bool {
        self.pool.acquire().matches_headers(&self.lookup, headers)
    }
}

/// Matches messages sent to an endpoint address or anything beneath it.
#[derive(Debug, Clone)]
pub struct PrefixEndpointAddressFilter {
    address: EndpointAddress,
    comparer: UriComparer,
    authority: String,
    segments: Vec<String>,
    lookup: HeaderLookup,
    pool: Arc<ProcessorPool>,
}

impl PrefixEndpointAddressFilter {
    /// Builds a prefix filter.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::InvalidAddress`] when the URI has no
    /// hierarchical path to take a prefix of.
    pub fn new(address: EndpointAddress, comparer: UriComparer) -> Result<Self, FilterError> {
        let segments = UriComparer::segments(address.uri()).ok_or_else(|| {
            FilterError::invalid_address(address.uri().as_str(), "URI has no hierarchical path")
        })?;
        let authority = comparer.authority_key(address.uri());
        let lookup = HeaderLookup::new(address.headers());
        Ok(Self {
            address,
            comparer,
            authority,
            segments,
            lookup,
            pool: ProcessorPool::shared(),
        })
    }

    /// Uses `pool` for header matching instead of the shared pool.
    #[must_use]
    pub fn with_pool(mut self, pool: Arc<ProcessorPool>) -> Self {
        self.pool = pool;
        self
    }

    /// The endpoint address.
    #[must_use]
    pub const fn address(&self) -> &EndpointAddress {
        &self.address
    }

    /// The URI comparer.
    #[must_use]
    pub const fn comparer(&self) -> UriComparer {
        self.comparer
    }

    pub(crate) fn authority(&self) -> &str {
        &self.authority
    }

    pub(crate) fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Returns `true` when the message targets this address or a descendant.
    #[must_use]
    pub fn matches(&self, message: &Message) -> bool {
        let Some(to) = message.headers().to() else {
            return false;
        };
        self.comparer.is_prefix(self.address.uri(), to) && self.matches_headers(message.headers())
    }

    pub(crate) fn matches_headers(&self, headers: &MessageHeaders) -> bool {
        self.pool.acquire().matches_headers(&self.lookup, headers)
    }
}
