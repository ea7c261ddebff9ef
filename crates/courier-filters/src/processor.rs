//! Required-header matching for address filters.
//!
//! Every header an endpoint address requires is reduced to a canonical string
//! describing its XML shape: element and attribute names with their lengths,
//! attributes sorted by qualified name, and text nodes delimited by length.
//! Identical required headers form a group, and each member of a group owns
//! one bit. An inbound header sets the first free bit of its group, so a
//! duplicated inbound header only counts once per required copy. A message
//! satisfies the address when every required bit is set.

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, PoisonError};

use courier_message::{HeaderContent, HeaderElement, MessageHeaders};
use once_cell::sync::Lazy;
use tracing::trace;

/// Number of idle processors kept by the shared pool.
pub const DEFAULT_POOL_CAPACITY: usize = 32;

const POOL_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::processor");

static SHARED_POOL: Lazy<Arc<ProcessorPool>> =
    Lazy::new(|| Arc::new(ProcessorPool::new(DEFAULT_POOL_CAPACITY)));

/// Writes the canonical form of `header` into `out`.
pub fn canonical_header(header: &HeaderElement, out: &mut String) {
    out.push('<');
    push_name(out, &header.name().local, &header.name().namespace);

    let mut attributes: Vec<_> = header.attributes().iter().collect();
    attributes.sort_by(|left, right| left.name.cmp(&right.name));
    for attribute in attributes {
        out.push('@');
        push_name(out, &attribute.name.local, &attribute.name.namespace);
        push_delimited(out, &attribute.value);
    }

    for node in header.content() {
        match node {
            HeaderContent::Text { text } => {
                out.push('T');
                push_delimited(out, text);
            }
            HeaderContent::Element { element } => canonical_header(element, out),
        }
    }
    out.push('>');
}

fn push_name(out: &mut String, local: &str, namespace: &str) {
    push_delimited(out, local);
    push_delimited(out, namespace);
}

fn push_delimited(out: &mut String, value: &str) {
    out.push_str(&value.len().to_string());
    out.push(':');
    out.push_str(value);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BitGroup {
    first: usize,
    len: usize,
}

/// Precomputed canonical-header lookup for one endpoint address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderLookup {
    groups: HashMap<String, BitGroup>,
    bit_count: usize,
}

impl HeaderLookup {
    /// Builds the lookup for the given required headers.
    #[must_use]
    pub fn new(required: &[HeaderElement]) -> Self {
        let mut order: Vec<(String, usize)> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        for header in required {
            let mut canonical = String::new();
            canonical_header(header, &mut canonical);
            if let Some(&position) = positions.get(&canonical) {
                if let Some(entry) = order.get_mut(position) {
                    entry.1 += 1;
                }
            } else {
                positions.insert(canonical.clone(), order.len());
                order.push((canonical, 1));
            }
        }

        let mut groups = HashMap::with_capacity(order.len());
        let mut next = 0;
        for (canonical, len) in order {
            groups.insert(canonical, BitGroup { first: next, len });
            next += len;
        }
        Self {
            groups,
            bit_count: next,
        }
    }

    /// Number of required header occurrences.
    #[must_use]
    pub const fn bit_count(&self) -> usize {
        self.bit_count
    }

    /// Returns `true` when the address requires no headers.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.bit_count == 0
    }

    fn group(&self, canonical: &str) -> Option<BitGroup> {
        self.groups.get(canonical).copied()
    }
}

#[derive(Debug, Clone, Default)]
struct HeaderMask {
    words: Vec<u64>,
}

impl HeaderMask {
    fn reset(&mut self, bits: usize) {
        self.words.clear();
        self.words.resize((bits + 63) >> 6, 0);
    }

    fn is_set(&self, bit: usize) -> bool {
        self.words
            .get(bit >> 6)
            .is_some_and(|word| word & (1 << (bit & 63)) != 0)
    }

    fn set(&mut self, bit: usize) {
        if let Some(word) = self.words.get_mut(bit >> 6) {
            *word |= 1 << (bit & 63);
        }
    }

    fn is_full(&self, bits: usize) -> bool {
        (0..bits).all(|bit| self.is_set(bit))
    }
}

/// Scratch state for matching required headers.
#[derive(Debug, Default)]
pub struct EndpointAddressProcessor {
    mask: HeaderMask,
    scratch: String,
}

impl EndpointAddressProcessor {
    /// Returns `true` when `headers` carry every header `lookup` requires.
    pub fn matches_headers(&mut self, lookup: &HeaderLookup, headers: &MessageHeaders) -> bool {
        if lookup.is_empty() {
            return true;
        }
        self.mask.reset(lookup.bit_count());
        for header in headers.extra() {
            self.scratch.clear();
            canonical_header(header, &mut self.scratch);
            let Some(group) = lookup.group(&self.scratch) else {
                continue;
            };
            let free = (group.first..group.first + group.len).find(|bit| !self.mask.is_set(*bit));
            if let Some(bit) = free {
                self.mask.set(bit);
            }
        }
        self.mask.is_full(lookup.bit_count())
    }
}

/// Bounded free list of [`EndpointAddressProcessor`]s.
///
/// Processors are borrowed through [`ProcessorPool::acquire`] and returned
/// when the guard drops. Returns beyond the pool capacity are discarded.
#[derive(Debug)]
pub struct ProcessorPool {
    free: Mutex<Vec<EndpointAddressProcessor>>,
    capacity: usize,
}

impl ProcessorPool {
    /// Creates an empty pool keeping at most `capacity` idle processors.
    #[must_use]
    pub const fn new(capacity: usize) -> Self {
        Self {
            free: Mutex::new(Vec::new()),
            capacity,
        }
    }

    /// Process-wide pool used by filters built without an explicit pool.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::clone(&SHARED_POOL)
    }

    /// Maximum number of idle processors.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of idle processors currently pooled.
    #[must_use]
    pub fn idle(&self) -> usize {
        self.free.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Borrows a processor, creating one when the pool is empty.
    #[must_use]
    pub fn acquire(&self) -> PooledProcessor<'_> {
        let processor = self
            .free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
            .unwrap_or_default();
        PooledProcessor {
            pool: self,
            processor,
        }
    }

    fn release(&self, processor: EndpointAddressProcessor) {
        let mut free = self.free.lock().unwrap_or_else(PoisonError::into_inner);
        if free.len() < self.capacity {
            free.push(processor);
        } else {
            trace!(target: POOL_TARGET, capacity = self.capacity, "discarding surplus processor");
        }
    }
}

/// Scoped loan of a pooled processor.
#[derive(Debug)]
pub struct PooledProcessor<'pool> {
    pool: &'pool ProcessorPool,
    processor: EndpointAddressProcessor,
}

impl Deref for PooledProcessor<'_> {
    type Target = EndpointAddressProcessor;

    fn deref(&self) -> &Self::Target {
        &self.processor
    }
}

impl DerefMut for PooledProcessor<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.processor
    }
}

impl Drop for PooledProcessor<'_> {
    fn drop(&mut self) {
        self.pool.release(std::mem::take(&mut self.processor));
    }
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};

    use super::*;

    fn tenant(value: &str) -> HeaderElement {
        HeaderElement::text("Tenant", "urn:t", value)
    }

    fn headers(items: &[HeaderElement]) -> MessageHeaders {
        let mut headers = MessageHeaders::new();
        for item in items {
            headers.push(item.clone());
        }
        headers
    }

    #[fixture]
    fn processor() -> EndpointAddressProcessor {
        EndpointAddressProcessor::default()
    }

    #[test]
    fn canonical_form_sorts_attributes_and_delimits_text() {
        let first = HeaderElement::text("H", "urn:x", "v")
            .with_attribute("b", "", "2")
            .with_attribute("a", "", "1");
        let second = HeaderElement::text("H", "urn:x", "v")
            .with_attribute("a", "", "1")
            .with_attribute("b", "", "2");
        let mut left = String::new();
        let mut right = String::new();
        canonical_header(&first, &mut left);
        canonical_header(&second, &mut right);
        assert_eq!(left, right);
        assert_eq!(left, "<1:H5:urn:x@1:a0:1:1@1:b0:1:2T1:v>");
    }

    #[test]
    fn text_boundaries_are_part_of_the_canonical_form() {
        let split = HeaderElement::new("H", "").with_text("ab").with_text("c");
        let joined = HeaderElement::new("H", "").with_text("a").with_text("bc");
        let mut left = String::new();
        let mut right = String::new();
        canonical_header(&split, &mut left);
        canonical_header(&joined, &mut right);
        assert_ne!(left, right);
    }

    #[rstest]
    fn exact_header_set_matches(mut processor: EndpointAddressProcessor) {
        let lookup = HeaderLookup::new(&[tenant("a"), tenant("b")]);
        assert!(processor.matches_headers(&lookup, &headers(&[tenant("b"), tenant("a")])));
    }

    #[rstest]
    fn missing_required_header_fails(mut processor: EndpointAddressProcessor) {
        let lookup = HeaderLookup::new(&[tenant("a"), tenant("b")]);
        assert!(!processor.matches_headers(&lookup, &headers(&[tenant("a")])));
    }

    #[rstest]
    fn duplicate_inbound_header_counts_once(mut processor: EndpointAddressProcessor) {
        let lookup = HeaderLookup::new(&[tenant("a"), tenant("a")]);
        assert_eq!(lookup.bit_count(), 2);
        assert!(!processor.matches_headers(&lookup, &headers(&[tenant("a")])));
        assert!(processor.matches_headers(
            &lookup,
            &headers(&[tenant("a"), tenant("a"), tenant("a")])
        ));
    }

    #[rstest]
    fn unrelated_extra_headers_are_ignored(mut processor: EndpointAddressProcessor) {
        let lookup = HeaderLookup::new(&[tenant("a")]);
        assert!(processor.matches_headers(&lookup, &headers(&[tenant("z"), tenant("a")])));
    }

    #[test]
    fn pool_caps_idle_processors() {
        let pool = ProcessorPool::new(1);
        {
            let _first = pool.acquire();
            let _second = pool.acquire();
        }
        assert_eq!(pool.idle(), 1);
    }
}
