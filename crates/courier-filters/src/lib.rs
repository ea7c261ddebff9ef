//! Message filters and filter tables for the Courier dispatcher.
//!
//! Filters are predicates over message headers: the action, the `To`
//! address, and any out-of-band headers an endpoint address requires.
//! Tables map many filters to values and return the one value a message
//! selects, failing with [`FilterError::MultipleFiltersMatched`] when the
//! choice is ambiguous.
//!
//! ```text
//! FilterTable<V>
//! ├── priority 10 ── ActionFilterTable | AndFilterTable | EndpointAddressFilterTable
//! │                  PrefixEndpointAddressFilterTable | SequentialFilterTable
//! └── priority 0  ── ...
//! ```
//!
//! Tables are not synchronised; wrap one in [`SynchronizedFilterTable`] to
//! share it between threads.

mod error;
mod filter;
pub mod processor;
mod table;
mod uri;

pub use self::error::FilterError;
pub use self::filter::{
    ActionFilter, AndFilter, AndMatch, CustomFilter, EndpointAddressFilter, HeaderFilter,
    MessageFilter, PrefixEndpointAddressFilter,
};
pub use self::processor::{DEFAULT_POOL_CAPACITY, ProcessorPool};
pub use self::table::{
    ActionFilterTable, AndFilterTable, EndpointAddressFilterTable, FilterMatch, FilterTable,
    MessageFilterTable, PrefixEndpointAddressFilterTable, SequentialFilterTable,
    SynchronizedFilterTable, single,
};
pub use self::uri::UriComparer;
