//! Shared type definitions for eogate.
//!
//! These types are consumed by the metadata mapper, the plugin registry and
//! the search orchestrator. They carry no behavior beyond simple accessors so
//! every crate in the workspace can depend on them without pulling in I/O.

pub mod metadata;
pub mod product;
pub mod search_result;

pub use metadata::{CANONICAL_KEYS, CanonicalProperties, GENERIC_PRODUCT_TYPE, NOT_AVAILABLE, is_not_available};
pub use product::EoProduct;
pub use search_result::{Filters, SearchResult};
