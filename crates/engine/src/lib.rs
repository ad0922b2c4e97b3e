//! # eogate Engine
//!
//! Searches Earth-Observation catalogs through the providers configured in
//! an [`eogate_registry::PluginRegistry`].
//!
//! ## Key Features
//!
//! - **Product type resolution**: an explicit product type wins, otherwise it
//!   is guessed from `platform`, `instrument` and similar filters
//! - **Paging**: single pages, lazy page iteration and exhaustive collection
//! - **Fallback**: providers are tried in priority order until one answers
//! - **Fuzzy counts**: inconsistent totals reported by providers are
//!   reconciled into a best-effort estimate
//!
//! ## Usage
//!
//! ```no_run
//! use eogate_engine::{SearchOrchestrator, SearchParams};
//!
//! let orchestrator = SearchOrchestrator::from_environment()?;
//! let params = SearchParams::new()
//!     .with_product_type("S2_MSI_L1C")
//!     .with_filter("cloudCover", 20)
//!     .with_count(true);
//! let result = orchestrator.search_with_fallback(&params)?;
//! println!("{} of ~{:?} products", result.len(), result.number_matched);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Provider failures are logged and skipped unless
//! [`SearchParams::raise_errors`] is set. Configuration problems and plugins
//! breaking their contract always surface as errors.

pub mod count;
pub mod error;
pub mod guess;
pub mod orchestrator;
pub mod pages;

pub use count::reconcile_total;
pub use error::SearchError;
pub use guess::{CatalogGuesser, GUESSABLE_KEYS, ProductTypeDescription, ProductTypeGuesser};
pub use orchestrator::{DEFAULT_ITEMS_PER_PAGE, DEFAULT_MAX_ITEMS_PER_PAGE, SearchOrchestrator, SearchParams};
pub use pages::PageIter;
