//! Metadata mapping engine.
//!
//! Each provider describes, per canonical metadata key, where the value lives
//! in its raw search results. An entry is either a path (`$.properties.id`,
//! `./atom:title/text()`), a path with a converter suffix
//! (`{$.properties.date#to_iso_utc_datetime}`), a template referencing other
//! canonical keys (`{id}.zip`) or a literal. Queryable entries are pairs whose
//! first element describes the outbound search parameter.
//!
//! Mappings are compiled once with [`compile_mapping`]: paths are parsed and
//! converter names resolved to the closed [`Converter`] set, so a broken
//! provider configuration fails at load time. Extraction over a compiled
//! mapping never fails.

pub mod converters;
pub mod entry;
pub mod error;
pub mod extract;
pub mod format;
pub mod geometry;
pub mod json_path;
pub mod query_params;
pub mod xml;

pub use converters::Converter;
pub use entry::{MappingEntry, MetadataMapping, parse_mapping_entry, search_param_for};
pub use error::MappingError;
pub use extract::{
    CompiledEntry, CompiledMapping, DeferredTemplate, DiscoveryConfig, ResultFormat, ValueSource, collect_properties, compile_mapping,
    extract, extract_xml, resolve_templates,
};
pub use format::{Template, format_metadata, value_to_text};
pub use query_params::{QueryParams, format_query_params};
