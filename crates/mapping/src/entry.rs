//! Mapping table entries and the `{path#converter(args)}` suffix syntax.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{converters::Converter, error::MappingError};

/// Matches a whole entry of the form `{<path>#<converter>}` or
/// `{<path>#<converter>(<args>)}`.
static INGEST_CONVERSION_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\{(?P<path>[^#]*)#(?P<converter>[^\d\W]\w*)(\((?P<args>.*)\))*\}$").expect("valid conversion regex"));

/// Per-provider table from canonical key to entry, in configuration order.
pub type MetadataMapping = IndexMap<String, MappingEntry>;

/// One value of a provider's `metadata_mapping` table.
///
/// In YAML a plain string deserializes to [`MappingEntry::Path`] and a
/// two-element list to [`MappingEntry::Queryable`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MappingEntry {
    /// Path, template or literal used to read the value from results.
    Path(String),
    /// `[search_param, path_or_template]`: the key can also be sent to the provider.
    Queryable(String, String),
}

impl MappingEntry {
    /// The result-side part of the entry.
    pub fn path(&self) -> &str {
        match self {
            MappingEntry::Path(path) => path,
            MappingEntry::Queryable(_, path) => path,
        }
    }
}

impl From<&str> for MappingEntry {
    fn from(path: &str) -> Self {
        MappingEntry::Path(path.to_string())
    }
}

/// Splits an entry into an optional converter and the path it applies to.
///
/// A value that does not have the `{path#converter}` shape is returned whole
/// with no converter; callers then treat it as a path, a template or a
/// literal. An unknown converter name is an error.
pub fn parse_mapping_entry(entry: &MappingEntry) -> Result<(Option<Converter>, String), MappingError> {
    parse_mapping_path(entry.path())
}

/// Same as [`parse_mapping_entry`] for a bare path string.
pub fn parse_mapping_path(value: &str) -> Result<(Option<Converter>, String), MappingError> {
    let Some(captures) = INGEST_CONVERSION_REGEX.captures(value) else {
        return Ok((None, value.to_string()));
    };
    let path = captures.name("path").map(|m| m.as_str()).unwrap_or_default();
    let name = captures.name("converter").map(|m| m.as_str()).unwrap_or_default();
    let args = captures.name("args").map(|m| m.as_str());
    let converter = Converter::parse(name, args)?;
    Ok((Some(converter), path.to_string()))
}

/// Returns the outbound search parameter of a queryable entry.
pub fn search_param_for(entry: &MappingEntry) -> Option<&str> {
    match entry {
        MappingEntry::Queryable(search_param, _) => Some(search_param),
        MappingEntry::Path(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_converter_suffix() {
        let entry = MappingEntry::from("{$.properties.startDate#to_iso_utc_datetime}");
        let (converter, path) = parse_mapping_entry(&entry).expect("parse entry");
        assert_eq!(converter, Some(Converter::IsoUtcDatetime));
        assert_eq!(path, "$.properties.startDate");
    }

    #[test]
    fn keeps_converter_arguments() {
        let entry = MappingEntry::Queryable("productType".into(), "{$.title#slice_str(0,3,1)}".into());
        let (converter, path) = parse_mapping_entry(&entry).expect("parse entry");
        assert_eq!(converter, Some(Converter::SliceStr { start: 0, end: Some(3), step: 1 }));
        assert_eq!(path, "$.title");
    }

    #[test]
    fn returns_templates_and_literals_whole() {
        for value in ["{id}.zip", "https://example.com/{id}/{title}", "Sentinel-2", "$.properties.id"] {
            let (converter, path) = parse_mapping_path(value).expect("parse value");
            assert!(converter.is_none(), "unexpected converter for {value}");
            assert_eq!(path, value);
        }
    }

    #[test]
    fn rejects_unknown_converters() {
        let error = parse_mapping_path("{$.a#does_not_exist}").expect_err("unknown converter");
        assert_eq!(error, MappingError::UnknownConverter { name: "does_not_exist".into() });
    }

    #[test]
    fn search_param_only_for_queryables() {
        let queryable = MappingEntry::Queryable("cloudCover=[0,{cloudCover}]".into(), "$.properties.cloudCover".into());
        assert_eq!(search_param_for(&queryable), Some("cloudCover=[0,{cloudCover}]"));
        assert_eq!(search_param_for(&MappingEntry::from("$.id")), None);
    }

    #[test]
    fn deserializes_both_entry_shapes_from_yaml() {
        let yaml = "id: $.properties.id\nplatform:\n  - platformName\n  - $.properties.platform\n";
        let mapping: MetadataMapping = serde_yaml::from_str(yaml).expect("parse mapping");
        assert_eq!(mapping["id"], MappingEntry::Path("$.properties.id".into()));
        assert_eq!(mapping["platform"], MappingEntry::Queryable("platformName".into(), "$.properties.platform".into()));
    }
}
