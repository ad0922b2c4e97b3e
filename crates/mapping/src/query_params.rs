//! Outbound search parameters built from queryable mapping entries.

use eogate_types::CanonicalProperties;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::{
    error::MappingError,
    extract::CompiledMapping,
    format::{Template, value_to_text},
};

/// Search parameters in insertion order; a name may carry several values.
pub type QueryParams = IndexMap<String, Vec<String>>;

/// A search parameter whose value is computed from filters.
static COMPLEX_QS_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(.+=)?([^=]*)(\{.+\})+([^=&]*)$").expect("valid query string regex"));

/// Compiled search-side half of a queryable entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum QueryParam {
    /// The filter value is sent as is under this name.
    Plain(String),
    /// `name=template`
    Named { name: String, template: Template },
    /// A template without a name, sent under the canonical key.
    Templated(Template),
}

impl QueryParam {
    pub(crate) fn parse(search_param: &str) -> Result<Self, MappingError> {
        if !COMPLEX_QS_REGEX.is_match(search_param) {
            return Ok(QueryParam::Plain(search_param.to_string()));
        }
        match search_param.split_once('=') {
            Some((name, template)) if !name.contains('{') => Ok(QueryParam::Named {
                name: name.to_string(),
                template: Template::parse(template)?,
            }),
            _ => Ok(QueryParam::Templated(Template::parse(search_param)?)),
        }
    }
}

/// Builds query parameters for every queryable key present in `filters`.
///
/// Parameters follow mapping order. Filters that are absent or `null` are
/// skipped, as are keys the mapping does not declare queryable. Templates
/// render against the full filter set, so one parameter may combine several
/// filters.
///
/// # Errors
///
/// Returns an error when a template names a filter that was not provided or
/// a converter rejects its input.
pub fn format_query_params(mapping: &CompiledMapping, filters: &CanonicalProperties) -> Result<QueryParams, MappingError> {
    let mut params = QueryParams::new();
    for (key, entry) in mapping.entries() {
        let Some(param) = &entry.query_param else { continue };
        let Some(value) = filters.get(key).filter(|value| !value.is_null()) else {
            continue;
        };
        match param {
            QueryParam::Plain(name) => params.entry(name.clone()).or_default().push(value_to_text(value)),
            QueryParam::Named { name, template } => params.entry(name.clone()).or_default().push(template.render(filters)?),
            QueryParam::Templated(template) => params.entry(key.to_string()).or_default().push(template.render(filters)?),
        }
    }
    Ok(params)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        entry::{MappingEntry, MetadataMapping},
        extract::{ResultFormat, compile_mapping},
    };

    fn queryable(search: &str, path: &str) -> MappingEntry {
        MappingEntry::Queryable(search.to_string(), path.to_string())
    }

    fn filters(value: serde_json::Value) -> CanonicalProperties {
        serde_json::from_value(value).expect("filters")
    }

    #[test]
    fn classifies_search_params() {
        assert_eq!(QueryParam::parse("productType").unwrap(), QueryParam::Plain("productType".into()));
        assert!(matches!(QueryParam::parse("cloudCover=[0,{cloudCover}]").unwrap(), QueryParam::Named { ref name, .. } if name == "cloudCover"));
        assert!(matches!(QueryParam::parse("{startTimeFromAscendingNode#to_iso_date}").unwrap(), QueryParam::Templated(_)));
        assert_eq!(QueryParam::parse("q={oops").unwrap(), QueryParam::Plain("q={oops".into()));
    }

    #[test]
    fn formats_params_in_mapping_order() {
        let mapping: MetadataMapping = [
            ("productType", queryable("productType", "$.properties.productType")),
            ("cloudCover", queryable("cloudCover=[0,{cloudCover}]", "$.properties.cloudCover")),
            (
                "geometry",
                queryable("geometry={geometry#to_rounded_wkt}", "$.geometry"),
            ),
            ("startTimeFromAscendingNode", queryable("startDate", "$.properties.startDate")),
            ("title", "$.properties.title".into()),
        ]
        .into_iter()
        .map(|(key, entry)| (key.to_string(), entry))
        .collect();
        let compiled = compile_mapping(&mapping, ResultFormat::Json, None).expect("compile");

        let params = format_query_params(
            &compiled,
            &filters(json!({
                "productType": "S2_MSI_L1C",
                "cloudCover": 20,
                "geometry": [1, 43, 2, 44],
                "startTimeFromAscendingNode": null,
                "title": "ignored",
            })),
        )
        .expect("params");

        assert_eq!(params.keys().collect::<Vec<_>>(), ["productType", "cloudCover", "geometry"]);
        assert_eq!(params["productType"], ["S2_MSI_L1C"]);
        assert_eq!(params["cloudCover"], ["[0,20]"]);
        assert_eq!(params["geometry"], ["POLYGON ((1 43, 2 43, 2 44, 1 44, 1 43))"]);
    }

    #[test]
    fn repeated_names_accumulate() {
        let mapping: MetadataMapping = [
            ("platform", queryable("filter=platform:{platform}", "$.platform")),
            ("instrument", queryable("filter=instrument:{instrument}", "$.instrument")),
        ]
        .into_iter()
        .map(|(key, entry)| (key.to_string(), entry))
        .collect();
        let compiled = compile_mapping(&mapping, ResultFormat::Json, None).expect("compile");
        let params = format_query_params(&compiled, &filters(json!({"platform": "S2A", "instrument": "MSI"}))).expect("params");
        assert_eq!(params["filter"], ["platform:S2A", "instrument:MSI"]);
    }

    #[test]
    fn missing_template_fields_are_errors() {
        let mapping: MetadataMapping = [("startTimeFromAscendingNode", queryable("date={startTimeFromAscendingNode}/{completionTimeFromAscendingNode}", "$.start"))]
            .into_iter()
            .map(|(key, entry)| (key.to_string(), entry))
            .collect();
        let compiled = compile_mapping(&mapping, ResultFormat::Json, None).expect("compile");
        let error = format_query_params(&compiled, &filters(json!({"startTimeFromAscendingNode": "2021-01-01"}))).expect_err("missing");
        assert!(matches!(error, MappingError::MissingField { ref field } if field == "completionTimeFromAscendingNode"));
    }
}
