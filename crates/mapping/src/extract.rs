//! Compiling mapping tables and extracting canonical properties from results.

use eogate_types::{CANONICAL_KEYS, CanonicalProperties, NOT_AVAILABLE};
use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    converters::Converter,
    entry::{MetadataMapping, parse_mapping_entry, search_param_for},
    error::MappingError,
    format::{Template, contains_placeholder},
    json_path::JsonPath,
    query_params::QueryParam,
    xml::{XmlElement, XmlPath, parse_document},
};

/// Shape of the raw results a mapping is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultFormat {
    #[default]
    Json,
    Xml,
}

/// Settings for adding provider properties the mapping does not declare.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    #[serde(default)]
    pub auto_discovery: bool,
    /// Keys must match this pattern to be added.
    pub metadata_pattern: Option<String>,
    /// Path selecting the candidate values, e.g. `$.properties.*`.
    pub metadata_path: Option<String>,
}

/// Where the value of one key comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSource {
    Json { path: JsonPath, converter: Option<Converter> },
    Xml { path: XmlPath, converter: Option<Converter> },
    /// Formatted in a second pass against first-pass values.
    Template(Template),
    Literal(Value),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledEntry {
    pub source: ValueSource,
    pub(crate) query_param: Option<QueryParam>,
}

#[derive(Debug, Clone)]
enum DiscoveryPath {
    Json(JsonPath),
    Xml(XmlPath),
}

#[derive(Debug, Clone)]
struct CompiledDiscovery {
    pattern: Regex,
    path: DiscoveryPath,
}

/// A mapping table with every path parsed and converter resolved.
#[derive(Debug, Clone)]
pub struct CompiledMapping {
    format: ResultFormat,
    entries: IndexMap<String, CompiledEntry>,
    discovery: Option<CompiledDiscovery>,
}

impl CompiledMapping {
    pub fn format(&self) -> ResultFormat {
        self.format
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &CompiledEntry)> {
        self.entries.iter().map(|(key, entry)| (key.as_str(), entry))
    }

    pub fn get(&self, key: &str) -> Option<&CompiledEntry> {
        self.entries.get(key)
    }

    pub fn is_queryable(&self, key: &str) -> bool {
        self.entries.get(key).is_some_and(|entry| entry.query_param.is_some())
    }
}

/// A template whose value is computed after the first extraction pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredTemplate {
    pub key: String,
    pub template: Template,
}

/// Compiles a mapping table for results of the given format.
///
/// Paths and converters are validated here, so a mapping that compiles can
/// always be evaluated.
pub fn compile_mapping(
    mapping: &MetadataMapping,
    format: ResultFormat,
    discovery: Option<&DiscoveryConfig>,
) -> Result<CompiledMapping, MappingError> {
    let mut entries = IndexMap::with_capacity(mapping.len());
    for (key, entry) in mapping {
        let invalid = |error: MappingError| MappingError::InvalidEntry {
            key: key.clone(),
            message: error.to_string(),
        };
        let (converter, path) = parse_mapping_entry(entry).map_err(invalid)?;
        let source = compile_source(key, entry.path(), converter, &path, format).map_err(invalid)?;
        let query_param = search_param_for(entry).map(QueryParam::parse).transpose().map_err(invalid)?;
        entries.insert(key.clone(), CompiledEntry { source, query_param });
    }

    let discovery = match discovery {
        Some(DiscoveryConfig {
            auto_discovery: true,
            metadata_pattern: Some(pattern),
            metadata_path: Some(path),
        }) => {
            let invalid = |message: String| MappingError::InvalidEntry {
                key: "discover_metadata".to_string(),
                message,
            };
            let pattern = Regex::new(pattern).map_err(|error| invalid(error.to_string()))?;
            let path = match format {
                ResultFormat::Json => DiscoveryPath::Json(JsonPath::parse(path).map_err(invalid)?),
                ResultFormat::Xml => DiscoveryPath::Xml(XmlPath::parse(path).map_err(invalid)?),
            };
            Some(CompiledDiscovery { pattern, path })
        }
        _ => None,
    };

    Ok(CompiledMapping { format, entries, discovery })
}

fn compile_source(key: &str, raw: &str, converter: Option<Converter>, path: &str, format: ResultFormat) -> Result<ValueSource, MappingError> {
    let structural = match format {
        ResultFormat::Json if path.trim_start().starts_with('$') => match JsonPath::parse(path) {
            Ok(parsed) => Some(ValueSource::Json {
                path: parsed,
                converter: converter.clone(),
            }),
            Err(message) => {
                warn!(key = %key, path = %path, error = %message, "unsupported JSON path, keeping value as text");
                None
            }
        },
        ResultFormat::Xml if XmlPath::looks_like_path(path) => match XmlPath::parse(path) {
            Ok(parsed) => Some(ValueSource::Xml {
                path: parsed,
                converter: converter.clone(),
            }),
            Err(message) => {
                debug!(key = %key, path = %path, error = %message, "not an XML path, keeping value as text");
                None
            }
        },
        _ => None,
    };
    if let Some(source) = structural {
        return Ok(source);
    }
    // A converter applied to something that is not a path is a template
    // formatting another property, e.g. `{startTime#to_iso_date}`.
    if contains_placeholder(raw) {
        return Ok(ValueSource::Template(Template::parse(raw)?));
    }
    Ok(ValueSource::Literal(Value::String(raw.to_string())))
}

/// First extraction pass over a JSON result.
///
/// Every canonical key is present in the output, in catalog order, followed
/// by non-canonical mapped keys. Templates are returned separately and their
/// key holds the raw template text until [`resolve_templates`] runs.
pub fn collect_properties(raw: &Value, mapping: &CompiledMapping) -> (CanonicalProperties, Vec<DeferredTemplate>) {
    collect_with(mapping, |source| match source {
        ValueSource::Json { path, converter } => {
            let matches = path.find(raw);
            match matches.as_slice() {
                [single] => convert_value(single.value, converter.as_ref(), path.source()),
                _ => Value::String(NOT_AVAILABLE.to_string()),
            }
        }
        _ => Value::String(NOT_AVAILABLE.to_string()),
    })
}

fn collect_xml(root: &XmlElement, mapping: &CompiledMapping) -> (CanonicalProperties, Vec<DeferredTemplate>) {
    collect_with(mapping, |source| match source {
        ValueSource::Xml { path, converter } => {
            let mut values = path.evaluate(root);
            match values.len() {
                0 => Value::String(NOT_AVAILABLE.to_string()),
                1 => convert_value(&values.remove(0), converter.as_ref(), path.source()),
                _ => Value::Array(values.iter().map(|value| convert_value(value, converter.as_ref(), path.source())).collect()),
            }
        }
        _ => Value::String(NOT_AVAILABLE.to_string()),
    })
}

fn collect_with<F>(mapping: &CompiledMapping, mut evaluate_path: F) -> (CanonicalProperties, Vec<DeferredTemplate>)
where
    F: FnMut(&ValueSource) -> Value,
{
    let mut properties = CanonicalProperties::with_capacity(CANONICAL_KEYS.len() + mapping.entries.len());
    let mut templates = Vec::new();
    let extra_keys = mapping.entries.keys().filter(|key| !CANONICAL_KEYS.contains(&key.as_str())).map(String::as_str);

    for key in CANONICAL_KEYS.iter().copied().chain(extra_keys) {
        let value = match mapping.entries.get(key).map(|entry| &entry.source) {
            None => Value::String(NOT_AVAILABLE.to_string()),
            Some(ValueSource::Literal(value)) => value.clone(),
            Some(ValueSource::Template(template)) => {
                templates.push(DeferredTemplate {
                    key: key.to_string(),
                    template: template.clone(),
                });
                Value::String(template.source().to_string())
            }
            Some(source) => evaluate_path(source),
        };
        properties.insert(key.to_string(), value);
    }
    (properties, templates)
}

/// Applies a converter to an extracted value.
///
/// `null` stays `null`; scalar converter outputs are stored as strings. A
/// failing conversion yields the sentinel.
fn convert_value(value: &Value, converter: Option<&Converter>, path: &str) -> Value {
    let Some(converter) = converter else {
        return value.clone();
    };
    if value.is_null() {
        return Value::Null;
    }
    match converter.apply(value) {
        Ok(Value::Number(number)) => Value::String(number.to_string()),
        Ok(Value::Bool(flag)) => Value::String(flag.to_string()),
        Ok(converted) => converted,
        Err(error) => {
            warn!(path = %path, error = %error, "metadata conversion failed");
            Value::String(NOT_AVAILABLE.to_string())
        }
    }
}

/// Formats every deferred template in a single pass.
///
/// All templates read from one snapshot taken before any of them is
/// formatted, so a template that refers to another template's key sees that
/// template's raw text, not its output.
pub fn resolve_templates(properties: &mut CanonicalProperties, templates: &[DeferredTemplate]) {
    if templates.is_empty() {
        return;
    }
    let snapshot = properties.clone();
    for DeferredTemplate { key, template } in templates {
        let value = match template.render(&snapshot) {
            Ok(rendered) => Value::String(rendered),
            Err(error) => {
                warn!(key = %key, template = %template.source(), error = %error, "could not format metadata template");
                Value::String(NOT_AVAILABLE.to_string())
            }
        };
        properties.insert(key.clone(), value);
    }
}

/// Extracts canonical properties from one JSON result.
pub fn extract(raw: &Value, mapping: &CompiledMapping) -> CanonicalProperties {
    let (mut properties, templates) = collect_properties(raw, mapping);
    resolve_templates(&mut properties, &templates);
    if let Some(CompiledDiscovery {
        pattern,
        path: DiscoveryPath::Json(path),
    }) = &mapping.discovery
    {
        for found in path.find(raw) {
            let Some(key) = found.key else { continue };
            if pattern.is_match(&key) && !properties.contains_key(&key) {
                properties.insert(key, found.value.clone());
            }
        }
    }
    properties
}

/// Extracts canonical properties from one XML result.
///
/// Fails only if the document itself is not well-formed.
pub fn extract_xml(xml: &str, mapping: &CompiledMapping) -> Result<CanonicalProperties, MappingError> {
    let root = parse_document(xml)?;
    let (mut properties, templates) = collect_xml(&root, mapping);
    resolve_templates(&mut properties, &templates);
    if let Some(CompiledDiscovery {
        pattern,
        path: DiscoveryPath::Xml(path),
    }) = &mapping.discovery
    {
        for element in path.select(&root) {
            if pattern.is_match(&element.name) && !properties.contains_key(&element.name) {
                properties.insert(element.name.clone(), Value::String(element.text.trim().to_string()));
            }
        }
    }
    Ok(properties)
}
