//! Placeholder templates: `{name}`, `{name#converter(args)}`, `{{` and `}}`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use eogate_types::CanonicalProperties;

use crate::{converters::Converter, error::MappingError};

static FIELD_CONVERSION_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<field_name>.+)#(?P<converter>[^\d\W]\w*)(\((?P<args>.*)\))*$").expect("valid field regex"));

static PLACEHOLDER_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\{[^{}]+\})+").expect("valid placeholder regex"));

/// Returns true if `text` contains at least one `{...}` placeholder.
pub fn contains_placeholder(text: &str) -> bool {
    PLACEHOLDER_REGEX.is_match(text)
}

/// Renders a value the way it appears inside a formatted string.
///
/// Strings are inserted as-is, `null` becomes empty, structured values are
/// serialized as compact JSON.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        structured => structured.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field { name: String, converter: Option<Converter> },
}

/// A parsed template, validated once and rendered many times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self, MappingError> {
        let malformed = |message: &str| MappingError::MalformedTemplate {
            template: source.to_string(),
            message: message.to_string(),
        };
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut characters = source.chars().peekable();

        while let Some(character) = characters.next() {
            match character {
                '{' if characters.peek() == Some(&'{') => {
                    characters.next();
                    literal.push('{');
                }
                '}' if characters.peek() == Some(&'}') => {
                    characters.next();
                    literal.push('}');
                }
                '}' => return Err(malformed("single '}' encountered")),
                '{' => {
                    let mut field = String::new();
                    let mut depth = 1;
                    for inner in characters.by_ref() {
                        match inner {
                            '{' => depth += 1,
                            '}' => depth -= 1,
                            _ => {}
                        }
                        if depth == 0 {
                            break;
                        }
                        field.push(inner);
                    }
                    if depth != 0 {
                        return Err(malformed("unclosed '{'"));
                    }
                    if field.trim().is_empty() {
                        return Err(malformed("empty field name"));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(parse_field(&field)?);
                }
                other => literal.push(other),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Names of the properties the template reads, in order of appearance.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Field { name, .. } => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    pub fn has_fields(&self) -> bool {
        self.fields().next().is_some()
    }

    pub fn render(&self, properties: &CanonicalProperties) -> Result<String, MappingError> {
        let mut rendered = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => rendered.push_str(text),
                Segment::Field { name, converter } => {
                    let value = properties.get(name).ok_or_else(|| MappingError::MissingField { field: name.clone() })?;
                    match converter {
                        Some(converter) => rendered.push_str(&value_to_text(&converter.apply(value)?)),
                        None => rendered.push_str(&value_to_text(value)),
                    }
                }
            }
        }
        Ok(rendered)
    }
}

fn parse_field(field: &str) -> Result<Segment, MappingError> {
    let Some(captures) = FIELD_CONVERSION_REGEX.captures(field) else {
        return Ok(Segment::Field {
            name: field.to_string(),
            converter: None,
        });
    };
    let name = captures.name("field_name").map(|m| m.as_str()).unwrap_or_default();
    let converter_name = captures.name("converter").map(|m| m.as_str()).unwrap_or_default();
    let converter = Converter::parse(converter_name, captures.name("args").map(|m| m.as_str()))?;
    Ok(Segment::Field {
        name: name.to_string(),
        converter: Some(converter),
    })
}

/// Formats `template` against `properties`.
///
/// Keys may carry a STAC-style prefix (`{eo:cloud_cover}`). A missing key is
/// an error, and so is an unknown converter.
pub fn format_metadata(template: &str, properties: &CanonicalProperties) -> Result<String, MappingError> {
    Template::parse(template)?.render(properties)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn properties(pairs: &[(&str, Value)]) -> CanonicalProperties {
        pairs.iter().map(|(key, value)| (key.to_string(), value.clone())).collect()
    }

    #[test]
    fn formats_converters_and_escapes() {
        let props = properties(&[("start", json!("2021-04-21T18:27:19.123Z")), ("id", json!("S2A"))]);
        let formatted = format_metadata(r#"{{"id": "{id}", "t": {start#to_timestamp_milliseconds}}}"#, &props).expect("format");
        assert_eq!(formatted, r#"{"id": "S2A", "t": 1619029639123}"#);
    }

    #[test]
    fn supports_prefixed_keys() {
        let props = properties(&[("eo:cloud_cover", json!(12))]);
        assert_eq!(format_metadata("cc<={eo:cloud_cover}", &props).expect("format"), "cc<=12");
    }

    #[test]
    fn null_values_render_empty_with_or_without_converter() {
        let props = properties(&[("date", Value::Null)]);
        assert_eq!(format_metadata("[{date}|{date#to_iso_date}]", &props).expect("format"), "[|]");
    }

    #[test]
    fn missing_fields_and_unknown_converters_are_errors() {
        let props = properties(&[]);
        assert_eq!(
            format_metadata("{absent}", &props),
            Err(MappingError::MissingField { field: "absent".into() })
        );
        assert!(matches!(
            format_metadata("{id#bogus}", &properties(&[("id", json!("x"))])),
            Err(MappingError::UnknownConverter { .. })
        ));
        assert!(matches!(format_metadata("a}b", &props), Err(MappingError::MalformedTemplate { .. })));
        assert!(matches!(format_metadata("{open", &props), Err(MappingError::MalformedTemplate { .. })));
    }

    #[test]
    fn formatting_resolved_output_is_idempotent() {
        let props = properties(&[("id", json!("S2B_MSIL2A")), ("title", json!("tile"))]);
        let once = format_metadata("https://dl.example.com/{id}/{title}.zip", &props).expect("first pass");
        let twice = format_metadata(&once, &props).expect("second pass");
        assert_eq!(once, twice);
    }

    #[test]
    fn lists_template_fields() {
        let template = Template::parse("{a}-{b#remove_extension}-{{c}}").expect("parse");
        assert_eq!(template.fields().collect::<Vec<_>>(), vec!["a", "b"]);
        assert!(contains_placeholder("{a}-x"));
        assert!(!contains_placeholder("plain"));
    }
}
