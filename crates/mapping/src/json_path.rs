//! JSON path subset used by provider mappings.
//!
//! Supported: `$`, `.name`, `['name']`, `["name"]`, `[n]` (negative counts
//! from the end), `[*]`, `.*` and recursive descent `..name` / `..*`.

use std::fmt;

use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Child(String),
    Index(i64),
    Wildcard,
    Descendant(String),
    DescendantWildcard,
}

/// A parsed path; equality compares the source text.
#[derive(Clone)]
pub struct JsonPath {
    source: String,
    segments: Vec<Segment>,
}

/// One match with the last key or index it was reached through.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonMatch<'a> {
    pub key: Option<String>,
    pub value: &'a Value,
}

impl fmt::Debug for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JsonPath({})", self.source)
    }
}

impl PartialEq for JsonPath {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for JsonPath {}

impl JsonPath {
    pub fn parse(source: &str) -> Result<Self, String> {
        let trimmed = source.trim();
        let rest = trimmed.strip_prefix('$').ok_or_else(|| format!("path must start with '$': {trimmed}"))?;
        let characters: Vec<char> = rest.chars().collect();
        let mut segments = Vec::new();
        let mut index = 0;

        while index < characters.len() {
            match characters[index] {
                '.' if characters.get(index + 1) == Some(&'.') => {
                    index += 2;
                    let name = read_name(&characters, &mut index);
                    segments.push(match name.as_str() {
                        "" => return Err(format!("missing name after '..' in {trimmed}")),
                        "*" => Segment::DescendantWildcard,
                        _ => Segment::Descendant(name),
                    });
                }
                '.' => {
                    index += 1;
                    let name = read_name(&characters, &mut index);
                    segments.push(match name.as_str() {
                        "" => return Err(format!("missing name after '.' in {trimmed}")),
                        "*" => Segment::Wildcard,
                        _ => Segment::Child(name),
                    });
                }
                '[' => {
                    let close = characters[index..]
                        .iter()
                        .position(|character| *character == ']')
                        .map(|offset| index + offset)
                        .ok_or_else(|| format!("unclosed '[' in {trimmed}"))?;
                    let inner: String = characters[index + 1..close].iter().collect();
                    segments.push(parse_bracket(inner.trim()).ok_or_else(|| format!("unsupported selector [{inner}] in {trimmed}"))?);
                    index = close + 1;
                }
                other => return Err(format!("unexpected '{other}' in {trimmed}")),
            }
        }

        Ok(Self {
            source: trimmed.to_string(),
            segments,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluates the path, returning matches in traversal order.
    pub fn find<'a>(&self, root: &'a Value) -> Vec<JsonMatch<'a>> {
        let mut current = vec![JsonMatch { key: None, value: root }];
        for segment in &self.segments {
            let mut next = Vec::new();
            for item in &current {
                match segment {
                    Segment::Child(name) => {
                        if let Some(value) = item.value.get(name) {
                            next.push(JsonMatch {
                                key: Some(name.clone()),
                                value,
                            });
                        }
                    }
                    Segment::Index(position) => {
                        if let Value::Array(items) = item.value {
                            let resolved = if *position < 0 { items.len() as i64 + position } else { *position };
                            if let Some(value) = usize::try_from(resolved).ok().and_then(|i| items.get(i)) {
                                next.push(JsonMatch {
                                    key: Some(resolved.to_string()),
                                    value,
                                });
                            }
                        }
                    }
                    Segment::Wildcard => push_children(item.value, &mut next),
                    Segment::Descendant(name) => collect_descendants(item.value, &mut |key, value| {
                        if key == name {
                            next.push(JsonMatch {
                                key: Some(key.to_string()),
                                value,
                            });
                        }
                    }),
                    Segment::DescendantWildcard => collect_descendants(item.value, &mut |key, value| {
                        next.push(JsonMatch {
                            key: Some(key.to_string()),
                            value,
                        });
                    }),
                }
            }
            current = next;
        }
        current
    }
}

fn read_name(characters: &[char], index: &mut usize) -> String {
    let start = *index;
    while *index < characters.len() && characters[*index] != '.' && characters[*index] != '[' {
        *index += 1;
    }
    characters[start..*index].iter().collect::<String>().trim().to_string()
}

fn parse_bracket(inner: &str) -> Option<Segment> {
    if inner == "*" {
        return Some(Segment::Wildcard);
    }
    for quote in ['\'', '"'] {
        if let Some(name) = inner.strip_prefix(quote).and_then(|rest| rest.strip_suffix(quote)) {
            return Some(Segment::Child(name.to_string()));
        }
    }
    inner.parse().ok().map(Segment::Index)
}

fn push_children<'a>(value: &'a Value, into: &mut Vec<JsonMatch<'a>>) {
    match value {
        Value::Object(object) => into.extend(object.iter().map(|(key, value)| JsonMatch {
            key: Some(key.clone()),
            value,
        })),
        Value::Array(items) => into.extend(items.iter().enumerate().map(|(index, value)| JsonMatch {
            key: Some(index.to_string()),
            value,
        })),
        _ => {}
    }
}

/// Visits every nested (key, value) pair below `value` in pre-order.
fn collect_descendants<'a>(value: &'a Value, visit: &mut dyn FnMut(&str, &'a Value)) {
    match value {
        Value::Object(object) => {
            for (key, nested) in object {
                visit(key, nested);
                collect_descendants(nested, visit);
            }
        }
        Value::Array(items) => {
            for (index, nested) in items.iter().enumerate() {
                visit(&index.to_string(), nested);
                collect_descendants(nested, visit);
            }
        }
        _ => {}
    }
}
