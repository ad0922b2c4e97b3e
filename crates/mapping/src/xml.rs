//! XML result support: a small element tree built with quick-xml and the path
//! subset provider mappings use (`/a/b`, `//a`, `./a/text()`, `a/@attr`).
//!
//! Element names are matched on their local part, so `atom:title` and
//! `title` select the same elements whatever prefix the document declares.

use std::fmt;

use once_cell::sync::Lazy;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use regex::Regex;
use serde_json::Value;

use crate::error::MappingError;

static STEP_NAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z_][\w.\-]*:)?([A-Za-z_][\w.\-]*|\*)$").expect("valid step regex"));

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    /// Local name, without namespace prefix.
    pub name: String,
    pub attributes: Vec<(String, String)>,
    /// Text directly under this element.
    pub text: String,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.iter().find(|(key, _)| key == name).map(|(_, value)| value.as_str())
    }

    /// Concatenated text of this element and all its descendants.
    pub fn text_content(&self) -> String {
        let mut content = self.text.clone();
        for child in &self.children {
            content.push_str(&child.text_content());
        }
        content
    }

    /// Every element below this one, in document order.
    pub fn descendants(&self) -> Vec<&XmlElement> {
        let mut found = Vec::new();
        for child in &self.children {
            found.push(child);
            found.extend(child.descendants());
        }
        found
    }
}

/// Parses a document and returns its root element.
pub fn parse_document(xml: &str) -> Result<XmlElement, MappingError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => stack.push(element_from(&start)?),
            Ok(Event::Empty(start)) => {
                let element = element_from(&start)?;
                attach(&mut stack, &mut root, element);
            }
            Ok(Event::End(_)) => {
                if let Some(element) = stack.pop() {
                    attach(&mut stack, &mut root, element);
                }
            }
            Ok(Event::Text(text)) => {
                let unescaped = text.unescape().map_err(xml_error)?;
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&unescaped);
                }
            }
            Ok(Event::CData(data)) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Ok(Event::Eof) => break,
            Err(error) => return Err(xml_error(error)),
            _ => {}
        }
    }

    root.ok_or_else(|| MappingError::Xml {
        message: "document has no root element".to_string(),
    })
}

fn xml_error(error: impl fmt::Display) -> MappingError {
    MappingError::Xml { message: error.to_string() }
}

fn element_from(start: &BytesStart<'_>) -> Result<XmlElement, MappingError> {
    let mut attributes = Vec::new();
    for attribute in start.attributes() {
        let attribute = attribute.map_err(xml_error)?;
        if attribute.key.as_ref().starts_with(b"xmlns") {
            continue;
        }
        let key = String::from_utf8_lossy(attribute.key.local_name().as_ref()).into_owned();
        let value = attribute.unescape_value().map_err(xml_error)?.into_owned();
        attributes.push((key, value));
    }
    Ok(XmlElement {
        name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
        attributes,
        ..XmlElement::default()
    })
}

fn attach(stack: &mut [XmlElement], root: &mut Option<XmlElement>, element: XmlElement) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => {}
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Anchor {
    Document,
    Context,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Child,
    Descendant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    axis: Axis,
    /// Local name to match; `None` matches any element.
    local_name: Option<String>,
}

impl Step {
    fn matches(&self, element: &XmlElement) -> bool {
        self.local_name.as_deref().is_none_or(|name| name == element.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    Element,
    Text,
    Attribute(String),
}

/// A parsed XML path; equality compares the source text.
#[derive(Clone)]
pub struct XmlPath {
    source: String,
    anchor: Anchor,
    steps: Vec<Step>,
    target: Target,
}

impl fmt::Debug for XmlPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "XmlPath({})", self.source)
    }
}

impl PartialEq for XmlPath {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for XmlPath {}

impl XmlPath {
    /// Returns true when `text` should be read as a path rather than a literal.
    pub fn looks_like_path(text: &str) -> bool {
        let trimmed = text.trim();
        trimmed.contains('/') || trimmed.starts_with('@') || trimmed == "."
    }

    pub fn parse(source: &str) -> Result<Self, String> {
        let trimmed = source.trim();
        let (anchor, mut axis, rest) = if let Some(rest) = trimmed.strip_prefix("//") {
            (Anchor::Document, Axis::Descendant, rest)
        } else if let Some(rest) = trimmed.strip_prefix('/') {
            (Anchor::Document, Axis::Child, rest)
        } else {
            (Anchor::Context, Axis::Child, trimmed)
        };

        let tokens: Vec<&str> = rest.split('/').collect();
        let mut steps = Vec::new();
        let mut target = Target::Element;
        for (position, token) in tokens.iter().enumerate() {
            let is_last = position + 1 == tokens.len();
            match *token {
                "" if is_last && !steps.is_empty() => return Err(format!("trailing '/' in {trimmed}")),
                "" if position == 0 && rest.is_empty() => {}
                "" => axis = Axis::Descendant,
                "." => {}
                "text()" if is_last => target = Target::Text,
                attribute if is_last && attribute.starts_with('@') => {
                    let name = local_part(&attribute[1..]);
                    if name.is_empty() {
                        return Err(format!("empty attribute name in {trimmed}"));
                    }
                    target = Target::Attribute(name.to_string());
                }
                name if STEP_NAME_REGEX.is_match(name) => {
                    let local = local_part(name);
                    steps.push(Step {
                        axis,
                        local_name: (local != "*").then(|| local.to_string()),
                    });
                    axis = Axis::Child;
                }
                other => return Err(format!("unsupported step '{other}' in {trimmed}")),
            }
        }

        Ok(Self {
            source: trimmed.to_string(),
            anchor,
            steps,
            target,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Selected elements, before the text or attribute target is applied.
    pub fn select<'a>(&self, root: &'a XmlElement) -> Vec<&'a XmlElement> {
        let mut steps = self.steps.iter();
        let mut current: Vec<&XmlElement> = match self.anchor {
            Anchor::Context => vec![root],
            Anchor::Document => match steps.next() {
                None => vec![root],
                Some(first) => {
                    let mut candidates = vec![root];
                    if first.axis == Axis::Descendant {
                        candidates.extend(root.descendants());
                    }
                    candidates.into_iter().filter(|element| first.matches(element)).collect()
                }
            },
        };
        for step in steps {
            current = current
                .into_iter()
                .flat_map(|element| match step.axis {
                    Axis::Child => element.children.iter().collect::<Vec<_>>(),
                    Axis::Descendant => element.descendants(),
                })
                .filter(|element| step.matches(element))
                .collect();
        }
        current
    }

    /// Values of the selected nodes as JSON strings.
    pub fn evaluate(&self, root: &XmlElement) -> Vec<Value> {
        self.select(root)
            .into_iter()
            .filter_map(|element| match &self.target {
                Target::Element => Some(element.text_content().trim().to_string()),
                Target::Text => Some(element.text.trim().to_string()).filter(|text| !text.is_empty()),
                Target::Attribute(name) => element.attribute(name).map(str::to_string),
            })
            .map(Value::String)
            .collect()
    }
}

fn local_part(name: &str) -> &str {
    name.rsplit_once(':').map(|(_, local)| local).unwrap_or(name)
}
