//! Document decoding and encoding for JSON, YAML and XML.
//!
//! XML follows the xmltodict conventions: the root element becomes a
//! single-key map, attributes become `@name` keys, text next to child
//! elements becomes `#text`, and repeated children become sequences.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::value::{Map, Value};

static ANSI_ESCAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]").expect("ANSI escape pattern is valid")
});

/// A supported interchange format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    #[default]
    Json,
    Yaml,
    Xml,
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Format::Json => "JSON",
            Format::Yaml => "YAML",
            Format::Xml => "XML",
        })
    }
}

impl FromStr for Format {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "JSON" => Ok(Format::Json),
            "YAML" | "YML" => Ok(Format::Yaml),
            "XML" => Ok(Format::Xml),
            _ => Err(LoadError::UnsupportedFormat(s.to_string())),
        }
    }
}

/// Failure to turn input text into a document.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("unsupported file type: {0}")]
    UnsupportedFormat(String),

    #[error("invalid {format}: {detail}")]
    Malformed { format: Format, detail: String },
}

/// Failure to render a value in a format.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML encoding failed: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("XML encoding failed: {0}")]
    Xml(String),
}

/// Remove ANSI colour sequences, as left by coloured upstream tools.
pub fn strip_ansi(text: &str) -> Cow<'_, str> {
    ANSI_ESCAPE.replace_all(text, "")
}

/// Decode document text. Surrounding whitespace is ignored and empty input
/// is an empty map.
pub fn decode(text: &str, format: Format) -> Result<Value, LoadError> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(Value::Map(Map::new()));
    }
    let malformed = |detail: String| LoadError::Malformed { format, detail };
    let value = match format {
        Format::Json => serde_json::from_str::<serde_json::Value>(text)
            .map(Value::from)
            .map_err(|e| malformed(e.to_string()))?,
        Format::Yaml => serde_yaml::from_str::<serde_yaml::Value>(text)
            .map(Value::from)
            .map_err(|e| malformed(e.to_string()))?,
        Format::Xml => decode_xml(text).map_err(malformed)?,
    };
    debug!(%format, "document decoded");
    Ok(value)
}

/// Encode a value the way the `_j`, `_y` and `_x` helpers print it.
pub fn encode(value: &Value, format: Format) -> Result<String, EncodeError> {
    match format {
        Format::Json => json_string(value, Some(2), true),
        Format::Yaml => {
            let body = serde_yaml::to_string(&value.sorted_keys())?;
            Ok(format!("---\n{body}"))
        }
        Format::Xml => encode_xml(value).map_err(EncodeError::Xml),
    }
}

/// JSON text, compact when `indent` is `None`.
pub fn json_string(value: &Value, indent: Option<usize>, sort_keys: bool) -> Result<String, EncodeError> {
    let value = if sort_keys {
        Cow::Owned(value.sorted_keys())
    } else {
        Cow::Borrowed(value)
    };
    match indent {
        None => Ok(serde_json::to_string(value.as_ref())?),
        Some(width) => {
            let pad = " ".repeat(width);
            let mut buf = Vec::new();
            let formatter = serde_json::ser::PrettyFormatter::with_indent(pad.as_bytes());
            let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
            value.serialize(&mut serializer)?;
            Ok(String::from_utf8_lossy(&buf).into_owned())
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// XML
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Default)]
struct Element {
    name: String,
    children: Map,
    text: String,
}

impl Element {
    fn open(start: &BytesStart<'_>) -> Result<Self, String> {
        let mut element = Element {
            name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
            ..Element::default()
        };
        for attr in start.attributes() {
            let attr = attr.map_err(|e| e.to_string())?;
            let key = format!("@{}", String::from_utf8_lossy(attr.key.as_ref()));
            let value = attr.unescape_value().map_err(|e| e.to_string())?;
            element.children.insert(key, Value::Str(value.into_owned()));
        }
        Ok(element)
    }

    fn close(self) -> (String, Value) {
        let Element { name, mut children, text } = self;
        let text = text.trim().to_string();
        let value = if children.is_empty() {
            if text.is_empty() { Value::None } else { Value::Str(text) }
        } else {
            if !text.is_empty() {
                children.insert("#text".to_string(), Value::Str(text));
            }
            Value::Map(children)
        };
        (name, value)
    }

    fn add_child(&mut self, name: String, value: Value) {
        match self.children.get_mut(&name) {
            Some(Value::List(items)) => items.push(value),
            Some(existing) => {
                let first = std::mem::take(existing);
                *existing = Value::List(vec![first, value]);
            }
            None => {
                self.children.insert(name, value);
            }
        }
    }
}

fn decode_xml(text: &str) -> Result<Value, String> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut stack = vec![Element::default()];
    loop {
        let event = reader
            .read_event()
            .map_err(|e| format!("{e} at position {}", reader.buffer_position()))?;
        match event {
            Event::Start(start) => stack.push(Element::open(&start)?),
            Event::Empty(start) => {
                let (name, value) = Element::open(&start)?.close();
                current(&mut stack)?.add_child(name, value);
            }
            Event::End(_) => {
                let element = stack.pop().ok_or("unexpected closing tag")?;
                let (name, value) = element.close();
                current(&mut stack)?.add_child(name, value);
            }
            Event::Text(t) => {
                let text = t.unescape().map_err(|e| e.to_string())?;
                current(&mut stack)?.text.push_str(&text);
            }
            Event::CData(data) => {
                current(&mut stack)?
                    .text
                    .push_str(&String::from_utf8_lossy(&data.into_inner()));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let document = match stack.as_slice() {
        [document] => document,
        _ => return Err("unclosed element at end of input".to_string()),
    };
    if !document.text.trim().is_empty() {
        return Err("text outside the root element".to_string());
    }
    match document.children.len() {
        0 => Err("no element found".to_string()),
        1 => Ok(Value::Map(document.children.clone())),
        _ => Err("junk after document element".to_string()),
    }
}

fn current(stack: &mut [Element]) -> Result<&mut Element, String> {
    stack.last_mut().ok_or_else(|| "unbalanced tags".to_string())
}

/// A usable element name: invalid characters become `_`.
fn element_name(key: &str) -> String {
    let mut name: String = key
        .chars()
        .map(|c| if c.is_alphanumeric() || matches!(c, '_' | '-' | '.') { c } else { '_' })
        .collect();
    if !name.starts_with(|c: char| c.is_alphabetic() || c == '_') {
        name.insert(0, '_');
    }
    name
}

fn encode_xml(value: &Value) -> Result<String, String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(|e| e.to_string())?;
    match value {
        Value::Map(map) if map.len() == 1 && !matches!(map.values().next(), Some(Value::List(_))) => {
            for (key, child) in map {
                write_element(&mut writer, &element_name(key), child)?;
            }
        }
        other => write_element(&mut writer, "root", other)?,
    }
    Ok(String::from_utf8_lossy(&writer.into_inner()).into_owned())
}

fn write_element(writer: &mut Writer<Vec<u8>>, name: &str, value: &Value) -> Result<(), String> {
    let mut start = BytesStart::new(name);
    let mut text = None;
    let mut children: Vec<(String, &Value)> = Vec::new();
    match value {
        Value::None => {}
        Value::Map(map) => {
            for (key, child) in map {
                if let Some(attr) = key.strip_prefix('@') {
                    start.push_attribute((attr, child.to_display_string().as_str()));
                } else if key == "#text" {
                    text = Some(child.to_display_string());
                } else {
                    children.push((element_name(key), child));
                }
            }
        }
        Value::List(items) => children.extend(items.iter().map(|item| ("item".to_string(), item))),
        scalar => text = Some(scalar.to_display_string()),
    }

    if text.is_none() && children.is_empty() {
        return writer.write_event(Event::Empty(start)).map_err(|e| e.to_string());
    }
    writer.write_event(Event::Start(start)).map_err(|e| e.to_string())?;
    if let Some(text) = &text {
        writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(|e| e.to_string())?;
    }
    for (child_name, child) in children {
        match child {
            Value::List(items) if !items.is_empty() => {
                for item in items {
                    write_element(writer, &child_name, item)?;
                }
            }
            other => write_element(writer, &child_name, other)?,
        }
    }
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(|e| e.to_string())
}
