//! XML to JSON conversion for scanner reports.
//!
//! Elements become objects keyed by child tag, attributes become `@name`
//! keys and character data is stored under `#text` when the element also
//! has attributes or children. A leaf element is just its text, or `null`
//! when empty. Repeated child tags collapse into an array in document order.

use anyhow::{bail, Context, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use serde_json::{Map, Value};
use std::path::Path;
use tracing::debug;

/// An element whose closing tag has not been seen yet.
struct OpenElement {
    name: String,
    fields: Map<String, Value>,
    text: String,
}

impl OpenElement {
    fn start(tag: &BytesStart<'_>) -> Result<Self> {
        let name = String::from_utf8_lossy(tag.name().as_ref()).into_owned();

        let mut fields = Map::new();
        for attr in tag.attributes() {
            let attr = attr.with_context(|| format!("bad attribute on <{}>", name))?;
            let key = format!("@{}", String::from_utf8_lossy(attr.key.as_ref()));
            let value = attr.unescape_value()?.into_owned();
            fields.insert(key, Value::String(value));
        }

        Ok(Self {
            name,
            fields,
            text: String::new(),
        })
    }

    fn add_child(&mut self, name: String, value: Value) {
        match self.fields.get_mut(&name) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                self.fields.insert(name, value);
            }
        }
    }

    fn finish(self) -> (String, Value) {
        let text = self.text.trim();
        let value = if self.fields.is_empty() {
            if text.is_empty() {
                Value::Null
            } else {
                Value::String(text.to_string())
            }
        } else {
            let mut fields = self.fields;
            if !text.is_empty() {
                fields.insert("#text".to_string(), Value::String(text.to_string()));
            }
            Value::Object(fields)
        };
        (self.name, value)
    }
}

/// Convert an XML document to a JSON value of the form `{root_tag: ...}`.
pub fn convert(xml: &str) -> Result<Value> {
    let mut reader = Reader::from_str(xml);
    let mut open: Vec<OpenElement> = Vec::new();
    let mut root: Option<(String, Value)> = None;

    loop {
        let closed = match reader.read_event()? {
            Event::Start(ref tag) => {
                open.push(OpenElement::start(tag)?);
                None
            }
            Event::Empty(ref tag) => Some(OpenElement::start(tag)?),
            Event::End(_) => Some(open.pop().context("closing tag without an open element")?),
            Event::Text(text) => {
                if let Some(element) = open.last_mut() {
                    element.text.push_str(&text.unescape()?);
                }
                None
            }
            Event::CData(data) => {
                if let Some(element) = open.last_mut() {
                    element.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
                None
            }
            Event::Eof => break,
            _ => None,
        };

        if let Some(element) = closed {
            let (name, value) = element.finish();
            match open.last_mut() {
                Some(parent) => parent.add_child(name, value),
                None if root.is_some() => bail!("more than one root element (second is <{}>)", name),
                None => root = Some((name, value)),
            }
        }
    }

    if let Some(element) = open.last() {
        bail!("document ended inside <{}>", element.name);
    }

    let (name, value) = root.context("document has no root element")?;
    let mut document = Map::new();
    document.insert(name, value);
    Ok(Value::Object(document))
}

/// Read and convert an XML file.
pub fn convert_file(path: &Path) -> Result<Value> {
    let xml = std::fs::read_to_string(path)
        .with_context(|| format!("File '{}' not found or unreadable", path.display()))?;
    debug!(path = %path.display(), bytes = xml.len(), "Converting XML");
    convert(&xml)
}
