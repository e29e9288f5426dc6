// src/xml.rs

//! Small XML document model shared by the manifest parser, the modlist
//! importer and the activation file reader
//!
//! Mod manifests found in the wild are frequently not well-formed, so
//! documents are passed through [`sanitize`] before being handed to
//! quick-xml. The resulting tree is deliberately minimal: element name,
//! attributes, trimmed text and children.

use crate::error::{Error, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Longest entity body we look for after a bare `&` (e.g. `#x10FFFF`)
const MAX_ENTITY_LEN: usize = 32;

/// A parsed XML element
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    /// Concatenated, trimmed character data directly inside this element
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    fn from_start(start: &BytesStart<'_>) -> Result<Self> {
        let name = String::from_utf8_lossy(start.name().as_ref()).to_string();
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| Error::Xml(format!("Bad attribute in <{}>: {}", name, e)))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
            let value = attr.unescape_value()?.to_string();
            attributes.push((key, value));
        }
        Ok(Self {
            name,
            attributes,
            text: String::new(),
            children: Vec::new(),
        })
    }

    /// First direct child with the given tag name
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All direct children with the given tag name
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Text of the first direct child with the given name, if non-empty
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name)
            .map(|c| c.text.as_str())
            .filter(|t| !t.is_empty())
    }

    /// Attribute value by name
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Repair the two defects most commonly seen in hand-written manifests
///
/// A leading byte-order mark is removed, and every `&` that does not start a
/// predefined or numeric character reference is escaped to `&amp;`.
pub fn sanitize(raw: &str) -> String {
    let content = raw.strip_prefix('\u{feff}').unwrap_or(raw);
    let mut out = String::with_capacity(content.len());
    let mut rest = content;

    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        if is_entity_ref(after) {
            out.push('&');
        } else {
            out.push_str("&amp;");
        }
        rest = after;
    }
    out.push_str(rest);
    out
}

fn is_entity_ref(after_amp: &str) -> bool {
    let Some(end) = after_amp
        .bytes()
        .take(MAX_ENTITY_LEN)
        .position(|b| b == b';')
    else {
        return false;
    };
    let body = &after_amp[..end];
    match body {
        "amp" | "lt" | "gt" | "quot" | "apos" => true,
        _ => {
            if let Some(hex) = body.strip_prefix("#x") {
                !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit())
            } else if let Some(dec) = body.strip_prefix('#') {
                !dec.is_empty() && dec.chars().all(|c| c.is_ascii_digit())
            } else {
                false
            }
        }
    }
}

/// Parse a complete document and return its root element
///
/// The input is used as-is; call [`sanitize`] first for untrusted content.
pub fn parse_document(content: &str) -> Result<Element> {
    let mut reader = Reader::from_str(content);
    reader.trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let event = reader.read_event().map_err(|e| {
            Error::Xml(format!("{} at position {}", e, reader.buffer_position()))
        })?;

        match event {
            Event::Start(e) => {
                stack.push(Element::from_start(&e)?);
            }
            Event::Empty(e) => {
                let element = Element::from_start(&e)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let mut element = stack
                    .pop()
                    .ok_or_else(|| Error::Xml("Unexpected closing tag".to_string()))?;
                element.text = element.text.trim().to_string();
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(e) => {
                if let Some(current) = stack.last_mut() {
                    let text = e.unescape()?;
                    current.text.push_str(&text);
                }
            }
            Event::CData(e) => {
                if let Some(current) = stack.last_mut() {
                    current
                        .text
                        .push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(Error::Xml(format!(
            "Unexpected end of document: <{}> is not closed",
            open.name
        )));
    }

    root.ok_or_else(|| Error::Xml("Document has no root element".to_string()))
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> Result<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
        return Ok(());
    }
    if root.is_some() {
        return Err(Error::Xml(format!(
            "Junk after document element: <{}>",
            element.name
        )));
    }
    *root = Some(element);
    Ok(())
}
