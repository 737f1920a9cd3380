//! Owned XML element tree built from `quick-xml` events, and the read-only
//! accessors both parsers use to pull values out of it.
//!
//! Element and attribute names are stored by local name, so `<gpx:trkpt>` and
//! `<trkpt>` match the same tag.

use quick_xml::Reader;
use quick_xml::events::{BytesRef, BytesStart, Event};

use crate::error::{MapError, Result};

/// Deepest element nesting [`parse`] accepts. Tree walks recurse once per
/// level.
pub const MAX_DEPTH: usize = 1024;

#[derive(Debug, Clone, PartialEq)]
pub enum XmlChild {
    Element(XmlNode),
    Text(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlNode {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlChild>,
}

impl XmlNode {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn elements(&self) -> impl Iterator<Item = &XmlNode> {
        self.children.iter().filter_map(|child| match child {
            XmlChild::Element(node) => Some(node),
            XmlChild::Text(_) => None,
        })
    }

    /// Concatenated text of this node and all of its descendants.
    pub fn text_content(&self) -> String {
        let mut text = String::new();
        self.collect_text(&mut text);
        text
    }

    fn collect_text(&self, out: &mut String) {
        for child in &self.children {
            match child {
                XmlChild::Text(t) => out.push_str(t),
                XmlChild::Element(node) => node.collect_text(out),
            }
        }
    }

    fn push_text(&mut self, text: &str) {
        if let Some(XmlChild::Text(last)) = self.children.last_mut() {
            last.push_str(text);
        } else {
            self.children.push(XmlChild::Text(text.to_string()));
        }
    }
}

/// Parse an XML document.
///
/// The returned node is an unnamed document node whose only element child is
/// the document's root element.
pub fn parse(xml: &str) -> Result<XmlNode> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<XmlNode> = vec![XmlNode::default()];

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                check_depth(&stack)?;
                stack.push(element(&e));
            }
            Ok(Event::Empty(e)) => {
                check_depth(&stack)?;
                let node = element(&e);
                append(&mut stack, node)?;
            }
            Ok(Event::End(_)) => {
                // quick-xml already rejects mismatched end names
                if stack.len() < 2 {
                    return Err(MapError::Malformed("unexpected closing tag".to_string()));
                }
                if let Some(node) = stack.pop() {
                    append(&mut stack, node)?;
                }
            }
            Ok(Event::Text(e)) => {
                let raw = std::str::from_utf8(e.as_ref()).unwrap_or_default();
                if let Some(top) = stack.last_mut() {
                    top.push_text(raw);
                }
            }
            Ok(Event::CData(e)) => {
                let s = std::str::from_utf8(e.as_ref()).unwrap_or_default();
                if let Some(top) = stack.last_mut() {
                    top.push_text(s);
                }
            }
            Ok(Event::GeneralRef(e)) => {
                if let (Some(ch), Some(top)) = (resolve_reference(&e), stack.last_mut()) {
                    let mut buf = [0u8; 4];
                    top.push_text(ch.encode_utf8(&mut buf));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(MapError::XmlParse(e)),
            _ => {}
        }
    }

    if stack.len() != 1 {
        let open = stack.last().map(|n| n.name.clone()).unwrap_or_default();
        return Err(MapError::Malformed(format!("unclosed element <{open}>")));
    }
    let document = stack.pop().unwrap_or_default();
    if document.elements().next().is_none() {
        return Err(MapError::Malformed("document has no root element".to_string()));
    }
    Ok(document)
}

/// Rejects an element that would sit deeper than [`MAX_DEPTH`]. The stack
/// holds the document node plus every open element.
fn check_depth(stack: &[XmlNode]) -> Result<()> {
    if stack.len() > MAX_DEPTH {
        return Err(MapError::Malformed(format!(
            "elements nested deeper than {MAX_DEPTH} levels"
        )));
    }
    Ok(())
}

fn element(start: &BytesStart<'_>) -> XmlNode {
    let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
    let attributes = start
        .attributes()
        .filter_map(|attr| attr.ok())
        .map(|attr| {
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let raw = std::str::from_utf8(&attr.value).unwrap_or_default();
            let value = quick_xml::escape::unescape(raw)
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| raw.to_string());
            (key, value)
        })
        .collect();

    XmlNode {
        name,
        attributes,
        children: Vec::new(),
    }
}

fn append(stack: &mut [XmlNode], node: XmlNode) -> Result<()> {
    let is_document = stack.len() == 1;
    let parent = stack
        .last_mut()
        .ok_or_else(|| MapError::Malformed("element outside document".to_string()))?;
    if is_document && parent.elements().next().is_some() {
        return Err(MapError::Malformed(format!(
            "second root element <{}>",
            node.name
        )));
    }
    parent.children.push(XmlChild::Element(node));
    Ok(())
}

/// Character references (`&#60;`, `&#x3C;`) and the predefined XML entities.
fn resolve_reference(e: &BytesRef<'_>) -> Option<char> {
    if let Ok(Some(ch)) = e.resolve_char_ref() {
        return Some(ch);
    }
    match std::str::from_utf8(e.as_ref()).unwrap_or_default() {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => None,
    }
}

/// All descendant elements named `tag`, in document order. `root` itself is
/// not included.
pub fn descendants<'a>(root: &'a XmlNode, tag: &str) -> Vec<&'a XmlNode> {
    let mut found = Vec::new();
    collect_descendants(root, tag, &mut found);
    found
}

fn collect_descendants<'a>(node: &'a XmlNode, tag: &str, found: &mut Vec<&'a XmlNode>) {
    for child in node.elements() {
        if child.name == tag {
            found.push(child);
        }
        collect_descendants(child, tag, found);
    }
}

pub fn first_node<'a>(root: &'a XmlNode, tag: &str) -> Option<&'a XmlNode> {
    root.elements().find_map(|child| {
        if child.name == tag {
            Some(child)
        } else {
            first_node(child, tag)
        }
    })
}

/// Trimmed text content, or empty when there is no node.
pub fn value(node: Option<&XmlNode>) -> String {
    node.map(|n| n.text_content().trim().to_string())
        .unwrap_or_default()
}

pub fn first_value(root: &XmlNode, tag: &str) -> String {
    value(first_node(root, tag))
}

/// Numeric attribute value; NaN when missing or not a number.
pub fn number_attribute(node: &XmlNode, name: &str) -> f64 {
    node.attribute(name)
        .and_then(|v| v.trim().parse::<f64>().ok())
        .unwrap_or(f64::NAN)
}

pub fn has_attribute(node: &XmlNode, name: &str) -> bool {
    node.attribute(name).is_some()
}
