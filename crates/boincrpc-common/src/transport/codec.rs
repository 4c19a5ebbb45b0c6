use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::protocol::error::{BoincRpcError, Result};
use crate::protocol::value::{Mapping, StructuredValue};

/// XML codec for GUI RPC documents.
///
/// Handles the subset of XML the daemon speaks: nested elements, text
/// content, repeated siblings and self-closing empty elements. Attributes are
/// ignored on decode and never produced on encode.
///
/// # Example
///
/// ```
/// use boincrpc_common::transport::XmlCodec;
/// use boincrpc_common::StructuredValue;
///
/// let value = XmlCodec::decode(b"<a><b/><b>x</b></a>").unwrap();
/// assert_eq!(
///     value.get("a").and_then(|a| a.get("b")),
///     Some(&StructuredValue::Sequence(vec![StructuredValue::Empty, "x".into()]))
/// );
///
/// let xml = XmlCodec::encode(&value).unwrap();
/// assert_eq!(xml, "<a><b/><b>x</b></a>");
/// ```
pub struct XmlCodec;

impl XmlCodec {
    /// Decodes a raw reply buffer.
    ///
    /// # Errors
    ///
    /// Returns [`BoincRpcError::Codec`] if the buffer is not UTF-8 or not a
    /// well-formed document in the supported subset.
    pub fn decode(data: &[u8]) -> Result<StructuredValue> {
        let text = std::str::from_utf8(data)?;
        Self::decode_str(text)
    }

    /// Decodes an XML document into a mapping with a single key, the root
    /// element's tag.
    pub fn decode_str(xml: &str) -> Result<StructuredValue> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut open: Vec<OpenElement> = Vec::new();
        let mut root: Option<StructuredValue> = None;

        loop {
            match reader.read_event()? {
                Event::Start(start) => {
                    let name = std::str::from_utf8(start.name().as_ref())?.to_string();
                    open.push(OpenElement::new(name));
                }
                Event::Empty(start) => {
                    let name = std::str::from_utf8(start.name().as_ref())?.to_string();
                    attach(&mut open, &mut root, name, StructuredValue::Empty)?;
                }
                Event::End(_) => {
                    let element = open
                        .pop()
                        .ok_or_else(|| BoincRpcError::Codec("unexpected closing tag".to_string()))?;
                    let (name, value) = element.finish()?;
                    attach(&mut open, &mut root, name, value)?;
                }
                Event::Text(text) => {
                    let text = text
                        .unescape()
                        .map_err(|e| BoincRpcError::Codec(format!("bad text content: {}", e)))?;
                    append_text(&mut open, &text)?;
                }
                Event::CData(data) => {
                    let raw = data.into_inner();
                    append_text(&mut open, std::str::from_utf8(&raw)?)?;
                }
                Event::Eof => break,
                // Declarations, comments, processing instructions, doctypes
                _ => {}
            }
        }

        if let Some(element) = open.last() {
            return Err(BoincRpcError::Codec(format!(
                "unclosed element <{}>",
                element.name
            )));
        }

        root.ok_or_else(|| BoincRpcError::Codec("document has no root element".to_string()))
    }

    /// Encodes a mapping as a sequence of XML elements.
    ///
    /// No prolog is written and nothing wraps the output beyond the mapping's
    /// own keys; callers add the request envelope themselves.
    ///
    /// # Errors
    ///
    /// Returns [`BoincRpcError::Codec`] if:
    /// - The top-level value is not a mapping
    /// - A key is not a valid element name
    /// - Text contains a character XML 1.0 does not allow, the frame
    ///   terminator `0x03` among them
    /// - A sequence holds fewer than two items, which would not decode back
    ///   to a sequence
    /// - A sequence is nested directly inside another sequence
    pub fn encode(value: &StructuredValue) -> Result<String> {
        let StructuredValue::Mapping(map) = value else {
            return Err(BoincRpcError::Codec(
                "top-level value must be a mapping".to_string(),
            ));
        };

        let mut out = String::new();
        write_children(&mut out, map)?;
        Ok(out)
    }
}

/// Element whose closing tag has not been read yet.
struct OpenElement {
    name: String,
    children: StructuredValue,
    text: String,
}

impl OpenElement {
    fn new(name: String) -> Self {
        Self {
            name,
            children: StructuredValue::mapping(),
            text: String::new(),
        }
    }

    fn has_children(&self) -> bool {
        self.children.as_mapping().is_some_and(|map| !map.is_empty())
    }

    fn finish(self) -> Result<(String, StructuredValue)> {
        let value = match (self.has_children(), self.text.is_empty()) {
            (true, false) => {
                return Err(BoincRpcError::Codec(format!(
                    "element <{}> mixes text with child elements",
                    self.name
                )))
            }
            (true, true) => self.children,
            (false, false) => StructuredValue::Scalar(self.text),
            (false, true) => StructuredValue::Empty,
        };
        Ok((self.name, value))
    }
}

fn attach(
    open: &mut [OpenElement],
    root: &mut Option<StructuredValue>,
    name: String,
    value: StructuredValue,
) -> Result<()> {
    if let Some(parent) = open.last_mut() {
        parent.children.push_child(name, value);
        return Ok(());
    }

    if root.is_some() {
        return Err(BoincRpcError::Codec(format!(
            "second root element <{}>",
            name
        )));
    }
    *root = Some(StructuredValue::single(name, value));
    Ok(())
}

fn append_text(open: &mut [OpenElement], text: &str) -> Result<()> {
    if text.is_empty() {
        return Ok(());
    }
    match open.last_mut() {
        Some(element) => {
            element.text.push_str(text);
            Ok(())
        }
        None => Err(BoincRpcError::Codec(
            "text outside the root element".to_string(),
        )),
    }
}

fn write_children(out: &mut String, map: &Mapping) -> Result<()> {
    for (name, value) in map {
        write_element(out, name, value)?;
    }
    Ok(())
}

fn write_element(out: &mut String, name: &str, value: &StructuredValue) -> Result<()> {
    if !is_valid_name(name) {
        return Err(BoincRpcError::Codec(format!(
            "invalid element name {:?}",
            name
        )));
    }

    match value {
        StructuredValue::Empty => write_empty(out, name),
        StructuredValue::Mapping(map) if map.is_empty() => write_empty(out, name),
        StructuredValue::Mapping(map) => {
            write_open(out, name);
            write_children(out, map)?;
            write_close(out, name);
        }
        StructuredValue::Scalar(text) => {
            if let Some(c) = text.chars().find(|&c| !is_xml_char(c)) {
                return Err(BoincRpcError::Codec(format!(
                    "text of <{}> contains forbidden character {:?}",
                    name, c
                )));
            }
            write_open(out, name);
            out.push_str(&escape(text.as_str()));
            write_close(out, name);
        }
        StructuredValue::Sequence(items) => {
            if items.len() < 2 {
                return Err(BoincRpcError::Codec(format!(
                    "sequence under <{}> has {} item(s); repeated elements need at least two",
                    name,
                    items.len()
                )));
            }
            for item in items {
                if matches!(item, StructuredValue::Sequence(_)) {
                    return Err(BoincRpcError::Codec(format!(
                        "nested sequence under <{}>",
                        name
                    )));
                }
                write_element(out, name, item)?;
            }
        }
    }
    Ok(())
}

fn write_empty(out: &mut String, name: &str) {
    out.push('<');
    out.push_str(name);
    out.push_str("/>");
}

fn write_open(out: &mut String, name: &str) {
    out.push('<');
    out.push_str(name);
    out.push('>');
}

fn write_close(out: &mut String, name: &str) {
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

/// Characters allowed in XML 1.0 text. Excludes C0 controls other than tab,
/// LF and CR, so the frame terminator can never be written.
fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..='\u{10FFFF}')
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' || first == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | ':' | '-' | '.'))
}
