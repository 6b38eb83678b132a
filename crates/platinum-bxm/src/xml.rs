//! Conversion between BXM trees and textual XML.

use std::io::Write;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::{BxmDocument, BxmNode, Error, Result, TextEncoding};

fn xml_err(e: impl std::fmt::Display) -> Error {
    Error::Xml(e.to_string())
}

impl BxmDocument {
    /// Convert to an indented XML string.
    pub fn to_xml_string(&self) -> Result<String> {
        let mut output = Vec::new();
        self.write_xml(&mut output)?;
        String::from_utf8(output).map_err(xml_err)
    }

    /// Write XML to a writer.
    pub fn write_xml<W: Write>(&self, writer: &mut W) -> Result<()> {
        let mut xml_writer = Writer::new_with_indent(writer, b' ', 2);

        xml_writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
            .map_err(xml_err)?;

        write_element(&mut xml_writer, &self.root)
    }

    /// Parse XML text into a document that will be encoded in `encoding`.
    ///
    /// Whitespace around text content is trimmed.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use platinum_bxm::{BxmDocument, TextEncoding};
    ///
    /// let xml = r#"<Quest id="q100"><Step n="1">Go north</Step></Quest>"#;
    /// let doc = BxmDocument::from_xml(xml, TextEncoding::ShiftJis).unwrap();
    /// let bytes = doc.encode().unwrap();
    /// ```
    pub fn from_xml(xml: &str, encoding: TextEncoding) -> Result<Self> {
        let root = parse_xml_to_node(xml)?;
        Ok(Self::new(root, encoding))
    }

    /// Parse XML bytes into a document.
    pub fn from_xml_bytes(xml: &[u8], encoding: TextEncoding) -> Result<Self> {
        let xml_str = std::str::from_utf8(xml).map_err(xml_err)?;
        Self::from_xml(xml_str, encoding)
    }
}

fn write_element<W: Write>(writer: &mut Writer<W>, node: &BxmNode) -> Result<()> {
    let mut elem = BytesStart::new(node.name.as_str());
    for (key, value) in &node.attributes {
        elem.push_attribute((key.as_str(), value.as_str()));
    }

    if node.children.is_empty() && node.value.is_empty() {
        writer.write_event(Event::Empty(elem)).map_err(xml_err)?;
        return Ok(());
    }

    writer.write_event(Event::Start(elem)).map_err(xml_err)?;
    if !node.value.is_empty() {
        writer
            .write_event(Event::Text(BytesText::new(&node.value)))
            .map_err(xml_err)?;
    }
    for child in &node.children {
        write_element(writer, child)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(node.name.as_str())))
        .map_err(xml_err)?;

    Ok(())
}

fn start_node(e: &BytesStart<'_>) -> Result<BxmNode> {
    let mut node = BxmNode::new(String::from_utf8_lossy(e.name().as_ref()));
    for attr in e.attributes() {
        let attr = attr.map_err(xml_err)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().map_err(xml_err)?.into_owned();
        node.set_attr(key, value);
    }
    Ok(node)
}

fn parse_xml_to_node(xml: &str) -> Result<BxmNode> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<BxmNode> = Vec::new();
    let mut root: Option<BxmNode> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => stack.push(start_node(&e)?),
            Ok(Event::Empty(e)) => {
                let node = start_node(&e)?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => root = Some(node),
                }
            }
            Ok(Event::End(_)) => {
                if let Some(node) = stack.pop() {
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(node),
                        None => root = Some(node),
                    }
                }
            }
            Ok(Event::Text(e)) => {
                if let Some(node) = stack.last_mut() {
                    let text = e.unescape().map_err(xml_err)?;
                    node.value.push_str(&text);
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(node) = stack.last_mut() {
                    node.value.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(Error::Xml(format!("XML parse error: {}", e))),
        }
    }

    root.ok_or_else(|| Error::Xml("no root element found in XML".to_string()))
}
