//! Serialising the element tree.
//!
//! Output is always unformatted UTF-8 without a byte-order mark. Pretty
//! printing is deliberately absent: any whitespace inside a subtree covered
//! by a signature would change its digest.

use crate::element::{Element, Node};
use dcpack_core::Result;
use std::io::Write;
use std::path::Path;

/// Escape character data.
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape an attribute value.
pub fn escape_attribute(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(c),
        }
    }
    out
}

fn write_element(element: &Element, out: &mut String) {
    out.push('<');
    let qualified = element.qualified_name();
    out.push_str(&qualified);

    for (prefix, uri) in &element.ns_decls {
        match prefix {
            None => {
                out.push_str(" xmlns=\"");
            }
            Some(p) => {
                out.push_str(" xmlns:");
                out.push_str(p);
                out.push_str("=\"");
            }
        }
        out.push_str(&escape_attribute(uri));
        out.push('"');
    }

    for (name, value) in &element.attributes {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(&escape_attribute(value));
        out.push('"');
    }

    if element.children.is_empty() {
        out.push_str("/>");
        return;
    }

    out.push('>');
    for child in &element.children {
        match child {
            Node::Element(e) => write_element(e, out),
            Node::Text(t) => out.push_str(&escape_text(t)),
        }
    }
    out.push_str("</");
    out.push_str(&qualified);
    out.push('>');
}

/// Serialise a document to a string, with XML declaration.
pub fn document_to_string(root: &Element) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    write_element(root, &mut out);
    out.push('\n');
    out
}

/// Serialise just one element, without a declaration.
pub fn element_to_string(element: &Element) -> String {
    let mut out = String::new();
    write_element(element, &mut out);
    out
}

/// Write a document to a file as UTF-8 without BOM.
pub fn write_document(root: &Element, path: &Path) -> Result<()> {
    let mut file = std::fs::File::create(path)?;
    file.write_all(document_to_string(root).as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::read::parse_string;

    #[test]
    fn test_write_and_reparse() {
        let mut root = Element::root("PackingList", "urn:example:pkl");
        root.declare_namespace(Some("dsig"), "http://www.w3.org/2000/09/xmldsig#");
        root.add_text_child("Id", "urn:uuid:abc");
        root.add_text_child("AnnotationText", "A & B <Test>");
        root.add_child(Element::new("AssetList"));

        let text = document_to_string(&root);
        assert!(text.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n"));
        assert!(!text.contains("  <"));

        let reparsed = parse_string(&text).unwrap();
        assert_eq!(reparsed.namespace.as_deref(), Some("urn:example:pkl"));
        assert_eq!(
            reparsed.string_child("AnnotationText").unwrap(),
            "A & B <Test>"
        );
    }

    #[test]
    fn test_empty_element_self_closes() {
        let element = Element::new("RatingList");
        assert_eq!(element_to_string(&element), "<RatingList/>");
    }

    #[test]
    fn test_attribute_escaping() {
        let mut element = Element::new("Property");
        element.set_attribute("scope", "a\"b\nc");
        assert_eq!(
            element_to_string(&element),
            "<Property scope=\"a&quot;b&#xA;c\"/>"
        );
    }
}
