//! Parsing XML into the element tree.

use crate::element::{Element, Node};
use dcpack_core::{Result, XmlError};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::path::Path;

/// Parse a document from a string.
pub fn parse_string(source: &str) -> Result<Element> {
    parse(source, None)
}

/// Parse a document from a file.
pub fn parse_file(path: &Path) -> Result<Element> {
    let source = std::fs::read_to_string(path).map_err(|e| XmlError::Parse {
        message: e.to_string(),
        file: Some(path.to_path_buf()),
        line: None,
    })?;
    parse(&source, Some(path))
}

struct Scope {
    element: Element,
    // Namespace bindings introduced by this element.
    bindings: Vec<(Option<String>, String)>,
}

fn parse(source: &str, path: Option<&Path>) -> Result<Element> {
    let mut reader = Reader::from_str(source);
    reader.trim_text(false);
    reader.check_end_names(true);

    // In-scope namespace bindings, innermost last.
    let mut namespaces: Vec<(Option<String>, String)> = Vec::new();
    let mut stack: Vec<Scope> = Vec::new();
    let mut root: Option<Element> = None;

    let line_of = |offset: usize| -> u64 {
        source.as_bytes()[..offset.min(source.len())]
            .iter()
            .filter(|&&b| b == b'\n')
            .count() as u64
            + 1
    };
    let error = |message: String, offset: usize| -> dcpack_core::Error {
        XmlError::Parse {
            message,
            file: path.map(Path::to_path_buf),
            line: Some(line_of(offset)),
        }
        .into()
    };

    let mut buffer = Vec::new();
    loop {
        let offset = reader.buffer_position();
        match reader.read_event_into(&mut buffer) {
            Ok(Event::Start(start)) => {
                let scope = open_element(&start, &mut namespaces, line_of(offset))
                    .map_err(|m| error(m, offset))?;
                stack.push(scope);
            }
            Ok(Event::Empty(start)) => {
                let scope = open_element(&start, &mut namespaces, line_of(offset))
                    .map_err(|m| error(m, offset))?;
                close_element(scope, &mut namespaces, &mut stack, &mut root);
            }
            Ok(Event::End(_)) => {
                let scope = stack
                    .pop()
                    .ok_or_else(|| error("unexpected end tag".into(), offset))?;
                close_element(scope, &mut namespaces, &mut stack, &mut root);
            }
            Ok(Event::Text(text)) => {
                let text = text
                    .unescape()
                    .map_err(|e| error(e.to_string(), offset))?
                    .into_owned();
                if !text.trim().is_empty() {
                    if let Some(scope) = stack.last_mut() {
                        scope.element.children.push(Node::Text(text));
                    }
                }
            }
            Ok(Event::CData(data)) => {
                let text = String::from_utf8_lossy(&data).into_owned();
                if let Some(scope) = stack.last_mut() {
                    scope.element.children.push(Node::Text(text));
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(error(e.to_string(), offset)),
        }
        buffer.clear();
    }

    if !stack.is_empty() {
        return Err(error("unexpected end of document".into(), source.len()));
    }
    root.ok_or_else(|| error("document has no root element".into(), 0))
}

fn open_element(
    start: &BytesStart,
    namespaces: &mut Vec<(Option<String>, String)>,
    line: u64,
) -> std::result::Result<Scope, String> {
    let qualified = String::from_utf8_lossy(start.name().as_ref()).into_owned();

    let mut element = Element::new(&qualified);
    element.line = Some(line);
    let mut bindings = Vec::new();

    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| e.to_string())?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute
            .unescape_value()
            .map_err(|e| e.to_string())?
            .into_owned();

        if key == "xmlns" {
            bindings.push((None, value.clone()));
            element.ns_decls.push((None, value));
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            bindings.push((Some(prefix.to_string()), value.clone()));
            element.ns_decls.push((Some(prefix.to_string()), value));
        } else {
            element.attributes.push((key, value));
        }
    }

    namespaces.extend(bindings.iter().cloned());

    // Split any prefix off the name and resolve it against the bindings now
    // in scope.
    if let Some((prefix, local)) = qualified.split_once(':') {
        element.prefix = Some(prefix.to_string());
        element.name = local.to_string();
        element.namespace = lookup(namespaces, Some(prefix));
    } else {
        element.namespace = lookup(namespaces, None);
    }

    Ok(Scope { element, bindings })
}

fn close_element(
    scope: Scope,
    namespaces: &mut Vec<(Option<String>, String)>,
    stack: &mut Vec<Scope>,
    root: &mut Option<Element>,
) {
    namespaces.truncate(namespaces.len() - scope.bindings.len());
    match stack.last_mut() {
        Some(parent) => parent.element.children.push(Node::Element(scope.element)),
        None => {
            if root.is_none() {
                *root = Some(scope.element);
            }
        }
    }
}

fn lookup(namespaces: &[(Option<String>, String)], prefix: Option<&str>) -> Option<String> {
    namespaces
        .iter()
        .rev()
        .find(|(p, _)| p.as_deref() == prefix)
        .map(|(_, uri)| uri.clone())
}
