//! Inclusive XML canonicalisation (C14N 1.0, 2001-03-15, without comments).
//!
//! Only the subset exercised by DCP documents is implemented: element and
//! text nodes, namespace propagation, attribute ordering and the enveloped
//! signature exclusion. Processing instructions and comments never survive
//! parsing, so they need no treatment here.

use crate::dsig::DSIG_NS;
use crate::element::{Element, Node};
use crate::write::escape_attribute;
use std::collections::BTreeMap;

/// Canonicalise an element as the document root, with no inherited
/// namespace context.
pub fn canonicalize(element: &Element, exclude_enveloped_signature: bool) -> String {
    let mut out = String::new();
    render(element, &BTreeMap::new(), exclude_enveloped_signature, true, &mut out);
    out
}

/// Canonicalise a document subset rooted at `element`, where `in_scope`
/// holds the namespace bindings inherited from ancestors (keyed by prefix,
/// `None` being the default namespace).
///
/// Per the canonicalisation rules for subsets, inherited bindings are
/// rendered on the apex element, since no ancestor is present in the
/// output to carry them.
pub fn canonicalize_subset(
    element: &Element,
    in_scope: &BTreeMap<Option<String>, String>,
) -> String {
    let mut apex = element.clone();
    for (prefix, uri) in in_scope {
        if !apex.ns_decls.iter().any(|(p, _)| p == prefix) {
            apex.declare_namespace(prefix.as_deref(), uri);
        }
    }
    canonicalize(&apex, false)
}

fn is_enveloped_signature(element: &Element) -> bool {
    element.name == "Signature" && element.namespace.as_deref() == Some(DSIG_NS)
}

fn render(
    element: &Element,
    rendered: &BTreeMap<Option<String>, String>,
    exclude_signature: bool,
    is_root: bool,
    out: &mut String,
) {
    let qualified = element.qualified_name();
    out.push('<');
    out.push_str(&qualified);

    // The namespace axis: everything declared here, plus the element's own
    // binding in case it was built without an explicit declaration.
    let mut scope: BTreeMap<Option<String>, String> = rendered.clone();
    let mut own: BTreeMap<Option<String>, String> = BTreeMap::new();
    for (prefix, uri) in &element.ns_decls {
        own.insert(prefix.clone(), uri.clone());
    }
    if let Some(uri) = &element.namespace {
        own.entry(element.prefix.clone()).or_insert_with(|| uri.clone());
    }

    // Render only bindings that differ from what an ancestor already
    // rendered; sorted by prefix, default namespace first.
    for (prefix, uri) in &own {
        if scope.get(prefix) == Some(uri) {
            continue;
        }
        match prefix {
            None => out.push_str(" xmlns=\""),
            Some(p) => {
                out.push_str(" xmlns:");
                out.push_str(p);
                out.push_str("=\"");
            }
        }
        out.push_str(&escape_attribute(uri));
        out.push('"');
        scope.insert(prefix.clone(), uri.clone());
    }

    // Attributes sorted by (namespace URI, local name); unprefixed
    // attributes have no namespace and sort first.
    let mut attributes: Vec<(&str, &str)> = element
        .attributes
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    attributes.sort_by_key(|(name, _)| match name.split_once(':') {
        Some((prefix, local)) => (
            scope.get(&Some(prefix.to_string())).cloned().unwrap_or_default(),
            local.to_string(),
        ),
        None => (String::new(), name.to_string()),
    });
    for (name, value) in attributes {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(&escape_attribute(value));
        out.push('"');
    }

    out.push('>');

    for child in &element.children {
        match child {
            Node::Element(e) => {
                if exclude_signature && is_root && is_enveloped_signature(e) {
                    continue;
                }
                render(e, &scope, exclude_signature, false, out);
            }
            Node::Text(t) => out.push_str(&escape_c14n_text(t)),
        }
    }

    out.push_str("</");
    out.push_str(&qualified);
    out.push('>');
}

fn escape_c14n_text(text: &str) -> String {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::read::parse_string;

    #[test]
    fn test_empty_elements_expand() {
        let doc = parse_string("<a><b/></a>").unwrap();
        assert_eq!(canonicalize(&doc, false), "<a><b></b></a>");
    }

    #[test]
    fn test_attribute_order() {
        let doc = parse_string("<a c=\"3\" b=\"2\" a=\"1\"/>").unwrap();
        assert_eq!(canonicalize(&doc, false), "<a a=\"1\" b=\"2\" c=\"3\"></a>");
    }

    #[test]
    fn test_namespace_not_rerendered() {
        let doc =
            parse_string("<a xmlns=\"urn:x\"><b xmlns=\"urn:x\"/><c xmlns=\"urn:y\"/></a>")
                .unwrap();
        assert_eq!(
            canonicalize(&doc, false),
            "<a xmlns=\"urn:x\"><b></b><c xmlns=\"urn:y\"></c></a>"
        );
    }

    #[test]
    fn test_enveloped_signature_excluded() {
        let doc = parse_string(concat!(
            "<a xmlns:dsig=\"http://www.w3.org/2000/09/xmldsig#\">",
            "<b/><dsig:Signature><x/></dsig:Signature></a>",
        ))
        .unwrap();
        let c = canonicalize(&doc, true);
        assert!(!c.contains("Signature"));
        assert!(c.contains("<b></b>"));
    }

    #[test]
    fn test_signed_info_with_inherited_context() {
        let doc = parse_string(concat!(
            "<root xmlns=\"urn:r\" xmlns:dsig=\"http://www.w3.org/2000/09/xmldsig#\">",
            "<dsig:Signature><dsig:SignedInfo><dsig:Item/></dsig:SignedInfo></dsig:Signature>",
            "</root>",
        ))
        .unwrap();
        let signature = doc.child("Signature").unwrap();
        let signed_info = signature.child("SignedInfo").unwrap();

        let mut context = BTreeMap::new();
        context.insert(None, "urn:r".to_string());
        context.insert(
            Some("dsig".to_string()),
            "http://www.w3.org/2000/09/xmldsig#".to_string(),
        );
        let c = canonicalize_subset(signed_info, &context);
        // Inherited bindings are rendered on the apex, default namespace
        // first.
        assert_eq!(
            c,
            concat!(
                "<dsig:SignedInfo xmlns=\"urn:r\" ",
                "xmlns:dsig=\"http://www.w3.org/2000/09/xmldsig#\">",
                "<dsig:Item></dsig:Item></dsig:SignedInfo>"
            )
        );
    }
}
