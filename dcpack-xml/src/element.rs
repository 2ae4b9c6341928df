//! An owned XML element tree.
//!
//! DCP documents are built, inspected and canonicalised through this tree
//! rather than through serde, because signing needs byte-level control of
//! the output and reading needs tolerant, namespace-aware navigation.

use dcpack_core::{Result, XmlError};
use std::fmt;
use std::str::FromStr;

/// A child of an element: either another element or character data.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// One XML element.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    /// Local name, without any prefix.
    pub name: String,
    /// Prefix as written, if any.
    pub prefix: Option<String>,
    /// Resolved namespace URI, if any.
    pub namespace: Option<String>,
    /// Attributes in document order, as written (no `xmlns` entries).
    pub attributes: Vec<(String, String)>,
    /// Namespace declarations on this element: `(prefix, uri)`, where a
    /// `None` prefix is the default namespace.
    pub ns_decls: Vec<(Option<String>, String)>,
    /// Child nodes in document order.
    pub children: Vec<Node>,
    /// 1-based line number in the source document, when parsed.
    pub line: Option<u64>,
}

impl Element {
    /// Create an element with a local name.
    pub fn new(name: &str) -> Self {
        Element {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Create a root element carrying a default-namespace declaration.
    pub fn root(name: &str, default_namespace: &str) -> Self {
        let mut element = Element::new(name);
        element.namespace = Some(default_namespace.to_string());
        element.ns_decls.push((None, default_namespace.to_string()));
        element
    }

    /// Create a prefixed element in a namespace. No declaration is added;
    /// an ancestor must declare the prefix.
    pub fn prefixed(prefix: &str, name: &str, namespace: &str) -> Self {
        let mut element = Element::new(name);
        element.prefix = Some(prefix.to_string());
        element.namespace = Some(namespace.to_string());
        element
    }

    /// The qualified name as written.
    pub fn qualified_name(&self) -> String {
        match &self.prefix {
            Some(p) => format!("{p}:{}", self.name),
            None => self.name.clone(),
        }
    }

    /// Declare a namespace on this element.
    pub fn declare_namespace(&mut self, prefix: Option<&str>, uri: &str) {
        self.ns_decls
            .push((prefix.map(str::to_string), uri.to_string()));
    }

    /// Set an attribute, replacing any existing value.
    pub fn set_attribute(&mut self, name: &str, value: &str) {
        for (k, v) in self.attributes.iter_mut() {
            if k == name {
                *v = value.to_string();
                return;
            }
        }
        self.attributes.push((name.to_string(), value.to_string()));
    }

    /// Get an attribute value by name as written.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Get an attribute that must be present.
    pub fn string_attribute(&self, name: &str) -> Result<String> {
        self.attribute(name).map(str::to_string).ok_or_else(|| {
            XmlError::MissingAttribute {
                element: self.name.clone(),
                attribute: name.to_string(),
            }
            .into()
        })
    }

    /// Append a child element and return a mutable reference to it.
    pub fn add_child(&mut self, child: Element) -> &mut Element {
        self.children.push(Node::Element(child));
        match self.children.last_mut() {
            Some(Node::Element(e)) => e,
            _ => unreachable!(),
        }
    }

    /// Append a text node.
    pub fn add_text(&mut self, text: impl Into<String>) {
        self.children.push(Node::Text(text.into()));
    }

    /// Append `<name>text</name>`.
    pub fn add_text_child(&mut self, name: &str, text: impl Into<String>) -> &mut Element {
        let mut child = Element::new(name);
        child.add_text(text);
        self.add_child(child)
    }

    /// Insert a child element immediately before the first child with the
    /// given local name; appends if no such child exists.
    pub fn insert_child_before(&mut self, existing: &str, child: Element) {
        let position = self.children.iter().position(
            |n| matches!(n, Node::Element(e) if e.name == existing),
        );
        match position {
            Some(i) => self.children.insert(i, Node::Element(child)),
            None => {
                self.children.push(Node::Element(child));
            }
        }
    }

    /// Iterate over element children.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    /// The first child element with this local name.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|e| e.name == name)
    }

    /// All child elements with this local name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.elements().filter(move |e| e.name == name)
    }

    /// A child element that must be present.
    pub fn required_child(&self, name: &str) -> Result<&Element> {
        self.child(name).ok_or_else(|| {
            XmlError::MissingChild {
                parent: self.name.clone(),
                child: name.to_string(),
            }
            .into()
        })
    }

    /// The concatenated text content of this element.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for node in &self.children {
            if let Node::Text(t) = node {
                out.push_str(t);
            }
        }
        out
    }

    /// The text of a required child element.
    pub fn string_child(&self, name: &str) -> Result<String> {
        Ok(self.required_child(name)?.text())
    }

    /// The text of an optional child element.
    pub fn optional_string_child(&self, name: &str) -> Option<String> {
        self.child(name).map(Element::text)
    }

    /// The parsed content of a required child element.
    pub fn number_child<T>(&self, name: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        let text = self.string_child(name)?;
        text.trim().parse().map_err(|e: T::Err| {
            XmlError::BadContent {
                element: name.to_string(),
                message: e.to_string(),
            }
            .into()
        })
    }

    /// The parsed content of an optional child element.
    pub fn optional_number_child<T>(&self, name: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.child(name) {
            Some(_) => Ok(Some(self.number_child(name)?)),
            None => Ok(None),
        }
    }

    /// Whether any descendant element has this local name.
    pub fn has_descendant(&self, name: &str) -> bool {
        self.elements()
            .any(|e| e.name == name || e.has_descendant(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_and_navigate() {
        let mut root = Element::root("PackingList", "urn:example");
        root.add_text_child("Id", "urn:uuid:abc");
        let list = root.add_child(Element::new("AssetList"));
        list.add_text_child("Asset", "one");
        list.add_text_child("Asset", "two");

        assert_eq!(root.string_child("Id").unwrap(), "urn:uuid:abc");
        let assets: Vec<String> = root
            .child("AssetList")
            .unwrap()
            .children_named("Asset")
            .map(Element::text)
            .collect();
        assert_eq!(assets, ["one", "two"]);
        assert!(root.required_child("Missing").is_err());
    }

    #[test]
    fn test_insert_child_before() {
        let mut element = Element::new("MainSound");
        element.add_text_child("Id", "x");
        element.add_text_child("Hash", "h");
        element.insert_child_before("Hash", {
            let mut e = Element::new("KeyId");
            e.add_text("k");
            e
        });

        let names: Vec<&str> = element.elements().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["Id", "KeyId", "Hash"]);
    }

    #[test]
    fn test_number_child() {
        let mut element = Element::new("Chunk");
        element.add_text_child("Length", " 42 ");
        assert_eq!(element.number_child::<u64>("Length").unwrap(), 42);
        element.add_text_child("Offset", "zero");
        assert!(element.number_child::<u64>("Offset").is_err());
        assert_eq!(element.optional_number_child::<u64>("None").unwrap(), None);
    }

    #[test]
    fn test_attribute_replacement() {
        let mut element = Element::new("Reference");
        element.set_attribute("URI", "a");
        element.set_attribute("URI", "b");
        assert_eq!(element.attribute("URI"), Some("b"));
        assert_eq!(element.attributes.len(), 1);
    }
}
