//! Owned XML element tree.

use std::collections::BTreeMap;
use std::fmt;

use roxmltree::Node;

use super::utils::{escape_attribute, escape_text};
use crate::config::{XML_LANG, XML_NAMESPACE};

/// A child of an element: either a nested element or character data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

/// An XML element with a resolved namespace.
///
/// Attributes are keyed by local name, except attributes in the XML
/// namespace which keep their `xml:` prefix (`xml:lang`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct XmlElement {
    /// Namespace URI (empty when the element has none).
    pub namespace: String,

    /// Local name.
    pub name: String,

    /// Attribute values by key.
    pub attributes: BTreeMap<String, String>,

    /// Child nodes in document order.
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    /// Create an empty element.
    #[must_use]
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            attributes: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    /// Set an attribute.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(key, value);
        self
    }

    /// Append a child element.
    #[must_use]
    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.append_child(child);
        self
    }

    /// Append character data.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(XmlNode::Text(text.into()));
        self
    }

    /// Get an attribute value.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Set an attribute value, replacing any previous one.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }

    /// Remove an attribute, returning its value.
    pub fn remove_attribute(&mut self, key: &str) -> Option<String> {
        self.attributes.remove(key)
    }

    /// The explicit `xml:lang` of this element, if any.
    #[must_use]
    pub fn lang(&self) -> Option<&str> {
        self.attribute(XML_LANG)
    }

    /// Append a child element.
    pub fn append_child(&mut self, child: XmlElement) {
        self.children.push(XmlNode::Element(child));
    }

    /// Iterate over child elements, skipping text.
    pub fn child_elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|child| match child {
            XmlNode::Element(element) => Some(element),
            XmlNode::Text(_) => None,
        })
    }

    /// Find the first child element with the given namespace and name.
    ///
    /// # Examples
    /// ```
    /// use jxt::xml::XmlElement;
    ///
    /// let message = XmlElement::new("jabber:client", "message")
    ///     .with_child(XmlElement::new("jabber:client", "body").with_text("hi"));
    ///
    /// assert!(message.find_child("jabber:client", "body").is_some());
    /// assert!(message.find_child("jabber:client", "subject").is_none());
    /// ```
    #[must_use]
    pub fn find_child(&self, namespace: &str, name: &str) -> Option<&XmlElement> {
        self.child_elements()
            .find(|child| child.namespace == namespace && child.name == name)
    }

    /// Find all child elements with the given namespace and name.
    pub fn find_children<'a>(
        &'a self,
        namespace: &'a str,
        name: &'a str,
    ) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.child_elements()
            .filter(move |child| child.namespace == namespace && child.name == name)
    }

    /// Concatenated direct character data of this element.
    ///
    /// Whitespace-only content (such as indentation between children) reads
    /// as empty.
    #[must_use]
    pub fn text(&self) -> String {
        let text: String = self
            .children
            .iter()
            .filter_map(|child| match child {
                XmlNode::Text(text) => Some(text.as_str()),
                XmlNode::Element(_) => None,
            })
            .collect();
        if text.trim().is_empty() {
            String::new()
        } else {
            text
        }
    }

    /// Replace the direct character data of this element.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.children.retain(|child| matches!(child, XmlNode::Element(_)));
        let text = text.into();
        if !text.is_empty() {
            self.children.push(XmlNode::Text(text));
        }
    }

    fn write(&self, f: &mut fmt::Formatter<'_>, parent_namespace: Option<&str>) -> fmt::Result {
        write!(f, "<{}", self.name)?;
        match parent_namespace {
            Some(parent) if parent == self.namespace => {}
            None if self.namespace.is_empty() => {}
            _ => write!(f, " xmlns=\"{}\"", escape_attribute(&self.namespace))?,
        }
        for (key, value) in &self.attributes {
            write!(f, " {}=\"{}\"", key, escape_attribute(value))?;
        }
        if self.children.is_empty() {
            return f.write_str("/>");
        }
        f.write_str(">")?;
        for child in &self.children {
            match child {
                XmlNode::Element(element) => element.write(f, Some(&self.namespace))?,
                XmlNode::Text(text) => f.write_str(&escape_text(text))?,
            }
        }
        write!(f, "</{}>", self.name)
    }
}

impl fmt::Display for XmlElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write(f, None)
    }
}

impl From<Node<'_, '_>> for XmlElement {
    /// Convert a parsed element, keeping all character data in document order.
    fn from(node: Node<'_, '_>) -> Self {
        let tag = node.tag_name();
        let mut element = XmlElement::new(tag.namespace().unwrap_or(""), tag.name());

        for attribute in node.attributes() {
            let key = match attribute.namespace() {
                Some(XML_NAMESPACE) => format!("xml:{}", attribute.name()),
                _ => attribute.name().to_string(),
            };
            element.attributes.insert(key, attribute.value().to_string());
        }

        for child in node.children() {
            if child.is_element() {
                element.append_child(XmlElement::from(child));
            } else if child.is_text() {
                if let Some(text) = child.text() {
                    element.children.push(XmlNode::Text(text.to_string()));
                }
            }
        }

        element
    }
}
