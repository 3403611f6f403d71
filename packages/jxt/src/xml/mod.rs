//! Markup node model.
//!
//! The registry identifies elements by their qualified name only; the
//! owned [`XmlElement`] tree is what field converters read from and build.

mod element;
mod utils;

pub use element::{XmlElement, XmlNode};
pub use utils::{escape_attribute, escape_text, parse};

/// Contract for anything that can be looked up in the registry.
///
/// An element is identified by its namespace URI and local name, keyed as
/// `"{namespace}name"`.
pub trait QualifiedName {
    /// Namespace URI, or the empty string when the element has none.
    fn namespace(&self) -> &str;

    /// Local name without prefix.
    fn name(&self) -> &str;

    /// The `"{namespace}name"` key used by the identity index.
    fn qualified_key(&self) -> String {
        qualified_key(self.namespace(), self.name())
    }
}

/// Build the `"{namespace}name"` identity key.
///
/// # Examples
/// ```
/// use jxt::xml::qualified_key;
///
/// assert_eq!(qualified_key("jabber:client", "message"), "{jabber:client}message");
/// ```
#[must_use]
pub fn qualified_key(namespace: &str, name: &str) -> String {
    format!("{{{namespace}}}{name}")
}

impl QualifiedName for XmlElement {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl QualifiedName for roxmltree::Node<'_, '_> {
    fn namespace(&self) -> &str {
        self.tag_name().namespace().unwrap_or("")
    }

    fn name(&self) -> &str {
        self.tag_name().name()
    }
}
