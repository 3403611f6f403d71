//! Parsing and escaping helpers.

use roxmltree::Document;

use super::element::XmlElement;
use crate::error::Result;

/// Parse XML text into an owned element tree.
///
/// # Errors
/// Returns `XmlParse` if the text is not well-formed XML.
///
/// # Examples
/// ```
/// use jxt::xml::parse;
///
/// let element = parse(r#"<message xmlns="jabber:client" to="a@b"><body>hi</body></message>"#).unwrap();
/// assert_eq!(element.name, "message");
/// assert_eq!(element.attribute("to"), Some("a@b"));
/// ```
pub fn parse(xml: &str) -> Result<XmlElement> {
    let doc = Document::parse(xml)?;
    Ok(XmlElement::from(doc.root_element()))
}

/// Escape character data.
#[must_use]
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape an attribute value for use between double quotes.
#[must_use]
pub fn escape_attribute(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            '\t' => out.push_str("&#9;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_invalid_xml() {
        assert!(parse("<unclosed>").is_err());
    }

    #[test]
    fn test_escape_text() {
        assert_eq!(escape_text("a < b & c"), "a &lt; b &amp; c");
    }

    #[test]
    fn test_escape_attribute() {
        assert_eq!(escape_attribute(r#"say "hi""#), "say &quot;hi&quot;");
    }
}
