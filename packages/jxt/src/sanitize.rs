//! Built-in markup sanitizers.
//!
//! The XHTML-IM sanitizer keeps the recommended XHTML-IM profile: a fixed set
//! of elements and attributes, link targets with known-safe schemes, and a
//! short list of style properties. Unknown elements are unwrapped so their
//! text survives.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{XHTML_IM_SANITIZER, XHTML_NAMESPACE, XML_LANG};
use crate::xml::{XmlElement, XmlNode};

/// Cleans an element; `None` drops it entirely.
pub type Sanitizer = Arc<dyn Fn(&XmlElement) -> Option<XmlElement> + Send + Sync>;

/// Elements allowed by the XHTML-IM profile, with their allowed attributes.
const ALLOWED_ELEMENTS: &[(&str, &[&str])] = &[
    ("a", &["href", "style", "type"]),
    ("blockquote", &["style"]),
    ("body", &["style"]),
    ("br", &[]),
    ("cite", &["style"]),
    ("em", &[]),
    ("img", &["alt", "height", "src", "style", "width"]),
    ("li", &["style"]),
    ("ol", &["style"]),
    ("p", &["style"]),
    ("span", &["style"]),
    ("strong", &[]),
    ("ul", &["style"]),
];

/// URI schemes allowed in `href` and `src`.
const ALLOWED_SCHEMES: &[&str] = &["http", "https", "ftp", "mailto", "xmpp"];

/// CSS properties allowed in `style`.
const ALLOWED_STYLES: &[&str] = &[
    "background-color",
    "color",
    "font-family",
    "font-size",
    "font-style",
    "font-weight",
    "margin-left",
    "margin-right",
    "text-align",
    "text-decoration",
];

/// The built-in sanitizer set: XHTML-IM under `xhtmlim`.
#[must_use]
pub fn default_sanitizers() -> HashMap<String, Sanitizer> {
    HashMap::from([(XHTML_IM_SANITIZER.to_string(), xhtml_im_sanitizer())])
}

/// The XHTML-IM sanitizer as a shareable function value.
#[must_use]
pub fn xhtml_im_sanitizer() -> Sanitizer {
    Arc::new(sanitize_xhtml_im)
}

/// Sanitize an XHTML-IM fragment.
///
/// Returns `None` if the root element itself is not allowed.
///
/// # Examples
/// ```
/// use jxt::sanitize::sanitize_xhtml_im;
/// use jxt::xml::parse;
///
/// let body = parse(
///     r#"<body xmlns="http://www.w3.org/1999/xhtml"><p onclick="x()">Hi <script>bad()</script><a href="javascript:x()">link</a></p></body>"#,
/// ).unwrap();
///
/// let clean = sanitize_xhtml_im(&body).unwrap();
/// assert_eq!(
///     clean.to_string(),
///     r#"<body xmlns="http://www.w3.org/1999/xhtml"><p>Hi bad()<a>link</a></p></body>"#
/// );
/// ```
#[must_use]
pub fn sanitize_xhtml_im(element: &XmlElement) -> Option<XmlElement> {
    allowed_attributes(element)?;
    match sanitize_node(element).into_iter().next() {
        Some(XmlNode::Element(clean)) => Some(clean),
        _ => None,
    }
}

fn allowed_attributes(element: &XmlElement) -> Option<&'static [&'static str]> {
    if element.namespace != XHTML_NAMESPACE {
        return None;
    }
    ALLOWED_ELEMENTS
        .iter()
        .find(|(name, _)| *name == element.name)
        .map(|(_, attributes)| *attributes)
}

fn sanitize_node(element: &XmlElement) -> Vec<XmlNode> {
    let mut children = Vec::new();
    for child in &element.children {
        match child {
            XmlNode::Text(text) => children.push(XmlNode::Text(text.clone())),
            XmlNode::Element(nested) => children.extend(sanitize_node(nested)),
        }
    }

    let Some(attributes) = allowed_attributes(element) else {
        // Unknown elements are unwrapped.
        return children;
    };

    let mut clean = XmlElement::new(&element.namespace, &element.name);
    for (key, value) in &element.attributes {
        if key == XML_LANG {
            clean.set_attribute(key.clone(), value.clone());
            continue;
        }
        if !attributes.contains(&key.as_str()) {
            continue;
        }
        let value = match key.as_str() {
            "href" | "src" => is_safe_uri(value).then(|| value.clone()),
            "style" => sanitize_style(value),
            _ => Some(value.clone()),
        };
        if let Some(value) = value {
            clean.set_attribute(key.clone(), value);
        }
    }
    clean.children = children;

    vec![XmlNode::Element(clean)]
}

fn is_safe_uri(uri: &str) -> bool {
    let uri = uri.trim();
    let Some((scheme, _)) = uri.split_once(':') else {
        return true;
    };
    // A colon after the first slash belongs to a relative reference.
    if scheme.contains('/') {
        return true;
    }
    let scheme = scheme.to_ascii_lowercase();
    ALLOWED_SCHEMES.contains(&scheme.as_str())
}

fn sanitize_style(style: &str) -> Option<String> {
    let declarations: Vec<String> = style
        .split(';')
        .filter_map(|declaration| {
            let (property, value) = declaration.split_once(':')?;
            let property = property.trim().to_ascii_lowercase();
            let value = value.trim();
            let lowered = value.to_ascii_lowercase();
            if !ALLOWED_STYLES.contains(&property.as_str())
                || value.is_empty()
                || lowered.contains("url(")
                || lowered.contains("expression(")
            {
                return None;
            }
            Some(format!("{property}: {value}"))
        })
        .collect();

    if declarations.is_empty() {
        None
    } else {
        Some(declarations.join("; "))
    }
}
