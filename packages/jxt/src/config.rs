//! Configuration constants shared across the registry.

/// Namespace URI bound to the reserved `xml:` prefix.
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// Attribute key under which `xml:lang` is stored on parsed elements.
pub const XML_LANG: &str = "xml:lang";

/// Namespace of XHTML content, as carried inside XHTML-IM payloads.
pub const XHTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// Key of the built-in XHTML-IM sanitizer in a context's sanitizer set.
pub const XHTML_IM_SANITIZER: &str = "xhtmlim";

/// Field used for language tagging when a definition does not name one.
pub const DEFAULT_LANGUAGE_FIELD: &str = "lang";

/// Separator between type and version in exporter keys (`type__v2`).
pub const VERSION_SEPARATOR: &str = "__v";

/// Split a dotted path into its non-empty segments.
///
/// # Examples
/// ```
/// use jxt::config::split_path;
///
/// assert_eq!(split_path("message.body"), vec!["message", "body"]);
/// assert_eq!(split_path(".iq..error."), vec!["iq", "error"]);
/// assert!(split_path("").is_empty());
/// ```
pub fn split_path(path: &str) -> Vec<&str> {
    path.split('.').filter(|segment| !segment.is_empty()).collect()
}

/// Number of segments in a dotted path, as used for alias depth ordering.
#[must_use]
pub fn path_depth(path: &str) -> usize {
    split_path(path).len()
}

/// Build an exporter key from a type and an optional version.
#[must_use]
pub fn exporter_key(type_name: &str, version: Option<&str>) -> String {
    match version {
        Some(version) if !version.is_empty() => {
            format!("{type_name}{VERSION_SEPARATOR}{version}")
        }
        _ => type_name.to_string(),
    }
}
