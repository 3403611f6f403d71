//! Types for the translator registry.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use super::core::Registry;
use crate::language::{basic_language_resolver, LanguageResolver};
use crate::sanitize::Sanitizer;
use crate::xml::XmlElement;

/// Handle to a translator stored in a registry's arena.
///
/// Ids are only meaningful for the registry that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TranslatorId(pub(crate) usize);

/// Edge from a translator to the translator handling one of its fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildEdge {
    /// Translator reached through this field.
    pub target: TranslatorId,

    /// The field is exported as an array of elements.
    pub multiple: bool,

    /// Discriminator used when several identities map onto the field.
    pub selector: Option<String>,

    /// Identity key (`{ns}name`) that created the edge, if any.
    pub qualified_key: Option<String>,
}

/// Additional dotted-path location through which a translator is reachable.
///
/// # Examples
/// ```
/// use jxt::registry::Alias;
///
/// let alias = Alias::new("message.delay").with_selector("legacy");
/// assert_eq!(alias.path, "message.delay");
/// assert!(!alias.multiple);
///
/// let alias: Alias = "iq.ping".into();
/// assert_eq!(alias.path, "iq.ping");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Alias {
    /// Dotted path, e.g. `message.body`.
    pub path: String,

    /// Export the field as an array.
    pub multiple: bool,

    /// Discriminator for identities sharing the same field.
    pub selector: Option<String>,

    /// Data field that carries the type at this path.
    pub context_field: Option<String>,

    /// The type is implied by the path and is not written to data.
    pub implied_type: bool,
}

impl Alias {
    /// Create an alias for a path.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Mark the aliased field as array-valued.
    #[must_use]
    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }

    /// Set the selector.
    #[must_use]
    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    /// Set the data field holding the type at this path.
    #[must_use]
    pub fn with_context_field(mut self, field: impl Into<String>) -> Self {
        self.context_field = Some(field.into());
        self
    }

    /// Mark the type as implied by the path.
    #[must_use]
    pub fn implied(mut self) -> Self {
        self.implied_type = true;
        self
    }
}

impl From<&str> for Alias {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl From<String> for Alias {
    fn from(path: String) -> Self {
        Self::new(path)
    }
}

/// Type dispatch rule for a translator nested at a specific path.
///
/// The same element can mean different things depending on where it is
/// nested; a rule maps identities to type values for one path (and
/// optionally one selector).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeContext {
    /// Dotted path the rule applies to.
    pub path: String,

    /// Selector the rule was registered with.
    pub selector: Option<String>,

    /// Data field carrying the type, if not implied.
    pub type_field: Option<String>,

    /// Type implied by the path alone.
    pub implied_type: Option<String>,

    /// Type value per identity key.
    pub type_values: BTreeMap<String, String>,
}

impl TypeContext {
    /// Whether this rule can pick a type for the given export data.
    pub(crate) fn matches_data(&self, data: &Map<String, Value>) -> bool {
        if self.implied_type.is_some() {
            return true;
        }
        self.type_field
            .as_ref()
            .and_then(|field| data.get(field))
            .and_then(Value::as_str)
            .is_some_and(|value| self.type_values.values().any(|t| t == value))
    }
}

/// Key under which a [`TypeContext`] is stored: `path` or `path[selector]`.
#[must_use]
pub fn context_key(path: &str, selector: Option<&str>) -> String {
    match selector {
        Some(selector) => format!("{path}[{selector}]"),
        None => path.to_string(),
    }
}

/// Join a dotted path prefix and a field name.
#[must_use]
pub fn join_path(prefix: &str, field: &str) -> String {
    if prefix.is_empty() {
        field.to_string()
    } else {
        format!("{prefix}.{field}")
    }
}

/// Context passed through import and export operations.
///
/// Callers typically pass `TranslationContext::default()` or set languages
/// and sanitizer overrides; the registry fills in the rest on entry.
#[derive(Clone, Default)]
pub struct TranslationContext<'r> {
    /// Registry performing the translation. Set on entry.
    pub registry: Option<&'r Registry>,

    /// Accepted languages, lower-cased on entry.
    pub accept_languages: Vec<String>,

    /// Inherited language, lower-cased on entry.
    pub lang: Option<String>,

    /// Language negotiation function. Defaults to the registry's resolver.
    pub resolve_language: Option<LanguageResolver>,

    /// Named sanitizers. Always contains the XHTML-IM sanitizer after entry.
    pub sanitizers: HashMap<String, Sanitizer>,

    /// Dotted path of the value being translated.
    pub path: String,

    /// Selector of the edge the current translator was reached through.
    pub selector: Option<String>,
}

impl<'r> TranslationContext<'r> {
    /// Create an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the accepted languages, most preferred first.
    #[must_use]
    pub fn with_accept_languages<I, S>(mut self, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.accept_languages = languages.into_iter().map(Into::into).collect();
        self
    }

    /// Set the inherited language.
    #[must_use]
    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = Some(lang.into());
        self
    }

    /// Override language negotiation for this call.
    #[must_use]
    pub fn with_language_resolver(
        mut self,
        resolver: impl Fn(&[String], Option<&str>, &[String]) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.resolve_language = Some(Arc::new(resolver));
        self
    }

    /// Add or replace a named sanitizer.
    #[must_use]
    pub fn with_sanitizer(
        mut self,
        name: impl Into<String>,
        sanitizer: impl Fn(&XmlElement) -> Option<XmlElement> + Send + Sync + 'static,
    ) -> Self {
        self.sanitizers.insert(name.into(), Arc::new(sanitizer));
        self
    }

    /// Pick the best language out of `available` for this context.
    #[must_use]
    pub fn resolve_language(&self, available: &[String]) -> Option<String> {
        match &self.resolve_language {
            Some(resolver) => resolver(self.accept_languages.as_slice(), self.lang.as_deref(), available),
            None => basic_language_resolver(
                self.accept_languages.as_slice(),
                self.lang.as_deref(),
                available,
            ),
        }
    }

    /// Run the named sanitizer. Returns `None` if it is missing or rejects
    /// the element.
    #[must_use]
    pub fn sanitize(&self, name: &str, element: &XmlElement) -> Option<XmlElement> {
        let sanitizer = self.sanitizers.get(name)?;
        sanitizer(element)
    }

    /// Copy of this context positioned at another path.
    #[must_use]
    pub fn at_path(&self, path: impl Into<String>, selector: Option<String>) -> Self {
        let mut context = self.clone();
        context.path = path.into();
        context.selector = selector;
        context
    }
}

impl fmt::Debug for TranslationContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sanitizers: Vec<&str> = self.sanitizers.keys().map(String::as_str).collect();
        sanitizers.sort_unstable();
        f.debug_struct("TranslationContext")
            .field("accept_languages", &self.accept_languages)
            .field("lang", &self.lang)
            .field("path", &self.path)
            .field("selector", &self.selector)
            .field("sanitizers", &sanitizers)
            .field("has_registry", &self.registry.is_some())
            .field("has_resolver", &self.resolve_language.is_some())
            .finish()
    }
}

/// Result of importing an element.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Imported {
    /// Dotted path the element was imported at (empty if it has no alias).
    pub path: String,

    /// Imported data.
    pub data: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_context_key() {
        assert_eq!(context_key("iq.pubsub", None), "iq.pubsub");
        assert_eq!(context_key("iq.pubsub", Some("owner")), "iq.pubsub[owner]");
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("", "message"), "message");
        assert_eq!(join_path("message", "body"), "message.body");
    }

    #[test]
    fn test_alias_builder() {
        let alias = Alias::new("iq.pubsub")
            .multiple()
            .with_selector("owner")
            .with_context_field("context")
            .implied();

        assert_eq!(alias.path, "iq.pubsub");
        assert!(alias.multiple);
        assert_eq!(alias.selector.as_deref(), Some("owner"));
        assert_eq!(alias.context_field.as_deref(), Some("context"));
        assert!(alias.implied_type);
    }

    #[test]
    fn test_type_context_matches_data() {
        let mut rule = TypeContext {
            path: "iq.pubsub".to_string(),
            type_field: Some("context".to_string()),
            ..TypeContext::default()
        };
        rule.type_values
            .insert("{urn:owner}pubsub".to_string(), "owner".to_string());

        let owner = json!({"context": "owner"});
        let user = json!({"context": "user"});
        assert!(rule.matches_data(owner.as_object().unwrap()));
        assert!(!rule.matches_data(user.as_object().unwrap()));
    }

    #[test]
    fn test_context_resolve_language_without_resolver() {
        let context = TranslationContext::new().with_accept_languages(["de"]);
        let available = vec!["en".to_string(), "de".to_string()];
        assert_eq!(context.resolve_language(&available), Some("de".to_string()));
    }

    #[test]
    fn test_context_sanitize_missing() {
        let context = TranslationContext::new();
        assert!(context.sanitize("nope", &XmlElement::new("", "p")).is_none());
    }

    #[test]
    fn test_context_at_path() {
        let context = TranslationContext::new().with_lang("en");
        let child = context.at_path("message.body", Some("x".to_string()));
        assert_eq!(child.path, "message.body");
        assert_eq!(child.selector.as_deref(), Some("x"));
        assert_eq!(child.lang.as_deref(), Some("en"));
    }
}
