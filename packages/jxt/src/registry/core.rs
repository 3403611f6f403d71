//! Registry mapping element identities and dotted paths to translators.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use serde_json::Value;

use super::definition::{Definition, DefinitionItem};
use super::translator::Translator;
use super::types::{join_path, Alias, Imported, TranslationContext, TranslatorId};
use crate::config::{split_path, XHTML_IM_SANITIZER};
use crate::error::Result;
use crate::language::{basic_language_resolver, LanguageResolver};
use crate::sanitize::xhtml_im_sanitizer;
use crate::xml::{qualified_key, QualifiedName, XmlElement};

/// Registry of translators.
///
/// Translators live in an arena and are referenced only through two indices:
/// the identity index (`{namespace}element` → translator) and the child edges
/// of the path tree rooted at [`Registry::root`]. Replacing a translator is a
/// single pass over those two indices.
///
/// Registration (`define`, `alias`) needs `&mut self`; `import` and `export`
/// only read, so a fully configured registry can be shared across threads.
pub struct Registry {
    nodes: Vec<Translator>,
    translators: HashMap<String, TranslatorId>,
    root: TranslatorId,
    language_resolver: LanguageResolver,
}

impl Registry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: vec![Translator::new()],
            translators: HashMap::new(),
            root: TranslatorId(0),
            language_resolver: Arc::new(basic_language_resolver),
        }
    }

    /// Drop every definition, keeping the configured language resolver.
    pub fn reset(&mut self) {
        self.nodes = vec![Translator::new()];
        self.translators.clear();
        self.root = TranslatorId(0);
    }

    /// Replace the default language resolver used by import and export.
    pub fn set_language_resolver(
        &mut self,
        resolver: impl Fn(&[String], Option<&str>, &[String]) -> Option<String> + Send + Sync + 'static,
    ) {
        self.language_resolver = Arc::new(resolver);
    }

    /// Id of the root of the path tree.
    #[must_use]
    pub fn root(&self) -> TranslatorId {
        self.root
    }

    /// Get a translator by id.
    #[must_use]
    pub fn translator(&self, id: TranslatorId) -> Option<&Translator> {
        self.nodes.get(id.0)
    }

    /// Get the translator indexed under an element identity.
    #[must_use]
    pub fn translator_for(&self, namespace: &str, element: &str) -> Option<TranslatorId> {
        self.translators
            .get(&qualified_key(namespace, element))
            .copied()
    }

    /// Check if a translator is registered for an element identity.
    #[must_use]
    pub fn has_translator(&self, namespace: &str, element: &str) -> bool {
        self.translators
            .contains_key(&qualified_key(namespace, element))
    }

    /// Return the translator for an identity, creating and indexing a fresh
    /// one if there is none.
    pub fn get_or_create_translator(&mut self, namespace: &str, element: &str) -> TranslatorId {
        if let Some(id) = self.translator_for(namespace, element) {
            return id;
        }
        let id = self.allocate(Translator::new());
        self.index_translator(namespace, element, id);
        id
    }

    /// Top-level paths of the tree, in registration order.
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        self.node(self.root)
            .child_fields()
            .map(String::from)
            .collect()
    }

    /// Walk child edges from the root.
    ///
    /// Returns `None` as soon as a segment has no edge.
    #[must_use]
    pub fn walk_to_translator<S: AsRef<str>>(&self, path: &[S]) -> Option<TranslatorId> {
        let mut current = self.root;
        for segment in path {
            current = self.node(current).get_child(segment.as_ref())?.target;
        }
        Some(current)
    }

    /// Walk child edges from the root, creating and attaching placeholders
    /// for missing segments.
    pub fn vivify<S: AsRef<str>>(&mut self, path: &[S]) -> TranslatorId {
        let mut current = self.root;
        for segment in path {
            let segment = segment.as_ref();
            let next = match self.node(current).get_child(segment) {
                Some(edge) => edge.target,
                None => {
                    let created = self.allocate(Translator::placeholder());
                    self.node_mut(current)
                        .add_child(segment, created, false, None, None);
                    tracing::trace!(segment = %segment, translator = created.0, "Vivified placeholder");
                    created
                }
            };
            current = next;
        }
        current
    }

    /// Register a single definition.
    ///
    /// Calling this again for the same identity merges into the existing
    /// translator and re-links its aliases.
    pub fn define(&mut self, definition: Definition) {
        let namespace = definition.namespace.as_str();
        let element = definition.element.as_str();
        let aliases = definition.normalized_aliases();

        let canonical = match self.translator_for(namespace, element) {
            Some(existing) => existing,
            None => match self.resolve_canonical(&aliases) {
                Some(found) => found,
                None => self.get_or_create_translator(namespace, element),
            },
        };
        self.index_translator(namespace, element, canonical);

        let translator = self.node_mut(canonical);
        if let Some(field) = &definition.type_field {
            translator.type_field = Some(field.clone());
        }
        if let Some(default_type) = &definition.default_type {
            translator.default_type = default_type.clone();
        }
        if let Some(field) = &definition.version_field {
            translator.version_field = Some(field.clone());
        }
        if let Some(default_version) = &definition.default_version {
            translator.default_version = Some(default_version.clone());
        }
        if let Some(field) = &definition.language_field {
            translator.language_field = field.clone();
        }
        translator.update_definition(definition.to_record());

        for alias in &aliases {
            self.alias(namespace, element, alias, definition.type_name.as_deref());
        }

        for alias in &aliases {
            if let Some(existing) = self.walk_to_translator(&split_path(&alias.path)) {
                if existing != canonical {
                    self.replace_translator(existing, canonical);
                }
            }
        }

        tracing::debug!(
            namespace = %namespace,
            element = %element,
            aliases = aliases.len(),
            "Defined translator"
        );
    }

    /// Register a group of definitions and setup functions, in order.
    pub fn define_all(&mut self, items: impl IntoIterator<Item = DefinitionItem>) {
        for item in items {
            match item {
                DefinitionItem::Definition(definition) => self.define(*definition),
                DefinitionItem::Setup(setup) => setup(self),
            }
        }
    }

    /// Make the translator for an identity reachable at `alias.path`.
    ///
    /// The identity's translator is created if needed and is never a
    /// placeholder afterwards. Missing intermediate segments are vivified as
    /// placeholders. When `context_type` is given together with a context
    /// field or an implied type, a type dispatch rule is registered for the
    /// path.
    pub fn alias(
        &mut self,
        namespace: &str,
        element: &str,
        alias: &Alias,
        context_type: Option<&str>,
    ) {
        let segments = split_path(&alias.path);
        let Some((final_segment, parents)) = segments.split_last() else {
            tracing::warn!(
                namespace = %namespace,
                element = %element,
                "Ignoring alias with empty path"
            );
            return;
        };

        let linked = self.get_or_create_translator(namespace, element);
        self.node_mut(linked).placeholder = false;

        let parent = self.vivify(parents);
        let key = qualified_key(namespace, element);

        if let Some(context_type) = context_type {
            if alias.context_field.is_some() || alias.implied_type {
                let path = segments.join(".");
                self.node_mut(linked).add_context(
                    &path,
                    alias.selector.as_deref(),
                    alias.context_field.as_deref(),
                    &key,
                    context_type,
                    alias.implied_type,
                );
            }
        }

        self.node_mut(parent).add_child(
            final_segment,
            linked,
            alias.multiple,
            alias.selector.clone(),
            Some(key),
        );
    }

    /// Import an element.
    ///
    /// Returns `Ok(None)` if no translator is registered for the element.
    ///
    /// # Errors
    /// Propagates failures from field converters and sanitizers.
    pub fn import<'s>(
        &'s self,
        xml: &XmlElement,
        context: TranslationContext<'s>,
    ) -> Result<Option<Imported>> {
        let Some(id) = self.translator_for(xml.namespace(), xml.name()) else {
            tracing::trace!(key = %xml.qualified_key(), "Import of unregistered element");
            return Ok(None);
        };

        let path = self.get_import_key(xml, None).unwrap_or_default();
        let context = self.prepare_context(context, path.clone());
        Ok(self
            .node(id)
            .import(self, xml, &context)?
            .map(|data| Imported { path, data }))
    }

    /// Export data through the translator at a dotted path.
    ///
    /// Returns `Ok(None)` if no translator is reachable at `path`.
    ///
    /// # Errors
    /// Propagates failures from field converters and sanitizers.
    pub fn export<'s>(
        &'s self,
        path: &str,
        data: &Value,
        context: TranslationContext<'s>,
    ) -> Result<Option<XmlElement>> {
        let Some(id) = self.walk_to_translator(&split_path(path)) else {
            tracing::trace!(path = %path, "Export to unknown path");
            return Ok(None);
        };

        let context = self.prepare_context(context, path.to_string());
        self.node(id).export(self, data, &context)
    }

    /// Dotted path an element would be imported at.
    ///
    /// The search starts at the translator reached by `path` (the root when
    /// `None`) and returns the shallowest match, prefixed with `path`.
    #[must_use]
    pub fn get_import_key(&self, xml: &impl QualifiedName, path: Option<&str>) -> Option<String> {
        let segments = path.map(split_path).unwrap_or_default();
        let start = self.walk_to_translator(&segments)?;

        let mut queue = VecDeque::from([(start, segments.join("."))]);
        let mut visited = HashSet::new();
        while let Some((id, prefix)) = queue.pop_front() {
            if !visited.insert(id) {
                continue;
            }
            let translator = self.node(id);
            if let Some(field) = translator.get_import_key(xml) {
                return Some(join_path(&prefix, field));
            }
            for (field, edge) in &translator.children {
                queue.push_back((edge.target, join_path(&prefix, field)));
            }
        }
        None
    }

    fn prepare_context<'s>(
        &'s self,
        mut context: TranslationContext<'s>,
        path: String,
    ) -> TranslationContext<'s> {
        context.accept_languages = context
            .accept_languages
            .iter()
            .map(|lang| lang.to_lowercase())
            .collect();
        context.lang = context.lang.map(|lang| lang.to_lowercase());
        if context.resolve_language.is_none() {
            context.resolve_language = Some(Arc::clone(&self.language_resolver));
        }
        context
            .sanitizers
            .entry(XHTML_IM_SANITIZER.to_string())
            .or_insert_with(xhtml_im_sanitizer);
        context.path = path;
        context.selector = None;
        context.registry = Some(self);
        context
    }

    /// Pick the translator an aliased definition should attach to.
    ///
    /// The first real translator found at an alias path wins; otherwise the
    /// last placeholder seen is promoted in place.
    fn resolve_canonical(&mut self, aliases: &[Alias]) -> Option<TranslatorId> {
        let mut placeholder = None;
        for alias in aliases {
            match self.walk_to_translator(&split_path(&alias.path)) {
                Some(id) if !self.node(id).placeholder => return Some(id),
                Some(id) => placeholder = Some(id),
                None => {}
            }
        }

        let id = placeholder?;
        self.node_mut(id).placeholder = false;
        tracing::debug!(translator = id.0, "Promoted placeholder translator");
        Some(id)
    }

    /// Redirect every reference to `old` to `new`, merging its structure.
    ///
    /// `new` takes over the edges, import keys, type rules and converters of
    /// `old` that it does not already have; every tree edge and identity index entry
    /// pointing at `old` is then rewritten. `old` stays in the arena
    /// unreachable.
    pub fn replace_translator(&mut self, old: TranslatorId, new: TranslatorId) {
        if old == new {
            return;
        }

        let replaced = self.node(old).clone();
        self.node_mut(new).absorb(&replaced);

        for translator in &mut self.nodes {
            for edge in translator.children.values_mut() {
                if edge.target == old {
                    edge.target = new;
                }
            }
        }
        for id in self.translators.values_mut() {
            if *id == old {
                *id = new;
            }
        }

        tracing::debug!(old = old.0, new = new.0, "Replaced translator");
    }

    fn index_translator(&mut self, namespace: &str, element: &str, id: TranslatorId) {
        self.translators.insert(qualified_key(namespace, element), id);
    }

    fn allocate(&mut self, translator: Translator) -> TranslatorId {
        self.nodes.push(translator);
        TranslatorId(self.nodes.len() - 1)
    }

    // Ids are only minted by `allocate`, so indexing cannot go out of bounds.
    fn node(&self, id: TranslatorId) -> &Translator {
        &self.nodes[id.0]
    }

    fn node_mut(&mut self, id: TranslatorId) -> &mut Translator {
        &mut self.nodes[id.0]
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::FieldDefinition;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn simple(namespace: &str, element: &str, path: &str) -> Definition {
        Definition::new(namespace, element).with_path(path)
    }

    #[test]
    fn test_registry_define_and_has_translator() {
        let mut registry = Registry::new();
        registry.define(simple("urn:x", "msg", "message"));

        assert!(registry.has_translator("urn:x", "msg"));
        assert!(!registry.has_translator("urn:x", "missing"));
        assert_eq!(registry.paths(), vec!["message".to_string()]);
    }

    #[test]
    fn test_walk_to_translator_missing_segment() {
        let mut registry = Registry::new();
        registry.define(simple("urn:x", "msg", "message"));

        assert!(registry.walk_to_translator(&["message"]).is_some());
        assert!(registry.walk_to_translator(&["message", "body"]).is_none());
        assert_eq!(registry.walk_to_translator::<&str>(&[]), Some(registry.root()));
    }

    #[test]
    fn test_alias_vivifies_placeholders() {
        let mut registry = Registry::new();
        registry.alias("urn:x", "y", &Alias::new("x.y"), None);

        let x = registry.walk_to_translator(&["x"]).unwrap();
        let y = registry.walk_to_translator(&["x", "y"]).unwrap();
        assert!(registry.translator(x).unwrap().is_placeholder());
        assert!(!registry.translator(y).unwrap().is_placeholder());
        assert_eq!(registry.translator_for("urn:x", "y"), Some(y));
    }

    #[test]
    fn test_alias_with_empty_path_is_ignored() {
        let mut registry = Registry::new();
        registry.alias("urn:x", "y", &Alias::new(".."), None);

        assert!(!registry.has_translator("urn:x", "y"));
        assert!(registry.paths().is_empty());
    }

    #[test]
    fn test_define_promotes_placeholder_in_place() {
        let mut registry = Registry::new();
        registry.define(simple("urn:x", "leaf", "x.y.z"));
        let placeholder = registry.walk_to_translator(&["x", "y"]).unwrap();
        assert!(registry.translator(placeholder).unwrap().is_placeholder());

        registry.define(simple("urn:x", "mid", "x.y"));

        assert_eq!(registry.walk_to_translator(&["x", "y"]), Some(placeholder));
        assert_eq!(registry.translator_for("urn:x", "mid"), Some(placeholder));
        assert!(!registry.translator(placeholder).unwrap().is_placeholder());
        assert!(registry.walk_to_translator(&["x", "y", "z"]).is_some());
    }

    #[test]
    fn test_define_reuses_existing_translator_at_path() {
        let mut registry = Registry::new();
        registry.define(simple("urn:a", "pubsub", "iq.pubsub"));
        registry.define(simple("urn:b", "pubsub", "iq.pubsub"));

        assert_eq!(
            registry.translator_for("urn:a", "pubsub"),
            registry.translator_for("urn:b", "pubsub")
        );
    }

    #[test]
    fn test_define_replaces_stale_node_at_alias() {
        let mut registry = Registry::new();
        registry.define(simple("urn:x", "list", "items"));
        registry.define(simple("urn:x", "item", "list.item"));
        let stale = registry.walk_to_translator(&["list"]).unwrap();

        registry.define(simple("urn:x", "list", "items").with_alias("list"));

        let list = registry.translator_for("urn:x", "list").unwrap();
        assert_ne!(stale, list);
        assert_eq!(registry.walk_to_translator(&["list"]), Some(list));
        assert_eq!(
            registry.walk_to_translator(&["list", "item"]),
            registry.translator_for("urn:x", "item")
        );
        assert_eq!(
            registry.walk_to_translator(&["items", "item"]),
            registry.translator_for("urn:x", "item")
        );
    }

    #[test]
    fn test_vivify_creates_placeholders_once() {
        let mut registry = Registry::new();
        let leaf = registry.vivify(&["a", "b"]);

        assert!(registry.translator(leaf).unwrap().is_placeholder());
        assert_eq!(registry.walk_to_translator(&["a", "b"]), Some(leaf));
        assert_eq!(registry.vivify(&["a", "b"]), leaf);
    }

    #[test]
    fn test_replace_translator_redirects_edges_and_index() {
        let mut registry = Registry::new();
        registry.define(simple("urn:x", "old", "old"));
        registry.define(simple("urn:x", "child", "old.child"));
        registry.define(simple("urn:x", "new", "new"));
        let old = registry.translator_for("urn:x", "old").unwrap();
        let new = registry.translator_for("urn:x", "new").unwrap();

        registry.replace_translator(old, new);

        assert_eq!(registry.walk_to_translator(&["old"]), Some(new));
        assert_eq!(registry.translator_for("urn:x", "old"), Some(new));
        assert_eq!(
            registry.walk_to_translator(&["new", "child"]),
            registry.translator_for("urn:x", "child")
        );
    }

    #[test]
    fn test_redirected_identity_still_imports() {
        let mut registry = Registry::new();
        registry.define(simple("urn:a", "a", "p").with_field("id", crate::fields::attribute("id")));
        registry.define(simple("urn:b", "b", "q"));
        registry.define(simple("urn:b", "b", "q").with_alias("p"));

        assert!(registry.has_translator("urn:a", "a"));
        assert_eq!(
            registry.translator_for("urn:a", "a"),
            registry.translator_for("urn:b", "b")
        );

        let imported = registry
            .import(
                &XmlElement::new("urn:a", "a").with_attribute("id", "1"),
                TranslationContext::new(),
            )
            .unwrap()
            .unwrap();
        assert_eq!(imported.path, "p");
        assert_eq!(Value::Object(imported.data), json!({"id": "1"}));
    }

    #[test]
    fn test_define_all_runs_setup_functions_in_order() {
        let mut registry = Registry::new();
        registry.define_all([
            DefinitionItem::from(simple("urn:x", "a", "a")),
            DefinitionItem::setup(|registry: &mut Registry| {
                assert!(registry.has_translator("urn:x", "a"));
                registry.define(simple("urn:x", "b", "b"));
            }),
        ]);

        assert!(registry.has_translator("urn:x", "b"));
    }

    #[test]
    fn test_reset_clears_definitions() {
        let mut registry = Registry::new();
        registry.define(simple("urn:x", "a", "a"));
        registry.reset();

        assert!(!registry.has_translator("urn:x", "a"));
        assert!(registry.paths().is_empty());
    }

    #[test]
    fn test_export_unknown_path_is_silent() {
        let registry = Registry::new();
        let result = registry
            .export("nothing.here", &json!({}), TranslationContext::new())
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_import_unknown_element_is_silent() {
        let registry = Registry::new();
        let result = registry
            .import(&XmlElement::new("urn:x", "nope"), TranslationContext::new())
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_import_context_defaults() {
        let mut registry = Registry::new();
        registry.define(simple("urn:x", "msg", "message").with_field(
            "seen",
            FieldDefinition::import_only(|_, context| {
                Ok(Some(json!({
                    "path": context.path,
                    "lang": context.lang,
                    "accept": context.accept_languages,
                    "xhtmlim": context.sanitizers.contains_key("xhtmlim"),
                    "registry": context.registry.is_some(),
                })))
            }),
        ));

        let context = TranslationContext::new()
            .with_lang("EN")
            .with_accept_languages(["DE-at", "En"]);
        let imported = registry
            .import(&XmlElement::new("urn:x", "msg"), context)
            .unwrap()
            .unwrap();

        assert_eq!(imported.path, "message");
        assert_eq!(
            imported.data.get("seen"),
            Some(&json!({
                "path": "message.seen",
                "lang": "en",
                "accept": ["de-at", "en"],
                "xhtmlim": true,
                "registry": true,
            }))
        );
    }
}
