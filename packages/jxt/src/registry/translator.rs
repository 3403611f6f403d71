//! Translator nodes: per-element converters linked into the path tree.

use std::collections::{BTreeMap, HashMap};

use indexmap::IndexMap;
use serde_json::{Map, Value};

use super::core::Registry;
use super::definition::DefinitionRecord;
use super::field::{FieldExporter, FieldImporter};
use super::types::{context_key, join_path, ChildEdge, TranslationContext, TranslatorId, TypeContext};
use crate::config::{exporter_key, DEFAULT_LANGUAGE_FIELD, XML_LANG};
use crate::error::Result;
use crate::xml::{QualifiedName, XmlElement};

/// Field importers registered for one element identity.
#[derive(Clone)]
pub struct ElementImporter {
    pub namespace: String,
    pub element: String,
    pub version: Option<String>,
    pub fields: IndexMap<String, FieldImporter>,
    pub field_orders: IndexMap<String, i32>,
}

impl ElementImporter {
    fn new(namespace: &str, element: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            element: element.to_string(),
            version: None,
            fields: IndexMap::new(),
            field_orders: IndexMap::new(),
        }
    }

    /// Field names, stable-sorted by import ordering.
    fn ordered_fields(&self) -> Vec<&String> {
        let mut names: Vec<&String> = self.fields.keys().collect();
        names.sort_by_key(|name| self.field_orders.get(*name).copied().unwrap_or(0));
        names
    }
}

/// Field exporters registered for one type (and version).
#[derive(Clone)]
pub struct ElementExporter {
    pub namespace: String,
    pub element: String,
    pub optional_namespaces: IndexMap<String, String>,
    pub fields: IndexMap<String, FieldExporter>,
    pub field_orders: IndexMap<String, i32>,
}

impl ElementExporter {
    fn new(namespace: &str, element: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            element: element.to_string(),
            optional_namespaces: IndexMap::new(),
            fields: IndexMap::new(),
            field_orders: IndexMap::new(),
        }
    }

    /// Data keys, stable-sorted by export ordering.
    fn ordered_keys<'a>(&self, data: &'a Map<String, Value>) -> Vec<&'a String> {
        let mut keys: Vec<&String> = data.keys().collect();
        keys.sort_by_key(|key| self.field_orders.get(*key).copied().unwrap_or(0));
        keys
    }
}

/// A node of the registry.
///
/// A translator is either a placeholder, holding nothing but tree edges, or
/// carries the merged definitions of every identity indexed to it.
#[derive(Clone)]
pub struct Translator {
    pub(crate) placeholder: bool,
    pub(crate) type_field: Option<String>,
    pub(crate) default_type: String,
    pub(crate) version_field: Option<String>,
    pub(crate) default_version: Option<String>,
    pub(crate) language_field: String,
    pub(crate) importers: IndexMap<String, ElementImporter>,
    pub(crate) exporters: IndexMap<String, ElementExporter>,
    pub(crate) type_values: HashMap<String, String>,
    pub(crate) type_orders: HashMap<String, i32>,
    pub(crate) children: IndexMap<String, ChildEdge>,
    pub(crate) children_index: HashMap<String, String>,
    pub(crate) child_selectors: HashMap<String, String>,
    pub(crate) contexts: BTreeMap<String, TypeContext>,
}

impl Translator {
    /// Create an empty, non-placeholder translator.
    #[must_use]
    pub fn new() -> Self {
        Self {
            placeholder: false,
            type_field: None,
            default_type: String::new(),
            version_field: None,
            default_version: None,
            language_field: DEFAULT_LANGUAGE_FIELD.to_string(),
            importers: IndexMap::new(),
            exporters: IndexMap::new(),
            type_values: HashMap::new(),
            type_orders: HashMap::new(),
            children: IndexMap::new(),
            children_index: HashMap::new(),
            child_selectors: HashMap::new(),
            contexts: BTreeMap::new(),
        }
    }

    /// Create a placeholder that only keeps the path tree connected.
    #[must_use]
    pub fn placeholder() -> Self {
        Self {
            placeholder: true,
            ..Self::new()
        }
    }

    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }

    #[must_use]
    pub fn type_field(&self) -> Option<&str> {
        self.type_field.as_deref()
    }

    #[must_use]
    pub fn default_type(&self) -> &str {
        &self.default_type
    }

    #[must_use]
    pub fn language_field(&self) -> &str {
        &self.language_field
    }

    /// Get the edge for a field.
    #[must_use]
    pub fn get_child(&self, field: &str) -> Option<&ChildEdge> {
        self.children.get(field)
    }

    /// Field names of all child edges, in insertion order.
    pub fn child_fields(&self) -> impl Iterator<Item = &str> {
        self.children.keys().map(String::as_str)
    }

    /// Field an element would be imported into under this translator.
    #[must_use]
    pub fn get_import_key(&self, xml: &impl QualifiedName) -> Option<&str> {
        self.children_index
            .get(&xml.qualified_key())
            .map(String::as_str)
    }

    /// Identity keys this translator can import.
    pub fn import_keys(&self) -> impl Iterator<Item = &str> {
        self.importers.keys().map(String::as_str)
    }

    /// Type dispatch rules, keyed by `path` or `path[selector]`.
    #[must_use]
    pub fn contexts(&self) -> &BTreeMap<String, TypeContext> {
        &self.contexts
    }

    /// Link a field to a translator.
    ///
    /// An existing edge keeps its target (reconciled later through
    /// replacement) but takes the new multiplicity and selector.
    pub fn add_child(
        &mut self,
        field: &str,
        target: TranslatorId,
        multiple: bool,
        selector: Option<String>,
        qualified_key: Option<String>,
    ) {
        match self.children.get_mut(field) {
            Some(edge) => {
                edge.multiple = multiple;
                if selector.is_some() {
                    edge.selector = selector.clone();
                }
                if edge.qualified_key.is_none() {
                    edge.qualified_key = qualified_key.clone();
                }
            }
            None => {
                self.children.insert(
                    field.to_string(),
                    ChildEdge {
                        target,
                        multiple,
                        selector: selector.clone(),
                        qualified_key: qualified_key.clone(),
                    },
                );
            }
        }

        if let Some(key) = qualified_key {
            self.children_index.insert(key.clone(), field.to_string());
            match selector {
                Some(selector) => {
                    self.child_selectors.insert(key, selector);
                }
                None => {
                    self.child_selectors.remove(&key);
                }
            }
        }
    }

    /// Register a type dispatch rule for an identity nested at `path`.
    pub fn add_context(
        &mut self,
        path: &str,
        selector: Option<&str>,
        type_field: Option<&str>,
        qualified_key: &str,
        type_name: &str,
        implied: bool,
    ) {
        let rule = self
            .contexts
            .entry(context_key(path, selector))
            .or_insert_with(|| TypeContext {
                path: path.to_string(),
                selector: selector.map(String::from),
                ..TypeContext::default()
            });
        if implied {
            rule.implied_type = Some(type_name.to_string());
        }
        rule.type_field = type_field.map(String::from);
        rule.type_values
            .insert(qualified_key.to_string(), type_name.to_string());
    }

    /// Merge a definition record into this translator.
    pub fn update_definition(&mut self, record: DefinitionRecord) {
        let key = crate::xml::qualified_key(&record.namespace, &record.element);
        let type_name = record
            .type_name
            .clone()
            .unwrap_or_else(|| self.default_type.clone());
        let version = record.version.clone().or_else(|| self.default_version.clone());
        let export_key = exporter_key(&type_name, version.as_deref());

        let importer = self
            .importers
            .entry(key.clone())
            .or_insert_with(|| ElementImporter::new(&record.namespace, &record.element));
        if record.version.is_some() {
            importer.version = record.version.clone();
        }
        importer.fields.extend(record.importers.clone());
        importer
            .field_orders
            .extend(record.importer_ordering.clone());

        let exporter = self
            .exporters
            .entry(export_key)
            .or_insert_with(|| ElementExporter::new(&record.namespace, &record.element));
        exporter.fields.extend(record.exporters.clone());
        exporter
            .field_orders
            .extend(record.exporter_ordering.clone());
        exporter
            .optional_namespaces
            .extend(record.optional_namespaces.clone());

        for (context_key, context) in record.contexts {
            match self.contexts.get_mut(&context_key) {
                Some(existing) => {
                    existing.type_values.extend(context.type_values);
                    if context.type_field.is_some() {
                        existing.type_field = context.type_field;
                    }
                    if context.implied_type.is_some() {
                        existing.implied_type = context.implied_type;
                    }
                }
                None => {
                    self.contexts.insert(context_key, context);
                }
            }
        }

        match record.type_name {
            Some(type_name) => {
                if let Some(order) = record.type_order {
                    self.type_orders.insert(type_name.clone(), order);
                }
                self.type_values.insert(key, type_name);
            }
            None if self.type_field.is_some() => {
                // Untyped definitions on a typed translator extend every variant.
                for importer in self.importers.values_mut() {
                    importer.fields.extend(record.importers.clone());
                    importer
                        .field_orders
                        .extend(record.importer_ordering.clone());
                }
                for exporter in self.exporters.values_mut() {
                    exporter.fields.extend(record.exporters.clone());
                    exporter
                        .field_orders
                        .extend(record.exporter_ordering.clone());
                }
            }
            None => {}
        }
    }

    /// Merge the structure of a replaced translator into this one.
    ///
    /// Entries this translator already has win. Missing edges, import keys,
    /// type rules, converters and type data are copied over.
    pub(crate) fn absorb(&mut self, replaced: &Translator) {
        for (field, edge) in &replaced.children {
            self.children
                .entry(field.clone())
                .or_insert_with(|| edge.clone());
        }
        for (key, field) in &replaced.children_index {
            self.children_index
                .entry(key.clone())
                .or_insert_with(|| field.clone());
        }
        for (key, selector) in &replaced.child_selectors {
            self.child_selectors
                .entry(key.clone())
                .or_insert_with(|| selector.clone());
        }
        for (key, context) in &replaced.contexts {
            self.contexts
                .entry(key.clone())
                .or_insert_with(|| context.clone());
        }
        for (key, importer) in &replaced.importers {
            self.importers
                .entry(key.clone())
                .or_insert_with(|| importer.clone());
        }
        for (key, exporter) in &replaced.exporters {
            self.exporters
                .entry(key.clone())
                .or_insert_with(|| exporter.clone());
        }
        for (key, value) in &replaced.type_values {
            self.type_values
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
        for (key, order) in &replaced.type_orders {
            self.type_orders.entry(key.clone()).or_insert(*order);
        }
    }

    fn import_context(&self, path: &str, selector: Option<&str>, key: &str) -> Option<&TypeContext> {
        self.contexts
            .get(&context_key(path, selector))
            .filter(|rule| rule.type_values.contains_key(key))
            .or_else(|| {
                self.contexts
                    .values()
                    .find(|rule| rule.path == path && rule.type_values.contains_key(key))
            })
    }

    fn export_context(
        &self,
        path: &str,
        selector: Option<&str>,
        data: &Map<String, Value>,
    ) -> Option<&TypeContext> {
        let at_path = || self.contexts.values().filter(move |rule| rule.path == path);
        at_path()
            .find(|rule| rule.implied_type.is_none() && rule.matches_data(data))
            .or_else(|| self.contexts.get(&context_key(path, selector)))
            .or_else(|| at_path().next())
    }

    fn type_order_of(&self, value: &Value) -> i32 {
        let type_name = self
            .type_field
            .as_ref()
            .and_then(|field| value.get(field))
            .and_then(Value::as_str)
            .unwrap_or(&self.default_type);
        self.type_orders.get(type_name).copied().unwrap_or(0)
    }

    /// Convert an element into data.
    ///
    /// Returns `Ok(None)` if no importer is registered for the element.
    pub fn import(
        &self,
        registry: &Registry,
        xml: &XmlElement,
        parent: &TranslationContext<'_>,
    ) -> Result<Option<Map<String, Value>>> {
        let key = xml.qualified_key();
        let Some(importer) = self.importers.get(&key) else {
            tracing::trace!(key = %key, path = %parent.path, "No importer for element");
            return Ok(None);
        };

        let mut output = Map::new();

        let rule = self.import_context(&parent.path, parent.selector.as_deref(), &key);
        let type_name = rule
            .and_then(|rule| rule.type_values.get(&key))
            .or_else(|| self.type_values.get(&key))
            .cloned()
            .unwrap_or_else(|| self.default_type.clone());
        let implied = rule.is_some_and(|rule| rule.implied_type.is_some());
        let type_field = rule
            .and_then(|rule| rule.type_field.clone())
            .or_else(|| self.type_field.clone());
        if let Some(field) = type_field {
            if !implied && !type_name.is_empty() {
                output.insert(field, Value::String(type_name));
            }
        }

        if let (Some(field), Some(version)) = (&self.version_field, &importer.version) {
            output.insert(field.clone(), Value::String(version.clone()));
        }

        let explicit_lang = xml.lang().map(str::to_lowercase);
        if let Some(lang) = &explicit_lang {
            if parent.lang.as_deref() != Some(lang.as_str()) {
                output.insert(self.language_field.clone(), Value::String(lang.clone()));
            }
        }

        let mut context = parent.clone();
        context.lang = explicit_lang.or_else(|| parent.lang.clone());

        for name in importer.ordered_fields() {
            let Some(field_importer) = importer.fields.get(name) else {
                continue;
            };
            context.path = join_path(&parent.path, name);
            context.selector = None;
            if let Some(value) = field_importer(xml, &mut context)? {
                if !value.is_null() {
                    output.insert(name.clone(), value);
                }
            }
        }

        for child in xml.child_elements() {
            let child_key = child.qualified_key();
            let Some(field) = self.children_index.get(&child_key) else {
                continue;
            };
            let Some(edge) = self.children.get(field) else {
                continue;
            };
            let Some(target) = registry.translator(edge.target) else {
                continue;
            };

            let child_context = context.at_path(
                join_path(&parent.path, field),
                self.child_selectors.get(&child_key).cloned(),
            );
            let Some(child_output) = target.import(registry, child, &child_context)? else {
                continue;
            };
            let child_value = Value::Object(child_output);

            if edge.multiple {
                match output.get_mut(field) {
                    Some(Value::Array(items)) => items.push(child_value),
                    _ => {
                        output.insert(field.clone(), Value::Array(vec![child_value]));
                    }
                }
            } else {
                match output.get(field) {
                    Some(existing)
                        if target.type_order_of(existing) <= target.type_order_of(&child_value) => {}
                    _ => {
                        output.insert(field.clone(), child_value);
                    }
                }
            }
        }

        Ok(Some(output))
    }

    /// Convert data into an element.
    ///
    /// Returns `Ok(None)` if the data is not an object or no exporter matches
    /// its type.
    pub fn export(
        &self,
        registry: &Registry,
        data: &Value,
        parent: &TranslationContext<'_>,
    ) -> Result<Option<XmlElement>> {
        let Some(object) = data.as_object() else {
            return Ok(None);
        };

        let rule = self.export_context(&parent.path, parent.selector.as_deref(), object);
        let type_name = rule
            .and_then(|rule| rule.implied_type.clone())
            .or_else(|| {
                let field = rule
                    .and_then(|rule| rule.type_field.as_ref())
                    .or(self.type_field.as_ref())?;
                object.get(field)?.as_str().map(String::from)
            })
            .unwrap_or_else(|| self.default_type.clone());
        let version = self
            .version_field
            .as_ref()
            .and_then(|field| object.get(field))
            .and_then(Value::as_str)
            .map(String::from)
            .or_else(|| self.default_version.clone());

        let exporter = self
            .exporters
            .get(&exporter_key(&type_name, version.as_deref()))
            .or_else(|| self.exporters.get(&type_name))
            .or_else(|| {
                self.exporters
                    .get(&exporter_key(&self.default_type, version.as_deref()))
            })
            .or_else(|| self.exporters.get(&self.default_type));
        let Some(exporter) = exporter else {
            tracing::trace!(type_name = %type_name, path = %parent.path, "No exporter for type");
            return Ok(None);
        };

        let mut output = XmlElement::new(&exporter.namespace, &exporter.element);

        let lang = object
            .get(&self.language_field)
            .and_then(Value::as_str)
            .map(str::to_lowercase)
            .or_else(|| parent.lang.clone());
        if let Some(lang) = &lang {
            if parent.lang.as_deref() != Some(lang.as_str()) {
                output.set_attribute(XML_LANG, lang.clone());
            }
        }

        let mut context = parent.clone();
        context.lang = lang;

        for key in exporter.ordered_keys(object) {
            let Some(value) = object.get(key) else {
                continue;
            };
            if value.is_null() {
                continue;
            }

            if let Some(field_exporter) = exporter.fields.get(key) {
                context.path = join_path(&parent.path, key);
                context.selector = None;
                field_exporter(&mut output, value, &mut context)?;
                continue;
            }

            let Some(edge) = self.children.get(key) else {
                continue;
            };
            let Some(target) = registry.translator(edge.target) else {
                continue;
            };

            let child_context = context.at_path(join_path(&parent.path, key), edge.selector.clone());
            let items: Vec<&Value> = match value {
                Value::Array(items) if edge.multiple => items.iter().collect(),
                other => vec![other],
            };
            for item in items {
                if let Some(child) = target.export(registry, item, &child_context)? {
                    output.append_child(child);
                }
            }
        }

        apply_optional_namespaces(&mut output, &exporter.optional_namespaces);

        Ok(Some(output))
    }
}

impl Default for Translator {
    fn default() -> Self {
        Self::new()
    }
}

/// Rewrite `{uri}local` attribute keys to declared `prefix:local` keys.
fn apply_optional_namespaces(element: &mut XmlElement, namespaces: &IndexMap<String, String>) {
    if namespaces.is_empty() {
        return;
    }
    let clark_keys: Vec<String> = element
        .attributes
        .keys()
        .filter(|key| key.starts_with('{'))
        .cloned()
        .collect();
    for key in clark_keys {
        let Some((uri, local)) = key[1..].split_once('}') else {
            continue;
        };
        let Some((prefix, _)) = namespaces.iter().find(|(_, namespace)| *namespace == uri) else {
            continue;
        };
        let prefixed = format!("{prefix}:{local}");
        let declaration = format!("xmlns:{prefix}");
        let uri = uri.to_string();
        if let Some(value) = element.remove_attribute(&key) {
            element.set_attribute(prefixed, value);
            element.set_attribute(declaration, uri);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_placeholder_flag() {
        assert!(Translator::placeholder().is_placeholder());
        assert!(!Translator::new().is_placeholder());
    }

    #[test]
    fn test_add_child_keeps_existing_target() {
        let mut translator = Translator::new();
        translator.add_child("body", TranslatorId(1), false, None, Some("{a}body".into()));
        translator.add_child("body", TranslatorId(2), true, Some("x".into()), Some("{b}body".into()));

        let edge = translator.get_child("body").unwrap();
        assert_eq!(edge.target, TranslatorId(1));
        assert!(edge.multiple);
        assert_eq!(edge.selector.as_deref(), Some("x"));
        assert_eq!(translator.children_index.get("{a}body").map(String::as_str), Some("body"));
        assert_eq!(translator.children_index.get("{b}body").map(String::as_str), Some("body"));
        assert_eq!(translator.child_selectors.get("{b}body").map(String::as_str), Some("x"));
    }

    #[test]
    fn test_add_context_merges_identities() {
        let mut translator = Translator::new();
        translator.add_context("iq.pubsub", None, Some("context"), "{a}pubsub", "user", false);
        translator.add_context("iq.pubsub", None, Some("context"), "{b}pubsub", "owner", false);

        let rule = translator.contexts().get("iq.pubsub").unwrap();
        assert_eq!(rule.type_values.len(), 2);
        assert_eq!(rule.type_field.as_deref(), Some("context"));
        assert!(rule.implied_type.is_none());
    }

    #[test]
    fn test_update_definition_indexes_type() {
        let mut translator = Translator::new();
        translator.update_definition(DefinitionRecord {
            namespace: "urn:x".into(),
            element: "x".into(),
            type_name: Some("thing".into()),
            type_order: Some(2),
            version: Some("2".into()),
            ..DefinitionRecord::default()
        });

        assert_eq!(translator.type_values.get("{urn:x}x").map(String::as_str), Some("thing"));
        assert_eq!(translator.type_orders.get("thing"), Some(&2));
        assert!(translator.exporters.contains_key("thing__v2"));
        assert_eq!(
            translator.importers.get("{urn:x}x").and_then(|i| i.version.as_deref()),
            Some("2")
        );
    }

    #[test]
    fn test_absorb_keeps_existing_and_adds_missing() {
        let mut survivor = Translator::new();
        survivor.update_definition(DefinitionRecord {
            namespace: "urn:b".into(),
            element: "b".into(),
            type_name: Some("bee".into()),
            ..DefinitionRecord::default()
        });
        survivor.add_child("body", TranslatorId(1), false, None, None);

        let mut replaced = Translator::new();
        replaced.update_definition(DefinitionRecord {
            namespace: "urn:a".into(),
            element: "a".into(),
            type_name: Some("ant".into()),
            type_order: Some(3),
            ..DefinitionRecord::default()
        });
        replaced.add_child("body", TranslatorId(2), false, None, None);
        replaced.add_child("extra", TranslatorId(3), true, None, Some("{urn:x}extra".into()));

        survivor.absorb(&replaced);

        assert_eq!(survivor.get_child("body").unwrap().target, TranslatorId(1));
        assert_eq!(survivor.get_child("extra").unwrap().target, TranslatorId(3));
        assert!(survivor.importers.contains_key("{urn:a}a"));
        assert!(survivor.importers.contains_key("{urn:b}b"));
        assert!(survivor.exporters.contains_key("ant"));
        assert!(survivor.exporters.contains_key("bee"));
        assert_eq!(survivor.type_values.get("{urn:a}a").map(String::as_str), Some("ant"));
        assert_eq!(survivor.type_orders.get("ant"), Some(&3));
    }

    #[test]
    fn test_apply_optional_namespaces() {
        let mut namespaces = IndexMap::new();
        namespaces.insert("d".to_string(), "urn:delay".to_string());

        let mut element = XmlElement::new("urn:x", "x")
            .with_attribute("{urn:delay}stamp", "2024")
            .with_attribute("{urn:other}a", "1");
        apply_optional_namespaces(&mut element, &namespaces);

        assert_eq!(element.attribute("d:stamp"), Some("2024"));
        assert_eq!(element.attribute("xmlns:d"), Some("urn:delay"));
        assert_eq!(element.attribute("{urn:other}a"), Some("1"));
    }
}
