//! Declarative definitions consumed by [`Registry::define`].

use std::collections::BTreeMap;
use std::fmt;

use indexmap::IndexMap;

use super::core::Registry;
use super::field::{FieldDefinition, FieldExporter, FieldImporter};
use super::types::{Alias, TypeContext};
use crate::config::path_depth;

/// Declarative description of one element's converter.
///
/// # Examples
/// ```
/// use jxt::fields::{attribute, child_text};
/// use jxt::registry::{Alias, Definition};
///
/// let definition = Definition::new("urn:xmpp:delay", "delay")
///     .with_alias(Alias::new("message.delay"))
///     .with_alias("presence.delay")
///     .with_field("stamp", attribute("stamp"))
///     .with_field("reason", child_text("urn:xmpp:delay", "reason"));
///
/// assert_eq!(definition.fields.len(), 2);
/// ```
#[derive(Clone, Default)]
pub struct Definition {
    pub namespace: String,
    pub element: String,

    /// Primary dotted path; merged into `aliases`.
    pub path: Option<String>,
    pub aliases: Vec<Alias>,

    /// Field converters in declaration order.
    pub fields: IndexMap<String, FieldDefinition>,

    /// Export ordering for fields handled by child translators.
    pub children_export_order: IndexMap<String, i32>,

    /// Prefix to namespace URI map available to field converters.
    pub optional_namespaces: IndexMap<String, String>,

    pub type_field: Option<String>,
    pub default_type: Option<String>,
    pub version_field: Option<String>,
    pub default_version: Option<String>,
    pub language_field: Option<String>,

    /// Logical type this element represents.
    pub type_name: Option<String>,
    pub version: Option<String>,

    /// Precedence among types when singular children collide (lower wins).
    pub type_order: Option<i32>,
}

impl Definition {
    /// Create a definition for an element.
    #[must_use]
    pub fn new(namespace: impl Into<String>, element: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            element: element.into(),
            ..Self::default()
        }
    }

    /// Set the primary path.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Add an alias.
    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<Alias>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Add a field converter.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, field: FieldDefinition) -> Self {
        self.fields.insert(name.into(), field);
        self
    }

    /// Set the export ordering for a child-translated field.
    #[must_use]
    pub fn with_child_export_order(mut self, name: impl Into<String>, order: i32) -> Self {
        self.children_export_order.insert(name.into(), order);
        self
    }

    /// Declare a prefixed namespace.
    #[must_use]
    pub fn with_optional_namespace(
        mut self,
        prefix: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        self.optional_namespaces
            .insert(prefix.into(), namespace.into());
        self
    }

    /// Set the logical type.
    #[must_use]
    pub fn with_type(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    /// Set the type order.
    #[must_use]
    pub fn with_type_order(mut self, order: i32) -> Self {
        self.type_order = Some(order);
        self
    }

    /// Set the version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Set the data field carrying the type, and its fallback value.
    #[must_use]
    pub fn with_type_field(
        mut self,
        field: impl Into<String>,
        default_type: Option<&str>,
    ) -> Self {
        self.type_field = Some(field.into());
        self.default_type = default_type.map(String::from);
        self
    }

    /// Set the data field carrying the version, and its fallback value.
    #[must_use]
    pub fn with_version_field(
        mut self,
        field: impl Into<String>,
        default_version: Option<&str>,
    ) -> Self {
        self.version_field = Some(field.into());
        self.default_version = default_version.map(String::from);
        self
    }

    /// Set the data field carrying the language.
    #[must_use]
    pub fn with_language_field(mut self, field: impl Into<String>) -> Self {
        self.language_field = Some(field.into());
        self
    }

    /// Aliases with `path` merged in, deepest first.
    ///
    /// The sort is stable, so aliases of equal depth keep declaration order.
    #[must_use]
    pub fn normalized_aliases(&self) -> Vec<Alias> {
        let mut aliases = self.aliases.clone();
        if let Some(path) = &self.path {
            if !aliases.iter().any(|alias| &alias.path == path) {
                aliases.push(Alias::new(path.clone()));
            }
        }
        aliases.sort_by_key(|alias| std::cmp::Reverse(path_depth(&alias.path)));
        aliases
    }

    /// Assemble the record merged into a translator.
    #[must_use]
    pub fn to_record(&self) -> DefinitionRecord {
        let mut record = DefinitionRecord {
            namespace: self.namespace.clone(),
            element: self.element.clone(),
            type_name: self.type_name.clone(),
            version: self.version.clone(),
            type_order: self.type_order,
            optional_namespaces: self.optional_namespaces.clone(),
            ..DefinitionRecord::default()
        };

        for (name, field) in &self.fields {
            if let Some(importer) = field.converter.importer() {
                record.importers.insert(name.clone(), importer.clone());
            }
            if let Some(exporter) = field.converter.exporter() {
                record.exporters.insert(name.clone(), exporter.clone());
            }
            record
                .importer_ordering
                .insert(name.clone(), field.import_ordering());
            record
                .exporter_ordering
                .insert(name.clone(), field.export_ordering());
        }

        for (name, order) in &self.children_export_order {
            record.exporter_ordering.insert(name.clone(), *order);
        }

        record
    }
}

impl fmt::Debug for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Definition")
            .field("namespace", &self.namespace)
            .field("element", &self.element)
            .field("path", &self.path)
            .field("aliases", &self.aliases)
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .field("type_name", &self.type_name)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

/// Assembled definition merged into a translator by `update_definition`.
#[derive(Clone, Default)]
pub struct DefinitionRecord {
    pub namespace: String,
    pub element: String,
    pub type_name: Option<String>,
    pub version: Option<String>,
    pub type_order: Option<i32>,
    pub importers: IndexMap<String, FieldImporter>,
    pub exporters: IndexMap<String, FieldExporter>,
    pub importer_ordering: IndexMap<String, i32>,
    pub exporter_ordering: IndexMap<String, i32>,
    pub optional_namespaces: IndexMap<String, String>,
    pub contexts: BTreeMap<String, TypeContext>,
}

/// One entry of a grouped registration.
pub enum DefinitionItem {
    /// A definition to register.
    Definition(Box<Definition>),
    /// A setup function run against the registry.
    Setup(Box<dyn FnOnce(&mut Registry)>),
}

impl DefinitionItem {
    /// Wrap a setup function.
    pub fn setup(setup: impl FnOnce(&mut Registry) + 'static) -> Self {
        Self::Setup(Box::new(setup))
    }
}

impl From<Definition> for DefinitionItem {
    fn from(definition: Definition) -> Self {
        Self::Definition(Box::new(definition))
    }
}

impl fmt::Debug for DefinitionItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Definition(definition) => f.debug_tuple("Definition").field(definition).finish(),
            Self::Setup(_) => f.write_str("Setup"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::FieldDefinition;
    use pretty_assertions::assert_eq;

    fn paths(aliases: &[Alias]) -> Vec<&str> {
        aliases.iter().map(|alias| alias.path.as_str()).collect()
    }

    #[test]
    fn test_normalized_aliases_sorted_deepest_first() {
        let definition = Definition::new("urn:x", "x")
            .with_path("a")
            .with_alias("b.c")
            .with_alias("d.e.f")
            .with_alias("g.h");

        assert_eq!(
            paths(&definition.normalized_aliases()),
            vec!["d.e.f", "b.c", "g.h", "a"]
        );
    }

    #[test]
    fn test_normalized_aliases_does_not_duplicate_path() {
        let definition = Definition::new("urn:x", "x")
            .with_path("a.b")
            .with_alias(Alias::new("a.b").multiple());

        let aliases = definition.normalized_aliases();
        assert_eq!(aliases.len(), 1);
        assert!(aliases[0].multiple);
    }

    #[test]
    fn test_to_record_splits_directions_and_orders() {
        let definition = Definition::new("urn:x", "x")
            .with_field("a", FieldDefinition::import_only(|_, _| Ok(None)).with_order(2))
            .with_field(
                "b",
                FieldDefinition::export_only(|_, _, _| Ok(())).with_export_order(-1),
            )
            .with_child_export_order("items", 7);

        let record = definition.to_record();
        assert_eq!(record.importers.keys().collect::<Vec<_>>(), vec!["a"]);
        assert_eq!(record.exporters.keys().collect::<Vec<_>>(), vec!["b"]);
        assert_eq!(record.importer_ordering.get("a"), Some(&2));
        assert_eq!(record.exporter_ordering.get("b"), Some(&-1));
        assert_eq!(record.exporter_ordering.get("items"), Some(&7));
        assert!(record.contexts.is_empty());
    }
}
