//! Translator registry.
//!
//! Definitions bind an element identity (`{namespace}element`) to field
//! converters and make the resulting translator reachable through one or
//! more dotted paths (`message.body`). Import dispatches on the identity of
//! an element; export walks the path tree.

mod core;
mod definition;
mod field;
mod translator;
mod types;

pub use self::core::Registry;
pub use definition::{Definition, DefinitionItem, DefinitionRecord};
pub use field::{FieldConverter, FieldDefinition, FieldExporter, FieldImporter};
pub use translator::{ElementExporter, ElementImporter, Translator};
pub use types::{
    context_key, join_path, Alias, ChildEdge, Imported, TranslationContext, TranslatorId,
    TypeContext,
};
