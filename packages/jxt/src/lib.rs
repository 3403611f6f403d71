//! JXT - declarative registry of bidirectional XML stanza converters.
//!
//! Definitions bind an XML element identity (`{namespace}element`) to a set
//! of field converters and make the resulting translator reachable through
//! dotted paths such as `message.body`. Importing dispatches on an element's
//! identity and yields structured data; exporting walks the path tree and
//! rebuilds the element.
//!
//! # Example
//!
//! ```
//! use jxt::registry::{Registry, TranslationContext};
//! use jxt::stanzas::define_core_stanzas;
//! use jxt::xml::parse;
//! use serde_json::json;
//!
//! let mut registry = Registry::new();
//! define_core_stanzas(&mut registry);
//!
//! let xml = parse(r#"<message xmlns="jabber:client" type="chat"><body>hi</body></message>"#).unwrap();
//! let imported = registry.import(&xml, TranslationContext::new()).unwrap().unwrap();
//! assert_eq!(imported.path, "message");
//! assert_eq!(imported.data.get("body"), Some(&json!("hi")));
//!
//! let exported = registry
//!     .export("message", &json!(imported.data), TranslationContext::new())
//!     .unwrap()
//!     .unwrap();
//! assert_eq!(exported, xml);
//! ```
//!
//! # Architecture
//!
//! - [`registry`]: Translator arena, alias resolution and the import/export facade
//! - [`xml`]: Owned markup node model and parsing
//! - [`fields`]: Stock field converters
//! - [`language`]: Language negotiation
//! - [`sanitize`]: Built-in XHTML-IM sanitizer
//! - [`stanzas`]: Core stanza definitions
//! - [`config`]: Configuration constants and path helpers
//! - [`error`]: Error types and Result alias
//! - [`cli`]: Command-line interface

pub mod cli;
pub mod config;
pub mod error;
pub mod fields;
pub mod language;
pub mod registry;
pub mod sanitize;
pub mod stanzas;
pub mod xml;

pub use error::{JxtError, Result};
pub use registry::{Alias, Definition, DefinitionItem, FieldDefinition, Registry, TranslationContext};
pub use stanzas::define_core_stanzas;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
