//! Error types for the JXT registry.
//!
//! Lookups that miss (an unregistered element on import, an unknown path on
//! export) are not errors at the registry level; they yield `Ok(None)`.
//! `JxtError` carries failures raised by collaborators such as field
//! converters and sanitizers, plus the typed misses surfaced by the CLI.

use thiserror::Error;

/// Main error type for the JXT library.
#[derive(Debug, Error)]
pub enum JxtError {
    /// XML parsing failed.
    #[error("XML parsing failed: {0}")]
    XmlParse(#[from] roxmltree::Error),

    /// JSON (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization failed.
    #[error("YAML serialization failed: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A field converter could not convert a value.
    #[error("Cannot convert field '{field}': {message}")]
    FieldConversion { field: String, message: String },

    /// No translator is registered for an element.
    #[error("No translator for element <{name}>{}", if .namespace.is_empty() { String::new() } else { format!(" in namespace {}", .namespace) })]
    UnknownElement { namespace: String, name: String },

    /// No translator is reachable at a dotted path.
    #[error("No translator at path '{0}'")]
    UnknownPath(String),
}

impl JxtError {
    /// Build a field conversion error.
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FieldConversion {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for JXT operations.
pub type Result<T> = std::result::Result<T, JxtError>;
