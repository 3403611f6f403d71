//! Field converter definitions.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::types::TranslationContext;
use crate::error::Result;
use crate::xml::XmlElement;

/// Reads one field's value out of an element.
///
/// Returning `Ok(None)` leaves the field out of the imported data.
pub type FieldImporter = Arc<
    dyn Fn(&XmlElement, &mut TranslationContext<'_>) -> Result<Option<Value>> + Send + Sync,
>;

/// Writes one field's value into the element being exported.
pub type FieldExporter =
    Arc<dyn Fn(&mut XmlElement, &Value, &mut TranslationContext<'_>) -> Result<()> + Send + Sync>;

/// Which directions a field supports.
#[derive(Clone)]
pub enum FieldConverter {
    Import(FieldImporter),
    Export(FieldExporter),
    Both {
        importer: FieldImporter,
        exporter: FieldExporter,
    },
}

impl FieldConverter {
    /// The import half, if any.
    #[must_use]
    pub fn importer(&self) -> Option<&FieldImporter> {
        match self {
            Self::Import(importer) | Self::Both { importer, .. } => Some(importer),
            Self::Export(_) => None,
        }
    }

    /// The export half, if any.
    #[must_use]
    pub fn exporter(&self) -> Option<&FieldExporter> {
        match self {
            Self::Export(exporter) | Self::Both { exporter, .. } => Some(exporter),
            Self::Import(_) => None,
        }
    }
}

impl fmt::Debug for FieldConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Self::Import(_) => "Import",
            Self::Export(_) => "Export",
            Self::Both { .. } => "Both",
        };
        f.write_str(kind)
    }
}

/// A field's converters plus its evaluation ordering.
///
/// Import ordering is `import_order`, else `order`, else 0; export ordering
/// is `export_order`, else `order`, else 0. Lower values run first and ties
/// keep declaration order.
#[derive(Debug, Clone)]
pub struct FieldDefinition {
    pub converter: FieldConverter,
    pub order: Option<i32>,
    pub import_order: Option<i32>,
    pub export_order: Option<i32>,
}

impl FieldDefinition {
    /// A field that converts in both directions.
    pub fn new(
        importer: impl Fn(&XmlElement, &mut TranslationContext<'_>) -> Result<Option<Value>>
            + Send
            + Sync
            + 'static,
        exporter: impl Fn(&mut XmlElement, &Value, &mut TranslationContext<'_>) -> Result<()>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self::from_converter(FieldConverter::Both {
            importer: Arc::new(importer),
            exporter: Arc::new(exporter),
        })
    }

    /// A field that is only read on import.
    pub fn import_only(
        importer: impl Fn(&XmlElement, &mut TranslationContext<'_>) -> Result<Option<Value>>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self::from_converter(FieldConverter::Import(Arc::new(importer)))
    }

    /// A field that is only written on export.
    pub fn export_only(
        exporter: impl Fn(&mut XmlElement, &Value, &mut TranslationContext<'_>) -> Result<()>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self::from_converter(FieldConverter::Export(Arc::new(exporter)))
    }

    /// Wrap an existing converter with default ordering.
    #[must_use]
    pub fn from_converter(converter: FieldConverter) -> Self {
        Self {
            converter,
            order: None,
            import_order: None,
            export_order: None,
        }
    }

    /// Set the ordering for both directions.
    #[must_use]
    pub fn with_order(mut self, order: i32) -> Self {
        self.order = Some(order);
        self
    }

    /// Set the import ordering.
    #[must_use]
    pub fn with_import_order(mut self, order: i32) -> Self {
        self.import_order = Some(order);
        self
    }

    /// Set the export ordering.
    #[must_use]
    pub fn with_export_order(mut self, order: i32) -> Self {
        self.export_order = Some(order);
        self
    }

    /// Effective import ordering key.
    #[must_use]
    pub fn import_ordering(&self) -> i32 {
        self.import_order.or(self.order).unwrap_or(0)
    }

    /// Effective export ordering key.
    #[must_use]
    pub fn export_ordering(&self) -> i32 {
        self.export_order.or(self.order).unwrap_or(0)
    }
}
