//! Stock field converters.
//!
//! Each constructor returns a [`FieldDefinition`] for the common shapes a
//! stanza field takes: an attribute, the element's own text, a child
//! element's text, a presence flag, or language-tagged alternatives.

use serde_json::{Map, Value};

use crate::config::XML_LANG;
use crate::error::{JxtError, Result};
use crate::registry::{FieldDefinition, TranslationContext};
use crate::xml::{parse, XmlElement};

/// Render a scalar JSON value as XML text.
fn scalar_text(field: &str, value: &Value) -> Result<String> {
    match value {
        Value::String(text) => Ok(text.clone()),
        Value::Number(number) => Ok(number.to_string()),
        Value::Bool(flag) => Ok(flag.to_string()),
        other => Err(JxtError::field(
            field,
            format!("expected a scalar value, got {other}"),
        )),
    }
}

fn integer_value(field: &str, value: &Value) -> Result<i64> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .ok_or_else(|| JxtError::field(field, format!("{number} is not an integer"))),
        Value::String(text) => text
            .trim()
            .parse()
            .map_err(|_| JxtError::field(field, format!("'{text}' is not an integer"))),
        other => Err(JxtError::field(
            field,
            format!("expected an integer, got {other}"),
        )),
    }
}

/// String attribute.
///
/// # Examples
/// ```
/// use jxt::fields::attribute;
/// use jxt::registry::{Definition, Registry, TranslationContext};
/// use jxt::xml::parse;
/// use serde_json::json;
///
/// let mut registry = Registry::new();
/// registry.define(
///     Definition::new("jabber:client", "iq")
///         .with_path("iq")
///         .with_field("id", attribute("id")),
/// );
///
/// let xml = parse(r#"<iq xmlns="jabber:client" id="abc"/>"#).unwrap();
/// let imported = registry.import(&xml, TranslationContext::new()).unwrap().unwrap();
/// assert_eq!(imported.data.get("id"), Some(&json!("abc")));
/// ```
#[must_use]
pub fn attribute(name: &str) -> FieldDefinition {
    let import_name = name.to_string();
    let export_name = name.to_string();
    FieldDefinition::new(
        move |xml, _| {
            Ok(xml
                .attribute(&import_name)
                .map(|value| Value::String(value.to_string())))
        },
        move |xml, value, _| {
            let text = scalar_text(&export_name, value)?;
            xml.set_attribute(export_name.clone(), text);
            Ok(())
        },
    )
}

/// Integer attribute. Values that do not parse are left out on import.
#[must_use]
pub fn integer_attribute(name: &str) -> FieldDefinition {
    let import_name = name.to_string();
    let export_name = name.to_string();
    FieldDefinition::new(
        move |xml, _| {
            Ok(xml
                .attribute(&import_name)
                .and_then(|value| value.trim().parse::<i64>().ok())
                .map(Value::from))
        },
        move |xml, value, _| {
            let number = integer_value(&export_name, value)?;
            xml.set_attribute(export_name.clone(), number.to_string());
            Ok(())
        },
    )
}

/// Boolean attribute (`true`/`1` and `false`/`0`).
#[must_use]
pub fn boolean_attribute(name: &str) -> FieldDefinition {
    let import_name = name.to_string();
    let export_name = name.to_string();
    FieldDefinition::new(
        move |xml, _| {
            Ok(match xml.attribute(&import_name) {
                Some("true" | "1") => Some(Value::Bool(true)),
                Some("false" | "0") => Some(Value::Bool(false)),
                _ => None,
            })
        },
        move |xml, value, _| {
            let Value::Bool(flag) = value else {
                return Err(JxtError::field(&export_name, "expected a boolean"));
            };
            xml.set_attribute(export_name.clone(), flag.to_string());
            Ok(())
        },
    )
}

/// The element's own character data.
#[must_use]
pub fn text() -> FieldDefinition {
    FieldDefinition::new(
        |xml, _| {
            let text = xml.text();
            Ok((!text.is_empty()).then_some(Value::String(text)))
        },
        |xml, value, context| {
            let text = scalar_text(&context.path, value)?;
            xml.set_text(text);
            Ok(())
        },
    )
}

/// Text of a child element.
#[must_use]
pub fn child_text(namespace: &str, element: &str) -> FieldDefinition {
    let namespace = namespace.to_string();
    let element = element.to_string();
    let (import_ns, import_el) = (namespace.clone(), element.clone());
    FieldDefinition::new(
        move |xml, _| {
            Ok(xml
                .find_child(&import_ns, &import_el)
                .map(|child| Value::String(child.text())))
        },
        move |xml, value, context| {
            let text = scalar_text(&context.path, value)?;
            xml.append_child(XmlElement::new(&namespace, &element).with_text(text));
            Ok(())
        },
    )
}

/// Integer text of a child element.
#[must_use]
pub fn child_integer(namespace: &str, element: &str) -> FieldDefinition {
    let namespace = namespace.to_string();
    let element = element.to_string();
    let (import_ns, import_el) = (namespace.clone(), element.clone());
    FieldDefinition::new(
        move |xml, _| {
            Ok(xml
                .find_child(&import_ns, &import_el)
                .and_then(|child| child.text().trim().parse::<i64>().ok())
                .map(Value::from))
        },
        move |xml, value, context| {
            let number = integer_value(&context.path, value)?;
            xml.append_child(XmlElement::new(&namespace, &element).with_text(number.to_string()));
            Ok(())
        },
    )
}

/// Presence flag: `true` when the child element exists.
#[must_use]
pub fn child_boolean(namespace: &str, element: &str) -> FieldDefinition {
    let namespace = namespace.to_string();
    let element = element.to_string();
    let (import_ns, import_el) = (namespace.clone(), element.clone());
    FieldDefinition::new(
        move |xml, _| {
            Ok(xml
                .find_child(&import_ns, &import_el)
                .map(|_| Value::Bool(true)))
        },
        move |xml, value, _| {
            if value.as_bool() == Some(true) {
                xml.append_child(XmlElement::new(&namespace, &element));
            }
            Ok(())
        },
    )
}

/// Language-tagged child text.
///
/// On import, the children are grouped by language and the best match is
/// picked with the context's language resolver. On export, a string becomes
/// one child in the inherited language; an object of `{lang: text}` becomes
/// one child per language.
#[must_use]
pub fn child_language_text(namespace: &str, element: &str) -> FieldDefinition {
    let namespace = namespace.to_string();
    let element = element.to_string();
    let (import_ns, import_el) = (namespace.clone(), element.clone());
    FieldDefinition::new(
        move |xml, context| import_language_text(xml, context, &import_ns, &import_el),
        move |xml, value, context| {
            export_language_text(xml, value, context, &namespace, &element)
        },
    )
}

fn import_language_text(
    xml: &XmlElement,
    context: &mut TranslationContext<'_>,
    namespace: &str,
    element: &str,
) -> Result<Option<Value>> {
    let mut by_lang: Vec<(String, String)> = Vec::new();
    for child in xml.find_children(namespace, element) {
        let lang = child
            .lang()
            .map(str::to_lowercase)
            .or_else(|| context.lang.clone())
            .unwrap_or_default();
        if !by_lang.iter().any(|(existing, _)| *existing == lang) {
            by_lang.push((lang, child.text()));
        }
    }
    if by_lang.is_empty() {
        return Ok(None);
    }

    let available: Vec<String> = by_lang.iter().map(|(lang, _)| lang.clone()).collect();
    let chosen = context
        .resolve_language(&available)
        .and_then(|lang| by_lang.iter().find(|(candidate, _)| *candidate == lang))
        .or_else(|| by_lang.first())
        .map(|(_, text)| Value::String(text.clone()));
    Ok(chosen)
}

fn export_language_text(
    xml: &mut XmlElement,
    value: &Value,
    context: &mut TranslationContext<'_>,
    namespace: &str,
    element: &str,
) -> Result<()> {
    match value {
        Value::Object(alternatives) => {
            for (lang, text) in alternatives {
                let text = scalar_text(&context.path, text)?;
                let mut child = XmlElement::new(namespace, element).with_text(text);
                if !lang.is_empty() && context.lang.as_deref() != Some(lang.as_str()) {
                    child.set_attribute(XML_LANG, lang.clone());
                }
                xml.append_child(child);
            }
        }
        other => {
            let text = scalar_text(&context.path, other)?;
            xml.append_child(XmlElement::new(namespace, element).with_text(text));
        }
    }
    Ok(())
}

/// Child markup passed through a named sanitizer, carried as serialized XML.
///
/// Import serializes the sanitized child; export parses the string,
/// sanitizes it, and appends the result. Content the sanitizer rejects is
/// dropped in both directions.
#[must_use]
pub fn sanitized_child(namespace: &str, element: &str, sanitizer: &str) -> FieldDefinition {
    let namespace = namespace.to_string();
    let element = element.to_string();
    let import_sanitizer = sanitizer.to_string();
    let export_sanitizer = sanitizer.to_string();
    FieldDefinition::new(
        move |xml, context| {
            Ok(xml
                .find_child(&namespace, &element)
                .and_then(|child| context.sanitize(&import_sanitizer, child))
                .map(|clean| Value::String(clean.to_string())))
        },
        move |xml, value, context| {
            let Value::String(markup) = value else {
                return Err(JxtError::field(&context.path, "expected serialized XML"));
            };
            let parsed = parse(markup)?;
            if let Some(clean) = context.sanitize(&export_sanitizer, &parsed) {
                xml.append_child(clean);
            }
            Ok(())
        },
    )
}

/// Collect every language-tagged alternative of a child as `{lang: text}`.
#[must_use]
pub fn child_alternate_language_text(namespace: &str, element: &str) -> FieldDefinition {
    let namespace = namespace.to_string();
    let element = element.to_string();
    FieldDefinition::import_only(move |xml, context| {
        let mut alternatives = Map::new();
        for child in xml.find_children(&namespace, &element) {
            let lang = child
                .lang()
                .map(str::to_lowercase)
                .or_else(|| context.lang.clone())
                .unwrap_or_default();
            alternatives
                .entry(lang)
                .or_insert_with(|| Value::String(child.text()));
        }
        Ok((!alternatives.is_empty()).then_some(Value::Object(alternatives)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::FieldImporter;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn importer(field: &FieldDefinition) -> &FieldImporter {
        field.converter.importer().unwrap()
    }

    fn run_import(field: &FieldDefinition, xml: &XmlElement, context: &mut TranslationContext<'_>) -> Option<Value> {
        importer(field)(xml, context).unwrap()
    }

    fn run_export(field: &FieldDefinition, value: Value, context: &mut TranslationContext<'_>) -> Result<XmlElement> {
        let mut xml = XmlElement::new("urn:x", "x");
        let exporter = field.converter.exporter().unwrap();
        exporter(&mut xml, &value, context)?;
        Ok(xml)
    }

    #[test]
    fn test_attribute() {
        let field = attribute("to");
        let mut context = TranslationContext::new();
        let xml = XmlElement::new("urn:x", "x").with_attribute("to", "a@b");

        assert_eq!(run_import(&field, &xml, &mut context), Some(json!("a@b")));
        assert_eq!(run_import(&field, &XmlElement::new("urn:x", "x"), &mut context), None);

        let exported = run_export(&field, json!(42), &mut context).unwrap();
        assert_eq!(exported.attribute("to"), Some("42"));
        assert!(run_export(&field, json!({"a": 1}), &mut context).is_err());
    }

    #[test]
    fn test_integer_attribute() {
        let field = integer_attribute("priority");
        let mut context = TranslationContext::new();

        let xml = XmlElement::new("urn:x", "x").with_attribute("priority", " 5 ");
        assert_eq!(run_import(&field, &xml, &mut context), Some(json!(5)));

        let bad = XmlElement::new("urn:x", "x").with_attribute("priority", "high");
        assert_eq!(run_import(&field, &bad, &mut context), None);

        let exported = run_export(&field, json!("7"), &mut context).unwrap();
        assert_eq!(exported.attribute("priority"), Some("7"));
        assert!(run_export(&field, json!(1.5), &mut context).is_err());
    }

    #[test]
    fn test_boolean_attribute() {
        let field = boolean_attribute("muted");
        let mut context = TranslationContext::new();

        let xml = XmlElement::new("urn:x", "x").with_attribute("muted", "1");
        assert_eq!(run_import(&field, &xml, &mut context), Some(json!(true)));

        let exported = run_export(&field, json!(false), &mut context).unwrap();
        assert_eq!(exported.attribute("muted"), Some("false"));
        assert!(run_export(&field, json!("yes"), &mut context).is_err());
    }

    #[test]
    fn test_text() {
        let field = text();
        let mut context = TranslationContext::new();

        let xml = XmlElement::new("urn:x", "x").with_text("hello");
        assert_eq!(run_import(&field, &xml, &mut context), Some(json!("hello")));
        assert_eq!(run_import(&field, &XmlElement::new("urn:x", "x"), &mut context), None);

        let exported = run_export(&field, json!("bye"), &mut context).unwrap();
        assert_eq!(exported.text(), "bye");
    }

    #[test]
    fn test_child_text_and_integer() {
        let mut context = TranslationContext::new();
        let xml = XmlElement::new("urn:x", "x")
            .with_child(XmlElement::new("urn:x", "show").with_text("away"))
            .with_child(XmlElement::new("urn:x", "priority").with_text("10"));

        assert_eq!(
            run_import(&child_text("urn:x", "show"), &xml, &mut context),
            Some(json!("away"))
        );
        assert_eq!(
            run_import(&child_integer("urn:x", "priority"), &xml, &mut context),
            Some(json!(10))
        );

        let exported = run_export(&child_integer("urn:x", "priority"), json!(-1), &mut context).unwrap();
        assert_eq!(exported.to_string(), r#"<x xmlns="urn:x"><priority>-1</priority></x>"#);
    }

    #[test]
    fn test_child_boolean() {
        let field = child_boolean("urn:x", "request");
        let mut context = TranslationContext::new();

        let xml = XmlElement::new("urn:x", "x").with_child(XmlElement::new("urn:x", "request"));
        assert_eq!(run_import(&field, &xml, &mut context), Some(json!(true)));
        assert_eq!(run_import(&field, &XmlElement::new("urn:x", "x"), &mut context), None);

        let exported = run_export(&field, json!(false), &mut context).unwrap();
        assert_eq!(exported.child_elements().count(), 0);
        let exported = run_export(&field, json!(true), &mut context).unwrap();
        assert_eq!(exported.child_elements().count(), 1);
    }

    #[test]
    fn test_child_language_text_picks_accepted_language() {
        let field = child_language_text("urn:x", "body");
        let xml = XmlElement::new("urn:x", "x")
            .with_child(XmlElement::new("urn:x", "body").with_text("hello"))
            .with_child(
                XmlElement::new("urn:x", "body")
                    .with_attribute("xml:lang", "DE")
                    .with_text("hallo"),
            );

        let mut german = TranslationContext::new()
            .with_lang("en")
            .with_accept_languages(["de"]);
        assert_eq!(run_import(&field, &xml, &mut german), Some(json!("hallo")));

        let mut english = TranslationContext::new().with_lang("en");
        assert_eq!(run_import(&field, &xml, &mut english), Some(json!("hello")));

        let mut nothing = TranslationContext::new();
        assert_eq!(
            run_import(&field, &XmlElement::new("urn:x", "x"), &mut nothing),
            None
        );
    }

    #[test]
    fn test_child_language_text_export() {
        let field = child_language_text("urn:x", "body");
        let mut context = TranslationContext::new().with_lang("en");

        let exported = run_export(&field, json!({"en": "hello", "de": "hallo"}), &mut context).unwrap();
        assert_eq!(
            exported.to_string(),
            r#"<x xmlns="urn:x"><body>hello</body><body xml:lang="de">hallo</body></x>"#
        );

        let exported = run_export(&field, json!("hi"), &mut context).unwrap();
        assert_eq!(exported.to_string(), r#"<x xmlns="urn:x"><body>hi</body></x>"#);
    }

    #[test]
    fn test_child_alternate_language_text() {
        let field = child_alternate_language_text("urn:x", "status");
        let xml = XmlElement::new("urn:x", "x")
            .with_child(XmlElement::new("urn:x", "status").with_text("out"))
            .with_child(
                XmlElement::new("urn:x", "status")
                    .with_attribute("xml:lang", "fr")
                    .with_text("dehors"),
            );

        let mut context = TranslationContext::new().with_lang("en");
        assert_eq!(
            run_import(&field, &xml, &mut context),
            Some(json!({"en": "out", "fr": "dehors"}))
        );
        assert!(field.converter.exporter().is_none());
    }

    #[test]
    fn test_sanitized_child() {
        let field = sanitized_child("http://www.w3.org/1999/xhtml", "body", "xhtmlim");
        let mut context = TranslationContext::new().with_sanitizer("xhtmlim", crate::sanitize::sanitize_xhtml_im);

        let xml = XmlElement::new("urn:x", "html").with_child(
            XmlElement::new("http://www.w3.org/1999/xhtml", "body")
                .with_child(XmlElement::new("http://www.w3.org/1999/xhtml", "script").with_text("x")),
        );
        assert_eq!(
            run_import(&field, &xml, &mut context),
            Some(json!(r#"<body xmlns="http://www.w3.org/1999/xhtml">x</body>"#))
        );

        let exported = run_export(
            &field,
            json!(r#"<body xmlns="http://www.w3.org/1999/xhtml"><em>hi</em></body>"#),
            &mut context,
        )
        .unwrap();
        assert_eq!(exported.child_elements().count(), 1);

        assert!(run_export(&field, json!("<not-closed>"), &mut context).is_err());
    }
}
