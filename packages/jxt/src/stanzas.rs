//! Core stanza definitions.
//!
//! Registers `message`, `presence` and `iq` for both the client and server
//! namespaces, the shared stanza `error` payload, and a few small extensions
//! (`delay`, `ping` and XHTML-IM message bodies). The CLI loads these into a fresh registry.
//!
//! Both namespaces import into the same translators. Export always produces
//! client stanzas, so the server definitions carry importers only.

use serde_json::Value;

use crate::config::{XHTML_IM_SANITIZER, XHTML_NAMESPACE};
use crate::error::JxtError;
use crate::fields::{
    attribute, child_integer, child_language_text, child_text, integer_attribute,
    sanitized_child, text,
};
use crate::registry::{Definition, DefinitionItem, FieldConverter, FieldDefinition, Registry};
use crate::xml::XmlElement;

pub const NS_CLIENT: &str = "jabber:client";
pub const NS_SERVER: &str = "jabber:server";
pub const NS_STANZAS: &str = "urn:ietf:params:xml:ns:xmpp-stanzas";
pub const NS_DELAY: &str = "urn:xmpp:delay";
pub const NS_PING: &str = "urn:xmpp:ping";
pub const NS_XHTML_IM: &str = "http://jabber.org/protocol/xhtml-im";

/// Stanza namespaces the core definitions are registered for.
pub const STANZA_NAMESPACES: [&str; 2] = [NS_CLIENT, NS_SERVER];

/// Register the core stanzas.
///
/// # Examples
/// ```
/// use jxt::registry::Registry;
/// use jxt::stanzas::define_core_stanzas;
///
/// let mut registry = Registry::new();
/// define_core_stanzas(&mut registry);
///
/// assert_eq!(registry.paths(), vec!["message", "presence", "iq"]);
/// assert!(registry.has_translator("jabber:server", "iq"));
/// ```
pub fn define_core_stanzas(registry: &mut Registry) {
    registry.define_all(core_stanza_definitions());
}

/// The core stanza definitions, in registration order.
#[must_use]
pub fn core_stanza_definitions() -> Vec<DefinitionItem> {
    let mut items = Vec::new();
    for namespace in STANZA_NAMESPACES {
        let definitions = [
            message(namespace),
            presence(namespace),
            iq(namespace),
            stanza_error(namespace),
        ];
        for definition in definitions {
            let definition = if namespace == NS_CLIENT {
                definition
            } else {
                import_only(definition)
            };
            items.push(definition.into());
        }
    }
    items.push(delay().into());
    items.push(Definition::new(NS_PING, "ping").with_path("iq.ping").into());
    items.push(xhtml_im().into());
    items
}

/// Drop the exporters of every field of a definition.
fn import_only(mut definition: Definition) -> Definition {
    for field in definition.fields.values_mut() {
        let Some(importer) = field.converter.importer().cloned() else {
            continue;
        };
        field.converter = FieldConverter::Import(importer);
    }
    definition
}

/// Routing attributes shared by every top-level stanza.
fn routed(namespace: &str, element: &str) -> Definition {
    Definition::new(namespace, element)
        .with_path(element)
        .with_field("to", attribute("to"))
        .with_field("from", attribute("from"))
        .with_field("id", attribute("id"))
        .with_field("type", attribute("type"))
}

fn message(namespace: &str) -> Definition {
    routed(namespace, "message")
        .with_field("body", child_language_text(namespace, "body"))
        .with_field("subject", child_language_text(namespace, "subject"))
        .with_field("thread", child_text(namespace, "thread"))
}

fn presence(namespace: &str) -> Definition {
    routed(namespace, "presence")
        .with_field("show", child_text(namespace, "show"))
        .with_field("status", child_language_text(namespace, "status"))
        .with_field("priority", child_integer(namespace, "priority"))
}

fn iq(namespace: &str) -> Definition {
    routed(namespace, "iq")
}

fn stanza_error(namespace: &str) -> Definition {
    Definition::new(namespace, "error")
        .with_path("message.error")
        .with_alias("presence.error")
        .with_alias("iq.error")
        .with_field("type", attribute("type"))
        .with_field("by", attribute("by"))
        .with_field("code", integer_attribute("code"))
        .with_field("condition", error_condition())
        .with_field("text", child_language_text(NS_STANZAS, "text"))
}

fn delay() -> Definition {
    Definition::new(NS_DELAY, "delay")
        .with_path("message.delay")
        .with_alias("presence.delay")
        .with_field("from", attribute("from"))
        .with_field("stamp", attribute("stamp"))
        .with_field("reason", text())
}

fn xhtml_im() -> Definition {
    Definition::new(NS_XHTML_IM, "html")
        .with_path("message.html")
        .with_field(
            "body",
            sanitized_child(XHTML_NAMESPACE, "body", XHTML_IM_SANITIZER),
        )
}

/// The defined condition: the first child in the stanza error namespace
/// other than `<text/>`, carried by its element name.
fn error_condition() -> FieldDefinition {
    FieldDefinition::new(
        |xml, _| {
            Ok(xml
                .child_elements()
                .find(|child| child.namespace == NS_STANZAS && child.name != "text")
                .map(|child| Value::String(child.name.clone())))
        },
        |xml, value, context| {
            let Some(condition) = value.as_str().filter(|condition| !condition.is_empty()) else {
                return Err(JxtError::field(
                    &context.path,
                    "expected a condition name",
                ));
            };
            xml.append_child(XmlElement::new(NS_STANZAS, condition));
            Ok(())
        },
    )
}
