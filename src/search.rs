//! Search parameter value projection.
//!
//! Converts a resolved element into the scalar string used as a search
//! query parameter value. Projection is directed by the element's kind;
//! complex datatypes reduce to their most identifying part, optionally
//! qualified with the code system (`system|code`). Literal commas are
//! escaped because comma is the multi-value delimiter in search parameter
//! syntax.

use serde_json::Value as JsonValue;

use crate::node::{ElementKind, Field, Node};
use crate::path::resolve_node;

/// Project an element into its search parameter value.
///
/// Returns `None` when the element has no projectable content (e.g. a
/// Period with neither bound, a CodeableConcept with no resolvable code).
pub fn project(node: Node<'_>, include_system: bool) -> Option<String> {
    let projected = match node.kind() {
        ElementKind::Period => match node.string_field("start") {
            Some(start) => format!("gt{start}"),
            None => format!("lt{}", node.string_field("end")?),
        },
        ElementKind::Reference => node.string_field("reference")?.to_string(),
        ElementKind::CodeableConcept => {
            let codings = resolve_node(node, "coding");
            let coding = codings
                .iter()
                .find(|coding| coding.string_field("code").is_some())?;
            if include_system {
                format!(
                    "{}|{}",
                    coding.string_field("system").unwrap_or_default(),
                    coding.string_field("code").unwrap_or_default()
                )
            } else {
                coding.string_field("code")?.to_string()
            }
        }
        ElementKind::Identifier => {
            let value = node.string_field("value")?;
            if include_system {
                format!("{}|{value}", node.string_field("system").unwrap_or_default())
            } else {
                value.to_string()
            }
        }
        ElementKind::Coding => {
            let code = node.string_field("code")?;
            if include_system {
                format!("{}|{code}", node.string_field("system").unwrap_or_default())
            } else {
                code.to_string()
            }
        }
        ElementKind::HumanName => node
            .string_field("family")
            .or_else(|| first_string(node.field("given")))
            .or_else(|| node.string_field("text"))?
            .to_string(),
        ElementKind::Address => node
            .string_field("text")
            .or_else(|| node.string_field("city"))
            .or_else(|| node.string_field("state"))
            .or_else(|| node.string_field("postalCode"))
            .or_else(|| node.string_field("country"))?
            .to_string(),
        _ => match node.value() {
            JsonValue::String(s) => s.clone(),
            value => value.to_string(),
        },
    };

    Some(escape_commas(&projected))
}

fn first_string<'a>(field: Field<'a>) -> Option<&'a str> {
    field.into_nodes().first().and_then(|node| node.as_str())
}

/// Escape every literal comma with a preceding backslash.
pub fn escape_commas(value: &str) -> String {
    value.replace(',', "\\,")
}
