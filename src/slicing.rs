//! Slice matching for repeating elements.
//!
//! Profiles constrain repeating elements by "slicing" them: each slice is
//! identified by a discriminator that picks the matching occurrences out of
//! the collection. This module evaluates a discriminator against a resolved
//! collection and returns the first matching element, in collection order.
//! A discriminator that matches nothing yields `None`, never an error.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::node::{ElementKind, Field, Node, parse_date};
use crate::path::resolve_node;

/// Discriminator for selecting one slice out of a repeated element.
///
/// Discriminator definitions come from implementation-guide data, so the
/// enum is serde-deserializable with a `type` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Discriminator {
    /// Matches when any coding under `path` carries the exact code and
    /// system.
    #[serde(rename_all = "camelCase")]
    PatternCodeableConcept {
        #[serde(default)]
        path: String,
        code: String,
        system: String,
    },
    /// Matches when the identifier under `path` carries the exact system.
    #[serde(rename_all = "camelCase")]
    PatternIdentifier {
        #[serde(default)]
        path: String,
        system: String,
    },
    /// Conjunction of literal value constraints at arbitrary sub-paths.
    Value { constraints: Vec<ValueConstraint> },
    /// Matches on the candidate's datatype.
    #[serde(rename_all = "camelCase")]
    Type { type_name: String },
}

/// One `(path, expected literal)` constraint of a value discriminator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueConstraint {
    pub path: String,
    pub value: JsonValue,
}

impl ValueConstraint {
    pub fn new(path: impl Into<String>, value: JsonValue) -> Self {
        Self {
            path: path.into(),
            value,
        }
    }
}

/// Find the first element of `collection_path` matching the discriminator.
///
/// Candidates are evaluated in collection order; the first success wins.
/// Returns `None` when no candidate matches or the path resolves to
/// nothing.
pub fn find_slice<'a>(
    node: Node<'a>,
    collection_path: &str,
    discriminator: &Discriminator,
) -> Option<Node<'a>> {
    resolve_node(node, collection_path)
        .into_iter()
        .find(|candidate| matches_discriminator(*candidate, discriminator))
}

/// Evaluate a discriminator against a single candidate element.
pub fn matches_discriminator(candidate: Node<'_>, discriminator: &Discriminator) -> bool {
    match discriminator {
        Discriminator::PatternCodeableConcept { path, code, system } => {
            let coding_path = if path.is_empty() {
                "coding".to_string()
            } else {
                format!("{path}.coding")
            };
            resolve_node(candidate, &coding_path).iter().any(|coding| {
                coding.string_field("code") == Some(code)
                    && coding.string_field("system") == Some(system)
            })
        }
        Discriminator::PatternIdentifier { path, system } => resolve_node(candidate, path)
            .iter()
            .any(|identifier| identifier.string_field("system") == Some(system)),
        Discriminator::Type { type_name } => matches_type(candidate, type_name),
        Discriminator::Value { constraints } => {
            let constraints: Vec<(&str, &JsonValue)> = constraints
                .iter()
                .map(|c| (c.path.as_str(), &c.value))
                .collect();
            satisfies_constraints(candidate, &constraints)
        }
    }
}

fn matches_type(candidate: Node<'_>, type_name: &str) -> bool {
    match type_name {
        // A date slice accepts any value whose raw form parses as a
        // calendar date.
        "Date" => candidate.as_str().is_some_and(|s| parse_date(s).is_some()),
        "String" => candidate.value().is_string(),
        _ => ElementKind::parse_str(type_name).is_some_and(|kind| candidate.kind() == kind),
    }
}

/// Conjunctive evaluation of value constraints of arbitrary depth.
///
/// Constraints are grouped by their path's first segment. For each group
/// the candidate descends one segment and recurses with the shortened
/// paths; a sequence-valued segment matches when any of its elements
/// satisfies the group's remaining constraints. An empty constraint list
/// is an automatic pass. All groups must be satisfied.
fn satisfies_constraints(node: Node<'_>, constraints: &[(&str, &JsonValue)]) -> bool {
    if constraints.is_empty() {
        return true;
    }

    // Group by first path segment, preserving first-seen order. Constraints
    // whose path is exhausted compare the node's raw value directly.
    let mut groups: Vec<(&str, Vec<(&str, &JsonValue)>)> = Vec::new();
    for (path, expected) in constraints.iter().copied() {
        if path.is_empty() {
            if node.value() != expected {
                return false;
            }
            continue;
        }
        let (segment, rest) = match path.split_once('.') {
            Some((segment, rest)) => (segment, rest),
            None => (path, ""),
        };
        match groups.iter_mut().find(|(s, _)| *s == segment) {
            Some((_, group)) => group.push((rest, expected)),
            None => groups.push((segment, vec![(rest, expected)])),
        }
    }

    groups.iter().all(|(segment, remaining)| {
        let children = match node.field(segment) {
            Field::Absent => return false,
            field => field.into_nodes(),
        };
        children
            .iter()
            .any(|child| satisfies_constraints(*child, remaining))
    })
}
