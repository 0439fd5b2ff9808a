//! Element node model used by the resolution and validation engine.
//!
//! The engine operates on deserialized resources as read-only trees. A
//! [`Node`] is a borrowed view over a `serde_json::Value` together with an
//! [`ElementKind`] tag describing what FHIR datatype the value looks like.
//! The kind drives type-directed behavior (search value projection, type
//! discriminators); it is classified structurally from the value's field
//! shape and can be overridden by callers that know the element type from
//! context.
//!
//! Field access is total: unknown field names and JSON `null` resolve to
//! [`Field::Absent`] rather than failing, so malformed paths degrade to
//! "not found" instead of an error.

use serde_json::Value as JsonValue;

/// Datatype tag for an element node.
///
/// Composite is the fallback for object values that match none of the
/// recognized datatype shapes (backbone elements, resources, etc.).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    CodeableConcept,
    Coding,
    Identifier,
    Reference,
    Period,
    HumanName,
    Address,
    Quantity,
    Extension,
    Composite,
    String,
    Date,
    Number,
    Boolean,
}

impl ElementKind {
    /// Parse a FHIR datatype name into a kind.
    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "CodeableConcept" => Some(Self::CodeableConcept),
            "Coding" => Some(Self::Coding),
            "Identifier" => Some(Self::Identifier),
            "Reference" => Some(Self::Reference),
            "Period" => Some(Self::Period),
            "HumanName" => Some(Self::HumanName),
            "Address" => Some(Self::Address),
            "Quantity" => Some(Self::Quantity),
            "Extension" => Some(Self::Extension),
            "Date" => Some(Self::Date),
            "String" => Some(Self::String),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CodeableConcept => "CodeableConcept",
            Self::Coding => "Coding",
            Self::Identifier => "Identifier",
            Self::Reference => "Reference",
            Self::Period => "Period",
            Self::HumanName => "HumanName",
            Self::Address => "Address",
            Self::Quantity => "Quantity",
            Self::Extension => "Extension",
            Self::Composite => "Composite",
            Self::String => "String",
            Self::Date => "Date",
            Self::Number => "Number",
            Self::Boolean => "Boolean",
        }
    }
}

impl std::fmt::Display for ElementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a JSON value by the shape of its fields.
///
/// Datatype shapes are checked from most to least distinctive. Values that
/// could be read as more than one datatype (e.g. a bare `{"text": ...}`)
/// fall through to the first shape that claims them; callers with schema
/// knowledge should use [`Node::with_kind`] instead of relying on
/// classification for such values.
pub fn classify(value: &JsonValue) -> ElementKind {
    match value {
        JsonValue::String(s) => {
            if parse_date(s).is_some() {
                ElementKind::Date
            } else {
                ElementKind::String
            }
        }
        JsonValue::Number(_) => ElementKind::Number,
        JsonValue::Bool(_) => ElementKind::Boolean,
        JsonValue::Object(map) => {
            if map.contains_key("coding") {
                ElementKind::CodeableConcept
            } else if map.contains_key("reference") {
                ElementKind::Reference
            } else if map.contains_key("url") {
                ElementKind::Extension
            } else if map.contains_key("start") || map.contains_key("end") {
                ElementKind::Period
            } else if map.contains_key("family")
                || map.contains_key("given")
                || map.contains_key("prefix")
                || map.contains_key("suffix")
            {
                ElementKind::HumanName
            } else if map.contains_key("city")
                || map.contains_key("line")
                || map.contains_key("state")
                || map.contains_key("postalCode")
                || map.contains_key("country")
            {
                ElementKind::Address
            } else if map.get("value").is_some_and(JsonValue::is_number) {
                ElementKind::Quantity
            } else if map.contains_key("system") && map.contains_key("value") {
                ElementKind::Identifier
            } else if map.contains_key("code") || map.contains_key("system") {
                ElementKind::Coding
            } else {
                ElementKind::Composite
            }
        }
        _ => ElementKind::Composite,
    }
}

/// Parse a calendar date, accepting a full dateTime by taking its date part.
pub(crate) fn parse_date(s: &str) -> Option<chrono::NaiveDate> {
    let date_part = if s.len() > 10 { s.get(..10)? } else { s };
    chrono::NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

/// A borrowed, immutable view over one element of a deserialized resource.
///
/// Nodes are cheap to copy and never outlive the resource they view. The
/// engine neither mutates nor retains them beyond a call.
#[derive(Debug, Clone, Copy)]
pub struct Node<'a> {
    kind: ElementKind,
    value: &'a JsonValue,
}

impl<'a> Node<'a> {
    /// Wrap a value, classifying its kind structurally.
    pub fn new(value: &'a JsonValue) -> Self {
        Self {
            kind: classify(value),
            value,
        }
    }

    /// Wrap a value with an explicitly known kind.
    pub fn with_kind(value: &'a JsonValue, kind: ElementKind) -> Self {
        Self { kind, value }
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    pub fn value(&self) -> &'a JsonValue {
        self.value
    }

    /// Read a named field. Unknown names and `null` values are `Absent`.
    pub fn field(&self, name: &str) -> Field<'a> {
        match self.value.get(name) {
            None | Some(JsonValue::Null) => Field::Absent,
            Some(JsonValue::Array(items)) => Field::Many(items.iter().map(Node::new).collect()),
            Some(value) => Field::One(Node::new(value)),
        }
    }

    /// Read a single-valued string field, if present.
    pub fn string_field(&self, name: &str) -> Option<&'a str> {
        self.value.get(name).and_then(JsonValue::as_str)
    }

    pub fn as_str(&self) -> Option<&'a str> {
        self.value.as_str()
    }

    pub fn is_scalar(&self) -> bool {
        matches!(
            self.value,
            JsonValue::String(_) | JsonValue::Number(_) | JsonValue::Bool(_)
        )
    }
}

impl PartialEq for Node<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

/// Result of a field lookup on a [`Node`].
#[derive(Debug, Clone)]
pub enum Field<'a> {
    /// The field is missing or `null`.
    Absent,
    /// A single nested value.
    One(Node<'a>),
    /// An ordered sequence of nested values.
    Many(Vec<Node<'a>>),
}

impl<'a> Field<'a> {
    /// Flatten into a node list: absent is empty, a single value is a
    /// one-element list.
    pub fn into_nodes(self) -> Vec<Node<'a>> {
        match self {
            Field::Absent => Vec::new(),
            Field::One(node) => vec![node],
            Field::Many(nodes) => nodes,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Field::Absent)
    }
}

/// Depth-first walk over every element in a subtree, including the root.
///
/// The visitor receives each node together with its dotted path from the
/// root (the root itself has an empty path). Sequence-valued fields are
/// flattened: each element of the sequence is visited under the field's
/// path.
pub fn walk<'a, F>(root: Node<'a>, visitor: &mut F)
where
    F: FnMut(Node<'a>, &str),
{
    let mut path = String::new();
    walk_inner(root, &mut path, visitor);
}

fn walk_inner<'a, F>(node: Node<'a>, path: &mut String, visitor: &mut F)
where
    F: FnMut(Node<'a>, &str),
{
    visitor(node, path);

    if let JsonValue::Object(map) = node.value() {
        for (key, child) in map {
            let prev_len = path.len();
            if !path.is_empty() {
                path.push('.');
            }
            path.push_str(key);

            match child {
                JsonValue::Null => {}
                JsonValue::Array(items) => {
                    for item in items {
                        walk_inner(Node::new(item), path, visitor);
                    }
                }
                value => walk_inner(Node::new(value), path, visitor),
            }

            path.truncate(prev_len);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classify_datatypes() {
        assert_eq!(
            classify(&json!({"coding": [{"code": "a"}]})),
            ElementKind::CodeableConcept
        );
        assert_eq!(
            classify(&json!({"reference": "Patient/1"})),
            ElementKind::Reference
        );
        assert_eq!(
            classify(&json!({"start": "2024-01-01"})),
            ElementKind::Period
        );
        assert_eq!(
            classify(&json!({"system": "http://mrn", "value": "123"})),
            ElementKind::Identifier
        );
        assert_eq!(
            classify(&json!({"system": "http://loinc.org", "code": "1234-5"})),
            ElementKind::Coding
        );
        assert_eq!(
            classify(&json!({"family": "Chalmers", "given": ["Peter"]})),
            ElementKind::HumanName
        );
        assert_eq!(classify(&json!({"city": "Boston"})), ElementKind::Address);
        assert_eq!(
            classify(&json!({"value": 6.3, "unit": "kg"})),
            ElementKind::Quantity
        );
        assert_eq!(
            classify(&json!({"url": "http://example.org/ext", "valueCode": "a"})),
            ElementKind::Extension
        );
        assert_eq!(
            classify(&json!({"resourceType": "Patient", "id": "1"})),
            ElementKind::Composite
        );
    }

    #[test]
    fn test_classify_scalars() {
        assert_eq!(classify(&json!("2024-03-15")), ElementKind::Date);
        assert_eq!(classify(&json!("2024-03-15T10:00:00Z")), ElementKind::Date);
        assert_eq!(classify(&json!("hello")), ElementKind::String);
        assert_eq!(classify(&json!(42)), ElementKind::Number);
        assert_eq!(classify(&json!(true)), ElementKind::Boolean);
    }

    #[test]
    fn test_field_access() {
        let value = json!({
            "name": [{"family": "Chalmers"}],
            "gender": "male",
            "deceasedBoolean": null
        });
        let node = Node::new(&value);

        assert!(matches!(node.field("name"), Field::Many(ref items) if items.len() == 1));
        assert!(matches!(node.field("gender"), Field::One(_)));
        assert!(node.field("deceasedBoolean").is_absent());
        assert!(node.field("nonexistent").is_absent());
    }

    #[test]
    fn test_walk_visits_nested_sequences() {
        let value = json!({
            "code": {
                "coding": [
                    {"system": "http://loinc.org", "code": "1234-5"},
                    {"system": "http://snomed.info/sct", "code": "271649006"}
                ]
            }
        });

        let mut paths = Vec::new();
        walk(Node::new(&value), &mut |_, path| paths.push(path.to_string()));

        assert!(paths.contains(&String::new()));
        assert!(paths.contains(&"code".to_string()));
        assert_eq!(paths.iter().filter(|p| *p == "code.coding").count(), 2);
        assert_eq!(
            paths.iter().filter(|p| *p == "code.coding.system").count(),
            2
        );
    }
}
