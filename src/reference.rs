//! Reference graph validation.
//!
//! Walks every reference-typed element reachable in a record's subtree and
//! attempts to read each relative reference exactly once, sharing a
//! deduplicating visited set across records. The walk is bounded to
//! [`MAX_RESOLVED_REFERENCES`] attempts as a guard against pathological
//! reference fan-out; hitting the bound truncates silently. Resolution
//! failures are data returned to the caller, not errors.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value as JsonValue;
use std::collections::HashSet;
use thiserror::Error;

use crate::node::{ElementKind, Node, walk};

/// Hard cap on reference resolution attempts per shared visited set.
pub const MAX_RESOLVED_REFERENCES: usize = 50;

/// Error codes for reference resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceErrorCode {
    /// REF1001: Referenced resource does not exist
    NonExistentResource = 1001,
    /// REF1002: Reference service unavailable
    ServiceUnavailable = 1002,
    /// REF1003: Invalid reference format
    InvalidReferenceFormat = 1003,
}

impl std::fmt::Display for ReferenceErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "REF{:04}", *self as u32)
    }
}

/// Errors that can occur while reading referenced resources
#[derive(Debug, Error)]
pub enum ReferenceError {
    /// Referenced resource does not exist
    #[error("Referenced resource {resource_type}/{id} does not exist")]
    NonExistentResource { resource_type: String, id: String },

    /// Service is unavailable
    #[error("Reference read service unavailable: {message}")]
    ServiceUnavailable { message: String },

    /// Invalid reference format
    #[error("Invalid reference format: {reference}")]
    InvalidReferenceFormat { reference: String },
}

impl ReferenceError {
    /// Get the error code for this error
    pub fn code(&self) -> ReferenceErrorCode {
        match self {
            ReferenceError::NonExistentResource { .. } => ReferenceErrorCode::NonExistentResource,
            ReferenceError::ServiceUnavailable { .. } => ReferenceErrorCode::ServiceUnavailable,
            ReferenceError::InvalidReferenceFormat { .. } => {
                ReferenceErrorCode::InvalidReferenceFormat
            }
        }
    }
}

/// Result type for reference operations
pub type ReferenceResult<T> = Result<T, ReferenceError>;

/// Trait for reading referenced resources.
///
/// `Ok(Some(_))` is a resolved resource, `Ok(None)` a missing one, and
/// `Err(_)` a read that could not be performed. Implementations own
/// transport and timeout policy.
#[async_trait]
pub trait ResourceReader: Send + Sync {
    async fn read(&self, resource_type: &str, id: &str) -> ReferenceResult<Option<JsonValue>>;
}

/// A reader that treats every reference as resolvable.
///
/// Useful for testing or when reference validation is disabled.
#[derive(Debug, Default, Clone)]
pub struct NoOpResourceReader;

impl NoOpResourceReader {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ResourceReader for NoOpResourceReader {
    async fn read(&self, _resource_type: &str, _id: &str) -> ReferenceResult<Option<JsonValue>> {
        Ok(Some(JsonValue::Object(serde_json::Map::new())))
    }
}

/// Deduplicating set of attempted `(resourceType, id)` targets, shared
/// across the records of one validation pass.
///
/// Both successful and failed attempts are recorded, so the same target is
/// never read twice. The set refuses new entries once it holds `limit`
/// members.
#[derive(Debug)]
pub struct VisitedReferences {
    seen: HashSet<(String, String)>,
    limit: usize,
}

impl Default for VisitedReferences {
    fn default() -> Self {
        Self::new()
    }
}

impl VisitedReferences {
    pub fn new() -> Self {
        Self::with_limit(MAX_RESOLVED_REFERENCES)
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            seen: HashSet::new(),
            limit,
        }
    }

    /// Whether the attempt budget is exhausted. Callers should check this
    /// before each record as well as relying on the per-reference check.
    pub fn is_full(&self) -> bool {
        self.seen.len() >= self.limit
    }

    pub fn contains(&self, resource_type: &str, id: &str) -> bool {
        self.seen
            .contains(&(resource_type.to_string(), id.to_string()))
    }

    /// Record a target. Returns `false` if it was already recorded.
    fn insert(&mut self, resource_type: &str, id: &str) -> bool {
        self.seen
            .insert((resource_type.to_string(), id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// A reference that could not be resolved.
#[derive(Debug, Clone)]
pub struct BrokenReference {
    /// The literal reference string from the record
    pub reference: String,
    /// Why resolution failed
    pub message: String,
}

static RELATIVE_REFERENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z]+)/([A-Za-z0-9\-\.]{1,64})$").expect("valid regex"));

/// Split a relative reference (`Type/id`) into its parts.
///
/// Absolute URLs, fragment (contained) references and malformed strings
/// yield `None`; they are outside this walk's scope.
pub fn parse_relative_reference(reference: &str) -> Option<(&str, &str)> {
    let captures = RELATIVE_REFERENCE.captures(reference)?;
    Some((
        captures.get(1)?.as_str(),
        captures.get(2)?.as_str(),
    ))
}

/// Attempt every relative reference in `record`'s subtree exactly once.
///
/// New targets are read through `reader` and recorded in `visited`
/// whether or not the read succeeds; targets already in `visited` are
/// skipped. No new attempts start once the visited set is full. Broken
/// references are returned in encounter order.
pub async fn walk_references(
    record: &JsonValue,
    reader: &dyn ResourceReader,
    visited: &mut VisitedReferences,
) -> Vec<BrokenReference> {
    let mut broken = Vec::new();
    if visited.is_full() {
        return broken;
    }

    let mut references: Vec<String> = Vec::new();
    walk(Node::new(record), &mut |node, _path| {
        if node.kind() == ElementKind::Reference
            && let Some(reference) = node.string_field("reference")
        {
            references.push(reference.to_string());
        }
    });

    for reference in references {
        let Some((resource_type, id)) = parse_relative_reference(&reference) else {
            continue;
        };
        if visited.contains(resource_type, id) {
            continue;
        }
        if visited.is_full() {
            tracing::warn!(
                limit = visited.limit,
                "stopping reference resolution at the attempt cap"
            );
            break;
        }
        visited.insert(resource_type, id);

        match reader.read(resource_type, id).await {
            Ok(Some(_)) => {
                tracing::debug!(reference = %reference, "resolved reference");
            }
            Ok(None) => broken.push(BrokenReference {
                reference: reference.clone(),
                message: format!("Referenced resource {resource_type}/{id} does not exist"),
            }),
            Err(error) => broken.push(BrokenReference {
                reference: reference.clone(),
                message: error.to_string(),
            }),
        }
    }

    broken
}
