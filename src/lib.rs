//! octofhir-conformance - FHIR profile conformance validation engine.
//!
//! This crate provides the structural core underlying per-resource
//! conformance checks:
//! - Recursive path resolution into deserialized resources
//! - Search parameter value projection
//! - Discriminator-based slice matching
//! - Terminology binding validation
//! - Bounded paginated bundle collection with a per-page hook
//! - Bounded, deduplicated reference graph validation
//! - Detection of the data-absent-reason conventions
//!
//! The engine consumes resources as read-only `serde_json::Value` trees
//! wrapped in [`Node`] views and talks to its collaborators (terminology
//! lookup, page fetching, resource reads) through injected async traits.
//! It performs no transport, retains no state beyond the caller-owned
//! accumulators, and reports "not found" as absence rather than errors.
//!
//! # Quick Start
//!
//! ```
//! use octofhir_conformance::{resolve_node, Node};
//! use serde_json::json;
//!
//! let patient = json!({
//!     "resourceType": "Patient",
//!     "name": [{"given": ["Peter", "James"]}, {"given": ["Jim"]}]
//! });
//!
//! let given = resolve_node(Node::new(&patient), "name.given");
//! assert_eq!(given.len(), 3);
//! ```
//!
//! # Module Organization
//!
//! - [`node`] - Element node model and generic tree walk
//! - [`path`] - Recursive path resolution
//! - [`search`] - Search parameter value projection
//! - [`slicing`] - Discriminator-based slice matching
//! - [`terminology`] - Terminology lookup collaborator and caching
//! - [`binding`] - Terminology binding validation
//! - [`pagination`] - Paginated bundle collection
//! - [`reference`] - Reference graph validation
//! - [`absent`] - Data-absent-reason detection

pub mod absent;
pub mod binding;
pub mod error;
pub mod node;
pub mod pagination;
pub mod path;
pub mod reference;
pub mod search;
pub mod slicing;
pub mod terminology;

// Error exports
pub use error::{ConformanceError, Result};

// Node model exports
pub use node::{ElementKind, Field, Node, classify, walk};

// Path resolution exports
pub use path::{resolve, resolve_first_matching, resolve_node};

// Search projection exports
pub use search::{escape_commas, project};

// Slicing exports
pub use slicing::{Discriminator, ValueConstraint, find_slice, matches_discriminator};

// Binding exports
pub use binding::{BindingDescriptor, BindingKind, BindingViolation, invalid_bindings};

// Terminology exports
pub use terminology::{
    BindingStrength, CacheConfig, CacheStats, CachedTerminologyService, CodeValidationResult,
    InMemoryTerminologyService, TerminologyError, TerminologyErrorCode, TerminologyResult,
    TerminologyService,
};

// Pagination exports
pub use pagination::{
    FetchedPage, MAX_PAGES, PageFetcher, PaginationError, PaginationErrorCode, PaginationResult,
    collect_pages,
};

// Reference validation exports
pub use reference::{
    BrokenReference, MAX_RESOLVED_REFERENCES, NoOpResourceReader, ReferenceError,
    ReferenceErrorCode, ReferenceResult, ResourceReader, VisitedReferences,
    parse_relative_reference, walk_references,
};

// Data-absent-reason exports
pub use absent::{
    DATA_ABSENT_REASON_CODE_SYSTEM, DATA_ABSENT_REASON_EXTENSION_URL, DataAbsentReport,
    DataAbsentTracker, scan,
};
