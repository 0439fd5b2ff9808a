//! Terminology lookup services for binding validation.
//!
//! Binding validation needs a single capability: is a `(system, code)` pair
//! a member of a value set, or of its own code system when no value set is
//! named. The `TerminologyService` trait defines that interface; validators
//! accept any implementation. Implementations can connect to terminology
//! servers, local databases, or in-memory code lists.
//!
//! # Example
//!
//! ```ignore
//! use octofhir_conformance::terminology::{
//!     CacheConfig, CachedTerminologyService, TerminologyService,
//! };
//! use std::sync::Arc;
//!
//! let service: Arc<dyn TerminologyService> = Arc::new(MyTerminologyService::new());
//!
//! // Wrap with caching so repeated binding checks stay cheap
//! let cached = CachedTerminologyService::new(service, CacheConfig::default());
//! ```

use async_trait::async_trait;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Error codes for terminology lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminologyErrorCode {
    /// TX1001: Value set not found
    ValueSetNotFound = 1001,
    /// TX1002: Code system not found
    CodeSystemNotFound = 1002,
    /// TX1003: Terminology service unavailable
    ServiceUnavailable = 1003,
}

impl std::fmt::Display for TerminologyErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TX{:04}", *self as u32)
    }
}

/// Errors that can occur while consulting the terminology service.
///
/// A code simply not being a member is NOT an error; it is a negative
/// [`CodeValidationResult`].
#[derive(Debug, Error)]
pub enum TerminologyError {
    /// Value set was not found
    #[error("Value set not found: {url}")]
    ValueSetNotFound { url: String },

    /// Code system was not found
    #[error("Code system not found: {system}")]
    CodeSystemNotFound { system: String },

    /// Service is unavailable
    #[error("Terminology service unavailable: {message}")]
    ServiceUnavailable { message: String },

    /// Network or communication error
    #[error("Network error: {0}")]
    NetworkError(String),
}

impl TerminologyError {
    /// Get the error code for this error
    pub fn code(&self) -> TerminologyErrorCode {
        match self {
            TerminologyError::ValueSetNotFound { .. } => TerminologyErrorCode::ValueSetNotFound,
            TerminologyError::CodeSystemNotFound { .. } => TerminologyErrorCode::CodeSystemNotFound,
            TerminologyError::ServiceUnavailable { .. } => TerminologyErrorCode::ServiceUnavailable,
            TerminologyError::NetworkError(_) => TerminologyErrorCode::ServiceUnavailable,
        }
    }
}

/// Result type for terminology operations
pub type TerminologyResult<T> = Result<T, TerminologyError>;

/// Result of validating a code against a value set or code system
#[derive(Debug, Clone)]
pub struct CodeValidationResult {
    /// Whether the code is a member
    pub valid: bool,
    /// Display text for the code (if found)
    pub display: Option<String>,
}

impl CodeValidationResult {
    pub fn valid() -> Self {
        Self {
            valid: true,
            display: None,
        }
    }

    pub fn valid_with_display(display: String) -> Self {
        Self {
            valid: true,
            display: Some(display),
        }
    }

    pub fn invalid() -> Self {
        Self {
            valid: false,
            display: None,
        }
    }
}

/// Trait for terminology lookup services.
///
/// The single operation answers both membership questions the binding
/// validator asks:
///
/// - `value_set_url` present: is `(system, code)` a member of that value
///   set?
/// - `value_set_url` absent: is `code` a valid code of the `system` code
///   system?
#[async_trait]
pub trait TerminologyService: Send + Sync {
    /// Validate a code against a value set or, when `value_set_url` is
    /// `None`, against the given code system.
    ///
    /// # Arguments
    ///
    /// * `value_set_url` - Canonical URL of the value set, if the binding names one
    /// * `code` - The code value to validate
    /// * `system` - Code system URL (from Coding.system / Quantity.system)
    async fn validate_code(
        &self,
        value_set_url: Option<&str>,
        code: &str,
        system: Option<&str>,
    ) -> TerminologyResult<CodeValidationResult>;
}

/// Configuration for the terminology cache
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Time-to-live for cached validation results
    pub ttl: Duration,
    /// Maximum number of entries in the cache
    pub max_size: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(3600),
            max_size: 10_000,
        }
    }
}

impl CacheConfig {
    pub fn new(ttl: Duration, max_size: u64) -> Self {
        Self { ttl, max_size }
    }

    /// Configuration for short-lived caches (5 minutes)
    pub fn short_lived() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            max_size: 1_000,
        }
    }

    /// Configuration for long-lived caches (24 hours)
    pub fn long_lived() -> Self {
        Self {
            ttl: Duration::from_secs(86400),
            max_size: 50_000,
        }
    }
}

/// Cache key for terminology lookups
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    value_set_url: Option<String>,
    code: String,
    system: Option<String>,
}

/// A cached wrapper around a `TerminologyService`.
///
/// Binding validation asks the same membership question once per coding
/// per record, so a TTL cache in front of a network-backed service removes
/// nearly all repeat lookups.
pub struct CachedTerminologyService {
    inner: Arc<dyn TerminologyService>,
    cache: Cache<CacheKey, CodeValidationResult>,
}

impl CachedTerminologyService {
    pub fn new(inner: Arc<dyn TerminologyService>, config: CacheConfig) -> Self {
        let cache = Cache::builder()
            .time_to_live(config.ttl)
            .max_capacity(config.max_size)
            .build();

        Self { inner, cache }
    }

    /// Get cache statistics
    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            entry_count: self.cache.entry_count(),
            weighted_size: self.cache.weighted_size(),
        }
    }

    /// Clear all cached entries
    pub fn clear_cache(&self) {
        self.cache.invalidate_all();
    }

    #[cfg(test)]
    pub(crate) async fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks().await;
    }
}

/// Statistics about the cache
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub entry_count: u64,
    pub weighted_size: u64,
}

#[async_trait]
impl TerminologyService for CachedTerminologyService {
    async fn validate_code(
        &self,
        value_set_url: Option<&str>,
        code: &str,
        system: Option<&str>,
    ) -> TerminologyResult<CodeValidationResult> {
        let key = CacheKey {
            value_set_url: value_set_url.map(|s| s.to_string()),
            code: code.to_string(),
            system: system.map(|s| s.to_string()),
        };

        if let Some(result) = self.cache.get(&key).await {
            return Ok(result);
        }

        let result = self.inner.validate_code(value_set_url, code, system).await?;
        self.cache.insert(key, result.clone()).await;

        Ok(result)
    }
}

/// Type alias for code map: (code, system) -> display
type CodeMap = std::collections::HashMap<(String, Option<String>), Option<String>>;

/// A simple in-memory terminology service.
///
/// Maintains in-memory maps of value sets and code systems to their valid
/// codes. Useful for unit tests and offline scenarios.
#[derive(Debug, Default)]
pub struct InMemoryTerminologyService {
    /// Map of value_set_url -> CodeMap
    value_sets: std::collections::HashMap<String, CodeMap>,
    /// Map of code_system_url -> set of codes
    code_systems: std::collections::HashMap<String, std::collections::HashSet<String>>,
}

impl InMemoryTerminologyService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a code to a value set
    pub fn add_value_set_code(
        &mut self,
        value_set_url: &str,
        code: &str,
        system: Option<&str>,
        display: Option<&str>,
    ) {
        let vs = self
            .value_sets
            .entry(value_set_url.to_string())
            .or_default();
        vs.insert(
            (code.to_string(), system.map(|s| s.to_string())),
            display.map(|d| d.to_string()),
        );
    }

    /// Add a code to a code system
    pub fn add_system_code(&mut self, system: &str, code: &str) {
        self.code_systems
            .entry(system.to_string())
            .or_default()
            .insert(code.to_string());
    }
}

#[async_trait]
impl TerminologyService for InMemoryTerminologyService {
    async fn validate_code(
        &self,
        value_set_url: Option<&str>,
        code: &str,
        system: Option<&str>,
    ) -> TerminologyResult<CodeValidationResult> {
        let Some(value_set_url) = value_set_url else {
            // Bare code system membership check
            let Some(system) = system else {
                return Ok(CodeValidationResult::invalid());
            };
            let Some(codes) = self.code_systems.get(system) else {
                return Err(TerminologyError::CodeSystemNotFound {
                    system: system.to_string(),
                });
            };
            return Ok(if codes.contains(code) {
                CodeValidationResult::valid()
            } else {
                CodeValidationResult::invalid()
            });
        };

        let Some(vs) = self.value_sets.get(value_set_url) else {
            return Err(TerminologyError::ValueSetNotFound {
                url: value_set_url.to_string(),
            });
        };

        let key = (code.to_string(), system.map(|s| s.to_string()));
        if let Some(display) = vs.get(&key) {
            return Ok(match display {
                Some(d) => CodeValidationResult::valid_with_display(d.clone()),
                None => CodeValidationResult::valid(),
            });
        }

        // Loose matching: a probe without a system matches the code under
        // any system.
        if system.is_none() {
            for ((c, _sys), display) in vs.iter() {
                if c == code {
                    return Ok(match display {
                        Some(d) => CodeValidationResult::valid_with_display(d.clone()),
                        None => CodeValidationResult::valid(),
                    });
                }
            }
        }

        // A system-qualified probe also matches a system-less entry
        let key_no_system = (code.to_string(), None);
        if vs.contains_key(&key_no_system) {
            Ok(CodeValidationResult::valid())
        } else {
            Ok(CodeValidationResult::invalid())
        }
    }
}

/// FHIR binding strength levels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingStrength {
    /// Code MUST be from the value set
    #[default]
    Required,
    /// Code SHOULD be from the value set, but others allowed with text
    Extensible,
    /// Code SHOULD be from the value set for interoperability
    Preferred,
    /// Value set is just an example
    Example,
}

impl BindingStrength {
    /// Parse binding strength from string
    pub fn parse_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "required" => Some(BindingStrength::Required),
            "extensible" => Some(BindingStrength::Extensible),
            "preferred" => Some(BindingStrength::Preferred),
            "example" => Some(BindingStrength::Example),
            _ => None,
        }
    }

    /// Whether validation failure at this strength is an error
    pub fn is_error_on_failure(&self) -> bool {
        matches!(self, BindingStrength::Required)
    }
}
