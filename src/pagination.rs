//! Paginated bundle collection.
//!
//! Search results arrive as a paged bundle chain linked by `next` URLs.
//! [`collect_pages`] walks the chain, flattens each page's entry resources
//! into one list, and invokes a per-page hook with the page envelope so
//! callers can run idempotent side-effecting checks once per page.
//!
//! The walk is defensively bounded to [`MAX_PAGES`] pages; hitting the cap
//! truncates silently. A missing or unparseable continuation link also
//! ends the walk silently. A continuation fetch that fails or returns a
//! malformed body, by contrast, aborts the whole operation with an error
//! naming the offending URL.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use thiserror::Error;
use url::Url;

/// Hard cap on pages processed in one `collect_pages` call, a guard
/// against misbehaving or malicious continuation chains.
pub const MAX_PAGES: usize = 20;

/// Error codes for pagination failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationErrorCode {
    /// PG1001: Continuation fetch returned a non-success status
    FetchFailed = 1001,
    /// PG1002: Continuation page body was not a valid bundle
    MalformedPage = 1002,
    /// PG1003: Continuation fetch could not be performed
    Transport = 1003,
}

impl std::fmt::Display for PaginationErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PG{:04}", *self as u32)
    }
}

/// Errors that abort a pagination walk.
#[derive(Debug, Error)]
pub enum PaginationError {
    /// Continuation fetch returned a non-success status
    #[error("Fetching next page {url} failed with status {status}")]
    FetchFailed { url: String, status: u16 },

    /// Continuation page body could not be parsed as a bundle
    #[error("Next page {url} is not a valid bundle: {message}")]
    MalformedPage { url: String, message: String },

    /// Continuation fetch could not be performed at all
    #[error("Could not fetch next page {url}: {message}")]
    Transport { url: String, message: String },
}

impl PaginationError {
    /// Get the error code for this error
    pub fn code(&self) -> PaginationErrorCode {
        match self {
            PaginationError::FetchFailed { .. } => PaginationErrorCode::FetchFailed,
            PaginationError::MalformedPage { .. } => PaginationErrorCode::MalformedPage,
            PaginationError::Transport { .. } => PaginationErrorCode::Transport,
        }
    }
}

/// Result type for pagination operations
pub type PaginationResult<T> = Result<T, PaginationError>;

/// Raw result of fetching one continuation page.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// HTTP status of the response
    pub status: u16,
    /// Raw response body
    pub body: String,
}

/// Trait for fetching continuation pages.
///
/// Implementations own transport, authentication and any timeout or retry
/// policy; the engine imposes none of its own.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> PaginationResult<FetchedPage>;
}

/// Walk a paged bundle chain and return the flattened entry resources.
///
/// Per page: entries are flattened into the accumulator, then
/// `per_page_hook` is invoked with the page envelope, then the `next`
/// link is consulted. The initial bundle counts as the first page.
pub async fn collect_pages<F>(
    initial: &JsonValue,
    fetcher: &dyn PageFetcher,
    mut per_page_hook: F,
) -> PaginationResult<Vec<JsonValue>>
where
    F: FnMut(&JsonValue),
{
    let mut entries = Vec::new();
    let mut page_count = 1;

    collect_entries(initial, &mut entries);
    per_page_hook(initial);
    let mut next = continuation_url(initial);

    while let Some(url) = next {
        if page_count >= MAX_PAGES {
            tracing::warn!(pages = page_count, "stopping pagination at the page cap");
            break;
        }

        let page = fetcher.fetch(&url).await?;
        if !(200..300).contains(&page.status) {
            return Err(PaginationError::FetchFailed {
                url,
                status: page.status,
            });
        }
        let bundle: JsonValue =
            serde_json::from_str(&page.body).map_err(|e| PaginationError::MalformedPage {
                url: url.clone(),
                message: e.to_string(),
            })?;
        if !bundle.is_object() {
            return Err(PaginationError::MalformedPage {
                url,
                message: "expected a JSON object".to_string(),
            });
        }

        page_count += 1;
        tracing::debug!(page = page_count, "collected continuation page");

        collect_entries(&bundle, &mut entries);
        per_page_hook(&bundle);
        next = continuation_url(&bundle);
    }

    Ok(entries)
}

fn collect_entries(bundle: &JsonValue, entries: &mut Vec<JsonValue>) {
    if let Some(list) = bundle.get("entry").and_then(JsonValue::as_array) {
        for entry in list {
            if let Some(resource) = entry.get("resource")
                && !resource.is_null()
            {
                entries.push(resource.clone());
            }
        }
    }
}

/// Extract the `next` link, discarding links whose URL does not parse.
fn continuation_url(bundle: &JsonValue) -> Option<String> {
    let url = bundle
        .get("link")?
        .as_array()?
        .iter()
        .find(|link| link.get("relation").and_then(JsonValue::as_str) == Some("next"))?
        .get("url")?
        .as_str()?;

    if Url::parse(url).is_err() {
        tracing::warn!(url, "ignoring unparseable continuation link");
        return None;
    }
    Some(url.to_string())
}
