//! Structured error kinds for the crawl core. Call sites that cross into
//! `anyhow::Result` (tool/handler level) convert via `?` /
//! `anyhow::Error::from`, the same boundary drawn elsewhere in this crate
//! between `thiserror` crate-internal errors and `anyhow` at the edges.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("validation: {0}")]
    Validation(String),

    #[error("all seeds blocked by SSRF guard: {0:?}")]
    AllSeedsBlocked(Vec<String>),

    #[error("job not found: {0}")]
    JobNotFound(String),

    #[error("result not found: {0}")]
    ResultNotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Per-URL fetch classification. Transient and permanent fetch failures
/// almost never fail the whole page — the worker records a metric and
/// moves on.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("dns resolution failed for {host}")]
    DnsFailure { host: String },
    #[error("connection refused or timed out: {0}")]
    Transient(String),
    #[error("ssrf blocked: {reason}")]
    SsrfBlocked { reason: String },
    #[error("non-html content-type: {0}")]
    NonHtml(String),
    #[error("no response received")]
    NoResponse,
}
