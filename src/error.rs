//! Error taxonomy for the scraping engine.

use thiserror::Error;

/// Failure modes for a single source attempt.
///
/// Everything here is recoverable at the session level: the orchestrator
/// absorbs per-source errors by falling back to reference data, and only a
/// `Session` error ever reaches the caller as an `Outcome::Error`.
/// Renderer terminal states (challenge, timeout, cancellation) are not
/// errors at all; they travel as `RenderOutcome` variants.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("fetch failed for {source_name}: {message}")]
    SourceFetch { source_name: String, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("page load failed for {url}: {message}")]
    LoadError { url: String, message: String },

    #[error("extraction script failed: {0}")]
    ExtractionFailed(String),

    #[error("browser engine unavailable: {0}")]
    BrowserUnavailable(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("session error: {0}")]
    Session(String),
}

pub type Result<T> = std::result::Result<T, ScrapeError>;
