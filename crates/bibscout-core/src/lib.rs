use thiserror::Error;

pub mod assembler;
pub mod config_file;
pub mod fetch;
pub mod fragments;
pub mod matcher;
pub mod normalize;
pub mod orchestrator;
pub mod parse;
pub mod query;

// Re-export for convenience
pub use assembler::{AssemblyContext, assemble_record};
pub use fetch::{FetchError, Fetcher, HttpFetcher, SessionConfig};
pub use fragments::{Fragments, extract_fragments};
pub use normalize::normalize_title;
pub use orchestrator::{Resolver, resolve};

/// The document whose bibliographic metadata should be resolved.
///
/// Produced by the caller before resolution begins; text extraction from the
/// underlying file happens upstream. At least one of `text`, `title_hint`,
/// `doi_hint` must be present.
#[derive(Debug, Clone, Default)]
pub struct DocumentContext {
    /// Raw text already extracted from the document, if any.
    pub text: Option<String>,
    /// A known title, used as an exact-phrase query.
    pub title_hint: Option<String>,
    /// A known DOI, used verbatim as the query.
    pub doi_hint: Option<String>,
    /// Path-like reference to the source file (for record provenance only).
    pub file_ref: Option<String>,
}

impl DocumentContext {
    /// Validate that resolution can proceed: at least one of raw text, title
    /// hint, or DOI hint must be present.
    pub fn validate(&self) -> Result<(), ResolveError> {
        if self.text.is_none() && self.title_hint.is_none() && self.doi_hint.is_none() {
            return Err(ResolveError::EmptyContext);
        }
        Ok(())
    }
}

/// One parsed search result describing a possibly-matching publication.
///
/// A results page yields zero or more candidates; their order reflects the
/// backend's own ranking and is preserved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Candidate {
    /// Always non-empty; blocks without a parseable title yield no candidate.
    pub title: String,
    pub url: Option<String>,
    pub authors: Option<String>,
    pub venue: Option<String>,
    pub year: Option<u16>,
    pub publisher: Option<String>,
    pub citations: Option<u32>,
    /// Backend-internal identifier of the "cited by" result set.
    pub cited_by_id: Option<String>,
    /// "View cached page" link.
    pub cached_url: Option<String>,
    /// "Import citation" link yielding the exportable bibliographic text.
    pub export_url: Option<String>,
}

/// An accepted candidate plus the normalized-distance ratio that justified it.
///
/// Exact substring matches carry a ratio of 0.0.
#[derive(Debug, Clone)]
pub struct Match {
    pub candidate: Candidate,
    pub distance_ratio: f64,
}

/// The final output: exported bibliographic text with appended derived fields.
#[derive(Debug, Clone)]
pub struct ResolvedRecord {
    pub text: String,
    pub candidate: Candidate,
    /// Number of queries issued before the match was accepted.
    pub queries_issued: usize,
}

/// Outcome of one resolution call.
#[derive(Debug, Clone)]
pub enum Resolution {
    Resolved(ResolvedRecord),
    /// No candidate was accepted within the retry budget. Carries the trail of
    /// attempted queries and hit counts for diagnostics.
    Unresolved { trail: Vec<String> },
}

/// Progress events emitted during resolution via the injected callback.
#[derive(Debug, Clone)]
pub enum ResolveEvent {
    QueryIssued {
        number: usize,
        query: String,
    },
    QuerySkipped {
        number: usize,
        query: String,
    },
    HitCount {
        primary_attempt: u32,
        fallback_attempt: u32,
        hits: Option<u64>,
    },
    /// The secondary web-search backend refined the query to this URL.
    WebSearchRefined {
        url: String,
    },
    WebSearchEmpty,
    NoMatch {
        candidates: usize,
        hits: u64,
    },
    /// A defensive challenge was detected; the caller may open `url` manually.
    ChallengeDetected {
        url: String,
    },
    FetchFailed {
        url: String,
        message: String,
    },
}

/// Tuning parameters for one resolution call.
#[derive(Debug, Clone)]
pub struct Config {
    /// Primary scholarly-search endpoint; the query is appended as `?q=`.
    pub primary_url: String,
    /// Secondary general web-search endpoint (SearxNG-compatible JSON API),
    /// used to refine the query once the primary budget is exhausted.
    pub websearch_url: String,
    pub primary_tries: u32,
    pub fallback_tries: u32,
    /// Edit-distance acceptance bound as a fraction of the candidate title's
    /// normalized length.
    pub accept_ratio: f64,
    /// How many filtered tokens the query window advances per attempt.
    pub window_step: usize,
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            primary_url: "https://scholar.google.com/scholar".into(),
            websearch_url: "http://localhost:8080/search".into(),
            primary_tries: 3,
            fallback_tries: 2,
            accept_ratio: 0.1,
            window_step: 64,
            timeout_secs: 10,
        }
    }
}

#[derive(Error, Debug)]
pub enum ResolveError {
    /// None of raw text, title hint, or DOI hint was provided.
    #[error("nothing to resolve: no text, title, or DOI given")]
    EmptyContext,
    /// The backend served a defensive challenge; automatic retry is forbidden.
    #[error("defensive challenge detected at {url}")]
    ChallengeDetected { url: String },
    /// Required browser-session material could not be loaded.
    #[error("session setup failed: {0}")]
    Session(String),
    /// The export fetch for an accepted candidate failed.
    #[error("export fetch failed: {0}")]
    Export(#[from] FetchError),
    /// The accepted candidate carries no export link to fetch.
    #[error("candidate has no export link")]
    MissingExportLink,
}
