//! The HTTP fetch capability the orchestrator depends on.
//!
//! Backends are reached through the [`Fetcher`] trait so the retry state
//! machine can be driven by a scripted mock in tests. The real implementation
//! wraps a [`reqwest::Client`] with a persistent cookie jar, optionally
//! seeded from browser session material.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::ResolveError;

/// Errors from a single fetch round trip. All of them are treated upstream as
/// a normal failed attempt that consumes its retry slot.
#[derive(Error, Debug, Clone)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,
    #[error("HTTP {0}")]
    Status(u16),
    #[error("transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Transport(e.to_string())
        }
    }
}

/// A blocking-round-trip page fetch: URL in, response body text out.
pub trait Fetcher: Send + Sync {
    fn fetch<'a>(
        &'a self,
        url: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, FetchError>> + Send + 'a>>;
}

/// Session material for the HTTP client.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub user_agent: String,
    pub referer: String,
    /// Netscape-format cookie file to seed the jar from. When set, a missing
    /// or unreadable file is fatal: the primary backend rejects cookieless
    /// clients and no fallback exists.
    pub cookie_file: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0"
                .into(),
            referer: "https://scholar.google.com".into(),
            cookie_file: None,
        }
    }
}

/// [`Fetcher`] backed by reqwest with a process-scoped cookie jar.
///
/// The jar is acquired once and reused across all attempts of a resolution
/// call. Concurrent resolution calls should not share one `HttpFetcher`
/// without external synchronization when the jar is file-seeded.
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(session: &SessionConfig, timeout: Duration) -> Result<Self, ResolveError> {
        let jar = Arc::new(reqwest::cookie::Jar::default());
        if let Some(ref path) = session.cookie_file {
            seed_jar(&jar, path)?;
        }

        let mut headers = reqwest::header::HeaderMap::new();
        if let Ok(v) = reqwest::header::HeaderValue::from_str(&session.referer) {
            headers.insert(reqwest::header::REFERER, v);
        }

        let client = reqwest::Client::builder()
            .user_agent(session.user_agent.clone())
            .default_headers(headers)
            .cookie_provider(jar)
            .build()
            .map_err(|e| ResolveError::Session(e.to_string()))?;

        Ok(Self { client, timeout })
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

/// Load a Netscape-format cookie file into the jar.
fn seed_jar(jar: &reqwest::cookie::Jar, path: &Path) -> Result<(), ResolveError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ResolveError::Session(format!("cannot read {}: {e}", path.display())))?;

    let mut loaded = 0usize;
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 7 {
            continue;
        }
        let (domain, cookie_path, name, value) = (fields[0], fields[2], fields[5], fields[6]);
        let host = domain.trim_start_matches('.');
        let Ok(url) = format!("https://{host}/").parse::<reqwest::Url>() else {
            continue;
        };
        jar.add_cookie_str(
            &format!("{name}={value}; Domain={domain}; Path={cookie_path}"),
            &url,
        );
        loaded += 1;
    }
    tracing::debug!(count = loaded, path = %path.display(), "seeded cookie jar");
    Ok(())
}

impl Fetcher for HttpFetcher {
    fn fetch<'a>(
        &'a self,
        url: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, FetchError>> + Send + 'a>> {
        Box::pin(async move {
            let resp = self.client.get(url).timeout(self.timeout).send().await?;
            let status = resp.status();
            if !status.is_success() {
                return Err(FetchError::Status(status.as_u16()));
            }
            Ok(resp.text().await?)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_cookie_file_is_fatal() {
        let session = SessionConfig {
            cookie_file: Some(PathBuf::from("/nonexistent/cookies.txt")),
            ..SessionConfig::default()
        };
        let err = HttpFetcher::new(&session, Duration::from_secs(5)).err().unwrap();
        assert!(matches!(err, ResolveError::Session(_)));
    }

    #[test]
    fn no_cookie_file_is_fine() {
        let session = SessionConfig::default();
        assert!(HttpFetcher::new(&session, Duration::from_secs(5)).is_ok());
    }

    #[test]
    fn seed_jar_parses_netscape_lines() {
        let dir = std::env::temp_dir().join(format!("bibscout_jar_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("cookies.txt");
        std::fs::write(
            &path,
            "# Netscape HTTP Cookie File\n\
             .example.com\tTRUE\t/\tFALSE\t2145916800\tGSP\tID=abc123\n\
             malformed line without tabs\n",
        )
        .unwrap();

        let jar = reqwest::cookie::Jar::default();
        assert!(seed_jar(&jar, &path).is_ok());
        let _ = std::fs::remove_file(&path);
    }
}
