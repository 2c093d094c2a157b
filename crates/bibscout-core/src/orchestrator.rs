//! The retry/fallback state machine driving one resolution call.
//!
//! One invocation owns its retry counters, runs strictly sequential backend
//! round trips, and terminates within the combined primary and fallback
//! budgets regardless of backend behavior.

use crate::assembler::{AssemblyContext, assemble_record};
use crate::fetch::Fetcher;
use crate::fragments::{Fragments, extract_fragments};
use crate::matcher::select_candidate;
use crate::parse;
use crate::query::{QuerySource, build_query};
use crate::{Config, DocumentContext, Match, Resolution, ResolveError, ResolveEvent};

/// Queries shorter than this are skipped without a network round trip.
const MIN_QUERY_LEN: usize = 3;

/// Mutable counters owned by one resolution call.
#[derive(Debug, Default)]
struct RetryState {
    primary_used: u32,
    fallback_used: u32,
    queries_issued: usize,
    trail: Vec<String>,
}

enum State {
    TryPrimary,
    TryFallback,
    Matched(Match),
    Exhausted,
}

/// Drives resolution for one document at a time.
pub struct Resolver<'a> {
    config: Config,
    fetcher: &'a dyn Fetcher,
    on_event: Box<dyn Fn(ResolveEvent) + Send + Sync + 'a>,
}

impl<'a> Resolver<'a> {
    pub fn new(config: Config, fetcher: &'a dyn Fetcher) -> Self {
        Self {
            config,
            fetcher,
            on_event: Box::new(|_| {}),
        }
    }

    /// Install a progress callback; replaces process-wide logging so callers
    /// decide what to do with the diagnostic stream.
    pub fn with_event_handler(
        mut self,
        handler: impl Fn(ResolveEvent) + Send + Sync + 'a,
    ) -> Self {
        self.on_event = Box::new(handler);
        self
    }

    /// Resolve one document: run the state machine to completion, then
    /// assemble the record for an accepted candidate.
    ///
    /// `extras` carries caller-supplied provenance (checksum, timestamp,
    /// inode); fragment-derived fields are filled in here before assembly.
    pub async fn resolve(
        &self,
        ctx: &DocumentContext,
        extras: &AssemblyContext,
    ) -> Result<Resolution, ResolveError> {
        ctx.validate()?;

        let fragments = ctx
            .text
            .as_deref()
            .map(extract_fragments)
            .unwrap_or_default();
        let mut state = RetryState::default();

        let outcome = self.run_machine(ctx, &fragments, &mut state).await?;

        match outcome {
            State::Matched(m) => {
                tracing::info!(title = %m.candidate.title, ratio = m.distance_ratio, "match accepted");
                let actx = AssemblyContext {
                    file_ref: ctx.file_ref.clone(),
                    doi: ctx.doi_hint.clone().or_else(|| fragments.doi.clone()),
                    abstract_text: fragments.abstract_text.clone(),
                    queries_issued: state.queries_issued,
                    ..extras.clone()
                };
                let record = match assemble_record(&m.candidate, &actx, self.fetcher).await {
                    Ok(record) => record,
                    Err(ResolveError::ChallengeDetected { url }) => {
                        tracing::warn!("defensive challenge detected on export fetch");
                        (self.on_event)(ResolveEvent::ChallengeDetected { url: url.clone() });
                        return Err(ResolveError::ChallengeDetected { url });
                    }
                    Err(e) => return Err(e),
                };
                Ok(Resolution::Resolved(record))
            }
            _ => {
                tracing::info!(
                    queries = state.queries_issued,
                    "no matching result, giving up"
                );
                Ok(Resolution::Unresolved { trail: state.trail })
            }
        }
    }

    async fn run_machine(
        &self,
        ctx: &DocumentContext,
        fragments: &Fragments,
        state: &mut RetryState,
    ) -> Result<State, ResolveError> {
        let mut current = State::TryPrimary;
        loop {
            current = match current {
                State::TryPrimary => {
                    if state.primary_used >= self.config.primary_tries {
                        State::TryFallback
                    } else {
                        let offset =
                            state.primary_used as usize * self.config.window_step;
                        state.primary_used += 1;
                        match self.primary_attempt(ctx, fragments, offset, state).await? {
                            Some(m) => State::Matched(m),
                            None => State::TryPrimary,
                        }
                    }
                }
                State::TryFallback => {
                    if state.fallback_used >= self.config.fallback_tries {
                        State::Exhausted
                    } else {
                        let offset =
                            state.fallback_used as usize * self.config.window_step;
                        state.fallback_used += 1;
                        match self.fallback_attempt(ctx, fragments, offset, state).await? {
                            Some(m) => State::Matched(m),
                            None => State::TryFallback,
                        }
                    }
                }
                terminal => return Ok(terminal),
            };
        }
    }

    /// One primary-backend attempt: build a query, fetch, parse, match.
    async fn primary_attempt(
        &self,
        ctx: &DocumentContext,
        fragments: &Fragments,
        offset: usize,
        state: &mut RetryState,
    ) -> Result<Option<Match>, ResolveError> {
        let Some(query) = self.next_query(ctx, fragments, offset, state) else {
            return Ok(None);
        };
        self.evaluate_on_primary(&query, ctx, fragments, state).await
    }

    /// One fallback attempt: refine the query through the secondary web-search
    /// backend, then evaluate the refined term on the primary backend.
    async fn fallback_attempt(
        &self,
        ctx: &DocumentContext,
        fragments: &Fragments,
        offset: usize,
        state: &mut RetryState,
    ) -> Result<Option<Match>, ResolveError> {
        let Some(query) = self.next_query(ctx, fragments, offset, state) else {
            return Ok(None);
        };

        let url = format!(
            "{}?q={}&format=json",
            self.config.websearch_url,
            urlencoding::encode(&query)
        );
        let body = match self.fetcher.fetch(&url).await {
            Ok(body) => body,
            Err(e) => {
                state.trail.push(format!("web search failed: {e}"));
                (self.on_event)(ResolveEvent::FetchFailed {
                    url,
                    message: e.to_string(),
                });
                return Ok(None);
            }
        };

        let hits = parse::parse_web_results(&body);
        let Some(top) = hits.first() else {
            state.trail.push("web search: no result".into());
            (self.on_event)(ResolveEvent::WebSearchEmpty);
            return Ok(None);
        };

        let refined = urlencoding::decode(&top.url)
            .map(|s| s.into_owned())
            .unwrap_or_else(|_| top.url.clone());
        state.trail.push(format!("web search result: {refined}"));
        (self.on_event)(ResolveEvent::WebSearchRefined {
            url: refined.clone(),
        });

        self.evaluate_on_primary(&refined, ctx, fragments, state).await
    }

    /// Build the next query, honoring source precedence and the minimum
    /// length rule. A too-short query consumes its attempt slot but no
    /// network round trip, which guarantees eventual termination.
    fn next_query(
        &self,
        ctx: &DocumentContext,
        fragments: &Fragments,
        offset: usize,
        state: &mut RetryState,
    ) -> Option<String> {
        let doi = ctx.doi_hint.as_deref().or(fragments.doi.as_deref());
        let source = if let Some(doi) = doi {
            QuerySource::Doi(doi)
        } else if let Some(title) = ctx.title_hint.as_deref() {
            QuerySource::Title(title)
        } else {
            QuerySource::Text(ctx.text.as_deref().unwrap_or_default())
        };

        let query = build_query(source, offset);
        state.queries_issued += 1;
        let number = state.queries_issued;

        if query.len() < MIN_QUERY_LEN {
            state
                .trail
                .push(format!("skipping too short query: {query}"));
            tracing::debug!(number, "skipping too short query");
            (self.on_event)(ResolveEvent::QuerySkipped { number, query });
            return None;
        }

        state.trail.push(format!("query {number}: {query}"));
        tracing::debug!(number, %query, "query built");
        (self.on_event)(ResolveEvent::QueryIssued {
            number,
            query: query.clone(),
        });
        Some(query)
    }

    /// Submit a query to the primary backend and evaluate the results page.
    async fn evaluate_on_primary(
        &self,
        query: &str,
        ctx: &DocumentContext,
        fragments: &Fragments,
        state: &mut RetryState,
    ) -> Result<Option<Match>, ResolveError> {
        let url = format!(
            "{}?q={}",
            self.config.primary_url,
            urlencoding::encode(query)
        );
        let body = match self.fetcher.fetch(&url).await {
            Ok(body) => body,
            Err(e) => {
                state.trail.push(format!("fetch failed: {e}"));
                (self.on_event)(ResolveEvent::FetchFailed {
                    url,
                    message: e.to_string(),
                });
                return Ok(None);
            }
        };

        // A challenge page means the backend is blocking automated access.
        // Retrying would amplify the trigger, so surface it and stop.
        if parse::is_challenge(&body) {
            tracing::warn!("defensive challenge detected");
            (self.on_event)(ResolveEvent::ChallengeDetected { url: url.clone() });
            return Err(ResolveError::ChallengeDetected { url });
        }

        let hits = parse::hit_count(&body);
        state.trail.push(format!(
            "result {}+{} hits: {}",
            state.primary_used,
            state.fallback_used,
            hits.map_or_else(|| "?".into(), |h| h.to_string())
        ));
        (self.on_event)(ResolveEvent::HitCount {
            primary_attempt: state.primary_used,
            fallback_attempt: state.fallback_used,
            hits,
        });

        let Some(hits) = hits.filter(|&h| h > 0) else {
            return Ok(None);
        };

        let origin = origin_of(&self.config.primary_url);
        let candidates = parse::parse_candidates(&body, origin);
        state
            .trail
            .push(format!("retrieved {} of {hits} entries", candidates.len()));

        // Without raw text there is nothing to match against; the backend's
        // top-ranked candidate is taken as authoritative.
        let selected = match fragments.head.as_deref() {
            None if ctx.text.is_none() => candidates.first().map(|c| Match {
                candidate: c.clone(),
                distance_ratio: 0.0,
            }),
            None => None,
            Some(head) => select_candidate(head, &candidates, self.config.accept_ratio),
        };

        if selected.is_none() {
            state.trail.push(format!(
                "no match in {} entries (of {hits})",
                candidates.len()
            ));
            (self.on_event)(ResolveEvent::NoMatch {
                candidates: candidates.len(),
                hits,
            });
        }
        Ok(selected)
    }
}

/// Scheme and host of a backend URL, for absolutizing parsed links.
fn origin_of(url: &str) -> &str {
    match url.find("://") {
        Some(scheme_end) => match url[scheme_end + 3..].find('/') {
            Some(path_start) => &url[..scheme_end + 3 + path_start],
            None => url,
        },
        None => url,
    }
}

/// Convenience wrapper: build a [`Resolver`] and run one resolution.
pub async fn resolve(
    ctx: &DocumentContext,
    extras: &AssemblyContext,
    config: Config,
    fetcher: &dyn Fetcher,
) -> Result<Resolution, ResolveError> {
    Resolver::new(config, fetcher).resolve(ctx, extras).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_strips_path() {
        assert_eq!(
            origin_of("https://scholar.google.com/scholar"),
            "https://scholar.google.com"
        );
        assert_eq!(origin_of("http://localhost:8080"), "http://localhost:8080");
        assert_eq!(origin_of("not a url"), "not a url");
    }
}
