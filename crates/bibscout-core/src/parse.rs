//! Pattern-based parsing of the primary backend's results pages.
//!
//! The upstream page format is quasi-structured, so candidate blocks are
//! located by markup anchors and scanned with bounded patterns rather than a
//! full document-model parse. Everything brittle about the page format is
//! isolated behind this module: HTML text in, candidates out.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::Candidate;

static NO_HITS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"did not match any articles|Sorry, no information is available for").unwrap()
});
static SINGLE_HIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Showing web page information for").unwrap());
static HIT_COUNT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:About |>)([0-9,]+) results?").unwrap());
static CHALLENGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"We're sorry|please type the characters").unwrap());

static BLOCK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?s)<h3 class="gs_rt">.*?</div></div>"#).unwrap());
static MARKUP_NOISE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"</?b>|<font [^>]*>\[[^\]]+\]</font>|&nbsp;|<br>").unwrap());
// The prefix admits only the known decoration forms; an unconstrained skip
// here would let a tag fragment pass as the title of a text-free heading.
static TITLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"<h3[^>]*>(?:<span [^>]*>.*?</span> )?(?:<a href="([^"]+)"[^>]*>)?([^<]+)(?:</a>)?</h3>"#,
    )
    .unwrap()
});
static CITATIONS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r">Cited by ([0-9]+)<").unwrap());
static CITED_BY_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#" href="/scholar\?[^"]*cites=([0-9]+)"#).unwrap());
static DESCRIPTOR_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?s)<div class="gs_a">(.*?)</div>"#).unwrap());
static DESCRIPTOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<authors>.*?)(?: - (?:(?P<venue>.*?), (?P<year>(?:19|20)[0-9]{2})|(?P<bareyear>(?:19|20)[0-9]{2})|(?P<barevenue>.*?)))? - (?P<publisher>.*)$",
    )
    .unwrap()
});
static CACHED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"q=cache:([^+"]+)[^"]*">View as HTML</a>"#).unwrap());
static EXPORT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"href="(/scholar\.[^"]+)"[^>]*>Import into "#).unwrap());
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^<]+?>").unwrap());

/// Number of hits a results page reports.
///
/// `Some(0)` for an explicit no-results marker, `None` when no recognizable
/// marker region is present (a malformed page, treated upstream as a failed
/// attempt).
pub fn hit_count(html: &str) -> Option<u64> {
    if NO_HITS_RE.is_match(html) {
        return Some(0);
    }
    if let Some(caps) = HIT_COUNT_RE.captures(html) {
        let digits = caps.get(1).unwrap().as_str().replace(',', "");
        return digits.parse().ok();
    }
    if SINGLE_HIT_RE.is_match(html) {
        return Some(1);
    }
    None
}

/// Whether the response is a known defensive-challenge page.
pub fn is_challenge(html: &str) -> bool {
    CHALLENGE_RE.is_match(html)
}

/// Extract candidates from a results page, in page order.
///
/// `origin` is the primary backend's scheme+host, used to absolutize the
/// cached-page and export links. Blocks lacking a parseable title are
/// skipped, never an error.
pub fn parse_candidates(html: &str, origin: &str) -> Vec<Candidate> {
    BLOCK_RE
        .find_iter(html)
        .filter_map(|m| parse_block(m.as_str(), origin))
        .collect()
}

fn parse_block(block: &str, origin: &str) -> Option<Candidate> {
    let block = MARKUP_NOISE_RE.replace_all(block, "");
    let block = block.replace("&hellip;", "...").replace("&amp;", "&");

    let title_caps = TITLE_RE.captures(&block)?;
    let title = title_caps.get(2).unwrap().as_str().trim().to_string();
    if title.is_empty() {
        return None;
    }

    let mut candidate = Candidate {
        title,
        url: title_caps.get(1).map(|m| m.as_str().to_string()),
        ..Candidate::default()
    };

    if let Some(caps) = CITATIONS_RE.captures(&block) {
        candidate.citations = caps.get(1).unwrap().as_str().parse().ok();
    }
    if let Some(caps) = CITED_BY_ID_RE.captures(&block) {
        candidate.cited_by_id = Some(caps.get(1).unwrap().as_str().to_string());
    }
    if let Some(caps) = DESCRIPTOR_LINE_RE.captures(&block) {
        parse_descriptor(caps.get(1).unwrap().as_str(), &mut candidate);
    }
    if let Some(caps) = CACHED_RE.captures(&block) {
        candidate.cached_url = Some(format!(
            "{origin}/scholar?q=cache:{}",
            caps.get(1).unwrap().as_str()
        ));
    }
    if let Some(caps) = EXPORT_RE.captures(&block) {
        candidate.export_url = Some(format!("{origin}{}", caps.get(1).unwrap().as_str()));
    }

    Some(candidate)
}

/// Decompose the "authors - venue, year - publisher" descriptor line.
fn parse_descriptor(line: &str, candidate: &mut Candidate) {
    let Some(caps) = DESCRIPTOR_RE.captures(line) else {
        return;
    };
    if let Some(authors) = caps.name("authors") {
        let cleaned = TAG_RE.replace_all(authors.as_str(), "").trim().to_string();
        if !cleaned.is_empty() {
            candidate.authors = Some(cleaned);
        }
    }
    if let Some(venue) = caps.name("venue").or_else(|| caps.name("barevenue")) {
        let venue = venue.as_str().trim();
        if !venue.is_empty() {
            candidate.venue = Some(venue.to_string());
        }
    }
    if let Some(year) = caps.name("year").or_else(|| caps.name("bareyear")) {
        candidate.year = year.as_str().parse().ok();
    }
    if let Some(publisher) = caps.name("publisher") {
        candidate.publisher = Some(publisher.as_str().trim().to_string());
    }
}

/// One ranked hit from the secondary web-search backend.
#[derive(Debug, Clone, Deserialize)]
pub struct WebHit {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct WebSearchResponse {
    results: Vec<WebHit>,
}

/// Parse the secondary backend's JSON payload into ranked web hits.
///
/// A malformed payload yields an empty list, which the orchestrator treats
/// the same as "no results".
pub fn parse_web_results(body: &str) -> Vec<WebHit> {
    serde_json::from_str::<WebSearchResponse>(body)
        .map(|r| r.results)
        .unwrap_or_default()
}
