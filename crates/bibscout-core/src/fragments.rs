use once_cell::sync::Lazy;
use regex::Regex;

/// Heading text lives in roughly the first thousand characters.
const HEAD_SPAN: usize = 1000;

/// Abstracts longer than this are considered runaway captures.
const ABSTRACT_MAX: usize = 1337;
/// Where a runaway abstract is cut before the abridged marker is appended.
const ABSTRACT_CUT: usize = 1234;
const WRAP_WIDTH: usize = 80;

static HEAD_BOUNDARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)^(.*?)(?:abstract|introduction)\n").unwrap());

static ABSTRACT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)(?i:abstract)[:. \n]+([A-Z].{99,3333})\n[0-9 .]*(?i:introduction)").unwrap()
});

static TRAILING_SENTENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^.]+$").unwrap());

static DOI_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)https?://(?:dx\.)?doi\.org/(10\.\d{4,}/[^\s\]>},]+)").unwrap()
});

static DOI_MARKED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bDOI[:\s]+(10\.\d{4,}/\w[^\s]*)").unwrap());

/// Heuristically bounded substrings of the document text.
///
/// Any fragment may be absent; downstream consumers fall back to hint-based
/// queries when it is.
#[derive(Debug, Clone, Default)]
pub struct Fragments {
    /// The heading region, cut at the first section boundary.
    pub head: Option<String>,
    /// The abstract, length-bounded and re-wrapped.
    pub abstract_text: Option<String>,
    /// A DOI embedded in the document text.
    pub doi: Option<String>,
}

/// Derive head, abstract, and embedded-DOI fragments from raw document text.
pub fn extract_fragments(text: &str) -> Fragments {
    Fragments {
        head: extract_head(text),
        abstract_text: extract_abstract(text),
        doi: extract_embedded_doi(text),
    }
}

fn extract_head(text: &str) -> Option<String> {
    if text.is_empty() {
        return None;
    }
    let span: String = text.chars().take(HEAD_SPAN).collect();
    let head = match HEAD_BOUNDARY.captures(&span) {
        Some(caps) => caps.get(1).unwrap().as_str().to_string(),
        None => span,
    };
    Some(head)
}

fn extract_abstract(text: &str) -> Option<String> {
    let caps = ABSTRACT_RE.captures(text)?;
    let mut body = caps
        .get(1)
        .unwrap()
        .as_str()
        .trim_matches([' ', '1', '2', '.'])
        .to_string();

    // The capture is greedy; a runaway match swallowing body text gets cut at
    // the last complete sentence and marked as abridged.
    if body.chars().count() > ABSTRACT_MAX {
        let cut: String = body.chars().take(ABSTRACT_CUT).collect();
        body = TRAILING_SENTENCE.replace(&cut, " [abridged]").to_string();
    }

    Some(wrap(&body.split_whitespace().collect::<Vec<_>>().join(" ")))
}

fn extract_embedded_doi(text: &str) -> Option<String> {
    let raw = DOI_URL_RE
        .captures(text)
        .or_else(|| DOI_MARKED_RE.captures(text))?
        .get(1)
        .unwrap()
        .as_str();
    Some(raw.trim_end_matches(['.', ',', ';', ':']).to_string())
}

/// Greedy word wrap to a fixed column width.
fn wrap(text: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut line = String::new();
    for word in text.split_whitespace() {
        if !line.is_empty() && line.len() + 1 + word.len() > WRAP_WIDTH {
            lines.push(std::mem::take(&mut line));
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(word);
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines.join("\n")
}
