use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Character budget for a generated query.
pub const MAX_QUERY_LEN: usize = 255;
/// How many filtered tokens one query window may draw from.
pub const WINDOW_WIDTH: usize = 99;

/// Common words that carry no search signal.
static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "about", "an", "are", "as", "at", "be", "by", "com", "for", "from", "how", "in", "is",
        "it", "of", "on", "or", "that", "the", "this", "to", "was", "what", "when", "where",
        "who", "will", "with", "www",
    ]
    .into_iter()
    .collect()
});

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[^a-z0-9"]"#).unwrap());
/// Separated LaTeX diacritics survive text extraction as `f" r`-style pairs.
static DIACRITIC_ARTIFACT: Lazy<Regex> = Lazy::new(|| Regex::new(r#" [^ ]+" [^ ]+ "#).unwrap());
static DANGLING_QUOTE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"" "#).unwrap());
/// Name-plus-digit tokens from author affiliation markers (`smith1 jones2`).
static AUTHOR_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-z]+[0-9] ").unwrap());
static HAS_LETTER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-z]").unwrap());
static TWO_VOWELS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[aeiou].*[aeiou]").unwrap());

/// What a query is built from, in order of authority.
#[derive(Debug, Clone, Copy)]
pub enum QuerySource<'a> {
    /// A known identifier; returned verbatim, bypassing tokenization.
    Doi(&'a str),
    /// A known title; wrapped as an exact-phrase query.
    Title(&'a str),
    /// Free document text; tokenized, filtered, and windowed.
    Text(&'a str),
}

/// Build one bounded-length query from `source`.
///
/// `offset` is a zero-based position in filtered-token units. Successive
/// attempts pass increasing offsets so that a wrong disambiguation on one
/// attempt can be corrected by the next using a later window of terms.
pub fn build_query(source: QuerySource<'_>, offset: usize) -> String {
    match source {
        QuerySource::Doi(doi) => doi.to_string(),
        QuerySource::Title(title) => format!("intitle:\"{title}\""),
        QuerySource::Text(text) => windowed_terms(&filter_terms(text), offset),
    }
}

/// Tokenize document text and keep only search-worthy terms.
///
/// A term survives when it is longer than one character, contains a letter,
/// is not a stop word, carries at least two vowels (excluding abbreviations
/// and raw numbers), and has not been selected already.
pub fn filter_terms(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let cleaned = NON_WORD.replace_all(&lowered, " ");
    let cleaned = DIACRITIC_ARTIFACT.replace_all(&cleaned, " ");
    let cleaned = DANGLING_QUOTE.replace_all(&cleaned, " ");
    let cleaned = AUTHOR_MARKER.replace_all(&cleaned, " ");

    let mut seen: HashSet<&str> = HashSet::new();
    let mut terms = Vec::new();
    for word in cleaned.split_whitespace() {
        if word.len() > 1
            && HAS_LETTER.is_match(word)
            && !STOP_WORDS.contains(word)
            && TWO_VOWELS.is_match(word)
            && seen.insert(word)
        {
            terms.push(word.to_string());
        }
    }
    terms
}

/// Concatenate a window of terms under the character budget.
///
/// Takes a [`WINDOW_WIDTH`]-token slice starting at `offset` and joins terms
/// with single spaces; a term that would push past [`MAX_QUERY_LEN`] is
/// dropped whole rather than truncated.
fn windowed_terms(terms: &[String], offset: usize) -> String {
    let mut q = String::new();
    for term in terms.iter().skip(offset).take(WINDOW_WIDTH) {
        let sep = usize::from(!q.is_empty());
        if q.len() + sep + term.len() <= MAX_QUERY_LEN {
            if sep == 1 {
                q.push(' ');
            }
            q.push_str(term);
        }
    }
    q
}
