use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use unicode_normalization::UnicodeNormalization;

/// Matches both numeric (`&#233;`, `&#xE9;`) and named (`&amp;`) references.
static CHAR_REF: Lazy<Regex> = Lazy::new(|| Regex::new(r"&#?\w+;").unwrap());

static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-zA-Z0-9]").unwrap());

fn named_entity(name: &str) -> Option<&'static str> {
    Some(match name {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        "nbsp" => " ",
        "hellip" => "...",
        "ndash" | "mdash" => "-",
        _ => return None,
    })
}

/// Resolve HTML character references in `text`, leaving unknown ones as-is.
pub fn unescape_entities(text: &str) -> String {
    CHAR_REF
        .replace_all(text, |caps: &Captures| {
            let m = caps.get(0).unwrap().as_str();
            let inner = &m[1..m.len() - 1];
            if let Some(digits) = inner.strip_prefix("#x").or_else(|| inner.strip_prefix("#X")) {
                if let Some(c) = u32::from_str_radix(digits, 16).ok().and_then(char::from_u32) {
                    return c.to_string();
                }
            } else if let Some(digits) = inner.strip_prefix('#') {
                if let Some(c) = digits.parse::<u32>().ok().and_then(char::from_u32) {
                    return c.to_string();
                }
            } else if let Some(s) = named_entity(inner) {
                return s.to_string();
            }
            m.to_string()
        })
        .to_string()
}

/// Fold a title to its comparable canonical form.
///
/// Character references are resolved, diacritics are folded to their base
/// letter via NFKD decomposition, and everything outside `[a-z0-9]` is
/// dropped. Idempotent: normalizing a normalized string is a no-op. Candidate
/// titles and the document head fragment both go through this so the two
/// sides of a comparison live in the same space.
pub fn normalize_title(title: &str) -> String {
    let unescaped = unescape_entities(title);
    let ascii: String = unescaped.nfkd().filter(|c| c.is_ascii()).collect();
    NON_ALNUM.replace_all(&ascii, "").to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic() {
        assert_eq!(normalize_title("Hello, World! 123"), "helloworld123");
    }

    #[test]
    fn named_entities() {
        assert_eq!(normalize_title("Foo &amp; Bar"), "foobar");
        assert_eq!(normalize_title("a&nbsp;b"), "ab");
    }

    #[test]
    fn numeric_entities() {
        // &#233; is é, &#xE9; the hex spelling of the same
        assert_eq!(normalize_title("caf&#233;"), "cafe");
        assert_eq!(normalize_title("caf&#xE9;"), "cafe");
    }

    #[test]
    fn unknown_entity_left_alone() {
        // The unresolvable reference survives unescaping; its word chars remain
        assert_eq!(unescape_entities("&bogus;"), "&bogus;");
        assert_eq!(normalize_title("&bogus;"), "bogus");
    }

    #[test]
    fn diacritics_folded() {
        assert_eq!(normalize_title("résumé"), "resume");
        assert_eq!(normalize_title("Gödel, Escher, Bach"), "godelescherbach");
    }

    #[test]
    fn idempotent() {
        for s in [
            "Causal Decision Theory and the Possibility of Trade",
            "résumé &amp; caf&#233;",
            "",
            "already1normalized2",
        ] {
            let once = normalize_title(s);
            assert_eq!(normalize_title(&once), once);
        }
    }

    #[test]
    fn empty() {
        assert_eq!(normalize_title(""), "");
        assert_eq!(normalize_title("!!!"), "");
    }
}
