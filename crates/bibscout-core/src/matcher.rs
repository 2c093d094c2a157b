use crate::normalize::normalize_title;
use crate::{Candidate, Match};

/// Select the first acceptable candidate against the normalized head fragment.
///
/// Exact containment of a candidate's normalized title in the head has
/// absolute priority; first in page order wins. Otherwise a candidate is
/// accepted when its substring edit distance to the head, divided by the
/// normalized title length, falls below `accept_ratio`. The ratio form makes
/// short titles require a tighter absolute match than long ones. Returns on
/// the first acceptance rather than searching for a global optimum.
pub fn select_candidate(
    head: &str,
    candidates: &[Candidate],
    accept_ratio: f64,
) -> Option<Match> {
    let head_norm = normalize_title(head);
    for candidate in candidates {
        let title_norm = normalize_title(&candidate.title);
        if title_norm.is_empty() {
            continue;
        }
        if head_norm.contains(&title_norm) {
            tracing::debug!(title = %candidate.title, "exact substring match");
            return Some(Match {
                candidate: candidate.clone(),
                distance_ratio: 0.0,
            });
        }
        let dist = substring_distance(&title_norm, &head_norm);
        let ratio = dist as f64 / title_norm.len() as f64;
        tracing::debug!(title = %candidate.title, dist, ratio, "fuzzy comparison");
        if ratio < accept_ratio {
            return Some(Match {
                candidate: candidate.clone(),
                distance_ratio: ratio,
            });
        }
    }
    None
}

/// Minimum edit distance between `needle` and any substring of `haystack`.
///
/// Semi-global alignment: the needle pays for every character, the haystack
/// gives free skips before and after the aligned region. Both inputs are
/// normalized titles, so the comparison runs over ASCII bytes.
pub fn substring_distance(needle: &str, haystack: &str) -> usize {
    let n = needle.as_bytes();
    let h = haystack.as_bytes();
    if n.is_empty() {
        return 0;
    }
    if h.is_empty() {
        return n.len();
    }

    // prev[i] holds the cost of aligning needle[..i] against a substring of
    // haystack ending at the previous column.
    let mut prev: Vec<usize> = (0..=n.len()).collect();
    let mut cur = vec![0usize; n.len() + 1];
    let mut best = prev[n.len()];

    for &hc in h {
        cur[0] = 0; // alignment may start anywhere in the haystack
        for i in 1..=n.len() {
            let subst = prev[i - 1] + usize::from(n[i - 1] != hc);
            cur[i] = subst.min(prev[i] + 1).min(cur[i - 1] + 1);
        }
        best = best.min(cur[n.len()]);
        std::mem::swap(&mut prev, &mut cur);
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn titled(t: &str) -> Candidate {
        Candidate {
            title: t.to_string(),
            ..Candidate::default()
        }
    }

    #[test]
    fn distance_exact_substring_is_zero() {
        assert_eq!(substring_distance("decision", "causaldecisiontheory"), 0);
    }

    #[test]
    fn distance_counts_substitutions() {
        assert_eq!(substring_distance("decizion", "causaldecisiontheory"), 1);
    }

    #[test]
    fn distance_counts_insertions_and_deletions() {
        assert_eq!(substring_distance("decsion", "causaldecisiontheory"), 1);
        assert_eq!(substring_distance("deccision", "causaldecisiontheory"), 1);
    }

    #[test]
    fn distance_empty_inputs() {
        assert_eq!(substring_distance("", "whatever"), 0);
        assert_eq!(substring_distance("abc", ""), 3);
    }

    #[test]
    fn exact_match_has_priority_and_first_wins() {
        let head = "Causal Decision Theory and the Possibility of Trade, by A. Hájek";
        let cands = vec![
            titled("Causal Decision Theory"),
            titled("The Possibility of Trade"),
        ];
        let m = select_candidate(head, &cands, 0.1).unwrap();
        assert_eq!(m.candidate.title, "Causal Decision Theory");
        assert_eq!(m.distance_ratio, 0.0);
    }

    #[test]
    fn fuzzy_accepts_within_ratio() {
        // Normalized title "abcdefghijkl" (length 12) with one substituted
        // character in the head: 1/12 < 10%
        let m = select_candidate("xxabcdefghiXklxx", &[titled("abcdefghijkl")], 0.1);
        let m = m.unwrap();
        assert!(m.distance_ratio > 0.0 && m.distance_ratio < 0.1);
    }

    #[test]
    fn fuzzy_rejects_short_title_same_absolute_distance() {
        // Length 8 with the same one-character difference: 1/8 = 12.5%
        assert!(select_candidate("xxabcdefXhxx", &[titled("abcdefgh")], 0.1).is_none());
    }

    #[test]
    fn no_candidate_accepted() {
        let head = "completely unrelated heading text about fish farming";
        assert!(
            select_candidate(head, &[titled("Quantum Chromodynamics Review")], 0.1).is_none()
        );
    }

    #[test]
    fn empty_candidate_list() {
        assert!(select_candidate("anything", &[], 0.1).is_none());
    }

    #[test]
    fn candidate_normalizing_to_empty_is_skipped() {
        let cands = vec![titled("!!!"), titled("real title with content here")];
        let head = "a real title with content here and more";
        let m = select_candidate(head, &cands, 0.1).unwrap();
        assert_eq!(m.candidate.title, "real title with content here");
    }

    #[test]
    fn normalization_bridges_diacritics_and_entities() {
        let head = "Über Causal Decision Theory — draft";
        let m = select_candidate(head, &[titled("&#220;ber causal decision theory")], 0.1);
        assert_eq!(m.unwrap().distance_ratio, 0.0);
    }
}
