//! Shared text normalization and comparison utilities
//!
//! Used by the metadata matcher for title similarity and by the organizer
//! for destination-name comparison.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

static NON_ALNUM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9\s]").unwrap());

/// Normalize a title for comparison: lowercase, strip punctuation,
/// collapse whitespace.
pub fn normalize_title(s: &str) -> String {
    let lower = s.to_lowercase();
    NON_ALNUM_RE
        .replace_all(&lower, "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Token-set similarity in [0, 1]: split both strings into lower-cased word
/// sets, return intersection size over union size.
pub fn token_set_similarity(a: &str, b: &str) -> f64 {
    let norm_a = normalize_title(a);
    let norm_b = normalize_title(b);
    let set_a: HashSet<&str> = norm_a.split_whitespace().collect();
    let set_b: HashSet<&str> = norm_b.split_whitespace().collect();

    if set_a.is_empty() && set_b.is_empty() {
        return 1.0;
    }
    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    intersection as f64 / union as f64
}

/// Whether either string contains the other after normalization.
pub fn one_contains_other(a: &str, b: &str) -> bool {
    let na = normalize_title(a);
    let nb = normalize_title(b);
    !na.is_empty() && !nb.is_empty() && (na.contains(&nb) || nb.contains(&na))
}

const ROMAN_NUMERALS: [&str; 10] = ["I", "II", "III", "IV", "V", "VI", "VII", "VIII", "IX", "X"];

/// Roman-numeral form for sequel numbers 1-10.
pub fn roman_numeral(n: u32) -> Option<&'static str> {
    if (1..=10).contains(&n) {
        Some(ROMAN_NUMERALS[(n - 1) as usize])
    } else {
        None
    }
}
