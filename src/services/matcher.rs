//! Provider match selection
//!
//! Builds an ordered list of query variants for a guessed title, walks them
//! against the provider (direct fetch first, then scored search), and stops
//! at the first accepted result. All weights are empirically chosen and kept
//! as named constants; do not re-derive them.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use super::omdb::{OmdbClient, OmdbError, OmdbItem, OmdbSearchHit};
use super::text_utils::{one_contains_other, roman_numeral, token_set_similarity};

/// Weight of title similarity in candidate scoring
pub const TITLE_WEIGHT: f64 = 50.0;
/// Bonus for an exact year match
pub const YEAR_EXACT_BONUS: f64 = 30.0;
/// Bonus for a year within one of the query
pub const YEAR_ADJACENT_BONUS: f64 = 15.0;
/// Bonus when the provider media type matches the requested one
pub const TYPE_BONUS: f64 = 10.0;
/// Minimum score a search candidate needs to be accepted
pub const ACCEPT_FLOOR: f64 = 20.0;
/// A direct-fetch hit is rejected when neither title contains the other and
/// similarity falls below this; guards against provider false positives on
/// short queries
pub const MIN_DIRECT_SIMILARITY: f64 = 0.4;

static TRAILING_NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(.*\S)\s+(\d{1,2})$").unwrap());

/// Title pairs the provider indexes under a different regional name
const FRANCHISE_ALIASES: &[(&str, &str)] = &[
    ("sorcerer's stone", "philosopher's stone"),
    ("sorcerers stone", "philosophers stone"),
];

/// Upper-case the first letter of each word. Alias table entries are
/// stored lower-case and get spliced into title-cased queries.
fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// One (title, year) attempt against the provider
#[derive(Debug, Clone, PartialEq)]
pub struct QueryVariant {
    pub title: String,
    pub year: Option<String>,
}

/// Ordered, deduplicated query variants for a guessed title.
pub fn build_query_variants(title: &str, year: Option<&str>) -> Vec<QueryVariant> {
    let title = title.trim();
    let mut titles: Vec<String> = Vec::new();
    let mut push = |t: String| {
        let t = t.trim().to_string();
        if t.len() >= 2 && !titles.contains(&t) {
            titles.push(t);
        }
    };

    push(title.to_string());

    // Trailing arabic numerals often mean roman-numeral sequels
    if let Some(caps) = TRAILING_NUMBER_RE.captures(title) {
        let base = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        let number: u32 = caps
            .get(2)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0);
        if let Some(roman) = roman_numeral(number) {
            push(format!("{} {}", base, roman));
        }
        push(base.to_string());
    }

    if let Some(stripped) = title.strip_prefix("The ").or_else(|| title.strip_prefix("the ")) {
        push(stripped.to_string());
    }

    let lower = title.to_lowercase();
    for (a, b) in FRANCHISE_ALIASES {
        if let Some(pos) = lower.find(a) {
            push(format!(
                "{}{}{}",
                &title[..pos],
                title_case(b),
                &title[pos + a.len()..]
            ));
        }
        if let Some(pos) = lower.find(b) {
            push(format!(
                "{}{}{}",
                &title[..pos],
                title_case(a),
                &title[pos + b.len()..]
            ));
        }
    }

    // Progressively drop trailing words, keeping at least two
    let words: Vec<&str> = title.split_whitespace().collect();
    for take in (2..words.len()).rev() {
        push(words[..take].join(" "));
    }

    let mut variants = Vec::new();
    for (i, t) in titles.iter().enumerate() {
        // title+year comes before title alone, mirroring the original
        // cascade; later variants skip the year to widen the net
        if i == 0 {
            if let Some(year) = year {
                variants.push(QueryVariant {
                    title: t.clone(),
                    year: Some(year.to_string()),
                });
            }
        }
        variants.push(QueryVariant {
            title: t.clone(),
            year: None,
        });
    }
    variants
}

/// Score a search candidate against the query.
pub fn score_candidate(
    query_title: &str,
    query_year: Option<i32>,
    media_type: Option<&str>,
    candidate: &OmdbSearchHit,
) -> f64 {
    let similarity = token_set_similarity(query_title, &candidate.title);
    let mut score = similarity * TITLE_WEIGHT;

    if let (Some(query_year), Some(candidate_year)) = (query_year, candidate.year_number()) {
        if query_year == candidate_year {
            score += YEAR_EXACT_BONUS;
        } else if (query_year - candidate_year).abs() == 1 {
            score += YEAR_ADJACENT_BONUS;
        }
    }

    if let (Some(wanted), Some(actual)) = (media_type, candidate.media_type.as_deref()) {
        if wanted == actual {
            score += TYPE_BONUS;
        }
    }

    score
}

/// Whether a direct-fetch result is plausible for the query.
pub fn direct_fetch_plausible(query_title: &str, result_title: &str) -> bool {
    let similarity = token_set_similarity(query_title, result_title);
    one_contains_other(query_title, result_title) || similarity >= MIN_DIRECT_SIMILARITY
}

pub struct MetadataMatcher {
    client: Arc<OmdbClient>,
}

impl MetadataMatcher {
    pub fn new(client: Arc<OmdbClient>) -> Self {
        Self { client }
    }

    /// Walk the variant cascade for a guessed title. Returns the first
    /// accepted item, or None when every variant exhausts. Upstream errors
    /// are logged and the remaining variants still run.
    pub async fn best_match(
        &self,
        title: &str,
        year: Option<&str>,
        media_type: Option<&str>,
    ) -> Option<OmdbItem> {
        for variant in build_query_variants(title, year) {
            match self
                .try_variant(&variant, media_type)
                .await
            {
                Ok(Some(item)) => {
                    debug!(
                        query = %variant.title,
                        matched = item.title.as_deref().unwrap_or(""),
                        "provider match accepted"
                    );
                    return Some(item);
                }
                Ok(None) => {}
                Err(OmdbError::NotFound) => {}
                Err(OmdbError::Upstream(message)) => {
                    warn!(query = %variant.title, error = %message, "provider lookup failed");
                }
            }
        }
        None
    }

    async fn try_variant(
        &self,
        variant: &QueryVariant,
        media_type: Option<&str>,
    ) -> Result<Option<OmdbItem>, OmdbError> {
        match self
            .client
            .fetch_by_title(&variant.title, variant.year.as_deref(), media_type)
            .await
        {
            Ok(item) => {
                let plausible = item
                    .title
                    .as_deref()
                    .map(|t| direct_fetch_plausible(&variant.title, t))
                    .unwrap_or(false);
                if plausible {
                    return Ok(Some(item));
                }
                debug!(
                    query = %variant.title,
                    got = item.title.as_deref().unwrap_or(""),
                    "direct fetch failed plausibility check"
                );
            }
            Err(OmdbError::NotFound) => {}
            Err(e) => return Err(e),
        }

        // Fall back to search and score each candidate
        let query_year: Option<i32> = variant.year.as_deref().and_then(|y| y.parse().ok());
        let hits = self
            .client
            .search(&variant.title, variant.year.as_deref(), media_type)
            .await?;

        let best = hits
            .iter()
            .map(|hit| {
                (
                    score_candidate(&variant.title, query_year, media_type, hit),
                    hit,
                )
            })
            .max_by(|(a, _), (b, _)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        if let Some((score, hit)) = best {
            if score >= ACCEPT_FLOOR {
                return self.client.fetch_by_id(&hit.imdb_id).await.map(Some);
            }
            debug!(query = %variant.title, score, "best search candidate below floor");
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(title: &str, year: &str, media_type: &str) -> OmdbSearchHit {
        OmdbSearchHit {
            title: title.to_string(),
            year: Some(year.to_string()),
            imdb_id: "tt0000000".to_string(),
            media_type: Some(media_type.to_string()),
        }
    }

    #[test]
    fn test_variants_start_with_title_and_year() {
        let variants = build_query_variants("The Matrix", Some("1999"));
        assert_eq!(variants[0].title, "The Matrix");
        assert_eq!(variants[0].year.as_deref(), Some("1999"));
        assert_eq!(variants[1].title, "The Matrix");
        assert_eq!(variants[1].year, None);
        assert!(variants.iter().any(|v| v.title == "Matrix"));
    }

    #[test]
    fn test_roman_numeral_variant() {
        let variants = build_query_variants("Rocky 2", None);
        assert!(variants.iter().any(|v| v.title == "Rocky II"));
        assert!(variants.iter().any(|v| v.title == "Rocky"));
    }

    #[test]
    fn test_franchise_alias_variant() {
        let variants =
            build_query_variants("Harry Potter and the Sorcerer's Stone", None);
        assert!(
            variants
                .iter()
                .any(|v| v.title == "Harry Potter and the Philosopher's Stone")
        );

        // spliced alias keeps the title-cased register in both directions
        let variants =
            build_query_variants("Harry Potter and the Philosopher's Stone", None);
        assert!(
            variants
                .iter()
                .any(|v| v.title == "Harry Potter and the Sorcerer's Stone")
        );
    }

    #[test]
    fn test_word_shortened_variants_keep_two_words() {
        let variants = build_query_variants("A Very Long Movie Title", None);
        assert!(variants.iter().any(|v| v.title == "A Very Long Movie"));
        assert!(variants.iter().any(|v| v.title == "A Very"));
        assert!(!variants.iter().any(|v| v.title == "A"));
    }

    #[test]
    fn test_variants_deduplicated() {
        let variants = build_query_variants("Alien", None);
        let titles: Vec<&str> = variants.iter().map(|v| v.title.as_str()).collect();
        let mut deduped = titles.clone();
        deduped.dedup();
        assert_eq!(titles, deduped);
    }

    #[test]
    fn test_score_exact_match() {
        let candidate = hit("Alien", "1979", "movie");
        let score = score_candidate("Alien", Some(1979), Some("movie"), &candidate);
        assert_eq!(score, TITLE_WEIGHT + YEAR_EXACT_BONUS + TYPE_BONUS);
    }

    #[test]
    fn test_score_adjacent_year() {
        let candidate = hit("Alien", "1980", "movie");
        let score = score_candidate("Alien", Some(1979), None, &candidate);
        assert_eq!(score, TITLE_WEIGHT + YEAR_ADJACENT_BONUS);
    }

    #[test]
    fn test_score_below_floor_for_unrelated_title() {
        let candidate = hit("Completely Different", "1990", "movie");
        let score = score_candidate("Alien", Some(1979), None, &candidate);
        assert!(score < ACCEPT_FLOOR);
    }

    #[test]
    fn test_direct_fetch_plausibility() {
        assert!(direct_fetch_plausible("The Matrix", "Matrix"));
        assert!(direct_fetch_plausible(
            "Harry Potter and the Sorcerer's Stone",
            "Harry Potter and the Philosopher's Stone"
        ));
        assert!(!direct_fetch_plausible("Alien", "The Notebook"));
    }

    #[test]
    fn test_similarity_is_token_based_not_edit_distance() {
        // a near-miss spelling shares no tokens and must not slip past
        // the plausibility floor or the accept floor
        assert!(!direct_fetch_plausible("Heat", "Heot"));
        let candidate = hit("Heot", "1995", "movie");
        let score = score_candidate("Heat", None, None, &candidate);
        assert_eq!(score, 0.0);
    }
}
