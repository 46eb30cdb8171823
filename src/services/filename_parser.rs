//! Filename heuristics for messy media names
//!
//! Parses titles/years out of release-style movie filenames and
//! show/season/episode numbers out of episode filenames:
//! - "The.Matrix.1999.1080p.BluRay.x264-GROUP.mkv"
//! - "Breaking Bad S01E02 REPACK 720p.mkv"
//! - "Show [1.02].mkv"
//!
//! Everything here is deterministic and does no I/O. Season/episode
//! extraction is an explicit ordered cascade of (pattern, extractor) pairs;
//! the first matching pattern wins, there is no scoring.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Release-tag vocabulary stripped from titles before year detection.
/// Resolution, source, codec, audio, language, and scene tokens.
const RELEASE_TAGS: &[&str] = &[
    "2160p", "1080p", "720p", "480p", "4k", "uhd", "hd", "bluray", "blu-ray", "bdrip", "brrip",
    "dvdrip", "dvd", "webrip", "web-dl", "webdl", "web", "hdtv", "hdrip", "remux", "x264", "x265",
    "h264", "h265", "h 264", "h 265", "hevc", "avc", "av1", "xvid", "divx", "aac", "ac3", "eac3",
    "dts", "dd5", "ddp5", "atmos", "truehd", "10bit", "8bit", "hdr", "hdr10", "dolby", "vision",
    "proper", "repack", "extended", "unrated", "limited", "internal", "multi", "dual", "subbed",
    "dubbed", "yify", "yts", "rarbg", "amzn", "nf", "vostfr",
];

static RELEASE_TAGS_RE: Lazy<Regex> = Lazy::new(|| {
    let escaped: Vec<String> = RELEASE_TAGS.iter().map(|t| regex::escape(t)).collect();
    Regex::new(&format!(r"(?i)\b(?:{})\b", escaped.join("|"))).unwrap()
});

static BRACKETED_YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\(\[]((?:19|20)\d{2})[\)\]]").unwrap());

static YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[\s\.\-_\(\[])((?:19|20)\d{2})(?:[\s\.\-_\)\]]|$)").unwrap());

static EMPTY_BRACKETS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(\s*\)|\[\s*\]").unwrap());

static SPACES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

// Season/episode patterns, most specific first.

static SXXEYY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bs(\d{1,2})[ \._\-]*e(\d{1,3})\b").unwrap());

static NXNN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{1,2})[xX](\d{2,3})\b").unwrap());

static EPISODE_ONLY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\be(?:p(?:isode)?)?[ \._\-]*(\d{1,3})\b").unwrap());

static VERBOSE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bseason[ \._\-]*(\d{1,2})\b.*?\bepisode[ \._\-]*(\d{1,3})\b").unwrap()
});

static BRACKET_PAIR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\(\[](\d{1,2})\.(\d{1,3})[\)\]]").unwrap());

static BARE_SEE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{3,4})\b").unwrap());

static BARE_NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{1,3})\b").unwrap());

type Extractor = fn(&Captures) -> (Option<u32>, Option<u32>);

struct EpisodePattern {
    regex: &'static Lazy<Regex>,
    extract: Extractor,
    /// "Episode 12" alone leaves the season unknown; when the verbose
    /// "Season 1 Episode 12" form is present, the later pattern supplies
    /// both numbers instead.
    skip_when_season_word: bool,
}

fn cap_u32(caps: &Captures, i: usize) -> Option<u32> {
    caps.get(i).and_then(|m| m.as_str().parse().ok())
}

fn extract_pair(caps: &Captures) -> (Option<u32>, Option<u32>) {
    (cap_u32(caps, 1), cap_u32(caps, 2))
}

fn extract_episode(caps: &Captures) -> (Option<u32>, Option<u32>) {
    (None, cap_u32(caps, 1))
}

fn extract_bare_see(caps: &Captures) -> (Option<u32>, Option<u32>) {
    let n: u32 = match caps.get(1).and_then(|m| m.as_str().parse().ok()) {
        Some(n) => n,
        None => return (None, None),
    };
    // 1976 is a year, not S19E76
    if (1900..=2099).contains(&n) {
        return (None, None);
    }
    let (season, episode) = (n / 100, n % 100);
    if season >= 1 && season < 50 && episode >= 1 {
        (Some(season), Some(episode))
    } else {
        (None, None)
    }
}

static SEASON_EPISODE_CASCADE: &[EpisodePattern] = &[
    EpisodePattern {
        regex: &SXXEYY_RE,
        extract: extract_pair,
        skip_when_season_word: false,
    },
    EpisodePattern {
        regex: &NXNN_RE,
        extract: extract_pair,
        skip_when_season_word: false,
    },
    EpisodePattern {
        regex: &EPISODE_ONLY_RE,
        extract: extract_episode,
        skip_when_season_word: true,
    },
    EpisodePattern {
        regex: &VERBOSE_RE,
        extract: extract_pair,
        skip_when_season_word: false,
    },
    EpisodePattern {
        regex: &BRACKET_PAIR_RE,
        extract: extract_pair,
        skip_when_season_word: false,
    },
    EpisodePattern {
        regex: &BARE_SEE_RE,
        extract: extract_bare_see,
        skip_when_season_word: false,
    },
];

/// Extract (season, episode) from a filename. First matching pattern in the
/// cascade wins; either number may be unknown.
pub fn parse_season_episode(filename: &str) -> (Option<u32>, Option<u32>) {
    let name = strip_extension(filename);
    let has_season_word = name.to_lowercase().contains("season");

    for pattern in SEASON_EPISODE_CASCADE {
        if pattern.skip_when_season_word && has_season_word {
            continue;
        }
        if let Some(caps) = pattern.regex.captures(name) {
            let (season, episode) = (pattern.extract)(&caps);
            if season.is_some() || episode.is_some() {
                return (season, episode);
            }
        }
    }
    (None, None)
}

/// Episode extraction for contexts where the season is already known from
/// the folder (e.g. files under "Season 2"). Falls back to a bare number
/// between 1 and 300.
pub fn parse_episode_only(filename: &str) -> Option<u32> {
    let name = strip_extension(filename);

    if let Some(caps) = SXXEYY_RE.captures(name) {
        if let Some(ep) = cap_u32(&caps, 2) {
            return Some(ep);
        }
    }
    if let Some(caps) = EPISODE_ONLY_RE.captures(name) {
        if let Some(ep) = cap_u32(&caps, 1) {
            return Some(ep);
        }
    }
    if let Some(caps) = NXNN_RE.captures(name) {
        if let Some(ep) = cap_u32(&caps, 2) {
            return Some(ep);
        }
    }
    if let Some(caps) = BARE_NUMBER_RE.captures(name) {
        if let Some(n) = cap_u32(&caps, 1) {
            if (1..=300).contains(&n) {
                return Some(n);
            }
        }
    }
    None
}

/// Byte offset of the first episode marker in the name, if any. Used to
/// truncate show filenames before movie-title guessing.
fn episode_marker_position(name: &str) -> Option<usize> {
    let mut best: Option<usize> = None;
    for regex in [&*SXXEYY_RE, &*NXNN_RE, &*VERBOSE_RE, &*BRACKET_PAIR_RE] {
        if let Some(m) = regex.find(name) {
            best = Some(best.map_or(m.start(), |b| b.min(m.start())));
        }
    }
    best
}

/// Guess (title, year) from a movie-style filename.
///
/// The string is truncated at any episode marker first so a stray show file
/// is not misread as a movie title; separators are normalized, the release
/// vocabulary stripped, and the title taken as everything before the year.
pub fn guess_title_year(filename: &str) -> (String, Option<String>) {
    let stem = strip_extension(filename);

    let truncated = match episode_marker_position(stem) {
        Some(0) => stem,
        Some(pos) => &stem[..pos],
        None => stem,
    };

    let spaced = truncated.replace(['.', '_'], " ");
    let cleaned = RELEASE_TAGS_RE.replace_all(&spaced, " ").to_string();

    // Prefer a bracketed year, then the first separator-bounded one.
    let year_match = BRACKETED_YEAR_RE
        .captures(&cleaned)
        .or_else(|| YEAR_RE.captures(&cleaned))
        .and_then(|caps| caps.get(1).map(|m| (m.start(), m.as_str().to_string())));

    let (raw_title, year) = match year_match {
        Some((start, year)) => (&cleaned[..start], Some(year)),
        None => (cleaned.as_str(), None),
    };

    let title = tidy_title(raw_title);
    if title.len() < 2 {
        // Over-stripped; fall back to the separator-normalized name.
        let fallback = tidy_title(&spaced);
        if fallback.len() >= 2 {
            return (fallback, year);
        }
    }
    (title, year)
}

fn tidy_title(s: &str) -> String {
    let no_brackets = EMPTY_BRACKETS_RE.replace_all(s, " ");
    let collapsed = SPACES_RE.replace_all(&no_brackets, " ");
    collapsed
        .trim_matches(|c: char| c.is_whitespace() || matches!(c, '-' | '_' | '.' | '(' | '['))
        .to_string()
}

fn strip_extension(filename: &str) -> &str {
    match filename.rfind('.') {
        // Only treat short trailing segments as extensions
        Some(pos) if filename.len() - pos <= 6 && pos > 0 => &filename[..pos],
        _ => filename,
    }
}

/// Folder names that mean "this is the shows root", not a show title
const SHOW_ROOT_SYNONYMS: &[&str] = &[
    "shows",
    "series",
    "tv",
    "television",
    "tv shows",
    "tv series",
    "serien",
];

/// Derive a show name from a relative path: prefer the first folder that is
/// not a known root synonym or a season folder, otherwise fall back to the
/// filename substring before the episode marker. Returns None when nothing
/// usable (length >= 2) survives sanitization.
pub fn infer_show_name(relative_path: &str) -> Option<String> {
    let path = Path::new(relative_path);
    let components: Vec<&str> = path
        .iter()
        .filter_map(|c| c.to_str())
        .collect();

    if components.len() > 1 {
        for dir in &components[..components.len() - 1] {
            let lower = dir.to_lowercase();
            if SHOW_ROOT_SYNONYMS.contains(&lower.as_str()) || lower.starts_with("season") {
                continue;
            }
            let name = sanitize_part(dir);
            if name.len() >= 2 {
                return Some(name);
            }
        }
    }

    let filename = components.last()?;
    let stem = strip_extension(filename);
    let prefix = match episode_marker_position(stem) {
        Some(pos) if pos > 0 => &stem[..pos],
        _ => stem,
    };
    let name = sanitize_part(&prefix.replace(['.', '_'], " "));
    if name.len() >= 2 { Some(name) } else { None }
}

/// Collapse separators to spaces, drop characters illegal in filenames,
/// and trim.
pub fn sanitize_part(s: &str) -> String {
    let spaced = s.replace(['.', '_'], " ");
    let cleaned = sanitize_filename::sanitize(&spaced);
    SPACES_RE.replace_all(&cleaned, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_sxxeyy() {
        assert_eq!(parse_season_episode("Show.S01E02.mkv"), (Some(1), Some(2)));
        assert_eq!(
            parse_season_episode("Show S1 E02 720p.mkv"),
            (Some(1), Some(2))
        );
    }

    #[test]
    fn test_parse_nxnn() {
        assert_eq!(parse_season_episode("Show 1x02.mkv"), (Some(1), Some(2)));
    }

    #[test]
    fn test_parse_bracket_pair() {
        assert_eq!(parse_season_episode("Show [1.02].mkv"), (Some(1), Some(2)));
        assert_eq!(parse_season_episode("Show (3.12).mkv"), (Some(3), Some(12)));
    }

    #[test]
    fn test_equivalent_notations_agree() {
        for name in ["Show.S01E02.mkv", "Show 1x02.mkv", "Show [1.02].mkv"] {
            assert_eq!(parse_season_episode(name), (Some(1), Some(2)), "{}", name);
        }
    }

    #[test]
    fn test_parse_verbose() {
        assert_eq!(
            parse_season_episode("Show Season 2 Episode 5.mkv"),
            (Some(2), Some(5))
        );
    }

    #[test]
    fn test_parse_episode_without_season() {
        assert_eq!(parse_season_episode("Show Episode 7.mkv"), (None, Some(7)));
        assert_eq!(parse_season_episode("Show E07.mkv"), (None, Some(7)));
    }

    #[test]
    fn test_parse_bare_see() {
        assert_eq!(parse_season_episode("Show 102.mkv"), (Some(1), Some(2)));
        // years never parse as season/episode
        assert_eq!(parse_season_episode("Movie 1976.mkv"), (None, None));
        // season must stay below 50
        assert_eq!(parse_season_episode("Track 5102.mkv"), (None, None));
    }

    #[test]
    fn test_parse_episode_only() {
        assert_eq!(parse_episode_only("Episode 12.mkv"), Some(12));
        assert_eq!(parse_episode_only("S02E07.mkv"), Some(7));
        assert_eq!(parse_episode_only("14.mkv"), Some(14));
        assert_eq!(parse_episode_only("500.mkv"), None);
    }

    #[test]
    fn test_guess_title_year_release_name() {
        let (title, year) = guess_title_year("The.Matrix.1999.1080p.BluRay.x264-GROUP.mkv");
        assert_eq!(title, "The Matrix");
        assert_eq!(year.as_deref(), Some("1999"));
    }

    #[test]
    fn test_guess_title_year_bracketed() {
        let (title, year) = guess_title_year("Alien (1979).mkv");
        assert_eq!(title, "Alien");
        assert_eq!(year.as_deref(), Some("1979"));
    }

    #[test]
    fn test_guess_title_no_year() {
        let (title, year) = guess_title_year("Some.Indie.Film.720p.mkv");
        assert_eq!(title, "Some Indie Film");
        assert_eq!(year, None);
    }

    #[test]
    fn test_guess_title_truncates_at_episode_marker() {
        let (title, _) = guess_title_year("Breaking.Bad.S01E02.720p.mkv");
        assert_eq!(title, "Breaking Bad");
    }

    #[test]
    fn test_guess_title_fallback_when_overstripped() {
        // The whole name is release vocabulary; the pre-strip name comes back.
        let (title, _) = guess_title_year("HDR.mkv");
        assert_eq!(title, "HDR");
    }

    #[test]
    fn test_infer_show_name_from_folder() {
        assert_eq!(
            infer_show_name("Breaking Bad/Season 1/ep02.mkv").as_deref(),
            Some("Breaking Bad")
        );
        assert_eq!(
            infer_show_name("shows/The Wire/S02E01.mkv").as_deref(),
            Some("The Wire")
        );
    }

    #[test]
    fn test_infer_show_name_from_filename() {
        assert_eq!(
            infer_show_name("The.Wire.S02E01.mkv").as_deref(),
            Some("The Wire")
        );
        assert_eq!(infer_show_name("x.mkv"), None);
    }

    #[test]
    fn test_sanitize_part() {
        assert_eq!(sanitize_part("What? Is: This*"), "What Is This");
        assert_eq!(sanitize_part("dots.and_underscores"), "dots and underscores");
    }
}
