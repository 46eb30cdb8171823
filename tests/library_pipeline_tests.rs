//! Integration tests for the library pipeline rules
//!
//! These tests verify the contracts the indexer and organizer agree on:
//! - Organize run phases (planning -> executing -> cleanup)
//! - Canonical destination naming
//! - Duplicate resolution policy
//! - Category extension routing

// ============================================================================
// Organize Phase Tests
// ============================================================================

/// Phases of an organize run
const PHASES: &[&str] = &["planning", "executing", "cleanup"];

mod organize_phases {
    use super::*;

    /// Check whether a phase transition is valid for the given run mode
    fn is_valid_transition(from: &str, to: &str, dry_run: bool) -> bool {
        match (from, to) {
            // planning -> executing: only when changes are applied
            ("planning", "executing") => !dry_run,
            // executing -> cleanup: junk sweep always follows a real run
            ("executing", "cleanup") => !dry_run,
            // a dry run ends after planning
            ("planning", "done") => dry_run,
            ("cleanup", "done") => !dry_run,
            _ => false,
        }
    }

    #[test]
    fn test_real_run_walks_all_phases() {
        assert!(is_valid_transition("planning", "executing", false));
        assert!(is_valid_transition("executing", "cleanup", false));
        assert!(is_valid_transition("cleanup", "done", false));
    }

    #[test]
    fn test_dry_run_stops_after_planning() {
        assert!(is_valid_transition("planning", "done", true));
        assert!(!is_valid_transition("planning", "executing", true));
        assert!(!is_valid_transition("executing", "cleanup", true));
    }

    #[test]
    fn test_no_phase_skipping() {
        // Cleanup never runs before the moves happened
        assert!(!is_valid_transition("planning", "cleanup", false));
        // And phases never run backwards
        assert!(!is_valid_transition("cleanup", "executing", false));
        assert!(!is_valid_transition("executing", "planning", false));
    }

    #[test]
    fn test_all_phases_named() {
        for phase in PHASES {
            assert!(!phase.is_empty());
        }
    }
}

// ============================================================================
// Canonical Naming Tests
// ============================================================================

mod canonical_naming {
    /// Destination folder for a movie
    fn movie_folder(title: &str, year: Option<&str>) -> String {
        match year {
            Some(year) => format!("{} ({})", title, year),
            None => title.to_string(),
        }
    }

    /// Destination file name for an episode
    fn episode_name(season: u32, episode: u32, ext: &str) -> String {
        format!("S{:02}E{:02}{}", season, episode, ext)
    }

    #[test]
    fn test_movie_folder_with_year() {
        assert_eq!(movie_folder("Heat", Some("1995")), "Heat (1995)");
    }

    #[test]
    fn test_movie_folder_without_year() {
        // A year-less guess still gets a folder, just without the suffix
        assert_eq!(movie_folder("Samsara", None), "Samsara");
    }

    #[test]
    fn test_movie_file_matches_folder() {
        let folder = movie_folder("Heat", Some("1995"));
        let file = format!("{}.mkv", folder);
        assert_eq!(file, "Heat (1995).mkv");
    }

    #[test]
    fn test_episode_names_are_zero_padded() {
        assert_eq!(episode_name(1, 2, ".mkv"), "S01E02.mkv");
        assert_eq!(episode_name(10, 123, ".mp4"), "S10E123.mp4");
    }

    #[test]
    fn test_unknown_season_defaults_to_one() {
        // Files with only an episode marker land in Season 1
        let season = None::<u32>.unwrap_or(1);
        assert_eq!(episode_name(season, 5, ".mkv"), "S01E05.mkv");
    }

    #[test]
    fn test_collision_suffix_ordering() {
        // Second copy gets (2); counting never starts at (1)
        let suffixes: Vec<String> = (2..5).map(|n| format!("Heat (1995) ({}).mkv", n)).collect();
        assert_eq!(suffixes[0], "Heat (1995) (2).mkv");
        assert_eq!(suffixes.last().unwrap(), "Heat (1995) (4).mkv");
    }
}

// ============================================================================
// Duplicate Resolution Tests
// ============================================================================

mod duplicate_resolution {
    /// Pick the survivor from a duplicate group: shortest path wins, ties
    /// break lexicographically
    fn pick_keeper(paths: &[&str]) -> String {
        let mut sorted: Vec<&str> = paths.to_vec();
        sorted.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
        sorted[0].to_string()
    }

    #[test]
    fn test_shortest_path_wins() {
        let keeper = pick_keeper(&[
            "/data/movies/dupes/backups/Alien.mkv",
            "/data/movies/Alien (1979)/Alien.mkv",
        ]);
        assert_eq!(keeper, "/data/movies/Alien (1979)/Alien.mkv");
    }

    #[test]
    fn test_ties_break_lexicographically() {
        let keeper = pick_keeper(&["/data/movies/b/Alien.mkv", "/data/movies/a/Alien.mkv"]);
        assert_eq!(keeper, "/data/movies/a/Alien.mkv");
    }

    #[test]
    fn test_single_entry_is_not_a_group() {
        // Groups need at least two paths; a lone file keeps itself
        let paths = ["/data/movies/Alien.mkv"];
        assert_eq!(pick_keeper(&paths), paths[0]);
    }
}

// ============================================================================
// Category Routing Tests
// ============================================================================

mod category_routing {
    /// Extension allow-lists per category, lowercase with leading dot
    fn accepts(category: &str, ext: &str) -> bool {
        let allowed: &[&str] = match category {
            "movies" | "shows" => &[
                ".mp4", ".mkv", ".avi", ".mov", ".webm", ".m4v", ".ts", ".wmv", ".flv", ".3gp",
                ".mpg", ".mpeg",
            ],
            "music" => &[".mp3", ".flac", ".wav", ".m4a"],
            "books" => &[".pdf", ".epub", ".mobi", ".cbz", ".cbr"],
            "gallery" => &[".jpg", ".jpeg", ".png", ".gif", ".mp4", ".mov"],
            "files" => return true,
            _ => return false,
        };
        allowed.contains(&ext.to_lowercase().as_str())
    }

    #[test]
    fn test_video_categories_share_extensions() {
        for ext in [".mkv", ".mp4", ".avi"] {
            assert!(accepts("movies", ext));
            assert!(accepts("shows", ext));
        }
    }

    #[test]
    fn test_non_video_rejected_from_video_categories() {
        assert!(!accepts("movies", ".mp3"));
        assert!(!accepts("shows", ".pdf"));
        assert!(!accepts("movies", ".jpg"));
    }

    #[test]
    fn test_gallery_accepts_short_videos() {
        // Galleries hold clips as well as images
        assert!(accepts("gallery", ".mp4"));
        assert!(accepts("gallery", ".mov"));
        assert!(!accepts("gallery", ".mkv"));
    }

    #[test]
    fn test_files_category_accepts_anything() {
        assert!(accepts("files", ".zip"));
        assert!(accepts("files", ".xyz"));
    }

    #[test]
    fn test_extension_matching_is_case_insensitive() {
        assert!(accepts("movies", ".MKV"));
        assert!(accepts("music", ".FLAC"));
    }

    #[test]
    fn test_unknown_category_rejects_everything() {
        assert!(!accepts("podcasts", ".mp3"));
    }
}
