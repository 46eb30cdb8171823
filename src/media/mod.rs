//! Media domain types shared across the scanner, organizer, and query layer

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Top-level media class a library file belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Movies,
    Shows,
    Music,
    Books,
    Gallery,
    Files,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Movies,
        Category::Shows,
        Category::Music,
        Category::Books,
        Category::Gallery,
        Category::Files,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Movies => "movies",
            Category::Shows => "shows",
            Category::Music => "music",
            Category::Books => "books",
            Category::Gallery => "gallery",
            Category::Files => "files",
        }
    }

    pub fn parse(s: &str) -> Option<Category> {
        match s.to_ascii_lowercase().as_str() {
            "movies" => Some(Category::Movies),
            "shows" => Some(Category::Shows),
            "music" => Some(Category::Music),
            "books" => Some(Category::Books),
            "gallery" => Some(Category::Gallery),
            "files" => Some(Category::Files),
            _ => None,
        }
    }

    /// Extension allow-list used when walking this category's roots.
    /// `files` accepts everything and is handled by the caller.
    pub fn allowed_extensions(&self) -> &'static [&'static str] {
        match self {
            Category::Movies | Category::Shows => VIDEO_EXTENSIONS,
            Category::Music => MUSIC_EXTENSIONS,
            Category::Books => BOOK_EXTENSIONS,
            Category::Gallery => GALLERY_EXTENSIONS,
            Category::Files => &[],
        }
    }

    /// Whether a file with this extension belongs in the category.
    pub fn accepts(&self, ext: &str) -> bool {
        if *self == Category::Files {
            return true;
        }
        let ext = ext.to_ascii_lowercase();
        self.allowed_extensions().iter().any(|e| *e == ext)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const VIDEO_EXTENSIONS: &[&str] = &[
    ".mp4", ".mkv", ".avi", ".mov", ".webm", ".m4v", ".ts", ".wmv", ".flv", ".3gp", ".mpg",
    ".mpeg",
];

pub const MUSIC_EXTENSIONS: &[&str] = &[".mp3", ".flac", ".wav", ".m4a"];

pub const BOOK_EXTENSIONS: &[&str] = &[".pdf", ".epub", ".mobi", ".cbz", ".cbr"];

pub const GALLERY_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif", ".mp4", ".mov"];

/// Sidecar files that never block a directory from being cleaned up
pub const JUNK_FILES: &[&str] = &[
    "poster.jpg",
    "poster.jpeg",
    "poster.png",
    "folder.jpg",
    "folder.png",
    "cover.jpg",
    "cover.png",
    "fanart.jpg",
    "movie.nfo",
];

/// Lower-cased extension of a path, including the leading dot
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
}

/// Whether the file is a playable video, judged by extension alone
pub fn is_playable_video(path: &Path) -> bool {
    extension_of(path)
        .map(|ext| VIDEO_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Whether the file name is a known sidecar (poster art, nfo)
pub fn is_junk_file(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    JUNK_FILES.contains(&lower.as_str())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn test_category_roundtrip() {
        for cat in Category::ALL {
            assert_eq!(Category::parse(cat.as_str()), Some(cat));
        }
        assert_eq!(Category::parse("MOVIES"), Some(Category::Movies));
        assert_eq!(Category::parse("podcasts"), None);
    }

    #[test]
    fn test_extension_filters() {
        assert!(Category::Movies.accepts(".MKV"));
        assert!(Category::Music.accepts(".flac"));
        assert!(!Category::Books.accepts(".mkv"));
        // files takes anything
        assert!(Category::Files.accepts(".xyz"));
    }

    #[test]
    fn test_playable_and_junk() {
        assert!(is_playable_video(&PathBuf::from("Alien (1979).mkv")));
        assert!(!is_playable_video(&PathBuf::from("poster.jpg")));
        assert!(is_junk_file("Poster.JPG"));
        assert!(!is_junk_file("episode.mkv"));
    }
}
