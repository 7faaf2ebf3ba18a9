//! Stem extraction
//!
//! A stem is a filename with all suffixes stripped; sibling files sharing a
//! stem form one FileGroup. Only known suffix tokens are stripped so titles
//! containing dots survive (`v1.2_notes.txt` has stem `v1.2_notes`).

use std::path::Path;

/// Suffix tokens that are stripped from the end of a filename, repeatedly.
const KNOWN_SUFFIXES: &[&str] = &[
    // documents
    "html", "htm", "json", "txt", "pdf", "epub", "mobi",
    // images
    "png", "jpg", "jpeg", "webp", "gif", "svg",
    // video
    "mp4", "mkv", "webm", "avi", "mov", "flv", "mpg", "mpeg", "ogv", "part",
    // audio
    "mp3", "ogg", "opus", "m4a", "wav", "flac",
    // captions
    "vtt", "srt",
    // intermediate tokens of multi-suffix names
    "readability", "info", "en", "es", "fr", "de",
];

fn is_known_suffix(token: &str) -> bool {
    KNOWN_SUFFIXES
        .iter()
        .any(|s| s.eq_ignore_ascii_case(token))
}

/// The stem of a filename: every trailing known suffix removed.
pub fn stem_of(filename: &str) -> String {
    let mut stem = filename;
    loop {
        match stem.rsplit_once('.') {
            Some((head, token)) if !head.is_empty() && is_known_suffix(token) => {
                stem = head;
            }
            _ => break,
        }
    }
    stem.to_string()
}

/// The full suffix of a filename relative to its stem, without the leading
/// dot (`readability.html` for `A.readability.html`).
pub fn suffix_of(filename: &str) -> String {
    let stem = stem_of(filename);
    filename
        .strip_prefix(&stem)
        .map(|s| s.trim_start_matches('.').to_string())
        .unwrap_or_default()
}

/// The stem of a path's filename.
pub fn path_stem(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(stem_of)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_single_suffix() {
        assert_eq!(stem_of("2026-01-01_Article.html"), "2026-01-01_Article");
        assert_eq!(stem_of("video.mp4"), "video");
    }

    #[test]
    fn strips_stacked_suffixes() {
        assert_eq!(
            stem_of("2026-01-01_Article.readability.json"),
            "2026-01-01_Article"
        );
        assert_eq!(
            stem_of("2026-01-01_Article.readability.html"),
            "2026-01-01_Article"
        );
        assert_eq!(stem_of("SomeVideo.info.json"), "SomeVideo");
        assert_eq!(stem_of("SomeVideo.en.vtt"), "SomeVideo");
    }

    #[test]
    fn keeps_dots_inside_titles() {
        assert_eq!(stem_of("v1.2_notes.txt"), "v1.2_notes");
        assert_eq!(stem_of("example.com_index.html"), "example.com_index");
    }

    #[test]
    fn unknown_extension_is_kept() {
        assert_eq!(stem_of("data.xyz"), "data.xyz");
        // A sibling with a known suffix stacked on top still groups with it.
        assert_eq!(stem_of("data.xyz.json"), "data.xyz");
    }

    #[test]
    fn no_suffix_at_all() {
        assert_eq!(stem_of("README"), "README");
        assert_eq!(stem_of(".hidden"), ".hidden");
    }

    #[test]
    fn suffix_extraction() {
        assert_eq!(suffix_of("A.readability.html"), "readability.html");
        assert_eq!(suffix_of("A.html"), "html");
        assert_eq!(suffix_of("README"), "");
    }

    #[test]
    fn siblings_share_a_stem() {
        let names = [
            "2026-01-01_Article.html",
            "2026-01-01_Article.readability.html",
            "2026-01-01_Article.readability.json",
            "2026-01-01_Article.readability.txt",
            "2026-01-01_Article.png",
        ];
        let stems: Vec<String> = names.iter().map(|n| stem_of(n)).collect();
        assert!(stems.iter().all(|s| s == "2026-01-01_Article"));
    }
}
