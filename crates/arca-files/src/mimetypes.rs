//! Mimetype detection and primary-file selection
//!
//! The primary file of a group decides which modeler runs. Selection follows
//! an extension priority table: the singlefile `.html` beats its
//! `.readability.html` variant, a video container beats its poster, caption
//! and info JSON. Ties break by shortest name.

use std::path::Path;

use crate::stems::suffix_of;

/// Guess the mimetype of a filename, defaulting to octet-stream.
pub fn mime_of(filename: &str) -> String {
    mime_guess::from_path(Path::new(filename))
        .first()
        .map(|m| m.essence_str().to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string())
}

/// Lower ranks are better primary candidates.
fn primary_rank(filename: &str) -> u32 {
    let suffix = suffix_of(filename).to_ascii_lowercase();
    let last = suffix.rsplit('.').next().unwrap_or("");

    if suffix.starts_with("readability.") || suffix == "readability" {
        return 50;
    }
    match last {
        "mp4" | "mkv" | "webm" | "avi" | "mov" | "flv" | "mpg" | "mpeg" | "ogv" => 0,
        "html" | "htm" => 5,
        "pdf" | "epub" | "mobi" => 10,
        "mp3" | "ogg" | "opus" | "m4a" | "wav" | "flac" => 15,
        "png" | "jpg" | "jpeg" | "webp" | "gif" | "svg" => 60,
        "vtt" | "srt" => 70,
        "txt" => 75,
        "json" => 80,
        _ => 90,
    }
}

/// Pick the primary file of a group by extension priority; ties break by
/// shortest name, then lexicographically.
pub fn choose_primary(files: &[String]) -> Option<&String> {
    files
        .iter()
        .min_by_key(|f| (primary_rank(f), f.len(), f.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn singlefile_beats_readability() {
        let files = names(&[
            "A.readability.html",
            "A.html",
            "A.readability.json",
            "A.readability.txt",
            "A.png",
        ]);
        assert_eq!(choose_primary(&files).unwrap(), "A.html");
    }

    #[test]
    fn video_container_beats_sidecar_files() {
        let files = names(&["V.info.json", "V.mp4", "V.png", "V.en.vtt"]);
        assert_eq!(choose_primary(&files).unwrap(), "V.mp4");
    }

    #[test]
    fn orphan_readability_is_its_own_primary() {
        let files = names(&["A.readability.html", "A.readability.json"]);
        assert_eq!(choose_primary(&files).unwrap(), "A.readability.html");
    }

    #[test]
    fn ties_break_by_shortest_name() {
        let files = names(&["Aa.html", "A.html"]);
        assert_eq!(choose_primary(&files).unwrap(), "A.html");
    }

    #[test]
    fn mime_detection() {
        assert_eq!(mime_of("A.html"), "text/html");
        assert_eq!(mime_of("V.mp4"), "video/mp4");
        assert_eq!(mime_of("A.png"), "image/png");
        assert_eq!(mime_of("strange.zzz"), "application/octet-stream");
    }
}
