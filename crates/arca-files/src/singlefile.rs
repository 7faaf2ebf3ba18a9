//! SingleFile header parsing
//!
//! A SingleFile snapshot starts with a comment block of the form:
//!
//! ```text
//!  Page saved with SingleFile
//!  url: https://example.com/page
//!  saved date: Thu Jan 01 2026 12:00:00 GMT+0000 (Coordinated Universal Time)
//! ```
//!
//! Only the first ~1 KiB of the file is read; the fields are extracted with
//! line-anchored regexes and the date is parsed as five whitespace-separated
//! tokens in GMT.

use std::io::Read;
use std::path::Path;
use std::sync::OnceLock;

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;

/// How much of the file head is inspected for the header.
pub const HEADER_READ_LEN: usize = 1024;

const SINGLEFILE_MARKER: &str = "Page saved with SingleFile";

fn match_url() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^\s+?url:\s+?(http.*)").expect("static regex"))
}

fn match_date() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^\s+?saved date:\s+?(.*)").expect("static regex"))
}

fn match_title() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("static regex"))
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct SingleFileHeader {
    pub url: Option<String>,
    pub saved_at: Option<DateTime<Utc>>,
}

/// Extract the SingleFile header fields from the head of a file. Returns
/// `None` when the marker line is absent.
pub fn parse_header(head: &str) -> Option<SingleFileHeader> {
    if !head.contains(SINGLEFILE_MARKER) {
        return None;
    }

    let url = match_url()
        .captures(head)
        .map(|c| c[1].trim().to_string());

    let saved_at = match_date()
        .captures(head)
        .and_then(|c| parse_saved_date(c[1].trim()));

    Some(SingleFileHeader { url, saved_at })
}

/// Parse `Thu Jan 01 2026 12:00:00 GMT+0000 (...)`: the first five tokens
/// treated as GMT; everything after them is ignored.
fn parse_saved_date(value: &str) -> Option<DateTime<Utc>> {
    let tokens: Vec<&str> = value.split_whitespace().take(5).collect();
    if tokens.len() < 5 {
        return None;
    }
    let joined = tokens.join(" ");
    NaiveDateTime::parse_from_str(&joined, "%a %b %d %Y %H:%M:%S")
        .ok()
        .map(|dt| dt.and_utc())
}

/// Read the head of a file for header inspection.
pub fn read_head(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut buffer = vec![0_u8; HEADER_READ_LEN];
    let read = file.read(&mut buffer)?;
    buffer.truncate(read);
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Whether a file on disk is a SingleFile snapshot.
pub fn is_singlefile_file(path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }
    match read_head(path) {
        Ok(head) => head.contains(SINGLEFILE_MARKER),
        Err(_) => false,
    }
}

/// Extract the `<title>` of an HTML document, if one appears in `contents`.
pub fn title_from_html(contents: &str) -> Option<String> {
    match_title()
        .captures(contents)
        .map(|c| c[1].trim().to_string())
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const HEAD: &str = "<!DOCTYPE html> <html lang=\"en\"><!--\n \
        Page saved with SingleFile \n \
        url: https://example.com/page \n \
        saved date: Thu Jan 01 2026 12:30:45 GMT+0000 (Coordinated Universal Time)\n-->";

    #[test]
    fn parses_url_and_date() {
        let header = parse_header(HEAD).unwrap();
        assert_eq!(header.url.as_deref(), Some("https://example.com/page"));
        assert_eq!(
            header.saved_at,
            Some(Utc.with_ymd_and_hms(2026, 1, 1, 12, 30, 45).unwrap())
        );
    }

    #[test]
    fn missing_marker_is_none() {
        assert_eq!(parse_header("<html><body>plain page</body></html>"), None);
    }

    #[test]
    fn marker_without_fields_parses_empty() {
        let header = parse_header(" Page saved with SingleFile \n").unwrap();
        assert_eq!(header.url, None);
        assert_eq!(header.saved_at, None);
    }

    #[test]
    fn url_must_be_http() {
        let head = " Page saved with SingleFile \n url: ftp://example.com \n";
        let header = parse_header(head).unwrap();
        assert_eq!(header.url, None);
    }

    #[test]
    fn truncated_date_is_ignored() {
        let head = " Page saved with SingleFile \n saved date: Thu Jan 01 \n";
        let header = parse_header(head).unwrap();
        assert_eq!(header.saved_at, None);
    }

    #[test]
    fn detects_singlefile_on_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let good = dir.path().join("good.html");
        std::fs::write(&good, HEAD).unwrap();
        let bad = dir.path().join("bad.html");
        std::fs::write(&bad, "<html></html>").unwrap();

        assert!(is_singlefile_file(&good));
        assert!(!is_singlefile_file(&bad));
        assert!(!is_singlefile_file(&dir.path().join("missing.html")));
    }

    #[test]
    fn title_extraction() {
        assert_eq!(
            title_from_html("<html><head><title> A Title </title></head></html>"),
            Some("A Title".to_string())
        );
        assert_eq!(title_from_html("<html></html>"), None);
    }
}
