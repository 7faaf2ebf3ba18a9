//! End-to-end discovery over a realistic media tree: archives with
//! readability variants, a video with its sidecars, year subfolders, and a
//! config directory that must be skipped.

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use arca_files::singlefile;
use arca_files::walk::discover;

const SINGLEFILE_HEAD: &str = "<!DOCTYPE html> <html><!--\n \
    Page saved with SingleFile \n \
    url: https://example.com/article \n \
    saved date: Thu Jan 01 2026 12:00:00 GMT+0000 (Coordinated Universal Time)\n-->";

fn write(dir: &Path, name: &str, contents: &str) {
    fs::write(dir.join(name), contents).unwrap();
}

fn media_tree() -> TempDir {
    let media = TempDir::new().unwrap();

    let config = media.path().join("config");
    fs::create_dir_all(&config).unwrap();
    write(&config, "tags.yaml", "version: 1\ntags: []\n");

    let domain = media.path().join("archive/example.com");
    fs::create_dir_all(&domain).unwrap();
    write(&domain, "2026-01-01-120000_Article.html", SINGLEFILE_HEAD);
    write(
        &domain,
        "2026-01-01-120000_Article.readability.html",
        "<html><body>article</body></html>",
    );
    write(
        &domain,
        "2026-01-01-120000_Article.readability.json",
        r#"{"url": "https://example.com/article", "title": "Article"}"#,
    );
    write(&domain, "2026-01-01-120000_Article.png", "png");

    // A year subfolder produced by a dated file format.
    let year = media.path().join("archive/fileformat-test.com/2026");
    fs::create_dir_all(&year).unwrap();
    write(&year, "2026-02-02-000000_Dated.html", SINGLEFILE_HEAD);

    let channel = media.path().join("videos/SomeChannel");
    fs::create_dir_all(&channel).unwrap();
    write(&channel, "SomeVideo.mp4", "video-bytes");
    write(&channel, "SomeVideo.info.json", r#"{"id": "v1"}"#);
    write(&channel, "SomeVideo.png", "poster");
    write(&channel, "SomeVideo.en.vtt", "captions");

    media
}

#[test]
fn discovers_groups_across_the_media_root() {
    let media = media_tree();
    let skip = media.path().join("config");
    let candidates = discover(&[media.path().to_path_buf()], &skip).unwrap();

    // Article group, the dated archive, and the video; the config file is
    // never a candidate.
    assert_eq!(candidates.len(), 3);
    assert!(candidates
        .iter()
        .all(|c| !c.directory.starts_with(media.path().join("config"))));
}

#[test]
fn archive_group_prefers_the_singlefile() {
    let media = media_tree();
    let skip = media.path().join("config");
    let candidates = discover(&[media.path().to_path_buf()], &skip).unwrap();

    let article = candidates
        .iter()
        .find(|c| c.stem == "2026-01-01-120000_Article")
        .unwrap();
    assert_eq!(article.primary, "2026-01-01-120000_Article.html");
    assert_eq!(article.mimetype, "text/html");
    assert_eq!(article.files.len(), 4);

    let primary = article.directory.join(&article.primary);
    assert!(singlefile::is_singlefile_file(&primary));
}

#[test]
fn video_group_prefers_the_container() {
    let media = media_tree();
    let skip = media.path().join("config");
    let candidates = discover(&[media.path().to_path_buf()], &skip).unwrap();

    let video = candidates.iter().find(|c| c.stem == "SomeVideo").unwrap();
    assert_eq!(video.primary, "SomeVideo.mp4");
    assert_eq!(video.mimetype, "video/mp4");
    assert_eq!(video.files.len(), 4);
}

#[test]
fn year_subfolder_group_lives_in_the_year_directory() {
    let media = media_tree();
    let skip = media.path().join("config");
    let candidates = discover(&[media.path().to_path_buf()], &skip).unwrap();

    let dated = candidates
        .iter()
        .find(|c| c.stem == "2026-02-02-000000_Dated")
        .unwrap();
    // The FileGroup's directory is where the file sits; associating it with
    // the domain collection above the year folder is the modeler's job.
    assert_eq!(
        dated.directory,
        media.path().join("archive/fileformat-test.com/2026")
    );
}

#[test]
fn refresh_scoped_to_one_domain_sees_only_it() {
    let media = media_tree();
    let skip = media.path().join("config");
    let domain = media.path().join("archive/example.com");
    let candidates = discover(&[domain.clone()], &skip).unwrap();

    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].directory, domain);
}
