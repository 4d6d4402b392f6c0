//! Unit tests for HTML metadata parsing, readable-content extraction and the
//! `ContentProcessor` pass.

use bookshelf::services::fetcher::FetchedContent;
use bookshelf::services::processor::{
    archive_path, extract_readable, BookmarkProcessor, ContentProcessor, PageMetadata, ProcessRequest,
};
use bookshelf::types::bookmark::Bookmark;
use tempfile::TempDir;

const ARTICLE: &str = r#"<!DOCTYPE html>
<html>
<head>
  <title>Plain Title</title>
  <meta name="description" content="A plain description">
  <meta property="og:title" content="Open Graph Title">
  <meta property="og:image" content="/img/cover.png">
  <meta name="author" content="Ada Lovelace">
  <style>body { color: red; }</style>
</head>
<body>
  <nav>Home | About</nav>
  <article>
    <h1>Engines</h1>
    <p>The analytical engine weaves algebraic patterns just as the Jacquard loom weaves flowers and leaves.</p>
    <script>console.log("tracking");</script>
    <p>Its operations are not limited to numbers alone &amp; may act on other things.</p>
  </article>
</body>
</html>"#;

fn request(book: Bookmark, content: FetchedContent) -> ProcessRequest {
    ProcessRequest {
        bookmark: book,
        content,
        keep_title: false,
        keep_excerpt: false,
        create_archive: false,
    }
}

fn html(body: &str) -> FetchedContent {
    FetchedContent::new(body, "text/html; charset=utf-8", "https://example.com/post")
}

// === PageMetadata ===

#[test]
fn test_metadata_prefers_open_graph_title() {
    let meta = PageMetadata::parse(ARTICLE);
    assert_eq!(meta.title.as_deref(), Some("Open Graph Title"));
    assert_eq!(meta.description.as_deref(), Some("A plain description"));
    assert_eq!(meta.image.as_deref(), Some("/img/cover.png"));
    assert_eq!(meta.author.as_deref(), Some("Ada Lovelace"));
}

#[test]
fn test_metadata_of_bare_document_is_empty() {
    assert_eq!(PageMetadata::parse("<p>hello</p>"), PageMetadata::default());
}

#[test]
fn test_metadata_ignores_empty_content_attributes() {
    let meta = PageMetadata::parse(r#"<title> </title><meta name="description" content="  ">"#);
    assert!(meta.title.is_none());
    assert!(meta.description.is_none());
}

// === extract_readable ===

#[test]
fn test_readable_prefers_article_and_drops_scripts() {
    let readable = extract_readable(ARTICLE).expect("article should be readable");
    assert!(readable.text.starts_with("Engines The analytical engine"));
    assert!(readable.text.contains("numbers alone & may act"));
    assert!(!readable.text.contains("tracking"));
    assert!(!readable.text.contains("Home | About"));
    assert!(readable.html.contains("<h1>Engines</h1>"));
}

#[test]
fn test_readable_rejects_short_documents() {
    assert!(extract_readable("<body><p>Too short.</p></body>").is_none());
    assert!(extract_readable("no markup at all").is_none());
}

// === ContentProcessor ===

#[test]
fn test_process_html_updates_metadata_and_content() {
    let tmp = TempDir::new().unwrap();
    let processor = ContentProcessor::new(tmp.path());
    let book = Bookmark::new(1, "https://example.com/post");

    let out = processor.process(request(book, html(ARTICLE))).unwrap();
    assert_eq!(out.title, "Open Graph Title");
    assert_eq!(out.excerpt, "A plain description");
    assert_eq!(out.author, "Ada Lovelace");
    assert_eq!(out.image_url, "https://example.com/img/cover.png");
    assert!(out.has_content);
    assert!(!out.has_archive);
    assert!(!archive_path(tmp.path(), 1).exists());
}

#[test]
fn test_process_keeps_title_and_excerpt_when_asked() {
    let tmp = TempDir::new().unwrap();
    let processor = ContentProcessor::new(tmp.path());
    let mut book = Bookmark::new(1, "https://example.com/post");
    book.title = "Mine".to_string();
    book.excerpt = "My notes".to_string();

    let mut req = request(book, html(ARTICLE));
    req.keep_title = true;
    req.keep_excerpt = true;
    let out = processor.process(req).unwrap();

    assert_eq!(out.title, "Mine");
    assert_eq!(out.excerpt, "My notes");
    assert_eq!(out.author, "Ada Lovelace");
}

#[test]
fn test_process_falls_back_to_readable_excerpt() {
    let tmp = TempDir::new().unwrap();
    let processor = ContentProcessor::new(tmp.path());
    let body = ARTICLE.replace(r#"<meta name="description" content="A plain description">"#, "");

    let out = processor
        .process(request(Bookmark::new(2, "https://example.com/post"), html(&body)))
        .unwrap();
    assert!(out.excerpt.starts_with("Engines The analytical engine"));
    assert!(out.excerpt.chars().count() <= 200);
}

#[test]
fn test_process_writes_archive() {
    let tmp = TempDir::new().unwrap();
    let processor = ContentProcessor::new(tmp.path());

    let mut req = request(Bookmark::new(5, "https://example.com/post"), html(ARTICLE));
    req.create_archive = true;
    let out = processor.process(req).unwrap();

    assert!(out.has_archive);
    let stored = std::fs::read(archive_path(tmp.path(), 5)).unwrap();
    assert_eq!(stored, ARTICLE.as_bytes());
}

#[test]
fn test_process_non_html_only_archives() {
    let tmp = TempDir::new().unwrap();
    let processor = ContentProcessor::new(tmp.path());
    let mut book = Bookmark::new(3, "https://example.com/file.pdf");
    book.title = "Report".to_string();

    let content = FetchedContent::new(vec![0x25, 0x50, 0x44, 0x46], "application/pdf", &book.url.clone());
    let mut req = request(book, content);
    req.create_archive = true;
    let out = processor.process(req).unwrap();

    assert_eq!(out.title, "Report");
    assert!(!out.has_content);
    assert!(out.has_archive);
}

#[test]
fn test_process_empty_body_is_fatal() {
    let tmp = TempDir::new().unwrap();
    let processor = ContentProcessor::new(tmp.path());

    let err = processor
        .process(request(Bookmark::new(1, "https://example.com/"), html("")))
        .unwrap_err();
    assert!(err.fatal);
}

#[test]
fn test_process_invalid_utf8_html_is_fatal() {
    let tmp = TempDir::new().unwrap();
    let processor = ContentProcessor::new(tmp.path());
    let content = FetchedContent::new(vec![0xff, 0xfe, 0xfd], "text/html", "https://example.com/");

    let err = processor
        .process(request(Bookmark::new(1, "https://example.com/"), content))
        .unwrap_err();
    assert!(err.fatal);
}

#[test]
fn test_archive_write_failure_is_recoverable() {
    let tmp = TempDir::new().unwrap();
    // A plain file where the archive directory should be.
    std::fs::write(tmp.path().join("archive"), b"not a dir").unwrap();
    let processor = ContentProcessor::new(tmp.path());

    let mut req = request(Bookmark::new(1, "https://example.com/post"), html(ARTICLE));
    req.create_archive = true;
    let err = processor.process(req).unwrap_err();
    assert!(!err.fatal);

    let partial = err.partial.expect("processed record should be attached");
    assert_eq!(partial.title, "Open Graph Title");
    assert_eq!(partial.excerpt, "A plain description");
    assert!(!partial.has_archive);
}

#[test]
fn test_process_resolves_image_against_final_url() {
    let tmp = TempDir::new().unwrap();
    let processor = ContentProcessor::new(tmp.path());
    let content = FetchedContent::new(ARTICLE, "text/html", "https://cdn.example.org/landing/");

    let out = processor
        .process(request(Bookmark::new(1, "https://example.com/post"), content))
        .unwrap();
    assert_eq!(out.image_url, "https://cdn.example.org/img/cover.png");
}
