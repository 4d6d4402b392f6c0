//! Bookmark Processor.
//!
//! Turns fetched content into updated bookmark metadata: title, excerpt,
//! author, preview image, readable content and an optional archive file.

use std::fs;
use std::panic;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use regex::Regex;
use reqwest::Url;

use crate::services::fetcher::FetchedContent;
use crate::types::bookmark::Bookmark;
use crate::types::errors::ProcessError;

/// Readable text shorter than this is not considered an article.
const MIN_READABLE_CHARS: usize = 100;

/// Length of an excerpt generated from readable text.
const EXCERPT_CHARS: usize = 200;

static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap());
static META_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<meta\s[^>]*>").unwrap());
static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)([a-z][a-z0-9:_-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap()
});
static NOISE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b.*?</script>|<style\b.*?</style>|<noscript\b.*?</noscript>|<!--.*?-->")
        .unwrap()
});
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());
static SPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Input to a single processing pass.
#[derive(Debug, Clone)]
pub struct ProcessRequest {
    pub bookmark: Bookmark,
    pub content: FetchedContent,
    pub keep_title: bool,
    pub keep_excerpt: bool,
    pub create_archive: bool,
}

/// Trait for turning fetched content into an updated bookmark.
pub trait BookmarkProcessor: Send + Sync + 'static {
    fn process(&self, request: ProcessRequest) -> Result<Bookmark, ProcessError>;
}

/// Runs `processor` on the blocking thread pool.
///
/// A panic inside the processor is re-raised in the calling task.
pub async fn process_blocking<P: BookmarkProcessor>(
    processor: Arc<P>,
    request: ProcessRequest,
) -> Result<Bookmark, ProcessError> {
    let id = request.bookmark.id;
    match tokio::task::spawn_blocking(move || processor.process(request)).await {
        Ok(result) => result,
        Err(err) if err.is_panic() => panic::resume_unwind(err.into_panic()),
        Err(err) => Err(ProcessError::recoverable(format!(
            "processing of bookmark {} was cancelled: {}",
            id, err
        ))),
    }
}

/// Returns the archive file location for a bookmark.
pub fn archive_path(data_dir: &Path, id: i64) -> PathBuf {
    data_dir.join("archive").join(id.to_string())
}

/// Returns the thumbnail file location for a bookmark.
pub fn thumb_path(data_dir: &Path, id: i64) -> PathBuf {
    data_dir.join("thumb").join(id.to_string())
}

/// Metadata read from an HTML document's head.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub author: Option<String>,
}

impl PageMetadata {
    /// Parses `<title>` and the relevant `<meta>` tags. `og:*` values win
    /// over their plain counterparts.
    pub fn parse(html: &str) -> Self {
        let mut meta = PageMetadata {
            title: TITLE_RE
                .captures(html)
                .map(|c| clean_text(&c[1]))
                .filter(|t| !t.is_empty()),
            ..Default::default()
        };

        let mut og_title = None;
        let mut og_description = None;
        for tag in META_RE.find_iter(html) {
            let mut key = None;
            let mut value = None;
            for attr in ATTR_RE.captures_iter(tag.as_str()) {
                let name = attr[1].to_ascii_lowercase();
                let text = attr.get(2).or_else(|| attr.get(3)).map(|m| m.as_str());
                match name.as_str() {
                    "name" | "property" => key = text.map(str::to_ascii_lowercase),
                    "content" => value = text.map(clean_text),
                    _ => {}
                }
            }

            let (Some(key), Some(value)) = (key, value) else {
                continue;
            };
            if value.is_empty() {
                continue;
            }
            match key.as_str() {
                "og:title" => og_title = Some(value),
                "og:description" => og_description = Some(value),
                "description" => {
                    meta.description.get_or_insert(value);
                }
                "og:image" => meta.image = Some(value),
                "author" | "article:author" => {
                    meta.author.get_or_insert(value);
                }
                _ => {}
            }
        }

        if og_title.is_some() {
            meta.title = og_title;
        }
        if og_description.is_some() {
            meta.description = og_description;
        }
        meta
    }
}

/// Readable part of a document.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadableContent {
    pub html: String,
    pub text: String,
}

/// Extracts the main content, trying `<article>`, `<main>` and then `<body>`.
///
/// Returns `None` when the candidate holds fewer than 100 characters of text.
pub fn extract_readable(html: &str) -> Option<ReadableContent> {
    let stripped = NOISE_RE.replace_all(html, "");
    let inner = ["article", "main", "body"]
        .iter()
        .find_map(|tag| extract_between_tags(&stripped, tag))?;

    let text = clean_text(&inner);
    if text.chars().count() < MIN_READABLE_CHARS {
        return None;
    }
    Some(ReadableContent {
        html: inner.trim().to_string(),
        text,
    })
}

/// Returns the inner HTML of the first `tag` element.
fn extract_between_tags(html: &str, tag: &str) -> Option<String> {
    let lower = html.to_ascii_lowercase();
    let open = format!("<{}", tag);
    let close = format!("</{}>", tag);

    let mut search_from = 0;
    while let Some(found) = lower[search_from..].find(&open) {
        let start = search_from + found;
        let after = lower.as_bytes().get(start + open.len()).copied();
        // Skip longer tag names sharing the prefix, e.g. <mainframe>.
        if matches!(after, Some(b'>') | Some(b' ') | Some(b'\t') | Some(b'\n') | Some(b'\r') | Some(b'/')) {
            let content_start = start + lower[start..].find('>')? + 1;
            let end = lower[content_start..].find(&close)?;
            return Some(html[content_start..content_start + end].to_string());
        }
        search_from = start + open.len();
    }
    None
}

/// Strips tags, decodes common entities and collapses whitespace.
fn clean_text(fragment: &str) -> String {
    let text = TAG_RE.replace_all(fragment, " ");
    let decoded = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&");
    SPACE_RE.replace_all(&decoded, " ").trim().to_string()
}

fn excerpt_from(text: &str) -> String {
    text.chars().take(EXCERPT_CHARS).collect::<String>().trim().to_string()
}

/// Resolves a possibly relative image URL against the bookmark URL.
fn resolve_image(base: &str, image: &str) -> Option<String> {
    match Url::parse(image) {
        Ok(url) => Some(url.to_string()),
        Err(_) => Url::parse(base).ok()?.join(image).ok().map(|u| u.to_string()),
    }
}

/// Production processor that writes archives under `data_dir`.
#[derive(Debug, Clone)]
pub struct ContentProcessor {
    data_dir: PathBuf,
}

impl ContentProcessor {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn write_archive(&self, id: i64, body: &[u8]) -> Result<(), ProcessError> {
        let path = archive_path(&self.data_dir, id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ProcessError::recoverable(format!("failed to create archive dir: {}", e)))?;
        }
        fs::write(&path, body)
            .map_err(|e| ProcessError::recoverable(format!("failed to write archive: {}", e)))
    }
}

impl BookmarkProcessor for ContentProcessor {
    fn process(&self, request: ProcessRequest) -> Result<Bookmark, ProcessError> {
        let ProcessRequest {
            mut bookmark,
            content,
            keep_title,
            keep_excerpt,
            create_archive,
        } = request;

        if content.body.is_empty() {
            return Err(ProcessError::fatal("empty content"));
        }

        if content.is_html() {
            let html = std::str::from_utf8(&content.body)
                .map_err(|e| ProcessError::fatal(format!("content is not valid UTF-8: {}", e)))?;

            let meta = PageMetadata::parse(html);
            let readable = extract_readable(html);

            if !keep_title {
                if let Some(title) = meta.title {
                    bookmark.title = title;
                }
            }

            if !keep_excerpt {
                let excerpt = meta
                    .description
                    .or_else(|| readable.as_ref().map(|r| excerpt_from(&r.text)));
                if let Some(excerpt) = excerpt {
                    bookmark.excerpt = excerpt;
                }
            }

            let base = if content.final_url.is_empty() {
                bookmark.url.as_str()
            } else {
                content.final_url.as_str()
            };
            if let Some(image) = meta.image.and_then(|img| resolve_image(base, &img)) {
                bookmark.image_url = image;
            }
            if let Some(author) = meta.author {
                bookmark.author = author;
            }

            match readable {
                Some(readable) => {
                    bookmark.content = readable.text;
                    bookmark.html = readable.html;
                }
                None => {
                    bookmark.content.clear();
                    bookmark.html.clear();
                }
            }
            bookmark.has_content = !bookmark.content.is_empty();
        }

        if create_archive {
            if let Err(err) = self.write_archive(bookmark.id, &content.body) {
                return Err(err.with_partial(bookmark));
            }
            bookmark.has_archive = true;
        }

        Ok(bookmark)
    }
}
