//! Unit tests for the RPC handler: JSON-RPC methods dispatched by `handle_method`.
//!
//! These tests exercise the RPC methods through the same code path used by the
//! real `bookshelf-rpc` binary, using a temporary data directory and an
//! in-memory fetcher.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};
use tempfile::TempDir;

use bookshelf::app::App;
use bookshelf::rpc_handler::handle_method;
use bookshelf::services::fetcher::{FetchedContent, RemoteFetcher};
use bookshelf::services::processor::{archive_path, ContentProcessor};
use bookshelf::services::settings_engine::SettingsEngine;
use bookshelf::types::errors::FetchError;

/// Serves `<title>Page N</title>` for `https://site.example/N`; other hosts fail.
#[derive(Default)]
struct SiteFetcher {
    calls: AtomicUsize,
}

impl RemoteFetcher for SiteFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedContent, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let page = url
            .strip_prefix("https://site.example/")
            .ok_or_else(|| FetchError::Network("unreachable".to_string()))?;
        let body = format!("<html><head><title>Page {}</title></head><body></body></html>", page);
        Ok(FetchedContent::new(body, "text/html", url))
    }
}

type TestApp = App<SiteFetcher, ContentProcessor>;

/// Create a fresh App backed by a temp directory.
fn setup() -> (TestApp, Arc<SiteFetcher>, TempDir) {
    let tmp = TempDir::new().expect("Failed to create temp dir");
    let config = tmp.path().join("settings.json").to_string_lossy().to_string();
    let data_dir = tmp.path().join("data");

    let fetcher = Arc::new(SiteFetcher::default());
    let processor = Arc::new(ContentProcessor::new(&data_dir));
    let mut app = App::with_collaborators(
        SettingsEngine::new(Some(config)),
        &data_dir,
        Arc::clone(&fetcher),
        processor,
    )
    .expect("Failed to init App");
    app.password_iterations = 1000;
    (app, fetcher, tmp)
}

async fn call(app: &TestApp, method: &str, params: Value) -> Result<Value, String> {
    handle_method(app, method, &params).await
}

async fn insert(app: &TestApp, url: &str) -> i64 {
    let res = call(app, "bookmark.insert", json!({"url": url, "title": ""}))
        .await
        .unwrap();
    res["id"].as_i64().unwrap()
}

// ─── Misc ───

#[tokio::test]
async fn test_ping() {
    let (app, _, _tmp) = setup();
    assert_eq!(call(&app, "ping", json!({})).await.unwrap(), json!({"pong": true}));
}

#[tokio::test]
async fn test_unknown_method_returns_error() {
    let (app, _, _tmp) = setup();
    let err = call(&app, "nonexistent.method", json!({})).await.unwrap_err();
    assert!(err.contains("unknown method"));
}

// ─── Bookmarks ───

#[tokio::test]
async fn test_insert_and_list() {
    let (app, _, _tmp) = setup();
    let res = call(
        &app,
        "bookmark.insert",
        json!({"url": "https://site.example/1?utm_campaign=x", "title": ""}),
    )
    .await
    .unwrap();
    assert_eq!(res["url"], "https://site.example/1");
    assert_eq!(res["title"], "Page 1");
    assert!(res.get("createArchive").is_none());

    let list = call(&app, "bookmarks.list", json!({})).await.unwrap();
    assert_eq!(list["page"], 1);
    assert_eq!(list["maxPage"], 1);
    assert_eq!(list["bookmarks"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_insert_invalid_url() {
    let (app, fetcher, _tmp) = setup();
    let err = call(&app, "bookmark.insert", json!({"url": "ftp://bad.example", "title": "Bad"}))
        .await
        .unwrap_err();
    assert!(err.to_lowercase().contains("url"));
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_list_filters_by_keyword_and_tags() {
    let (app, _, _tmp) = setup();
    let a = insert(&app, "https://site.example/alpha").await;
    insert(&app, "https://site.example/beta").await;
    call(&app, "bookmarks.update_tags", json!({"ids": [a], "tags": [{"name": "greek"}]}))
        .await
        .unwrap();

    let by_keyword = call(&app, "bookmarks.list", json!({"keyword": "beta"})).await.unwrap();
    assert_eq!(by_keyword["bookmarks"].as_array().unwrap().len(), 1);

    let by_tag = call(&app, "bookmarks.list", json!({"tags": ["greek"]})).await.unwrap();
    assert_eq!(by_tag["bookmarks"][0]["id"], a);

    let excluded = call(&app, "bookmarks.list", json!({"exclude": ["greek"]})).await.unwrap();
    assert_eq!(excluded["bookmarks"].as_array().unwrap().len(), 1);
    assert_ne!(excluded["bookmarks"][0]["id"], a);
}

#[tokio::test]
async fn test_update_bookmark() {
    let (app, _, _tmp) = setup();
    let id = insert(&app, "https://site.example/1").await;

    let res = call(
        &app,
        "bookmark.update",
        json!({"id": id, "url": "https://site.example/1", "title": "Renamed", "tags": [{"name": "t"}]}),
    )
    .await
    .unwrap();
    assert_eq!(res["title"], "Renamed");

    let tags = call(&app, "tags.list", json!({})).await.unwrap();
    assert_eq!(tags[0]["name"], "t");
    assert_eq!(tags[0]["nBookmarks"], 1);
}

#[tokio::test]
async fn test_cache_update_reports_failures() {
    let (app, _, _tmp) = setup();
    let good = insert(&app, "https://site.example/1").await;
    let bad = insert(&app, "https://elsewhere.example/").await;

    let report = call(&app, "cache.update", json!({"ids": [good, bad], "createArchive": true}))
        .await
        .unwrap();
    assert_eq!(report["failedIds"], json!([bad]));
    assert_eq!(report["bookmarks"].as_array().unwrap().len(), 2);
    assert_eq!(report["bookmarks"][0]["hasArchive"], true);
}

#[tokio::test]
async fn test_cache_update_rejects_unknown_ids() {
    let (app, fetcher, _tmp) = setup();
    let err = call(&app, "cache.update", json!({"ids": [123]})).await.unwrap_err();
    assert_eq!(err, "No bookmark with matching ids");
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_archive_get_returns_base64() {
    let (app, _, tmp) = setup();
    let id = insert(&app, "https://site.example/1").await;
    call(&app, "cache.update", json!({"ids": [id], "createArchive": true}))
        .await
        .unwrap();
    assert!(archive_path(&tmp.path().join("data"), id).exists());

    let res = call(&app, "archive.get", json!({"id": id})).await.unwrap();
    assert_eq!(res["id"], id);
    assert!(res["size"].as_u64().unwrap() > 0);
    assert!(!res["data"].as_str().unwrap().is_empty());

    assert!(call(&app, "archive.get", json!({"id": 999})).await.is_err());
}

#[tokio::test]
async fn test_archive_purge_keeps_fresh_entries() {
    let (app, _, _tmp) = setup();
    let id = insert(&app, "https://site.example/1").await;
    call(&app, "cache.update", json!({"ids": [id], "createArchive": true}))
        .await
        .unwrap();
    call(&app, "archive.get", json!({"id": id})).await.unwrap();

    let res = call(&app, "archive.purge", json!({})).await.unwrap();
    assert_eq!(res["purged"], 0);
}

#[tokio::test]
async fn test_delete_bookmarks() {
    let (app, _, _tmp) = setup();
    let id = insert(&app, "https://site.example/1").await;
    call(&app, "bookmarks.delete", json!({"ids": [id]})).await.unwrap();

    let list = call(&app, "bookmarks.list", json!({})).await.unwrap();
    assert!(list["bookmarks"].as_array().unwrap().is_empty());
    assert!(call(&app, "bookmarks.delete", json!({})).await.is_err());
}

#[tokio::test]
async fn test_tag_rename() {
    let (app, _, _tmp) = setup();
    let id = insert(&app, "https://site.example/1").await;
    call(&app, "bookmarks.update_tags", json!({"ids": [id], "tags": [{"name": "old"}]}))
        .await
        .unwrap();
    let tag_id = call(&app, "tags.list", json!({})).await.unwrap()[0]["id"].as_i64().unwrap();

    call(&app, "tag.rename", json!({"id": tag_id, "name": "new"})).await.unwrap();
    let tags = call(&app, "tags.list", json!({})).await.unwrap();
    assert_eq!(tags[0]["name"], "new");
}

// ─── Accounts ───

#[tokio::test]
async fn test_account_lifecycle() {
    let (app, _, _tmp) = setup();
    let created = call(
        &app,
        "account.create",
        json!({"username": "alice", "password": "password123", "owner": true}),
    )
    .await
    .unwrap();
    assert_eq!(created["username"], "alice");
    assert!(created.get("password").is_none());

    let ok = call(&app, "account.verify", json!({"username": "alice", "password": "password123"}))
        .await
        .unwrap();
    assert_eq!(ok["valid"], true);

    let err = call(
        &app,
        "account.update",
        json!({"username": "alice", "oldPassword": "nope-nope", "newPassword": "another123"}),
    )
    .await
    .unwrap_err();
    assert_eq!(err, "Old password doesn't match");

    call(&app, "accounts.delete", json!({"usernames": ["alice"]})).await.unwrap();
    let list = call(&app, "accounts.list", json!({})).await.unwrap();
    assert!(list.as_array().unwrap().is_empty());
}

// ─── Settings ───

#[tokio::test]
async fn test_settings_get_set_reset() {
    let (app, _, _tmp) = setup();
    let settings = call(&app, "settings.get", json!({})).await.unwrap();
    assert_eq!(settings["refresh"]["max_batch_size"], 20);

    call(&app, "settings.set", json!({"key": "refresh.max_batch_size", "value": 7}))
        .await
        .unwrap();
    let settings = call(&app, "settings.get", json!({})).await.unwrap();
    assert_eq!(settings["refresh"]["max_batch_size"], 7);

    assert!(call(&app, "settings.set", json!({"key": "refresh.bogus", "value": 1})).await.is_err());
    assert!(call(&app, "settings.set", json!({"key": "refresh.max_batch_size"})).await.is_err());

    call(&app, "settings.reset", json!({})).await.unwrap();
    let settings = call(&app, "settings.get", json!({})).await.unwrap();
    assert_eq!(settings["refresh"]["max_batch_size"], 20);
}
