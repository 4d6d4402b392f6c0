//! RPC method handler for the Bookshelf JSON-RPC protocol.
//!
//! Kept apart from `rpc_server.rs` so it can be unit-tested independently.
//! `handle_method` dispatches a method name and its params to the bookmark
//! service, the account manager or the settings engine.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::app::App;
use crate::managers::account_manager::{AccountManager, AccountManagerTrait};
use crate::services::crypto_service::CryptoService;
use crate::services::fetcher::RemoteFetcher;
use crate::services::processor::BookmarkProcessor;
use crate::services::settings_engine::SettingsEngineTrait;
use crate::types::bookmark::{Bookmark, BookmarkQuery, Tag};
use crate::types::refresh::UpdateCacheRequest;

/// Deserializes the whole params object into `T`.
fn parse<T: DeserializeOwned>(params: &Value) -> Result<T, String> {
    serde_json::from_value(params.clone()).map_err(|e| format!("invalid params: {}", e))
}

fn str_param<'a>(params: &'a Value, key: &str) -> Result<&'a str, String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| format!("missing {}", key))
}

fn field<T: DeserializeOwned>(params: &Value, key: &str) -> Result<T, String> {
    let value = params.get(key).ok_or_else(|| format!("missing {}", key))?;
    serde_json::from_value(value.clone()).map_err(|e| format!("invalid {}: {}", key, e))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<Value, String> {
    serde_json::to_value(value).map_err(|e| e.to_string())
}

/// Dispatches a JSON-RPC method call.
///
/// Returns `Ok(Value)` on success or `Err(String)` with an error message.
pub async fn handle_method<F, P>(app: &App<F, P>, method: &str, params: &Value) -> Result<Value, String>
where
    F: RemoteFetcher,
    P: BookmarkProcessor,
{
    match method {
        "bookmark.insert" => {
            let book: Bookmark = parse(params)?;
            let saved = app.bookmarks.insert_bookmark(book).await.map_err(|e| e.to_string())?;
            to_json(&saved)
        }
        "cache.update" => {
            let request: UpdateCacheRequest = parse(params)?;
            let report = app.bookmarks.update_cache(request).await.map_err(|e| e.to_string())?;
            to_json(&report)
        }
        _ => handle_sync(app, method, params),
    }
}

fn handle_sync<F, P>(app: &App<F, P>, method: &str, params: &Value) -> Result<Value, String>
where
    F: RemoteFetcher,
    P: BookmarkProcessor,
{
    match method {
        // ─── Bookmarks ───
        "bookmarks.list" => {
            let query: BookmarkQuery = if params.is_null() {
                BookmarkQuery::default()
            } else {
                parse(params)?
            };
            let page = app.bookmarks.get_bookmarks(&query).map_err(|e| e.to_string())?;
            to_json(&page)
        }
        "bookmark.update" => {
            let book: Bookmark = parse(params)?;
            let saved = app.bookmarks.update_bookmark(book).map_err(|e| e.to_string())?;
            to_json(&saved)
        }
        "bookmarks.update_tags" => {
            let ids: Vec<i64> = field(params, "ids")?;
            let tags: Vec<Tag> = field(params, "tags")?;
            let saved = app
                .bookmarks
                .update_bookmark_tags(&ids, &tags)
                .map_err(|e| e.to_string())?;
            to_json(&saved)
        }
        "bookmarks.delete" => {
            let ids: Vec<i64> = field(params, "ids")?;
            app.bookmarks.delete_bookmarks(&ids).map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }
        "archive.get" => {
            let id: i64 = field(params, "id")?;
            let data = app.bookmarks.open_archive(id).map_err(|e| e.to_string())?;
            Ok(json!({"id": id, "size": data.len(), "data": BASE64.encode(data.as_slice())}))
        }
        "archive.purge" => Ok(json!({"purged": app.bookmarks.purge_archive_cache()})),

        // ─── Tags ───
        "tags.list" => {
            let tags = app.bookmarks.get_tags().map_err(|e| e.to_string())?;
            to_json(&tags)
        }
        "tag.rename" => {
            let id: i64 = field(params, "id")?;
            let name = str_param(params, "name")?;
            app.bookmarks.rename_tag(id, name).map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }

        // ─── Accounts ───
        "accounts.list" | "account.create" | "account.update" | "account.verify" | "accounts.delete" => {
            handle_account(app, method, params)
        }

        // ─── Settings ───
        "settings.get" => {
            let engine = app.settings_engine.lock().map_err(|e| e.to_string())?;
            to_json(engine.get_settings())
        }
        "settings.set" => {
            let key = str_param(params, "key")?;
            let value = params.get("value").cloned().ok_or("missing value")?;
            let mut engine = app.settings_engine.lock().map_err(|e| e.to_string())?;
            engine.set_value(key, value).map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }
        "settings.reset" => {
            let mut engine = app.settings_engine.lock().map_err(|e| e.to_string())?;
            engine.reset().map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }

        "ping" => Ok(json!({"pong": true})),
        _ => Err(format!("unknown method: {}", method)),
    }
}

fn handle_account<F, P>(app: &App<F, P>, method: &str, params: &Value) -> Result<Value, String> {
    let conn = app.db.connection();
    let accounts = AccountManager::with_crypto(&conn, CryptoService::with_iterations(app.password_iterations));

    match method {
        "accounts.list" => {
            let keyword = params.get("keyword").and_then(|v| v.as_str()).unwrap_or("");
            let list = accounts.get_accounts(keyword).map_err(|e| e.to_string())?;
            to_json(&list)
        }
        "account.create" => {
            let username = str_param(params, "username")?;
            let password = str_param(params, "password")?;
            let owner = params.get("owner").and_then(|v| v.as_bool()).unwrap_or(false);
            let account = accounts
                .save_account(username, password, owner)
                .map_err(|e| e.to_string())?;
            to_json(&account)
        }
        "account.update" => {
            let username = str_param(params, "username")?;
            let old_password = str_param(params, "oldPassword")?;
            let new_password = str_param(params, "newPassword")?;
            let owner = params.get("owner").and_then(|v| v.as_bool()).unwrap_or(false);
            let account = accounts
                .update_account(username, old_password, new_password, owner)
                .map_err(|e| e.to_string())?;
            to_json(&account)
        }
        "account.verify" => {
            let username = str_param(params, "username")?;
            let password = str_param(params, "password")?;
            let valid = accounts
                .verify_password(username, password)
                .map_err(|e| e.to_string())?;
            Ok(json!({"valid": valid}))
        }
        "accounts.delete" => {
            let usernames: Vec<String> = field(params, "usernames")?;
            accounts.delete_accounts(&usernames).map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }
        _ => Err(format!("unknown method: {}", method)),
    }
}
