//! URL normalization applied before a bookmark is persisted.

use reqwest::Url;

use crate::types::errors::FetchError;

/// Removes every `utm_*` query parameter from `raw` and returns the cleaned URL.
///
/// Only `http` and `https` URLs are accepted. The fragment is preserved and an
/// empty query string is dropped entirely.
pub fn remove_utm_params(raw: &str) -> Result<String, FetchError> {
    let mut url = Url::parse(raw.trim()).map_err(|e| FetchError::InvalidUrl(format!("{}: {}", raw, e)))?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(FetchError::InvalidUrl(format!(
                "{}: unsupported scheme {}",
                raw, other
            )))
        }
    }

    if url.query().is_some() {
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| !key.starts_with("utm_"))
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();

        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(kept);
        }
    }

    Ok(url.to_string())
}
