//! Property-based tests for settings persistence.
//!
//! Arbitrary settings written through the engine must come back unchanged
//! after a reload from disk.

use bookshelf::services::settings_engine::{SettingsEngine, SettingsEngineTrait};
use bookshelf::types::settings::{AppSettings, ArchiveCacheSettings, FetchSettings, RefreshSettings};
use proptest::prelude::*;
use serde_json::json;
use tempfile::TempDir;

fn arb_refresh_settings() -> impl Strategy<Value = RefreshSettings> {
    (1usize..=64, 1usize..=500, 1usize..=50).prop_map(
        |(concurrency_limit, max_batch_size, max_archive_batch_size)| RefreshSettings {
            concurrency_limit,
            max_batch_size,
            max_archive_batch_size,
        },
    )
}

fn arb_fetch_settings() -> impl Strategy<Value = FetchSettings> {
    (1u64..=600, "[a-zA-Z0-9/._ -]{1,40}", 1usize..=100_000_000).prop_map(
        |(timeout_secs, user_agent, max_body_bytes)| FetchSettings {
            timeout_secs,
            user_agent,
            max_body_bytes,
        },
    )
}

fn arb_app_settings() -> impl Strategy<Value = AppSettings> {
    (
        "(/[a-z0-9_-]{1,12}){0,4}",
        arb_refresh_settings(),
        arb_fetch_settings(),
        (0usize..=256, 0u64..=86_400),
    )
        .prop_map(|(data_dir, refresh, fetch, (capacity, ttl_secs))| AppSettings {
            data_dir,
            refresh,
            fetch,
            archive_cache: ArchiveCacheSettings { capacity, ttl_secs },
        })
}

fn engine_in(dir: &TempDir) -> SettingsEngine {
    SettingsEngine::new(Some(dir.path().join("settings.json").to_string_lossy().to_string()))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    #[test]
    fn saved_settings_reload_unchanged(settings in arb_app_settings()) {
        let dir = TempDir::new().unwrap();
        let mut engine = engine_in(&dir);

        engine.set_value("data_dir", json!(settings.data_dir)).unwrap();
        engine.set_value("refresh", serde_json::to_value(&settings.refresh).unwrap()).unwrap();
        engine.set_value("fetch", serde_json::to_value(&settings.fetch).unwrap()).unwrap();
        engine.set_value("archive_cache", serde_json::to_value(&settings.archive_cache).unwrap()).unwrap();
        prop_assert_eq!(engine.get_settings(), &settings);

        let mut reloaded = engine_in(&dir);
        prop_assert_eq!(reloaded.load().unwrap(), settings);
    }

    #[test]
    fn single_key_update_touches_only_that_key(limit in 1usize..=1000) {
        let dir = TempDir::new().unwrap();
        let mut engine = engine_in(&dir);
        engine.set_value("refresh.max_batch_size", json!(limit)).unwrap();

        let mut expected = AppSettings::default();
        expected.refresh.max_batch_size = limit;

        let mut reloaded = engine_in(&dir);
        prop_assert_eq!(reloaded.load().unwrap(), expected);
    }
}
