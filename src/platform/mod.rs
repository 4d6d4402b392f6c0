// Bookshelf platform paths
// Config and data directories per operating system, selected with cfg(target_os).

use std::env;
use std::path::PathBuf;

const APP_DIR: &str = "bookshelf";

fn home() -> PathBuf {
    env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/tmp"))
}

/// Returns the configuration directory for Bookshelf.
///
/// - **Linux**: `$XDG_CONFIG_HOME/bookshelf` or `~/.config/bookshelf`
/// - **macOS**: `~/Library/Application Support/Bookshelf`
/// - **Windows**: `%APPDATA%/Bookshelf`
pub fn get_config_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        home().join("Library").join("Application Support").join("Bookshelf")
    }
    #[cfg(target_os = "windows")]
    {
        env::var_os("APPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(home)
            .join("Bookshelf")
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        match env::var_os("XDG_CONFIG_HOME") {
            Some(xdg) => PathBuf::from(xdg).join(APP_DIR),
            None => home().join(".config").join(APP_DIR),
        }
    }
}

/// Returns the data directory for Bookshelf (database, archives, thumbnails).
///
/// - **Linux**: `$XDG_DATA_HOME/bookshelf` or `~/.local/share/bookshelf`
/// - **macOS**: `~/Library/Application Support/Bookshelf`
/// - **Windows**: `%APPDATA%/Bookshelf`
pub fn get_data_dir() -> PathBuf {
    #[cfg(any(target_os = "macos", target_os = "windows"))]
    {
        get_config_dir()
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        match env::var_os("XDG_DATA_HOME") {
            Some(xdg) => PathBuf::from(xdg).join(APP_DIR),
            None => home().join(".local").join("share").join(APP_DIR),
        }
    }
}
