// Bookshelf state managers
// Managers own persistent and cached state: bookmarks, accounts, opened archives.

pub mod account_manager;
pub mod archive_cache;
pub mod bookmark_manager;
