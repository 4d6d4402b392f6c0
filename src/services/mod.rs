// Bookshelf services
// Services provide the refresh pipeline and its collaborators, plus crypto, settings and logging.

pub mod bookmark_service;
pub mod crypto_service;
pub mod fetcher;
pub mod logging;
pub mod processor;
pub mod refresh;
pub mod settings_engine;
pub mod url_cleaner;
