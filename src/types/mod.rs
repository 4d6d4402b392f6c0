// Bookshelf shared type definitions
// Each submodule defines types used across the application.

pub mod account;
pub mod bookmark;
pub mod errors;
pub mod refresh;
pub mod settings;
