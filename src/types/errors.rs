use std::fmt;

use super::bookmark::Bookmark;

// === BookmarkError ===

/// Errors related to bookmark storage operations.
#[derive(Debug)]
pub enum BookmarkError {
    /// Bookmark with the given ID was not found.
    NotFound(i64),
    /// A bookmark with the same URL already exists.
    DuplicateUrl(String),
    /// Tag with the given ID was not found.
    TagNotFound(i64),
    /// Database operation failed.
    DatabaseError(String),
}

impl fmt::Display for BookmarkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookmarkError::NotFound(id) => write!(f, "Bookmark not found: {}", id),
            BookmarkError::DuplicateUrl(url) => write!(f, "Duplicate bookmark URL: {}", url),
            BookmarkError::TagNotFound(id) => write!(f, "Tag not found: {}", id),
            BookmarkError::DatabaseError(msg) => {
                write!(f, "Bookmark database error: {}", msg)
            }
        }
    }
}

impl std::error::Error for BookmarkError {}

// === FetchError ===

/// Errors raised while downloading a bookmark's remote content.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchError {
    /// The URL could not be parsed or uses an unsupported scheme.
    InvalidUrl(String),
    /// The request failed before a response was received.
    Network(String),
    /// The remote server answered with a non-success status.
    Status(u16),
    /// The response body exceeded the configured size limit.
    TooLarge(usize),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::InvalidUrl(url) => write!(f, "Invalid URL: {}", url),
            FetchError::Network(msg) => write!(f, "Fetch network error: {}", msg),
            FetchError::Status(code) => write!(f, "Fetch failed with HTTP status {}", code),
            FetchError::TooLarge(limit) => {
                write!(f, "Response body exceeds {} bytes", limit)
            }
        }
    }
}

impl std::error::Error for FetchError {}

// === ProcessError ===

/// Error raised while turning fetched content into bookmark metadata.
///
/// A fatal error means the content was unusable. The single-item insert path
/// aborts on it; the batch refresh path treats every error as per-item.
/// A recoverable error may carry the record as processed so far.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessError {
    pub fatal: bool,
    pub message: String,
    pub partial: Option<Box<Bookmark>>,
}

impl ProcessError {
    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            fatal: true,
            message: message.into(),
            partial: None,
        }
    }

    pub fn recoverable(message: impl Into<String>) -> Self {
        Self {
            fatal: false,
            message: message.into(),
            partial: None,
        }
    }

    /// Attaches the partly processed record.
    pub fn with_partial(mut self, bookmark: Bookmark) -> Self {
        self.partial = Some(Box::new(bookmark));
        self
    }
}

impl fmt::Display for ProcessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.fatal {
            write!(f, "Fatal processing error: {}", self.message)
        } else {
            write!(f, "Processing error: {}", self.message)
        }
    }
}

impl std::error::Error for ProcessError {}

// === ServiceError ===

/// Errors surfaced by the bookmark service to the transport layer.
#[derive(Debug)]
pub enum ServiceError {
    /// No stored bookmark matched the requested IDs.
    NoMatchingBookmarks,
    /// The batch exceeds the refresh size limit.
    BatchTooLarge { limit: usize },
    /// The batch exceeds the archival size limit.
    ArchiveBatchTooLarge { limit: usize },
    /// The request was malformed.
    InvalidInput(String),
    /// The bookmark URL could not be cleaned.
    InvalidUrl(String),
    /// Processing failed with a fatal error on the single-item path.
    Process(ProcessError),
    /// No archive exists for the given bookmark.
    ArchiveNotFound(i64),
    /// Storage operation failed.
    Storage(BookmarkError),
    /// Filesystem operation failed.
    Io(String),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::NoMatchingBookmarks => write!(f, "No bookmark with matching ids"),
            ServiceError::BatchTooLarge { limit } => {
                write!(f, "Max {} bookmarks to update", limit)
            }
            ServiceError::ArchiveBatchTooLarge { limit } => {
                write!(f, "Max {} bookmarks to update with archival", limit)
            }
            ServiceError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            ServiceError::InvalidUrl(msg) => write!(f, "Failed to clean URL: {}", msg),
            ServiceError::Process(err) => write!(f, "Failed to process bookmark: {}", err),
            ServiceError::ArchiveNotFound(id) => write!(f, "Archive not found: {}", id),
            ServiceError::Storage(err) => write!(f, "{}", err),
            ServiceError::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for ServiceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServiceError::Process(err) => Some(err),
            ServiceError::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<BookmarkError> for ServiceError {
    fn from(err: BookmarkError) -> Self {
        ServiceError::Storage(err)
    }
}

// === AccountError ===

/// Errors related to account management.
#[derive(Debug)]
pub enum AccountError {
    /// No account with the given username exists.
    NotFound(String),
    /// The supplied password does not match the stored hash.
    PasswordMismatch,
    /// Username or password failed validation.
    InvalidInput(String),
    /// Hashing the password failed.
    Crypto(CryptoError),
    /// Database operation failed.
    DatabaseError(String),
}

impl fmt::Display for AccountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountError::NotFound(name) => write!(f, "Username doesn't exist: {}", name),
            AccountError::PasswordMismatch => write!(f, "Old password doesn't match"),
            AccountError::InvalidInput(msg) => write!(f, "Invalid account: {}", msg),
            AccountError::Crypto(err) => write!(f, "Account crypto error: {}", err),
            AccountError::DatabaseError(msg) => write!(f, "Account database error: {}", msg),
        }
    }
}

impl std::error::Error for AccountError {}

// === CryptoError ===

/// Errors related to cryptographic operations.
#[derive(Debug)]
pub enum CryptoError {
    /// Failed to generate random bytes.
    RandomGeneration(String),
    /// A stored hash could not be decoded.
    InvalidEncoding(String),
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CryptoError::RandomGeneration(msg) => {
                write!(f, "Random generation failed: {}", msg)
            }
            CryptoError::InvalidEncoding(msg) => write!(f, "Invalid encoding: {}", msg),
        }
    }
}

impl std::error::Error for CryptoError {}

// === SettingsError ===

/// Errors related to settings management.
#[derive(Debug)]
pub enum SettingsError {
    /// An I/O error occurred while reading or writing settings.
    IoError(String),
    /// Failed to serialize or deserialize settings.
    SerializationError(String),
    /// The provided settings key is invalid.
    InvalidKey(String),
    /// The provided settings value is invalid.
    InvalidValue(String),
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::IoError(msg) => write!(f, "Settings I/O error: {}", msg),
            SettingsError::SerializationError(msg) => {
                write!(f, "Settings serialization error: {}", msg)
            }
            SettingsError::InvalidKey(key) => write!(f, "Invalid settings key: {}", key),
            SettingsError::InvalidValue(msg) => {
                write!(f, "Invalid settings value: {}", msg)
            }
        }
    }
}

impl std::error::Error for SettingsError {}
