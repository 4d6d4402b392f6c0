use bookshelf::types::errors::*;

// === BookmarkError Tests ===

#[test]
fn bookmark_error_not_found_display() {
    let err = BookmarkError::NotFound(42);
    assert_eq!(err.to_string(), "Bookmark not found: 42");
}

#[test]
fn bookmark_error_duplicate_url_display() {
    let err = BookmarkError::DuplicateUrl("https://example.com/".to_string());
    assert_eq!(err.to_string(), "Duplicate bookmark URL: https://example.com/");
}

#[test]
fn bookmark_error_tag_not_found_display() {
    assert_eq!(BookmarkError::TagNotFound(7).to_string(), "Tag not found: 7");
}

// === FetchError Tests ===

#[test]
fn fetch_error_status_display() {
    assert_eq!(FetchError::Status(404).to_string(), "Fetch failed with HTTP status 404");
}

#[test]
fn fetch_error_too_large_display() {
    assert_eq!(FetchError::TooLarge(1024).to_string(), "Response body exceeds 1024 bytes");
}

// === ProcessError Tests ===

#[test]
fn process_error_fatal_flag_and_display() {
    let fatal = ProcessError::fatal("empty content");
    assert!(fatal.fatal);
    assert_eq!(fatal.to_string(), "Fatal processing error: empty content");

    let soft = ProcessError::recoverable("no archive");
    assert!(!soft.fatal);
    assert!(soft.partial.is_none());
    assert_eq!(soft.to_string(), "Processing error: no archive");
}

#[test]
fn process_error_carries_partial_record() {
    let mut book = bookshelf::types::bookmark::Bookmark::new(4, "https://example.com/");
    book.title = "Half done".to_string();

    let err = ProcessError::recoverable("archive write failed").with_partial(book.clone());
    assert_eq!(err.partial.as_deref(), Some(&book));
    assert_eq!(err.to_string(), "Processing error: archive write failed");
}

// === ServiceError Tests ===

#[test]
fn service_error_policy_messages() {
    assert_eq!(
        ServiceError::NoMatchingBookmarks.to_string(),
        "No bookmark with matching ids"
    );
    assert_eq!(
        ServiceError::BatchTooLarge { limit: 20 }.to_string(),
        "Max 20 bookmarks to update"
    );
    assert_eq!(
        ServiceError::ArchiveBatchTooLarge { limit: 5 }.to_string(),
        "Max 5 bookmarks to update with archival"
    );
}

#[test]
fn service_error_wraps_storage_error_as_source() {
    let err: ServiceError = BookmarkError::NotFound(3).into();
    assert_eq!(err.to_string(), "Bookmark not found: 3");

    let boxed: Box<dyn std::error::Error> = Box::new(err);
    assert!(boxed.source().is_some());
}

#[test]
fn service_error_process_has_source() {
    let err = ServiceError::Process(ProcessError::fatal("bad"));
    assert!(std::error::Error::source(&err).is_some());
    assert!(std::error::Error::source(&ServiceError::ArchiveNotFound(1)).is_none());
}

// === AccountError Tests ===

#[test]
fn account_error_display() {
    assert_eq!(AccountError::PasswordMismatch.to_string(), "Old password doesn't match");
    assert_eq!(
        AccountError::NotFound("alice".to_string()).to_string(),
        "Username doesn't exist: alice"
    );
}

// === CryptoError Tests ===

#[test]
fn crypto_error_invalid_encoding_display() {
    let err = CryptoError::InvalidEncoding("bad salt".to_string());
    assert_eq!(err.to_string(), "Invalid encoding: bad salt");
}

// === SettingsError Tests ===

#[test]
fn settings_error_invalid_key_display() {
    let err = SettingsError::InvalidKey("refresh.nope".to_string());
    assert_eq!(err.to_string(), "Invalid settings key: refresh.nope");
}

#[test]
fn settings_error_implements_error_trait() {
    let err: Box<dyn std::error::Error> = Box::new(SettingsError::IoError("disk".to_string()));
    assert!(err.source().is_none());
}
