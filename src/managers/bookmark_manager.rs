//! Bookmark Manager for Bookshelf.
//!
//! Implements `BookmarkManagerTrait`, the persistence gateway for bookmark
//! and tag records, backed by SQLite via `rusqlite`.

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, ErrorCode, OptionalExtension};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::types::bookmark::{Bookmark, GetBookmarksOptions, OrderMethod, Tag};
use crate::types::errors::BookmarkError;

/// Trait defining bookmark storage operations.
pub trait BookmarkManagerTrait {
    fn create_new_id(&self) -> Result<i64, BookmarkError>;
    fn get_bookmarks(&self, options: &GetBookmarksOptions) -> Result<Vec<Bookmark>, BookmarkError>;
    fn get_bookmarks_count(&self, options: &GetBookmarksOptions) -> Result<i64, BookmarkError>;
    fn get_bookmark(&self, id: i64, with_content: bool) -> Result<Bookmark, BookmarkError>;
    /// Upserts all bookmarks in a single transaction and returns the saved records.
    fn save_bookmarks(&self, bookmarks: &[Bookmark]) -> Result<Vec<Bookmark>, BookmarkError>;
    fn delete_bookmarks(&self, ids: &[i64]) -> Result<(), BookmarkError>;
    fn get_tags(&self) -> Result<Vec<Tag>, BookmarkError>;
    fn rename_tag(&self, id: i64, name: &str) -> Result<(), BookmarkError>;
}

/// Bookmark manager backed by a SQLite connection.
pub struct BookmarkManager<'a> {
    conn: &'a Connection,
}

impl<'a> BookmarkManager<'a> {
    /// Creates a new `BookmarkManager` using the provided database connection.
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Returns the current UNIX timestamp in seconds.
    fn now() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64
    }

    /// Builds the shared WHERE clause and its parameters for listing and counting.
    fn filter_clause(options: &GetBookmarksOptions) -> (String, Vec<Value>) {
        let mut clause = String::from(" WHERE 1 = 1");
        let mut args: Vec<Value> = Vec::new();

        if !options.ids.is_empty() {
            clause.push_str(&format!(" AND b.id IN ({})", placeholders(options.ids.len())));
            args.extend(options.ids.iter().map(|id| Value::Integer(*id)));
        }

        let keyword = options.keyword.trim();
        if !keyword.is_empty() {
            clause.push_str(
                " AND (b.url LIKE ? OR b.title LIKE ? OR b.excerpt LIKE ? OR b.content LIKE ?)",
            );
            let pattern = format!("%{}%", keyword);
            for _ in 0..4 {
                args.push(Value::Text(pattern.clone()));
            }
        }

        if !options.tags.is_empty() {
            clause.push_str(&format!(
                " AND b.id IN (SELECT bt.bookmark_id FROM bookmark_tag bt \
                 JOIN tag t ON t.id = bt.tag_id WHERE t.name IN ({}))",
                placeholders(options.tags.len())
            ));
            args.extend(options.tags.iter().map(|t| Value::Text(t.clone())));
        }

        if !options.excluded_tags.is_empty() {
            clause.push_str(&format!(
                " AND b.id NOT IN (SELECT bt.bookmark_id FROM bookmark_tag bt \
                 JOIN tag t ON t.id = bt.tag_id WHERE t.name IN ({}))",
                placeholders(options.excluded_tags.len())
            ));
            args.extend(options.excluded_tags.iter().map(|t| Value::Text(t.clone())));
        }

        (clause, args)
    }

    /// Reads a single `Bookmark` row into a struct (tags are loaded separately).
    fn row_to_bookmark(row: &rusqlite::Row) -> rusqlite::Result<Bookmark> {
        Ok(Bookmark {
            id: row.get(0)?,
            url: row.get(1)?,
            title: row.get(2)?,
            excerpt: row.get(3)?,
            author: row.get(4)?,
            public: row.get(5)?,
            modified: row.get(6)?,
            has_content: row.get(7)?,
            content: row.get(8)?,
            html: row.get(9)?,
            ..Default::default()
        })
    }

    fn tags_of(&self, bookmark_id: i64) -> Result<Vec<Tag>, BookmarkError> {
        let mut stmt = self
            .conn
            .prepare_cached(
                "SELECT t.id, t.name FROM bookmark_tag bt JOIN tag t ON t.id = bt.tag_id \
                 WHERE bt.bookmark_id = ?1 ORDER BY t.name",
            )
            .map_err(|e| BookmarkError::DatabaseError(e.to_string()))?;

        let rows = stmt
            .query_map(params![bookmark_id], |row| {
                Ok(Tag {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    ..Default::default()
                })
            })
            .map_err(|e| BookmarkError::DatabaseError(e.to_string()))?;

        let mut tags = Vec::new();
        for row in rows {
            tags.push(row.map_err(|e| BookmarkError::DatabaseError(e.to_string()))?);
        }
        Ok(tags)
    }

    /// Returns the ID of the tag with the given name, creating it if needed.
    fn ensure_tag(conn: &Connection, name: &str) -> Result<i64, rusqlite::Error> {
        conn.execute("INSERT OR IGNORE INTO tag (name) VALUES (?1)", params![name])?;
        conn.query_row("SELECT id FROM tag WHERE name = ?1", params![name], |row| row.get(0))
    }

    /// Writes one bookmark and applies its tag diff. Runs inside the caller's transaction.
    fn save_one(conn: &Connection, book: &Bookmark, now: i64) -> Result<Bookmark, BookmarkError> {
        if book.url.trim().is_empty() {
            return Err(BookmarkError::DatabaseError("URL must not be empty".to_string()));
        }
        if book.title.trim().is_empty() {
            return Err(BookmarkError::DatabaseError("Title must not be empty".to_string()));
        }

        let write = if book.id > 0 {
            conn.execute(
                "INSERT INTO bookmark (id, url, title, excerpt, author, public, content, html, modified) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9) \
                 ON CONFLICT(id) DO UPDATE SET url = excluded.url, title = excluded.title, \
                 excerpt = excluded.excerpt, author = excluded.author, public = excluded.public, \
                 content = excluded.content, html = excluded.html, modified = excluded.modified",
                params![
                    book.id, book.url, book.title, book.excerpt, book.author,
                    book.public, book.content, book.html, now
                ],
            )
            .map(|_| book.id)
        } else {
            conn.execute(
                "INSERT INTO bookmark (url, title, excerpt, author, public, content, html, modified) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    book.url, book.title, book.excerpt, book.author,
                    book.public, book.content, book.html, now
                ],
            )
            .map(|_| conn.last_insert_rowid())
        };

        let id = write.map_err(|e| match &e {
            rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation => {
                BookmarkError::DuplicateUrl(book.url.clone())
            }
            _ => BookmarkError::DatabaseError(e.to_string()),
        })?;

        let mut kept_tags = Vec::with_capacity(book.tags.len());
        for tag in &book.tags {
            if tag.deleted {
                if tag.id > 0 {
                    conn.execute(
                        "DELETE FROM bookmark_tag WHERE bookmark_id = ?1 AND tag_id = ?2",
                        params![id, tag.id],
                    )
                    .map_err(|e| BookmarkError::DatabaseError(e.to_string()))?;
                }
                continue;
            }

            let name = tag.name.trim();
            if name.is_empty() {
                continue;
            }

            let tag_id = if tag.id > 0 {
                tag.id
            } else {
                Self::ensure_tag(conn, name)
                    .map_err(|e| BookmarkError::DatabaseError(e.to_string()))?
            };

            conn.execute(
                "INSERT OR IGNORE INTO bookmark_tag (bookmark_id, tag_id) VALUES (?1, ?2)",
                params![id, tag_id],
            )
            .map_err(|e| BookmarkError::DatabaseError(e.to_string()))?;

            kept_tags.push(Tag {
                id: tag_id,
                name: name.to_string(),
                ..Default::default()
            });
        }

        Ok(Bookmark {
            id,
            modified: now,
            has_content: !book.content.is_empty(),
            tags: kept_tags,
            ..book.clone()
        })
    }
}

impl<'a> BookmarkManagerTrait for BookmarkManager<'a> {
    /// Returns the next free bookmark ID.
    fn create_new_id(&self) -> Result<i64, BookmarkError> {
        self.conn
            .query_row("SELECT COALESCE(MAX(id), 0) + 1 FROM bookmark", [], |row| row.get(0))
            .map_err(|e| BookmarkError::DatabaseError(e.to_string()))
    }

    /// Lists bookmarks matching the filter. Readable content is only loaded
    /// when `with_content` is set.
    fn get_bookmarks(&self, options: &GetBookmarksOptions) -> Result<Vec<Bookmark>, BookmarkError> {
        let (clause, mut args) = Self::filter_clause(options);
        let content_columns = if options.with_content {
            "b.content, b.html"
        } else {
            "'', ''"
        };

        let order = match options.order_method {
            OrderMethod::Default => " ORDER BY b.id",
            OrderMethod::ByLastAdded => " ORDER BY b.id DESC",
            OrderMethod::ByLastModified => " ORDER BY b.modified DESC, b.id DESC",
        };

        let mut sql = format!(
            "SELECT b.id, b.url, b.title, b.excerpt, b.author, b.public, b.modified, \
             b.content <> '', {} FROM bookmark b{}{}",
            content_columns, clause, order
        );

        if options.limit > 0 {
            sql.push_str(" LIMIT ? OFFSET ?");
            args.push(Value::Integer(options.limit));
            args.push(Value::Integer(options.offset.max(0)));
        }

        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|e| BookmarkError::DatabaseError(e.to_string()))?;

        let rows = stmt
            .query_map(params_from_iter(args), Self::row_to_bookmark)
            .map_err(|e| BookmarkError::DatabaseError(e.to_string()))?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row.map_err(|e| BookmarkError::DatabaseError(e.to_string()))?);
        }

        for book in &mut results {
            book.tags = self.tags_of(book.id)?;
        }
        Ok(results)
    }

    fn get_bookmarks_count(&self, options: &GetBookmarksOptions) -> Result<i64, BookmarkError> {
        let (clause, args) = Self::filter_clause(options);
        let sql = format!("SELECT COUNT(*) FROM bookmark b{}", clause);
        self.conn
            .query_row(&sql, params_from_iter(args), |row| row.get(0))
            .map_err(|e| BookmarkError::DatabaseError(e.to_string()))
    }

    fn get_bookmark(&self, id: i64, with_content: bool) -> Result<Bookmark, BookmarkError> {
        let options = GetBookmarksOptions {
            ids: vec![id],
            with_content,
            ..Default::default()
        };
        self.get_bookmarks(&options)?
            .into_iter()
            .next()
            .ok_or(BookmarkError::NotFound(id))
    }

    fn save_bookmarks(&self, bookmarks: &[Bookmark]) -> Result<Vec<Bookmark>, BookmarkError> {
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|e| BookmarkError::DatabaseError(e.to_string()))?;

        let now = Self::now();
        let mut saved = Vec::with_capacity(bookmarks.len());
        for book in bookmarks {
            saved.push(Self::save_one(&tx, book, now)?);
        }

        tx.commit()
            .map_err(|e| BookmarkError::DatabaseError(e.to_string()))?;
        Ok(saved)
    }

    /// Deletes bookmarks by ID. Their tag links are removed by cascade.
    fn delete_bookmarks(&self, ids: &[i64]) -> Result<(), BookmarkError> {
        if ids.is_empty() {
            return Ok(());
        }

        let sql = format!("DELETE FROM bookmark WHERE id IN ({})", placeholders(ids.len()));
        self.conn
            .execute(&sql, params_from_iter(ids.iter()))
            .map_err(|e| BookmarkError::DatabaseError(e.to_string()))?;
        Ok(())
    }

    /// Lists all tags with the number of bookmarks using each.
    fn get_tags(&self) -> Result<Vec<Tag>, BookmarkError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT t.id, t.name, COUNT(bt.tag_id) FROM tag t \
                 LEFT JOIN bookmark_tag bt ON bt.tag_id = t.id \
                 GROUP BY t.id, t.name ORDER BY t.name",
            )
            .map_err(|e| BookmarkError::DatabaseError(e.to_string()))?;

        let rows = stmt
            .query_map([], |row| {
                Ok(Tag {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    deleted: false,
                    n_bookmarks: row.get(2)?,
                })
            })
            .map_err(|e| BookmarkError::DatabaseError(e.to_string()))?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row.map_err(|e| BookmarkError::DatabaseError(e.to_string()))?);
        }
        Ok(results)
    }

    fn rename_tag(&self, id: i64, name: &str) -> Result<(), BookmarkError> {
        let existing: Option<i64> = self
            .conn
            .query_row("SELECT id FROM tag WHERE id = ?1", params![id], |row| row.get(0))
            .optional()
            .map_err(|e| BookmarkError::DatabaseError(e.to_string()))?;

        if existing.is_none() {
            return Err(BookmarkError::TagNotFound(id));
        }

        self.conn
            .execute("UPDATE tag SET name = ?1 WHERE id = ?2", params![name.trim(), id])
            .map_err(|e| BookmarkError::DatabaseError(e.to_string()))?;
        Ok(())
    }
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}
