//! SQLite database module for posts, comments and identities
//!
//! ## Tables
//!
//! - `identities` - Readers and authors (role column drives RoleGate)
//! - `follows` - Identity follows identity, unique per ordered pair
//! - `author_profiles` - One profile per author identity
//! - `categories` - Shared categories with derived slugs
//! - `tags` / `post_tags` - Shared tags, many-to-many with posts
//! - `posts` - Content items with lifetime and weekly view counters
//! - `comments` - Comments with optional parent (reply) reference

pub mod schema;
pub mod identities;
pub mod categories;
pub mod posts;
pub mod comments;

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::EngagementError;

/// Fixed-width text form so timestamps compare correctly as strings
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Encode a timestamp for storage
pub fn encode_timestamp(ts: DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Decode a stored timestamp
pub fn decode_timestamp(raw: &str) -> Result<DateTime<Utc>, rusqlite::Error> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}

/// Current time truncated to the stored precision
pub fn now() -> DateTime<Utc> {
    let now = Utc::now();
    // round-trip so in-memory values equal what a later read returns
    decode_timestamp(&encode_timestamp(now)).unwrap_or(now)
}

/// SQLite database for the engagement core
pub struct ContentDb {
    conn: Mutex<Connection>,
}

impl ContentDb {
    /// Open or create the database in `storage_dir`
    pub fn open(storage_dir: &Path) -> Result<Self, EngagementError> {
        let db_path = storage_dir.join("pastel.db");
        Self::open_file(&db_path)
    }

    /// Open or create the database at an explicit file path
    pub fn open_file(db_path: &Path) -> Result<Self, EngagementError> {
        info!("Opening SQLite database at {:?}", db_path);

        let conn = Connection::open(db_path)
            .map_err(|e| EngagementError::Internal(format!("Failed to open SQLite: {}", e)))?;

        // WAL for concurrent readers; busy timeout so concurrent writers queue
        // on the database lock instead of failing
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| EngagementError::Internal(format!("Failed to set PRAGMA: {}", e)))?;
        conn.busy_timeout(Duration::from_secs(5))?;

        Self::from_connection(conn)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self, EngagementError> {
        debug!("Opening in-memory SQLite database");

        let conn = Connection::open_in_memory().map_err(|e| {
            EngagementError::Internal(format!("Failed to open in-memory SQLite: {}", e))
        })?;

        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, EngagementError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.with_conn(schema::init_schema)?;
        Ok(db)
    }

    /// Run a read with the shared connection
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, EngagementError>
    where
        F: FnOnce(&Connection) -> Result<T, EngagementError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| EngagementError::Internal(format!("Lock poisoned: {}", e)))?;
        f(&conn)
    }

    /// Execute a write operation with exclusive access (for transactions)
    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T, EngagementError>
    where
        F: FnOnce(&mut Connection) -> Result<T, EngagementError>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| EngagementError::Internal(format!("Lock poisoned: {}", e)))?;
        f(&mut conn)
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats, EngagementError> {
        self.with_conn(|conn| {
            let count = |table: &str| -> Result<u64, EngagementError> {
                let n: i64 = conn.query_row(
                    &format!("SELECT COUNT(*) FROM {}", table),
                    [],
                    |row| row.get(0),
                )?;
                Ok(n as u64)
            };

            Ok(DbStats {
                post_count: count("posts")?,
                comment_count: count("comments")?,
                identity_count: count("identities")?,
                category_count: count("categories")?,
                tag_count: count("tags")?,
            })
        })
    }
}

/// Database statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct DbStats {
    pub post_count: u64,
    pub comment_count: u64,
    pub identity_count: u64,
    pub category_count: u64,
    pub tag_count: u64,
}

// Re-exports
pub use categories::{CategoryRow, CategoryWithCount, TagRow, TagWithCount};
pub use comments::{CommentRow, CommentThread, CreateCommentInput};
pub use identities::{AuthorProfileRow, IdentityRow, CreateIdentityInput};
pub use posts::{
    AuthorStats, CreatePostInput, PostQuery, PostRow, PostStatus, RankedPost, UpdatePostInput,
    ViewCounts, ViewTotals,
};

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_roundtrip_and_ordering() {
        let early = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let late = Utc.with_ymd_and_hms(2026, 11, 2, 3, 4, 5).unwrap();

        assert_eq!(encode_timestamp(early), "2026-01-02T03:04:05Z");
        assert_eq!(decode_timestamp(&encode_timestamp(early)).unwrap(), early);
        assert!(encode_timestamp(early) < encode_timestamp(late));
    }

    #[test]
    fn test_open_in_memory_has_empty_tables() {
        let db = ContentDb::open_in_memory().unwrap();
        let stats = db.stats().unwrap();
        assert_eq!(stats.post_count, 0);
        assert_eq!(stats.identity_count, 0);
    }

    #[test]
    fn test_reopen_file_keeps_schema() {
        let dir = tempfile::TempDir::new().unwrap();
        {
            let db = ContentDb::open(dir.path()).unwrap();
            db.with_conn(|conn| {
                conn.execute(
                    "INSERT INTO categories (title, description, slug) VALUES ('Rust', '', 'rust')",
                    [],
                )?;
                Ok(())
            })
            .unwrap();
        }
        let db = ContentDb::open(dir.path()).unwrap();
        assert_eq!(db.stats().unwrap().category_count, 1);
    }
}
