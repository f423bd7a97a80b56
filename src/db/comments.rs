//! Comment storage
//!
//! A comment may reference a parent comment on the same post. Listings
//! surface root comments and their direct replies; deeper chains are stored
//! but never walked.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::db::{decode_timestamp, encode_timestamp};
use crate::error::EngagementError;

/// Joined with the author's name and the post's title/owner for display
const SELECT_COMMENT: &str = "SELECT c.*, i.display_name AS author_name,
        p.title AS post_title, p.owner_id AS post_owner_id
     FROM comments c
     INNER JOIN identities i ON i.id = c.author_id
     INNER JOIN posts p ON p.id = c.post_id";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentRow {
    pub id: i64,
    pub post_id: i64,
    pub author_id: i64,
    pub parent_id: Option<i64>,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub author_name: String,
    pub post_title: String,
    pub post_owner_id: i64,
}

impl CommentRow {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        let created_at: String = row.get("created_at")?;
        Ok(Self {
            id: row.get("id")?,
            post_id: row.get("post_id")?,
            author_id: row.get("author_id")?,
            parent_id: row.get("parent_id")?,
            body: row.get("body")?,
            created_at: decode_timestamp(&created_at)?,
            author_name: row.get("author_name")?,
            post_title: row.get("post_title")?,
            post_owner_id: row.get("post_owner_id")?,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateCommentInput {
    pub post_id: i64,
    pub author_id: i64,
    #[serde(default)]
    pub parent_id: Option<i64>,
    pub body: String,
    /// Backdate (imports)
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// A root comment with its direct replies
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentThread {
    pub comment: CommentRow,
    pub replies: Vec<CommentRow>,
}

pub fn create_comment(
    conn: &Connection,
    input: &CreateCommentInput,
    now: DateTime<Utc>,
) -> Result<CommentRow, EngagementError> {
    let body = input.body.trim();
    if body.is_empty() {
        return Err(EngagementError::InvalidInput("Comment body is required".into()));
    }
    crate::db::posts::require_post(conn, input.post_id)?;
    crate::db::identities::require_identity(conn, input.author_id)?;

    if let Some(parent_id) = input.parent_id {
        let parent = require_comment(conn, parent_id)?;
        if parent.post_id != input.post_id {
            return Err(EngagementError::InvalidInput(format!(
                "Parent comment {} belongs to another post",
                parent_id
            )));
        }
    }

    conn.execute(
        "INSERT INTO comments (post_id, author_id, parent_id, body, created_at)
         VALUES (?, ?, ?, ?, ?)",
        params![
            input.post_id,
            input.author_id,
            input.parent_id,
            body,
            encode_timestamp(input.created_at.unwrap_or(now)),
        ],
    )?;
    require_comment(conn, conn.last_insert_rowid())
}

pub fn get_comment(conn: &Connection, id: i64) -> Result<Option<CommentRow>, EngagementError> {
    let row = conn
        .query_row(
            &format!("{} WHERE c.id = ?", SELECT_COMMENT),
            params![id],
            |row| CommentRow::from_row(row),
        )
        .optional()?;
    Ok(row)
}

pub fn require_comment(conn: &Connection, id: i64) -> Result<CommentRow, EngagementError> {
    get_comment(conn, id)?.ok_or_else(|| EngagementError::not_found("comment", id))
}

/// Delete a comment; its replies cascade
pub fn delete_comment(conn: &Connection, id: i64) -> Result<bool, EngagementError> {
    let changes = conn.execute("DELETE FROM comments WHERE id = ?", params![id])?;
    Ok(changes > 0)
}

fn query_comments(
    conn: &Connection,
    filter_and_order: &str,
    params: &[&dyn rusqlite::ToSql],
) -> Result<Vec<CommentRow>, EngagementError> {
    let sql = format!("{} {}", SELECT_COMMENT, filter_and_order);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params, |row| CommentRow::from_row(row))?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Root comments of a post, newest first, each with its direct replies oldest first
pub fn list_threads(conn: &Connection, post_id: i64) -> Result<Vec<CommentThread>, EngagementError> {
    let roots = query_comments(
        conn,
        "WHERE c.post_id = ? AND c.parent_id IS NULL ORDER BY c.created_at DESC, c.id DESC",
        params![post_id],
    )?;

    let mut threads = Vec::with_capacity(roots.len());
    for root in roots {
        let replies = query_comments(
            conn,
            "WHERE c.parent_id = ? ORDER BY c.created_at ASC, c.id ASC",
            params![root.id],
        )?;
        threads.push(CommentThread {
            comment: root,
            replies,
        });
    }
    Ok(threads)
}

/// Comments on an owner's posts created at or after `since`
pub fn count_for_owner_since(
    conn: &Connection,
    owner_id: i64,
    since: DateTime<Utc>,
) -> Result<u64, EngagementError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM comments c
         INNER JOIN posts p ON p.id = c.post_id
         WHERE p.owner_id = ? AND c.created_at >= ?",
        params![owner_id, encode_timestamp(since)],
        |row| row.get(0),
    )?;
    Ok(count as u64)
}

/// Newest comments on an owner's posts, optionally bounded by `since`
pub fn recent_for_owner(
    conn: &Connection,
    owner_id: i64,
    since: Option<DateTime<Utc>>,
    limit: i64,
) -> Result<Vec<CommentRow>, EngagementError> {
    match since {
        Some(since) => query_comments(
            conn,
            "WHERE p.owner_id = ? AND c.created_at >= ?
             ORDER BY c.created_at DESC, c.id DESC LIMIT ?",
            params![owner_id, encode_timestamp(since), limit],
        ),
        None => query_comments(
            conn,
            "WHERE p.owner_id = ? ORDER BY c.created_at DESC, c.id DESC LIMIT ?",
            params![owner_id, limit],
        ),
    }
}

/// Every comment on an owner's posts, newest first
pub fn all_for_owner(conn: &Connection, owner_id: i64) -> Result<Vec<CommentRow>, EngagementError> {
    query_comments(
        conn,
        "WHERE p.owner_id = ? ORDER BY c.created_at DESC, c.id DESC",
        params![owner_id],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::categories::create_category;
    use crate::db::identities::{create_identity, CreateIdentityInput};
    use crate::db::posts::{create_post, CreatePostInput};
    use crate::db::ContentDb;
    use crate::gate::Role;
    use chrono::Duration;

    /// (author, reader, post) ids
    fn seed(db: &ContentDb) -> (i64, i64, i64) {
        db.with_conn_mut(|conn| {
            let mut ids = vec![];
            for (email, role) in [("author@x.io", Role::Author), ("reader@x.io", Role::Reader)] {
                let identity = create_identity(
                    conn,
                    &CreateIdentityInput {
                        email: email.into(),
                        display_name: email.into(),
                        role,
                        job: String::new(),
                        phone: None,
                    },
                    Utc::now(),
                )?;
                ids.push(identity.id);
            }
            let cat = create_category(conn, "General", "")?;
            let post = create_post(
                conn,
                &CreatePostInput {
                    owner_id: ids[0],
                    category_id: cat.id,
                    title: "Post".into(),
                    ..Default::default()
                },
                Utc::now(),
            )?;
            Ok((ids[0], ids[1], post.id))
        })
        .unwrap()
    }

    fn comment(post_id: i64, author_id: i64, parent_id: Option<i64>, body: &str) -> CreateCommentInput {
        CreateCommentInput {
            post_id,
            author_id,
            parent_id,
            body: body.into(),
            created_at: None,
        }
    }

    #[test]
    fn test_threads_show_direct_replies_only() {
        let db = ContentDb::open_in_memory().unwrap();
        let (author, reader, post) = seed(&db);

        db.with_conn(|conn| {
            let now = Utc::now();
            let root = create_comment(conn, &comment(post, reader, None, "root"), now - Duration::hours(2))?;
            let reply = create_comment(conn, &comment(post, author, Some(root.id), "reply"), now)?;
            create_comment(conn, &comment(post, reader, Some(reply.id), "nested"), now)?;
            let newer_root = create_comment(conn, &comment(post, reader, None, "second"), now)?;

            let threads = list_threads(conn, post)?;
            assert_eq!(threads.len(), 2);
            assert_eq!(threads[0].comment.id, newer_root.id);
            assert_eq!(threads[1].comment.id, root.id);
            assert_eq!(threads[1].replies.len(), 1);
            assert_eq!(threads[1].replies[0].body, "reply");
            assert_eq!(threads[1].replies[0].author_name, "author@x.io");
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_missing_parent_is_not_found() {
        let db = ContentDb::open_in_memory().unwrap();
        let (_, reader, post) = seed(&db);
        let err = db
            .with_conn(|conn| create_comment(conn, &comment(post, reader, Some(404), "x"), Utc::now()))
            .unwrap_err();
        assert!(matches!(err, EngagementError::NotFound(_)));
    }

    #[test]
    fn test_owner_window_counts() {
        let db = ContentDb::open_in_memory().unwrap();
        let (author, reader, post) = seed(&db);
        let now = Utc::now();

        db.with_conn(|conn| {
            let mut old = comment(post, reader, None, "old");
            old.created_at = Some(now - Duration::days(10));
            create_comment(conn, &old, now)?;
            for i in 0..6 {
                create_comment(conn, &comment(post, reader, None, &format!("c{}", i)), now)?;
            }

            let since = now - Duration::days(7);
            assert_eq!(count_for_owner_since(conn, author, since)?, 6);

            let recent = recent_for_owner(conn, author, Some(since), 5)?;
            assert_eq!(recent.len(), 5);
            assert_eq!(recent[0].body, "c5");
            assert_eq!(all_for_owner(conn, author)?.len(), 7);
            assert_eq!(count_for_owner_since(conn, reader, since)?, 0);
            Ok(())
        })
        .unwrap();
    }
}
