//! Category and tag storage
//!
//! Both are shared between posts. Category slugs follow the title on every
//! save; tag slugs are fixed by the (unique) tag name.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::error::EngagementError;
use crate::slug::slugify;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryRow {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub slug: String,
}

impl CategoryRow {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            title: row.get("title")?,
            description: row.get("description")?,
            slug: row.get("slug")?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryWithCount {
    #[serde(flatten)]
    pub category: CategoryRow,
    pub post_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagRow {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

impl TagRow {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            slug: row.get("slug")?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TagWithCount {
    #[serde(flatten)]
    pub tag: TagRow,
    pub post_count: u64,
}

// =============================================================================
// Categories
// =============================================================================

pub fn create_category(
    conn: &Connection,
    title: &str,
    description: &str,
) -> Result<CategoryRow, EngagementError> {
    conn.execute(
        "INSERT INTO categories (title, description, slug) VALUES (?, ?, ?)",
        params![title, description, slugify(title)],
    )?;
    require_category(conn, conn.last_insert_rowid())
}

/// Save a category; the slug is recomputed from the new title
pub fn update_category(
    conn: &Connection,
    id: i64,
    title: &str,
    description: &str,
) -> Result<CategoryRow, EngagementError> {
    let changes = conn.execute(
        "UPDATE categories SET title = ?, description = ?, slug = ? WHERE id = ?",
        params![title, description, slugify(title), id],
    )?;
    if changes == 0 {
        return Err(EngagementError::not_found("category", id));
    }
    require_category(conn, id)
}

pub fn get_category(conn: &Connection, id: i64) -> Result<Option<CategoryRow>, EngagementError> {
    let row = conn
        .query_row("SELECT * FROM categories WHERE id = ?", params![id], |row| {
            CategoryRow::from_row(row)
        })
        .optional()?;
    Ok(row)
}

pub fn require_category(conn: &Connection, id: i64) -> Result<CategoryRow, EngagementError> {
    get_category(conn, id)?.ok_or_else(|| EngagementError::not_found("category", id))
}

/// First category with the slug (slugs are derived, so titles may collide)
pub fn get_category_by_slug(
    conn: &Connection,
    slug: &str,
) -> Result<Option<CategoryRow>, EngagementError> {
    let row = conn
        .query_row(
            "SELECT * FROM categories WHERE slug = ? ORDER BY id LIMIT 1",
            params![slug],
            |row| CategoryRow::from_row(row),
        )
        .optional()?;
    Ok(row)
}

/// All categories with their post counts, busiest first
pub fn list_categories_with_counts(
    conn: &Connection,
) -> Result<Vec<CategoryWithCount>, EngagementError> {
    let mut stmt = conn.prepare(
        "SELECT c.*, COUNT(p.id) AS post_count
         FROM categories c
         LEFT JOIN posts p ON p.category_id = c.id
         GROUP BY c.id
         ORDER BY post_count DESC, c.id ASC",
    )?;
    let rows = stmt.query_map([], category_with_count)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Categories an owner has published in, with counts
pub fn categories_for_owner(
    conn: &Connection,
    owner_id: i64,
) -> Result<Vec<CategoryWithCount>, EngagementError> {
    let mut stmt = conn.prepare(
        "SELECT c.*, COUNT(p.id) AS post_count
         FROM categories c
         INNER JOIN posts p ON p.category_id = c.id
         WHERE p.owner_id = ? AND p.status = 'published'
         GROUP BY c.id
         ORDER BY post_count DESC, c.id ASC",
    )?;
    let rows = stmt.query_map(params![owner_id], category_with_count)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

fn category_with_count(row: &Row) -> Result<CategoryWithCount, rusqlite::Error> {
    let post_count: i64 = row.get("post_count")?;
    Ok(CategoryWithCount {
        category: CategoryRow::from_row(row)?,
        post_count: post_count as u64,
    })
}

// =============================================================================
// Tags
// =============================================================================

/// Get or create a tag by name
pub fn upsert_tag(conn: &Connection, name: &str) -> Result<TagRow, EngagementError> {
    let name = name.trim();
    conn.execute(
        "INSERT OR IGNORE INTO tags (name, slug) VALUES (?, ?)",
        params![name, slugify(name)],
    )?;
    let row = conn.query_row("SELECT * FROM tags WHERE name = ?", params![name], |row| {
        TagRow::from_row(row)
    })?;
    Ok(row)
}

pub fn get_tag(conn: &Connection, id: i64) -> Result<Option<TagRow>, EngagementError> {
    let row = conn
        .query_row("SELECT * FROM tags WHERE id = ?", params![id], |row| {
            TagRow::from_row(row)
        })
        .optional()?;
    Ok(row)
}

pub fn get_tag_by_slug(conn: &Connection, slug: &str) -> Result<Option<TagRow>, EngagementError> {
    let row = conn
        .query_row(
            "SELECT * FROM tags WHERE slug = ? ORDER BY id LIMIT 1",
            params![slug],
            |row| TagRow::from_row(row),
        )
        .optional()?;
    Ok(row)
}

/// Tags of a post, alphabetical
pub fn tags_for_post(conn: &Connection, post_id: i64) -> Result<Vec<TagRow>, EngagementError> {
    let mut stmt = conn.prepare(
        "SELECT t.* FROM tags t
         INNER JOIN post_tags pt ON pt.tag_id = t.id
         WHERE pt.post_id = ?
         ORDER BY t.name",
    )?;
    let rows = stmt.query_map(params![post_id], |row| TagRow::from_row(row))?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Tag cloud: every tag with the number of posts carrying it
pub fn list_tags_with_counts(conn: &Connection) -> Result<Vec<TagWithCount>, EngagementError> {
    let mut stmt = conn.prepare(
        "SELECT t.*, COUNT(pt.post_id) AS post_count
         FROM tags t
         LEFT JOIN post_tags pt ON pt.tag_id = t.id
         GROUP BY t.id
         ORDER BY post_count DESC, t.id ASC",
    )?;
    let rows = stmt.query_map([], tag_with_count)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Most used tags among the posts of one category
pub fn popular_tags_in_category(
    conn: &Connection,
    category_id: i64,
    limit: i64,
) -> Result<Vec<TagWithCount>, EngagementError> {
    let mut stmt = conn.prepare(
        "SELECT t.*, COUNT(DISTINCT p.id) AS post_count
         FROM tags t
         INNER JOIN post_tags pt ON pt.tag_id = t.id
         INNER JOIN posts p ON p.id = pt.post_id
         WHERE p.category_id = ?
         GROUP BY t.id
         ORDER BY post_count DESC, t.id ASC
         LIMIT ?",
    )?;
    let rows = stmt.query_map(params![category_id, limit], tag_with_count)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Tags an owner has used on published posts, with counts
pub fn tags_for_owner(conn: &Connection, owner_id: i64) -> Result<Vec<TagWithCount>, EngagementError> {
    let mut stmt = conn.prepare(
        "SELECT t.*, COUNT(DISTINCT p.id) AS post_count
         FROM tags t
         INNER JOIN post_tags pt ON pt.tag_id = t.id
         INNER JOIN posts p ON p.id = pt.post_id
         WHERE p.owner_id = ? AND p.status = 'published'
         GROUP BY t.id
         ORDER BY post_count DESC, t.id ASC",
    )?;
    let rows = stmt.query_map(params![owner_id], tag_with_count)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

fn tag_with_count(row: &Row) -> Result<TagWithCount, rusqlite::Error> {
    let post_count: i64 = row.get("post_count")?;
    Ok(TagWithCount {
        tag: TagRow::from_row(row)?,
        post_count: post_count as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ContentDb;

    #[test]
    fn test_category_slug_follows_title_on_save() {
        let db = ContentDb::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let cat = create_category(conn, "Web Development", "")?;
            assert_eq!(cat.slug, "web-development");

            let renamed = update_category(conn, cat.id, "Backend Engineering", "servers")?;
            assert_eq!(renamed.slug, "backend-engineering");
            assert_eq!(renamed.description, "servers");
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_update_missing_category_is_not_found() {
        let db = ContentDb::open_in_memory().unwrap();
        let err = db
            .with_conn(|conn| update_category(conn, 42, "X", ""))
            .unwrap_err();
        assert!(matches!(err, EngagementError::NotFound(_)));
    }

    #[test]
    fn test_upsert_tag_reuses_existing() {
        let db = ContentDb::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let first = upsert_tag(conn, "Rust Lang")?;
            let again = upsert_tag(conn, " Rust Lang ")?;
            assert_eq!(first, again);
            assert_eq!(first.slug, "rust-lang");
            assert_eq!(get_tag_by_slug(conn, "rust-lang")?, Some(first));
            Ok(())
        })
        .unwrap();
    }
}
