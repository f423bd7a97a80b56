//! Post storage: CRUD, view counters and the ranking/aggregate queries
//!
//! View counters are only ever touched by single SQL statements
//! (`views = views + 1`, `weekly_views = 0`), so concurrent writers on the
//! same row never lose updates.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::db::categories::{self, TagRow};
use crate::db::{decode_timestamp, encode_timestamp};
use crate::error::EngagementError;
use crate::slug;

/// Lifecycle status of a post; transitions are unconstrained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Draft,
    #[default]
    Published,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Published => "published",
        }
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostStatus {
    type Err = EngagementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(PostStatus::Draft),
            "published" => Ok(PostStatus::Published),
            other => Err(EngagementError::InvalidInput(format!(
                "Unknown post status '{}'",
                other
            ))),
        }
    }
}

/// Post row from database
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostRow {
    pub id: i64,
    pub owner_id: i64,
    pub category_id: i64,
    pub title: String,
    pub body: String,
    pub slug: String,
    pub status: PostStatus,
    pub views: u64,
    pub weekly_views: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Populated separately from post_tags
    pub tags: Vec<TagRow>,
}

impl PostRow {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        let status: String = row.get("status")?;
        let created_at: String = row.get("created_at")?;
        let updated_at: String = row.get("updated_at")?;
        let views: i64 = row.get("views")?;
        let weekly_views: i64 = row.get("weekly_views")?;

        Ok(Self {
            id: row.get("id")?,
            owner_id: row.get("owner_id")?,
            category_id: row.get("category_id")?,
            title: row.get("title")?,
            body: row.get("body")?,
            slug: row.get("slug")?,
            status: status.parse::<PostStatus>().map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    0,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?,
            views: views as u64,
            weekly_views: weekly_views as u64,
            created_at: decode_timestamp(&created_at)?,
            updated_at: decode_timestamp(&updated_at)?,
            tags: vec![],
        })
    }

    pub fn is_published(&self) -> bool {
        self.status == PostStatus::Published
    }
}

/// Input for creating a post
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreatePostInput {
    pub owner_id: i64,
    pub category_id: i64,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub status: PostStatus,
    /// Tag names; created on first use
    #[serde(default)]
    pub tags: Vec<String>,
    /// Backdate creation (imports); also used as the initial last-modified
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Partial update; `None` leaves the field untouched
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePostInput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub status: Option<PostStatus>,
    /// Replaces the whole tag set when present
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostOrder {
    /// created_at desc, id desc
    #[default]
    Newest,
    /// updated_at desc, id desc
    LastModified,
    /// views desc, id asc
    MostViewed,
}

/// Query parameters for listing posts
#[derive(Debug, Clone, Deserialize)]
pub struct PostQuery {
    #[serde(default)]
    pub owner_id: Option<i64>,
    #[serde(default)]
    pub status: Option<PostStatus>,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub tag_id: Option<i64>,
    /// Only posts modified at or after this instant
    #[serde(default)]
    pub modified_since: Option<DateTime<Utc>>,
    #[serde(default)]
    pub order: PostOrder,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    100
}

impl Default for PostQuery {
    fn default() -> Self {
        Self {
            owner_id: None,
            status: None,
            category_id: None,
            tag_id: None,
            modified_since: None,
            order: PostOrder::default(),
            limit: default_limit(),
            offset: 0,
        }
    }
}

/// Counter values right after an increment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ViewCounts {
    pub views: u64,
    pub weekly_views: u64,
}

/// A related-content candidate with its score
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedPost {
    pub post: PostRow,
    pub shared_tags: u64,
}

/// Draft/published breakdown for one owner
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AuthorStats {
    pub total_posts: u64,
    pub total_draft: u64,
    pub total_published: u64,
}

/// Lifetime and trailing-window view sums for one owner
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ViewTotals {
    pub total: u64,
    pub week: u64,
}

// =============================================================================
// CRUD
// =============================================================================

/// Create a post with its tags in one transaction
pub fn create_post(
    conn: &mut Connection,
    input: &CreatePostInput,
    now: DateTime<Utc>,
) -> Result<PostRow, EngagementError> {
    let title = input.title.trim();
    if title.is_empty() {
        return Err(EngagementError::InvalidInput("Post title is required".into()));
    }
    categories::require_category(conn, input.category_id)?;
    crate::db::identities::require_identity(conn, input.owner_id)?;

    let created_at = encode_timestamp(input.created_at.unwrap_or(now));

    let tx = conn.transaction()?;

    let slug = slug::unique_slug(&slug::slugify(title), |candidate| {
        let taken: Option<i64> = tx
            .query_row("SELECT 1 FROM posts WHERE slug = ?", params![candidate], |row| row.get(0))
            .optional()?;
        Ok(taken.is_some())
    })?;

    tx.execute(
        r#"
        INSERT INTO posts (
            owner_id, category_id, title, body, slug, status, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            input.owner_id,
            input.category_id,
            title,
            input.body,
            slug,
            input.status.as_str(),
            created_at,
            created_at,
        ],
    )?;
    let id = tx.last_insert_rowid();

    set_post_tags(&tx, id, &input.tags)?;
    tx.commit()?;

    debug!(post_id = id, slug = %slug, "Created post");
    require_post(conn, id)
}

/// Apply a partial update and bump last-modified. The slug never changes.
pub fn update_post(
    conn: &mut Connection,
    id: i64,
    input: &UpdatePostInput,
    now: DateTime<Utc>,
) -> Result<PostRow, EngagementError> {
    let mut post = require_post(conn, id)?;

    if let Some(title) = &input.title {
        let title = title.trim();
        if title.is_empty() {
            return Err(EngagementError::InvalidInput("Post title is required".into()));
        }
        post.title = title.to_string();
    }
    if let Some(body) = &input.body {
        post.body = body.clone();
    }
    if let Some(category_id) = input.category_id {
        categories::require_category(conn, category_id)?;
        post.category_id = category_id;
    }
    if let Some(status) = input.status {
        post.status = status;
    }

    let tx = conn.transaction()?;
    tx.execute(
        "UPDATE posts SET title = ?, body = ?, category_id = ?, status = ?, updated_at = ?
         WHERE id = ?",
        params![
            post.title,
            post.body,
            post.category_id,
            post.status.as_str(),
            encode_timestamp(now),
            id,
        ],
    )?;
    if let Some(tags) = &input.tags {
        tx.execute("DELETE FROM post_tags WHERE post_id = ?", params![id])?;
        set_post_tags(&tx, id, tags)?;
    }
    tx.commit()?;

    require_post(conn, id)
}

fn set_post_tags(conn: &Connection, post_id: i64, names: &[String]) -> Result<(), EngagementError> {
    for name in names {
        if name.trim().is_empty() {
            continue;
        }
        let tag = categories::upsert_tag(conn, name)?;
        conn.execute(
            "INSERT OR IGNORE INTO post_tags (post_id, tag_id) VALUES (?, ?)",
            params![post_id, tag.id],
        )?;
    }
    Ok(())
}

pub fn get_post(conn: &Connection, id: i64) -> Result<Option<PostRow>, EngagementError> {
    let post = conn
        .query_row("SELECT * FROM posts WHERE id = ?", params![id], |row| {
            PostRow::from_row(row)
        })
        .optional()?;

    match post {
        Some(mut post) => {
            post.tags = categories::tags_for_post(conn, post.id)?;
            Ok(Some(post))
        }
        None => Ok(None),
    }
}

/// Fetch a post or fail with NotFound
pub fn require_post(conn: &Connection, id: i64) -> Result<PostRow, EngagementError> {
    get_post(conn, id)?.ok_or_else(|| EngagementError::not_found("post", id))
}

pub fn get_post_by_slug(conn: &Connection, slug: &str) -> Result<Option<PostRow>, EngagementError> {
    let id: Option<i64> = conn
        .query_row("SELECT id FROM posts WHERE slug = ?", params![slug], |row| row.get(0))
        .optional()?;
    match id {
        Some(id) => get_post(conn, id),
        None => Ok(None),
    }
}

/// Delete a post; comments and tag links cascade
pub fn delete_post(conn: &Connection, id: i64) -> Result<bool, EngagementError> {
    let changes = conn.execute("DELETE FROM posts WHERE id = ?", params![id])?;
    Ok(changes > 0)
}

// =============================================================================
// Listing
// =============================================================================

fn query_conditions(query: &PostQuery) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
    let mut sql = String::new();
    let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![];
    let mut conditions = vec![];

    if let Some(tag_id) = query.tag_id {
        sql.push_str(" INNER JOIN post_tags pt ON pt.post_id = p.id");
        conditions.push("pt.tag_id = ?".to_string());
        params.push(Box::new(tag_id));
    }
    if let Some(owner_id) = query.owner_id {
        conditions.push("p.owner_id = ?".to_string());
        params.push(Box::new(owner_id));
    }
    if let Some(status) = query.status {
        conditions.push("p.status = ?".to_string());
        params.push(Box::new(status.as_str()));
    }
    if let Some(category_id) = query.category_id {
        conditions.push("p.category_id = ?".to_string());
        params.push(Box::new(category_id));
    }
    if let Some(since) = query.modified_since {
        conditions.push("p.updated_at >= ?".to_string());
        params.push(Box::new(encode_timestamp(since)));
    }

    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }
    (sql, params)
}

/// List posts matching a query
pub fn list_posts(conn: &Connection, query: &PostQuery) -> Result<Vec<PostRow>, EngagementError> {
    EngagementError::check_non_negative("limit", query.limit)?;
    EngagementError::check_non_negative("offset", query.offset)?;

    let (filter, mut params) = query_conditions(query);
    let order = match query.order {
        PostOrder::Newest => "p.created_at DESC, p.id DESC",
        PostOrder::LastModified => "p.updated_at DESC, p.id DESC",
        PostOrder::MostViewed => "p.views DESC, p.id ASC",
    };
    let sql = format!(
        "SELECT p.* FROM posts p{} ORDER BY {} LIMIT ? OFFSET ?",
        filter, order
    );
    params.push(Box::new(query.limit));
    params.push(Box::new(query.offset));

    debug!("Executing query: {}", sql);

    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(param_refs.as_slice(), |row| PostRow::from_row(row))?;

    let mut results = vec![];
    for row in rows {
        let mut post = row?;
        post.tags = categories::tags_for_post(conn, post.id)?;
        results.push(post);
    }
    Ok(results)
}

/// Count posts matching a query (limit/offset ignored)
pub fn count_posts(conn: &Connection, query: &PostQuery) -> Result<u64, EngagementError> {
    let (filter, params) = query_conditions(query);
    let sql = format!("SELECT COUNT(*) FROM posts p{}", filter);
    let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let count: i64 = conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))?;
    Ok(count as u64)
}

/// Most viewed posts in a category
pub fn popular_in_category(
    conn: &Connection,
    category_id: i64,
    limit: i64,
) -> Result<Vec<PostRow>, EngagementError> {
    list_posts(
        conn,
        &PostQuery {
            category_id: Some(category_id),
            order: PostOrder::MostViewed,
            limit,
            ..Default::default()
        },
    )
}

/// Most viewed posts carrying a tag
pub fn popular_with_tag(
    conn: &Connection,
    tag_id: i64,
    limit: i64,
) -> Result<Vec<PostRow>, EngagementError> {
    list_posts(
        conn,
        &PostQuery {
            tag_id: Some(tag_id),
            order: PostOrder::MostViewed,
            limit,
            ..Default::default()
        },
    )
}

// =============================================================================
// View counters
// =============================================================================

/// Add one view to both counters in a single statement.
///
/// Leaves `updated_at` alone: reading a post is not a modification.
pub fn increment_views(conn: &Connection, id: i64) -> Result<ViewCounts, EngagementError> {
    let counts = conn
        .query_row(
            "UPDATE posts SET views = views + 1, weekly_views = weekly_views + 1
             WHERE id = ? RETURNING views, weekly_views",
            params![id],
            |row| {
                let views: i64 = row.get(0)?;
                let weekly_views: i64 = row.get(1)?;
                Ok(ViewCounts {
                    views: views as u64,
                    weekly_views: weekly_views as u64,
                })
            },
        )
        .optional()?;

    counts.ok_or_else(|| EngagementError::not_found("post", id))
}

/// Zero the weekly counter of an owner's posts last modified before `cutoff`.
///
/// Returns how many rows actually changed, so a repeated call returns 0.
pub fn reset_stale_weekly_views(
    conn: &Connection,
    owner_id: i64,
    cutoff: DateTime<Utc>,
) -> Result<usize, EngagementError> {
    let changes = conn.execute(
        "UPDATE posts SET weekly_views = 0
         WHERE owner_id = ? AND updated_at < ? AND weekly_views <> 0",
        params![owner_id, encode_timestamp(cutoff)],
    )?;
    Ok(changes)
}

// =============================================================================
// Ranking and aggregates
// =============================================================================

/// Posts sharing a tag or the category with `post`, best first.
///
/// Order: shared tag count desc, lifetime views desc, id asc. No status filter.
pub fn related_candidates(
    conn: &Connection,
    post: &PostRow,
    limit: i64,
) -> Result<Vec<RankedPost>, EngagementError> {
    let mut stmt = conn.prepare(
        r#"
        SELECT p.*, COUNT(DISTINCT shared.tag_id) AS shared_tags
        FROM posts p
        LEFT JOIN post_tags shared
            ON shared.post_id = p.id
           AND shared.tag_id IN (SELECT tag_id FROM post_tags WHERE post_id = ?1)
        WHERE p.id <> ?1
          AND (p.category_id = ?2 OR shared.tag_id IS NOT NULL)
        GROUP BY p.id
        ORDER BY shared_tags DESC, p.views DESC, p.id ASC
        LIMIT ?3
        "#,
    )?;

    let rows = stmt.query_map(params![post.id, post.category_id, limit], |row| {
        let shared: i64 = row.get("shared_tags")?;
        Ok(RankedPost {
            post: PostRow::from_row(row)?,
            shared_tags: shared as u64,
        })
    })?;

    let mut results = vec![];
    for row in rows {
        let mut ranked = row?;
        ranked.post.tags = categories::tags_for_post(conn, ranked.post.id)?;
        results.push(ranked);
    }
    Ok(results)
}

/// Draft/published/total counts in one pass
pub fn author_stats(conn: &Connection, owner_id: i64) -> Result<AuthorStats, EngagementError> {
    let (total, draft, published): (i64, i64, i64) = conn.query_row(
        "SELECT
            COUNT(*),
            COALESCE(SUM(CASE WHEN status = 'draft' THEN 1 ELSE 0 END), 0),
            COALESCE(SUM(CASE WHEN status = 'published' THEN 1 ELSE 0 END), 0)
         FROM posts WHERE owner_id = ?",
        params![owner_id],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )?;

    Ok(AuthorStats {
        total_posts: total as u64,
        total_draft: draft as u64,
        total_published: published as u64,
    })
}

/// Lifetime views of all owned posts, weekly views of those modified since `cutoff`
pub fn view_sums(
    conn: &Connection,
    owner_id: i64,
    cutoff: DateTime<Utc>,
) -> Result<ViewTotals, EngagementError> {
    let (total, week): (i64, i64) = conn.query_row(
        "SELECT
            COALESCE(SUM(views), 0),
            COALESCE(SUM(CASE WHEN updated_at >= ?2 THEN weekly_views ELSE 0 END), 0)
         FROM posts WHERE owner_id = ?1",
        params![owner_id, encode_timestamp(cutoff)],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    Ok(ViewTotals {
        total: total as u64,
        week: week as u64,
    })
}
