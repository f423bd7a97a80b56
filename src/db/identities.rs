//! Identity, follow and author profile storage

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::db::{decode_timestamp, encode_timestamp};
use crate::error::EngagementError;
use crate::gate::Role;
use crate::slug;

/// Identity row from database
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentityRow {
    pub id: i64,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub job: String,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl IdentityRow {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        let role: String = row.get("role")?;
        let created_at: String = row.get("created_at")?;
        Ok(Self {
            id: row.get("id")?,
            email: row.get("email")?,
            display_name: row.get("display_name")?,
            role: Role::from_stored(&role),
            job: row.get("job")?,
            phone: row.get("phone")?,
            created_at: decode_timestamp(&created_at)?,
        })
    }
}

/// Input for registering an identity
#[derive(Debug, Clone, Deserialize)]
pub struct CreateIdentityInput {
    pub email: String,
    pub display_name: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub job: String,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Author profile row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthorProfileRow {
    pub identity_id: i64,
    pub bio: String,
    pub social_links: BTreeMap<String, String>,
    pub slug: String,
}

impl AuthorProfileRow {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        let links_json: String = row.get("social_links_json")?;
        let social_links = serde_json::from_str(&links_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?;
        Ok(Self {
            identity_id: row.get("identity_id")?,
            bio: row.get("bio")?,
            social_links,
            slug: row.get("slug")?,
        })
    }
}

/// Map a UNIQUE violation to a conflict, everything else passes through
pub(crate) fn map_unique_violation(e: rusqlite::Error, what: &str) -> EngagementError {
    match &e {
        rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation => {
            EngagementError::Conflict(format!("{} already exists", what))
        }
        _ => EngagementError::Database(e),
    }
}

// =============================================================================
// Identities
// =============================================================================

pub fn create_identity(
    conn: &Connection,
    input: &CreateIdentityInput,
    now: DateTime<Utc>,
) -> Result<IdentityRow, EngagementError> {
    conn.execute(
        "INSERT INTO identities (email, display_name, role, job, phone, created_at)
         VALUES (?, ?, ?, ?, ?, ?)",
        params![
            input.email.trim().to_lowercase(),
            input.display_name,
            input.role.as_str(),
            input.job,
            input.phone,
            encode_timestamp(now),
        ],
    )
    .map_err(|e| map_unique_violation(e, &format!("identity with email {}", input.email)))?;

    let id = conn.last_insert_rowid();
    get_identity(conn, id)?
        .ok_or_else(|| EngagementError::Internal("Identity not found after insert".into()))
}

pub fn get_identity(conn: &Connection, id: i64) -> Result<Option<IdentityRow>, EngagementError> {
    let row = conn
        .query_row("SELECT * FROM identities WHERE id = ?", params![id], |row| {
            IdentityRow::from_row(row)
        })
        .optional()?;
    Ok(row)
}

/// Fetch an identity or fail with NotFound
pub fn require_identity(conn: &Connection, id: i64) -> Result<IdentityRow, EngagementError> {
    get_identity(conn, id)?.ok_or_else(|| EngagementError::not_found("identity", id))
}

// =============================================================================
// Follows
// =============================================================================

/// Returns false when the pair already existed
pub fn follow(
    conn: &Connection,
    follower_id: i64,
    following_id: i64,
    now: DateTime<Utc>,
) -> Result<bool, EngagementError> {
    let changes = conn.execute(
        "INSERT OR IGNORE INTO follows (follower_id, following_id, created_at) VALUES (?, ?, ?)",
        params![follower_id, following_id, encode_timestamp(now)],
    )?;
    Ok(changes > 0)
}

pub fn unfollow(conn: &Connection, follower_id: i64, following_id: i64) -> Result<bool, EngagementError> {
    let changes = conn.execute(
        "DELETE FROM follows WHERE follower_id = ? AND following_id = ?",
        params![follower_id, following_id],
    )?;
    Ok(changes > 0)
}

/// (followers, following) for an identity
pub fn follow_counts(conn: &Connection, identity_id: i64) -> Result<(u64, u64), EngagementError> {
    let (followers, following): (i64, i64) = conn.query_row(
        "SELECT
            (SELECT COUNT(*) FROM follows WHERE following_id = ?1),
            (SELECT COUNT(*) FROM follows WHERE follower_id = ?1)",
        params![identity_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    Ok((followers as u64, following as u64))
}

// =============================================================================
// Author profiles
// =============================================================================

pub fn get_author_profile(
    conn: &Connection,
    identity_id: i64,
) -> Result<Option<AuthorProfileRow>, EngagementError> {
    let row = conn
        .query_row(
            "SELECT * FROM author_profiles WHERE identity_id = ?",
            params![identity_id],
            |row| AuthorProfileRow::from_row(row),
        )
        .optional()?;
    Ok(row)
}

pub fn get_author_profile_by_slug(
    conn: &Connection,
    slug: &str,
) -> Result<Option<AuthorProfileRow>, EngagementError> {
    let row = conn
        .query_row(
            "SELECT * FROM author_profiles WHERE slug = ?",
            params![slug],
            |row| AuthorProfileRow::from_row(row),
        )
        .optional()?;
    Ok(row)
}

/// Create the profile, slug taken from the display name at creation time
pub fn create_author_profile(
    conn: &Connection,
    identity: &IdentityRow,
) -> Result<AuthorProfileRow, EngagementError> {
    let slug = slug::unique_slug(&slug::slugify(&identity.display_name), |candidate| {
        let taken: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM author_profiles WHERE slug = ?",
                params![candidate],
                |row| row.get(0),
            )
            .optional()?;
        Ok(taken.is_some())
    })?;

    conn.execute(
        "INSERT INTO author_profiles (identity_id, bio, social_links_json, slug) VALUES (?, '', '{}', ?)",
        params![identity.id, slug],
    )
    .map_err(|e| map_unique_violation(e, "author profile"))?;

    get_author_profile(conn, identity.id)?
        .ok_or_else(|| EngagementError::Internal("Profile not found after insert".into()))
}

/// Overwrite bio (when given) and merge social links key by key
pub fn update_author_profile(
    conn: &Connection,
    identity_id: i64,
    bio: Option<&str>,
    social_links: &BTreeMap<String, String>,
) -> Result<AuthorProfileRow, EngagementError> {
    let mut profile = get_author_profile(conn, identity_id)?
        .ok_or_else(|| EngagementError::not_found("author profile", identity_id))?;

    if let Some(bio) = bio {
        profile.bio = bio.to_string();
    }
    for (network, url) in social_links {
        profile.social_links.insert(network.clone(), url.clone());
    }

    conn.execute(
        "UPDATE author_profiles SET bio = ?, social_links_json = ? WHERE identity_id = ?",
        params![profile.bio, serde_json::to_string(&profile.social_links)?, identity_id],
    )?;

    Ok(profile)
}
