//! Identity service - registration, follows and author profiles

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use url::Url;

use crate::db::{self, identities, AuthorProfileRow, ContentDb, CreateIdentityInput, IdentityRow};
use crate::error::EngagementError;
use crate::gate::{RoleGate, Viewer};

use super::events::{EngagementEvent, EventBus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FollowCounts {
    pub followers: u64,
    pub following: u64,
}

/// Profile edit; `None` bio keeps the current one, links are merged per key
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub social_links: BTreeMap<String, String>,
}

pub struct IdentityService {
    content_db: Arc<ContentDb>,
    events: Arc<EventBus>,
    gate: Arc<RoleGate>,
}

impl IdentityService {
    pub fn new(content_db: Arc<ContentDb>, events: Arc<EventBus>, gate: Arc<RoleGate>) -> Self {
        Self {
            content_db,
            events,
            gate,
        }
    }

    pub fn register(&self, input: &CreateIdentityInput) -> Result<IdentityRow, EngagementError> {
        if input.display_name.trim().is_empty() {
            return Err(EngagementError::InvalidInput("display_name is required".into()));
        }
        let email = input.email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(EngagementError::InvalidInput(format!(
                "'{}' is not a valid email address",
                input.email
            )));
        }

        let identity = self
            .content_db
            .with_conn(|conn| identities::create_identity(conn, input, db::now()))?;

        info!(id = identity.id, role = %identity.role, "Identity registered");
        self.events
            .emit(EngagementEvent::IdentityCreated { id: identity.id });
        Ok(identity)
    }

    pub fn get(&self, id: i64) -> Result<Option<IdentityRow>, EngagementError> {
        self.content_db.with_conn(|conn| identities::get_identity(conn, id))
    }

    /// Resolve the id forwarded by the auth gateway. No id means anonymous;
    /// an id with no identity behind it is a lookup failure.
    pub fn resolve_viewer(&self, identity_id: Option<i64>) -> Result<Viewer, EngagementError> {
        let Some(id) = identity_id else {
            return Ok(Viewer::Anonymous);
        };
        match self.get(id)? {
            Some(identity) => Ok(Viewer::Authenticated(identity)),
            None => {
                warn!(identity_id = id, "Unknown identity in request");
                Err(EngagementError::not_found("identity", id))
            }
        }
    }

    // =========================================================================
    // Follows
    // =========================================================================

    /// Follow `target_id`; returns false when already following
    pub fn follow(&self, viewer: &Viewer, target_id: i64) -> Result<bool, EngagementError> {
        let follower = require_login(viewer)?;
        if follower.id == target_id {
            return Err(EngagementError::InvalidInput("cannot follow yourself".into()));
        }

        let created = self.content_db.with_conn(|conn| {
            identities::require_identity(conn, target_id)?;
            identities::follow(conn, follower.id, target_id, db::now())
        })?;

        if created {
            self.events.emit(EngagementEvent::Followed {
                follower_id: follower.id,
                following_id: target_id,
            });
        }
        Ok(created)
    }

    pub fn unfollow(&self, viewer: &Viewer, target_id: i64) -> Result<bool, EngagementError> {
        let follower = require_login(viewer)?;

        let removed = self
            .content_db
            .with_conn(|conn| identities::unfollow(conn, follower.id, target_id))?;

        if removed {
            self.events.emit(EngagementEvent::Unfollowed {
                follower_id: follower.id,
                following_id: target_id,
            });
        }
        Ok(removed)
    }

    pub fn follow_counts(&self, identity_id: i64) -> Result<FollowCounts, EngagementError> {
        self.content_db.with_conn(|conn| {
            identities::require_identity(conn, identity_id)?;
            let (followers, following) = identities::follow_counts(conn, identity_id)?;
            Ok(FollowCounts {
                followers,
                following,
            })
        })
    }

    // =========================================================================
    // Author profiles
    // =========================================================================

    /// The caller's author profile, created on first access
    pub fn get_or_create_profile(&self, viewer: &Viewer) -> Result<AuthorProfileRow, EngagementError> {
        let author = self.gate.require_author(viewer)?;

        self.content_db.with_conn(|conn| {
            match identities::get_author_profile(conn, author.id)? {
                Some(profile) => Ok(profile),
                None => {
                    let profile = identities::create_author_profile(conn, author)?;
                    info!(identity_id = author.id, slug = %profile.slug, "Author profile created");
                    Ok(profile)
                }
            }
        })
    }

    pub fn update_profile(
        &self,
        viewer: &Viewer,
        update: &ProfileUpdate,
    ) -> Result<AuthorProfileRow, EngagementError> {
        for (network, url) in &update.social_links {
            validate_link(network, url)?;
        }
        let author_id = self.gate.require_author(viewer)?.id;
        self.get_or_create_profile(viewer)?;

        let profile = self.content_db.with_conn(|conn| {
            identities::update_author_profile(
                conn,
                author_id,
                update.bio.as_deref(),
                &update.social_links,
            )
        })?;

        self.events.emit(EngagementEvent::ProfileUpdated {
            identity_id: author_id,
        });
        Ok(profile)
    }
}

fn require_login(viewer: &Viewer) -> Result<&IdentityRow, EngagementError> {
    viewer
        .identity()
        .ok_or_else(|| EngagementError::PermissionDenied("authentication required".into()))
}

fn validate_link(network: &str, link: &str) -> Result<(), EngagementError> {
    if network.trim().is_empty() {
        return Err(EngagementError::InvalidInput("social link name is required".into()));
    }
    let invalid = || {
        EngagementError::InvalidInput(format!(
            "{} link must be an http(s) URL, got '{}'",
            network, link
        ))
    };

    // The parser percent-encodes inner whitespace instead of failing
    if link.contains(char::is_whitespace) {
        return Err(invalid());
    }
    let parsed = Url::parse(link).map_err(|_| invalid())?;
    let has_host = parsed.host_str().is_some_and(|host| !host.is_empty());
    if !matches!(parsed.scheme(), "http" | "https") || !has_host {
        return Err(invalid());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_link() {
        assert!(validate_link("instagram", "https://instagram.com/pastel").is_ok());
        assert!(validate_link("linkedin", "http://linkedin.com/in/x").is_ok());
        assert!(validate_link("instagram", "instagram.com/pastel").is_err());
        assert!(validate_link("instagram", "https://").is_err());
        assert!(validate_link("", "https://x.io").is_err());
        assert!(validate_link("x", "https://x.io/a b").is_err());
        assert!(validate_link("x", "ftp://x.io/file").is_err());
    }

    #[test]
    fn test_validate_link_rejects_unparseable_urls() {
        for link in ["https://[::", "https://exa%mple.com", "http://:80", "https://a..b<>"] {
            assert!(
                matches!(validate_link("x", link), Err(EngagementError::InvalidInput(_))),
                "{} should be rejected",
                link
            );
        }
    }
}
