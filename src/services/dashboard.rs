//! DashboardComposer - assembles the author dashboard and public author pages

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::config::EngagementConfig;
use crate::db::{
    categories, comments, identities, posts, AuthorProfileRow, AuthorStats, CategoryWithCount,
    CommentRow, ContentDb, IdentityRow, PostQuery, PostRow, PostStatus, TagWithCount, ViewTotals,
};
use crate::error::EngagementError;
use crate::gate::{RoleGate, Viewer};

use super::stats::StatsAggregator;

/// Everything the author dashboard shows
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub stats: AuthorStats,
    pub comment_count: u64,
    pub recent_comments: Vec<CommentRow>,
    pub total_views: ViewTotals,
}

/// Public page of one author
#[derive(Debug, Clone, Serialize)]
pub struct AuthorPage {
    pub identity: IdentityRow,
    pub profile: AuthorProfileRow,
    pub posts: Vec<PostRow>,
    pub categories: Vec<CategoryWithCount>,
    pub tags: Vec<TagWithCount>,
    pub recent_comments: Vec<CommentRow>,
    pub followers: u64,
    pub following: u64,
}

pub struct DashboardComposer {
    content_db: Arc<ContentDb>,
    gate: Arc<RoleGate>,
    stats: Arc<StatsAggregator>,
    config: EngagementConfig,
}

impl DashboardComposer {
    pub fn new(
        content_db: Arc<ContentDb>,
        gate: Arc<RoleGate>,
        stats: Arc<StatsAggregator>,
        config: EngagementConfig,
    ) -> Self {
        Self {
            content_db,
            gate,
            stats,
            config,
        }
    }

    /// Dashboard for the calling author; anyone else gets PermissionDenied
    pub fn compose_dashboard(&self, viewer: &Viewer) -> Result<Dashboard, EngagementError> {
        let author = self.gate.require_author(viewer)?;
        let window = self.config.trailing_window_days;

        let dashboard = Dashboard {
            stats: self.stats.author_stats(author.id)?,
            comment_count: self.stats.recent_comment_count(author.id, window)?,
            recent_comments: self.stats.recent_comments(
                author.id,
                window,
                self.config.recent_comments_limit,
            )?,
            total_views: self.stats.view_totals(author.id)?,
        };

        debug!(
            author_id = author.id,
            total_posts = dashboard.stats.total_posts,
            "Composed dashboard"
        );
        Ok(dashboard)
    }

    /// Public author page looked up by profile slug
    pub fn author_page(&self, slug: &str) -> Result<AuthorPage, EngagementError> {
        let recent_limit = self.config.recent_comments_limit;

        self.content_db.with_conn(|conn| {
            let profile = identities::get_author_profile_by_slug(conn, slug)?
                .ok_or_else(|| EngagementError::not_found("author", slug))?;
            let identity = identities::require_identity(conn, profile.identity_id)?;
            let owner_id = identity.id;

            let published = posts::list_posts(
                conn,
                &PostQuery {
                    owner_id: Some(owner_id),
                    status: Some(PostStatus::Published),
                    ..Default::default()
                },
            )?;
            let (followers, following) = identities::follow_counts(conn, owner_id)?;

            Ok(AuthorPage {
                posts: published,
                categories: categories::categories_for_owner(conn, owner_id)?,
                tags: categories::tags_for_owner(conn, owner_id)?,
                recent_comments: comments::recent_for_owner(conn, owner_id, None, recent_limit)?,
                followers,
                following,
                identity,
                profile,
            })
        })
    }
}
