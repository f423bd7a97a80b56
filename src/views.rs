//! View types for the HTTP API boundary
//!
//! These types use camelCase serialization for TypeScript clients.
//! Row types in db/ use snake_case and chrono timestamps.
//!
//! Pattern:
//! - Service layer returns rows and composites (PostRow, Dashboard, ...)
//! - HTTP layer converts to View types (PostView, DashboardView, ...)
//! - ts-rs generates camelCase TypeScript from View types into `bindings/`
//!
//! Integer ids and counters are declared as `number` on the TypeScript side.

use std::collections::BTreeMap;

use serde::Serialize;
use ts_rs::TS;

use crate::db::{
    encode_timestamp, AuthorProfileRow, CategoryRow, CategoryWithCount, CommentRow, CommentThread, PostRow,
    RankedPost, TagRow, TagWithCount, ViewTotals,
};
use crate::gate::SessionPolicy;
use crate::services::{AuthorPage, ContentDetail, Dashboard, FollowCounts, Page};

// ============================================================================
// Taxonomy
// ============================================================================

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct TagView {
    #[ts(type = "number")]
    pub id: i64,
    pub name: String,
    pub slug: String,
}

impl From<TagRow> for TagView {
    fn from(row: TagRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            slug: row.slug,
        }
    }
}

/// Tag with the number of posts carrying it
#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct TagSummaryView {
    #[ts(type = "number")]
    pub id: i64,
    pub name: String,
    pub slug: String,
    #[ts(type = "number")]
    pub post_count: u64,
}

impl From<TagWithCount> for TagSummaryView {
    fn from(row: TagWithCount) -> Self {
        Self {
            id: row.tag.id,
            name: row.tag.name,
            slug: row.tag.slug,
            post_count: row.post_count,
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CategoryView {
    #[ts(type = "number")]
    pub id: i64,
    pub title: String,
    pub description: String,
    pub slug: String,
}

impl From<CategoryRow> for CategoryView {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            description: row.description,
            slug: row.slug,
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CategorySummaryView {
    #[ts(type = "number")]
    pub id: i64,
    pub title: String,
    pub slug: String,
    #[ts(type = "number")]
    pub post_count: u64,
}

impl From<CategoryWithCount> for CategorySummaryView {
    fn from(row: CategoryWithCount) -> Self {
        Self {
            id: row.category.id,
            title: row.category.title,
            slug: row.category.slug,
            post_count: row.post_count,
        }
    }
}

// ============================================================================
// Posts
// ============================================================================

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PostView {
    #[ts(type = "number")]
    pub id: i64,
    #[ts(type = "number")]
    pub owner_id: i64,
    #[ts(type = "number")]
    pub category_id: i64,
    pub title: String,
    pub body: String,
    pub slug: String,
    /// "draft" | "published"
    pub status: String,
    #[ts(type = "number")]
    pub views: u64,
    #[ts(type = "number")]
    pub weekly_views: u64,
    pub created_at: String,
    pub updated_at: String,
    pub tags: Vec<TagView>,
}

impl From<PostRow> for PostView {
    fn from(row: PostRow) -> Self {
        Self {
            id: row.id,
            owner_id: row.owner_id,
            category_id: row.category_id,
            title: row.title,
            body: row.body,
            slug: row.slug,
            status: row.status.to_string(),
            views: row.views,
            weekly_views: row.weekly_views,
            created_at: encode_timestamp(row.created_at),
            updated_at: encode_timestamp(row.updated_at),
            tags: row.tags.into_iter().map(TagView::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RelatedPostView {
    pub post: PostView,
    #[ts(type = "number")]
    pub shared_tags: u64,
}

impl From<RankedPost> for RelatedPostView {
    fn from(ranked: RankedPost) -> Self {
        Self {
            post: ranked.post.into(),
            shared_tags: ranked.shared_tags,
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PostPageView {
    pub items: Vec<PostView>,
    #[ts(type = "number")]
    pub page: i64,
    #[ts(type = "number")]
    pub page_size: i64,
    #[ts(type = "number")]
    pub total_items: u64,
    #[ts(type = "number")]
    pub total_pages: u64,
}

impl From<Page<PostRow>> for PostPageView {
    fn from(page: Page<PostRow>) -> Self {
        Self {
            items: page.items.into_iter().map(PostView::from).collect(),
            page: page.page,
            page_size: page.page_size,
            total_items: page.total_items,
            total_pages: page.total_pages,
        }
    }
}

// ============================================================================
// Comments
// ============================================================================

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CommentView {
    #[ts(type = "number")]
    pub id: i64,
    #[ts(type = "number")]
    pub post_id: i64,
    pub post_title: String,
    #[ts(type = "number")]
    pub author_id: i64,
    pub author_name: String,
    #[ts(type = "number | null")]
    pub parent_id: Option<i64>,
    pub body: String,
    pub created_at: String,
}

impl From<CommentRow> for CommentView {
    fn from(row: CommentRow) -> Self {
        Self {
            id: row.id,
            post_id: row.post_id,
            post_title: row.post_title,
            author_id: row.author_id,
            author_name: row.author_name,
            parent_id: row.parent_id,
            body: row.body,
            created_at: encode_timestamp(row.created_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CommentThreadView {
    pub comment: CommentView,
    pub replies: Vec<CommentView>,
}

impl From<CommentThread> for CommentThreadView {
    fn from(thread: CommentThread) -> Self {
        Self {
            comment: thread.comment.into(),
            replies: thread.replies.into_iter().map(CommentView::from).collect(),
        }
    }
}

/// Post detail page: the post after its view was counted, related posts
/// and the comment thread
#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ContentDetailView {
    pub post: PostView,
    pub related: Vec<RelatedPostView>,
    pub comments: Vec<CommentThreadView>,
}

impl From<ContentDetail> for ContentDetailView {
    fn from(detail: ContentDetail) -> Self {
        Self {
            post: detail.post.into(),
            related: detail.related.into_iter().map(RelatedPostView::from).collect(),
            comments: detail.comments.into_iter().map(CommentThreadView::from).collect(),
        }
    }
}

// ============================================================================
// Dashboard
// ============================================================================

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DashboardStatsView {
    #[ts(type = "number")]
    pub total_posts: u64,
    #[ts(type = "number")]
    pub total_draft: u64,
    #[ts(type = "number")]
    pub total_published: u64,
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ViewTotalsView {
    #[ts(type = "number")]
    pub total: u64,
    #[ts(type = "number")]
    pub week: u64,
}

impl From<ViewTotals> for ViewTotalsView {
    fn from(totals: ViewTotals) -> Self {
        Self {
            total: totals.total,
            week: totals.week,
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DashboardView {
    pub stats: DashboardStatsView,
    #[ts(type = "number")]
    pub comment_count: u64,
    pub recent_comments: Vec<CommentView>,
    pub total_views: ViewTotalsView,
}

impl From<Dashboard> for DashboardView {
    fn from(dashboard: Dashboard) -> Self {
        Self {
            stats: DashboardStatsView {
                total_posts: dashboard.stats.total_posts,
                total_draft: dashboard.stats.total_draft,
                total_published: dashboard.stats.total_published,
            },
            comment_count: dashboard.comment_count,
            recent_comments: dashboard
                .recent_comments
                .into_iter()
                .map(CommentView::from)
                .collect(),
            total_views: dashboard.total_views.into(),
        }
    }
}

// ============================================================================
// Authors and sessions
// ============================================================================

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AuthorPageView {
    #[ts(type = "number")]
    pub identity_id: i64,
    pub display_name: String,
    pub job: String,
    pub slug: String,
    pub bio: String,
    pub social_links: BTreeMap<String, String>,
    pub posts: Vec<PostView>,
    pub categories: Vec<CategorySummaryView>,
    pub tags: Vec<TagSummaryView>,
    pub recent_comments: Vec<CommentView>,
    #[ts(type = "number")]
    pub followers: u64,
    #[ts(type = "number")]
    pub following: u64,
}

impl From<AuthorPage> for AuthorPageView {
    fn from(page: AuthorPage) -> Self {
        Self {
            identity_id: page.identity.id,
            display_name: page.identity.display_name,
            job: page.identity.job,
            slug: page.profile.slug,
            bio: page.profile.bio,
            social_links: page.profile.social_links,
            posts: page.posts.into_iter().map(PostView::from).collect(),
            categories: page
                .categories
                .into_iter()
                .map(CategorySummaryView::from)
                .collect(),
            tags: page.tags.into_iter().map(TagSummaryView::from).collect(),
            recent_comments: page
                .recent_comments
                .into_iter()
                .map(CommentView::from)
                .collect(),
            followers: page.followers,
            following: page.following,
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ProfileView {
    #[ts(type = "number")]
    pub identity_id: i64,
    pub slug: String,
    pub bio: String,
    pub social_links: BTreeMap<String, String>,
}

impl From<AuthorProfileRow> for ProfileView {
    fn from(row: AuthorProfileRow) -> Self {
        Self {
            identity_id: row.identity_id,
            slug: row.slug,
            bio: row.bio,
            social_links: row.social_links,
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct FollowCountsView {
    #[ts(type = "number")]
    pub followers: u64,
    #[ts(type = "number")]
    pub following: u64,
}

impl From<FollowCounts> for FollowCountsView {
    fn from(counts: FollowCounts) -> Self {
        Self {
            followers: counts.followers,
            following: counts.following,
        }
    }
}

/// Session policy for the caller; `null` when anonymous
#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SessionPolicyView {
    pub expire_on_client_close: bool,
    #[ts(type = "number")]
    pub max_age_seconds: u64,
}

impl From<SessionPolicy> for SessionPolicyView {
    fn from(policy: SessionPolicy) -> Self {
        Self {
            expire_on_client_close: policy.expire_on_client_close,
            max_age_seconds: policy.max_age_seconds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{AuthorStats, ViewTotals};

    #[test]
    fn test_dashboard_wire_shape() {
        let view = DashboardView::from(Dashboard {
            stats: AuthorStats {
                total_posts: 5,
                total_draft: 3,
                total_published: 2,
            },
            comment_count: 0,
            recent_comments: vec![],
            total_views: ViewTotals { total: 10, week: 4 },
        });

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "stats": {"totalPosts": 5, "totalDraft": 3, "totalPublished": 2},
                "commentCount": 0,
                "recentComments": [],
                "totalViews": {"total": 10, "week": 4}
            })
        );
    }

    #[test]
    fn test_session_policy_wire_shape() {
        let view = SessionPolicyView::from(SessionPolicy {
            expire_on_client_close: true,
            max_age_seconds: 0,
        });
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["expireOnClientClose"], true);
        assert_eq!(json["maxAgeSeconds"], 0);
    }
}
