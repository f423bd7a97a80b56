//! Content service - posts, taxonomy and comments
//!
//! Wraps the repositories with role/ownership checks (through RoleGate),
//! validation and event emission.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::config::EngagementConfig;
use crate::db::{
    self, categories, comments, posts, CategoryRow, CategoryWithCount, CommentRow, CommentThread,
    ContentDb, CreateCommentInput, CreatePostInput, IdentityRow, PostQuery, PostRow, PostStatus,
    RankedPost, TagWithCount, UpdatePostInput,
};
use crate::db::posts::PostOrder;
use crate::error::EngagementError;
use crate::gate::{RoleGate, Viewer};

use super::events::{EngagementEvent, EventBus};
use super::related::RelatedContentRanker;
use super::view_counter::ViewCounter;

/// A post as shown on its detail page
#[derive(Debug, Clone, Serialize)]
pub struct ContentDetail {
    pub post: PostRow,
    pub related: Vec<RankedPost>,
    pub comments: Vec<CommentThread>,
}

/// One page of a paginated listing (pages start at 1)
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub page_size: i64,
    pub total_items: u64,
    pub total_pages: u64,
}

pub struct ContentService {
    content_db: Arc<ContentDb>,
    events: Arc<EventBus>,
    gate: Arc<RoleGate>,
    view_counter: Arc<ViewCounter>,
    ranker: Arc<RelatedContentRanker>,
    config: EngagementConfig,
}

impl ContentService {
    pub fn new(
        content_db: Arc<ContentDb>,
        events: Arc<EventBus>,
        gate: Arc<RoleGate>,
        view_counter: Arc<ViewCounter>,
        ranker: Arc<RelatedContentRanker>,
        config: EngagementConfig,
    ) -> Self {
        Self {
            content_db,
            events,
            gate,
            view_counter,
            ranker,
            config,
        }
    }

    // =========================================================================
    // Read Operations
    // =========================================================================

    pub fn get(&self, id: i64) -> Result<Option<PostRow>, EngagementError> {
        self.content_db.with_conn(|conn| posts::get_post(conn, id))
    }

    pub fn get_by_slug(&self, slug: &str) -> Result<Option<PostRow>, EngagementError> {
        self.content_db.with_conn(|conn| posts::get_post_by_slug(conn, slug))
    }

    /// Reader detail page: count the view, then rank related posts, then
    /// load the comment thread
    pub fn content_detail(&self, post_id: i64) -> Result<ContentDetail, EngagementError> {
        self.view_counter.record_view(post_id)?;
        let related = self.ranker.related_to(post_id, self.config.related_limit)?;

        self.content_db.with_conn(|conn| {
            Ok(ContentDetail {
                post: posts::require_post(conn, post_id)?,
                related,
                comments: comments::list_threads(conn, post_id)?,
            })
        })
    }

    /// Author-side detail page, only for the post's owner
    pub fn owner_detail(&self, viewer: &Viewer, post_id: i64) -> Result<ContentDetail, EngagementError> {
        let author = self.gate.require_author(viewer)?;
        let post = self
            .get(post_id)?
            .ok_or_else(|| EngagementError::not_found("post", post_id))?;
        ensure_owner(author, &post)?;

        self.content_detail(post_id)
    }

    /// Published posts, newest first
    pub fn published_page(&self, page: i64) -> Result<Page<PostRow>, EngagementError> {
        if page < 1 {
            return Err(EngagementError::InvalidInput(format!(
                "page must be >= 1, got {}",
                page
            )));
        }
        let page_size = self.config.page_size;
        let offset = (page - 1).checked_mul(page_size).ok_or_else(|| {
            EngagementError::InvalidInput(format!("page {} is out of range", page))
        })?;
        let query = PostQuery {
            status: Some(PostStatus::Published),
            limit: page_size,
            offset,
            ..Default::default()
        };

        self.content_db.with_conn(|conn| {
            let total_items = posts::count_posts(conn, &query)?;
            let total_pages = total_items.div_ceil(page_size as u64);
            Ok(Page {
                items: posts::list_posts(conn, &query)?,
                page,
                page_size,
                total_items,
                total_pages,
            })
        })
    }

    /// The caller's own posts: published by creation date, drafts by last edit
    pub fn owner_posts(&self, viewer: &Viewer, status: PostStatus) -> Result<Vec<PostRow>, EngagementError> {
        let author = self.gate.require_author(viewer)?;
        let order = match status {
            PostStatus::Published => PostOrder::Newest,
            PostStatus::Draft => PostOrder::LastModified,
        };
        self.content_db.with_conn(|conn| {
            posts::list_posts(
                conn,
                &PostQuery {
                    owner_id: Some(author.id),
                    status: Some(status),
                    order,
                    ..Default::default()
                },
            )
        })
    }

    // =========================================================================
    // Write Operations
    // =========================================================================

    /// Create a post owned by the calling author
    pub fn create_post(&self, viewer: &Viewer, mut input: CreatePostInput) -> Result<PostRow, EngagementError> {
        let author = self.gate.require_author(viewer)?;
        input.owner_id = author.id;

        let post = self
            .content_db
            .with_conn_mut(|conn| posts::create_post(conn, &input, db::now()))?;

        info!(post_id = post.id, owner_id = author.id, "Post created");
        self.events.emit(EngagementEvent::PostCreated {
            id: post.id,
            owner_id: post.owner_id,
            title: post.title.clone(),
        });
        Ok(post)
    }

    /// Owner-only partial update; bumps last-modified
    pub fn update_post(
        &self,
        viewer: &Viewer,
        post_id: i64,
        input: &UpdatePostInput,
    ) -> Result<PostRow, EngagementError> {
        let author = self.gate.require_author(viewer)?;

        let post = self.content_db.with_conn_mut(|conn| {
            let existing = posts::require_post(conn, post_id)?;
            ensure_owner(author, &existing)?;
            posts::update_post(conn, post_id, input, db::now())
        })?;

        self.events.emit(EngagementEvent::PostUpdated { id: post_id });
        Ok(post)
    }

    /// Owner-only delete; comments go with the post
    pub fn delete_post(&self, viewer: &Viewer, post_id: i64) -> Result<(), EngagementError> {
        let author = self.gate.require_author(viewer)?;

        self.content_db.with_conn(|conn| {
            let existing = posts::require_post(conn, post_id)?;
            ensure_owner(author, &existing)?;
            posts::delete_post(conn, post_id)
        })?;

        info!(post_id, "Post deleted");
        self.events.emit(EngagementEvent::PostDeleted { id: post_id });
        Ok(())
    }

    // =========================================================================
    // Taxonomy
    // =========================================================================

    pub fn create_category(
        &self,
        viewer: &Viewer,
        title: &str,
        description: &str,
    ) -> Result<CategoryRow, EngagementError> {
        self.gate.require_author(viewer)?;
        let title = validate_title(title)?;

        let category = self
            .content_db
            .with_conn(|conn| categories::create_category(conn, title, description))?;
        self.emit_category(&category);
        Ok(category)
    }

    /// Rename/describe a category; its slug follows the new title
    pub fn update_category(
        &self,
        viewer: &Viewer,
        id: i64,
        title: &str,
        description: &str,
    ) -> Result<CategoryRow, EngagementError> {
        self.gate.require_author(viewer)?;
        let title = validate_title(title)?;

        let category = self
            .content_db
            .with_conn(|conn| categories::update_category(conn, id, title, description))?;
        self.emit_category(&category);
        Ok(category)
    }

    fn emit_category(&self, category: &CategoryRow) {
        self.events.emit(EngagementEvent::CategorySaved {
            id: category.id,
            slug: category.slug.clone(),
        });
    }

    pub fn categories_with_counts(&self) -> Result<Vec<CategoryWithCount>, EngagementError> {
        self.content_db.with_conn(categories::list_categories_with_counts)
    }

    pub fn tags_with_counts(&self) -> Result<Vec<TagWithCount>, EngagementError> {
        self.content_db.with_conn(categories::list_tags_with_counts)
    }

    /// Sidebar tags for a category page
    pub fn popular_tags_in_category(&self, category_id: i64) -> Result<Vec<TagWithCount>, EngagementError> {
        let limit = self.config.popular_limit;
        self.content_db.with_conn(|conn| {
            categories::require_category(conn, category_id)?;
            categories::popular_tags_in_category(conn, category_id, limit)
        })
    }

    // =========================================================================
    // Comments
    // =========================================================================

    /// Comment as the caller; replies must target a comment on the same post
    pub fn add_comment(
        &self,
        viewer: &Viewer,
        post_id: i64,
        parent_id: Option<i64>,
        body: &str,
    ) -> Result<CommentRow, EngagementError> {
        let identity = viewer
            .identity()
            .ok_or_else(|| EngagementError::PermissionDenied("authentication required".into()))?;

        let input = CreateCommentInput {
            post_id,
            author_id: identity.id,
            parent_id,
            body: body.to_string(),
            created_at: None,
        };
        let comment = self
            .content_db
            .with_conn(|conn| comments::create_comment(conn, &input, db::now()))?;

        self.events.emit(EngagementEvent::CommentCreated {
            id: comment.id,
            post_id,
        });
        Ok(comment)
    }

    pub fn comment_threads(&self, post_id: i64) -> Result<Vec<CommentThread>, EngagementError> {
        self.content_db.with_conn(|conn| {
            posts::require_post(conn, post_id)?;
            comments::list_threads(conn, post_id)
        })
    }

    /// Only the owner of the commented post may delete a comment
    pub fn delete_comment(&self, viewer: &Viewer, comment_id: i64) -> Result<(), EngagementError> {
        let identity = viewer
            .identity()
            .ok_or_else(|| EngagementError::PermissionDenied("authentication required".into()))?;

        self.content_db.with_conn(|conn| {
            let comment = comments::require_comment(conn, comment_id)?;
            if comment.post_owner_id != identity.id {
                return Err(EngagementError::PermissionDenied(format!(
                    "identity {} does not own post {}",
                    identity.id, comment.post_id
                )));
            }
            comments::delete_comment(conn, comment_id)
        })?;

        self.events.emit(EngagementEvent::CommentDeleted { id: comment_id });
        Ok(())
    }
}

fn ensure_owner(author: &IdentityRow, post: &PostRow) -> Result<(), EngagementError> {
    if post.owner_id != author.id {
        return Err(EngagementError::PermissionDenied(format!(
            "identity {} does not own post {}",
            author.id, post.id
        )));
    }
    Ok(())
}

fn validate_title(title: &str) -> Result<&str, EngagementError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(EngagementError::InvalidInput("title is required".into()));
    }
    if title.len() > 200 {
        return Err(EngagementError::InvalidInput("title must be <= 200 characters".into()));
    }
    Ok(title)
}
