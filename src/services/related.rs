//! RelatedContentRanker - "you may also like" lists
//!
//! Candidates share at least one tag or the category with the source post.
//! Ranking: shared tag count desc, lifetime views desc, id asc. No
//! personalization and no status filter.

use std::sync::Arc;

use crate::db::{categories, posts, ContentDb, PostRow, RankedPost};
use crate::error::EngagementError;

pub struct RelatedContentRanker {
    content_db: Arc<ContentDb>,
}

impl RelatedContentRanker {
    pub fn new(content_db: Arc<ContentDb>) -> Self {
        Self { content_db }
    }

    /// At most `limit` posts related to `post_id`, never the post itself
    pub fn related_to(&self, post_id: i64, limit: i64) -> Result<Vec<RankedPost>, EngagementError> {
        EngagementError::check_non_negative("limit", limit)?;

        self.content_db.with_conn(|conn| {
            let post = posts::require_post(conn, post_id)?;
            posts::related_candidates(conn, &post, limit)
        })
    }

    /// Most viewed posts in a category
    pub fn popular_in_category(
        &self,
        category_id: i64,
        limit: i64,
    ) -> Result<Vec<PostRow>, EngagementError> {
        EngagementError::check_non_negative("limit", limit)?;

        self.content_db.with_conn(|conn| {
            categories::require_category(conn, category_id)?;
            posts::popular_in_category(conn, category_id, limit)
        })
    }

    /// Most viewed posts carrying a tag
    pub fn popular_with_tag(&self, tag_id: i64, limit: i64) -> Result<Vec<PostRow>, EngagementError> {
        EngagementError::check_non_negative("limit", limit)?;

        self.content_db.with_conn(|conn| {
            categories::get_tag(conn, tag_id)?
                .ok_or_else(|| EngagementError::not_found("tag", tag_id))?;
            posts::popular_with_tag(conn, tag_id, limit)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_limit_rejected_before_lookup() {
        let ranker = RelatedContentRanker::new(Arc::new(ContentDb::open_in_memory().unwrap()));
        // post 1 does not exist; validation must win
        assert!(matches!(
            ranker.related_to(1, -1),
            Err(EngagementError::InvalidInput(_))
        ));
        assert!(matches!(
            ranker.related_to(1, 3),
            Err(EngagementError::NotFound(_))
        ));
    }

    #[test]
    fn test_popular_unknown_tag_is_not_found() {
        let ranker = RelatedContentRanker::new(Arc::new(ContentDb::open_in_memory().unwrap()));
        assert!(matches!(
            ranker.popular_with_tag(5, 3),
            Err(EngagementError::NotFound(_))
        ));
    }
}
