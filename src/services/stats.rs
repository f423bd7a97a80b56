//! StatsAggregator - per-author numbers for the dashboard
//!
//! Everything here is a read except `view_totals`, which first applies the
//! weekly decay for the owner so stale weekly counts never leak into `week`.

use std::sync::Arc;

use crate::db::{self, comments, identities, posts, AuthorStats, CommentRow, ContentDb, ViewTotals};
use crate::error::EngagementError;

use super::view_counter::{trailing_window_start, ViewCounter};

pub struct StatsAggregator {
    content_db: Arc<ContentDb>,
    view_counter: Arc<ViewCounter>,
}

impl StatsAggregator {
    pub fn new(content_db: Arc<ContentDb>, view_counter: Arc<ViewCounter>) -> Self {
        Self {
            content_db,
            view_counter,
        }
    }

    /// Draft/published/total post counts. `total_posts` always equals the sum.
    pub fn author_stats(&self, owner_id: i64) -> Result<AuthorStats, EngagementError> {
        self.content_db.with_conn(|conn| {
            identities::require_identity(conn, owner_id)?;
            posts::author_stats(conn, owner_id)
        })
    }

    /// Comments on the owner's posts within the last `window_days`
    pub fn recent_comment_count(&self, owner_id: i64, window_days: i64) -> Result<u64, EngagementError> {
        let since = trailing_window_start(db::now(), window_days)?;

        self.content_db.with_conn(|conn| {
            identities::require_identity(conn, owner_id)?;
            comments::count_for_owner_since(conn, owner_id, since)
        })
    }

    /// Newest comments on the owner's posts within the window (ties: higher id first)
    pub fn recent_comments(
        &self,
        owner_id: i64,
        window_days: i64,
        limit: i64,
    ) -> Result<Vec<CommentRow>, EngagementError> {
        let since = trailing_window_start(db::now(), window_days)?;
        EngagementError::check_non_negative("limit", limit)?;

        self.content_db.with_conn(|conn| {
            identities::require_identity(conn, owner_id)?;
            comments::recent_for_owner(conn, owner_id, Some(since), limit)
        })
    }

    /// Every comment on the owner's posts, newest first
    pub fn author_comments(&self, owner_id: i64) -> Result<Vec<CommentRow>, EngagementError> {
        self.content_db.with_conn(|conn| {
            identities::require_identity(conn, owner_id)?;
            comments::all_for_owner(conn, owner_id)
        })
    }

    /// Lifetime views of all owned posts plus weekly views of posts modified
    /// within the window. Decays first, so `week <= total` holds.
    pub fn view_totals(&self, owner_id: i64) -> Result<ViewTotals, EngagementError> {
        self.view_counter.decay_weekly_views(owner_id)?;
        let cutoff = self.view_counter.window_start(db::now())?;

        self.content_db
            .with_conn(|conn| posts::view_sums(conn, owner_id, cutoff))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::events::EventBus;

    #[test]
    fn test_validation_runs_before_lookup() {
        let db = Arc::new(ContentDb::open_in_memory().unwrap());
        let counter = Arc::new(ViewCounter::new(db.clone(), Arc::new(EventBus::new()), 7));
        let stats = StatsAggregator::new(db, counter);

        assert!(matches!(
            stats.recent_comment_count(1, -7),
            Err(EngagementError::InvalidInput(_))
        ));
        assert!(matches!(
            stats.recent_comments(1, 7, -1),
            Err(EngagementError::InvalidInput(_))
        ));
        assert!(matches!(
            stats.recent_comment_count(1, i64::MAX / 2),
            Err(EngagementError::InvalidInput(_))
        ));
        assert!(matches!(
            stats.recent_comments(1, i64::MAX, 5),
            Err(EngagementError::InvalidInput(_))
        ));
        assert!(matches!(
            stats.author_stats(1),
            Err(EngagementError::NotFound(_))
        ));
        assert!(matches!(
            stats.view_totals(1),
            Err(EngagementError::NotFound(_))
        ));
    }
}
