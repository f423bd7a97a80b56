//! ViewCounter - atomic view recording and lazy weekly decay
//!
//! There is no scheduler: weekly counters of posts that have not been
//! modified within the trailing window are zeroed right before weekly
//! aggregates are read (see `StatsAggregator::view_totals`).

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::db::{self, identities, posts, ContentDb, ViewCounts};
use crate::error::EngagementError;

use super::events::{EngagementEvent, EventBus};

pub struct ViewCounter {
    content_db: Arc<ContentDb>,
    events: Arc<EventBus>,
    window_days: i64,
}

impl ViewCounter {
    pub fn new(content_db: Arc<ContentDb>, events: Arc<EventBus>, window_days: i64) -> Self {
        Self {
            content_db,
            events,
            window_days,
        }
    }

    /// Start of the trailing window ending at `now`
    pub fn window_start(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, EngagementError> {
        trailing_window_start(now, self.window_days)
    }

    /// Count one view of a post (drafts included).
    ///
    /// Both counters move in one statement; last-modified is untouched.
    pub fn record_view(&self, post_id: i64) -> Result<ViewCounts, EngagementError> {
        let counts = self
            .content_db
            .with_conn(|conn| posts::increment_views(conn, post_id))?;

        debug!(post_id, views = counts.views, "View recorded");
        self.events.emit(EngagementEvent::ViewRecorded {
            post_id,
            views: counts.views,
        });
        Ok(counts)
    }

    /// Zero the weekly counter of the owner's posts not modified within the
    /// window. Idempotent; returns the number of posts reset.
    pub fn decay_weekly_views(&self, owner_id: i64) -> Result<usize, EngagementError> {
        let cutoff = self.window_start(db::now())?;

        let reset = self.content_db.with_conn(|conn| {
            identities::require_identity(conn, owner_id)?;
            posts::reset_stale_weekly_views(conn, owner_id, cutoff)
        })?;

        if reset > 0 {
            info!(owner_id, reset, "Reset stale weekly views");
        }
        self.events
            .emit(EngagementEvent::WeeklyViewsDecayed { owner_id, reset });
        Ok(reset)
    }
}

/// Start of a window of `days` ending at `now`; out-of-range windows are
/// rejected rather than clamped
pub fn trailing_window_start(now: DateTime<Utc>, days: i64) -> Result<DateTime<Utc>, EngagementError> {
    EngagementError::check_non_negative("window_days", days)?;
    Duration::try_days(days)
        .and_then(|window| now.checked_sub_signed(window))
        .ok_or_else(|| {
            EngagementError::InvalidInput(format!("window of {} days is out of range", days))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::categories::create_category;
    use crate::db::identities::{create_identity, CreateIdentityInput};
    use crate::db::posts::{create_post, require_post, CreatePostInput};
    use crate::gate::Role;

    fn setup() -> (Arc<ContentDb>, ViewCounter, i64) {
        let db = Arc::new(ContentDb::open_in_memory().unwrap());
        let counter = ViewCounter::new(db.clone(), Arc::new(EventBus::new()), 7);
        let owner = db
            .with_conn(|conn| {
                create_identity(
                    conn,
                    &CreateIdentityInput {
                        email: "a@pastel.io".into(),
                        display_name: "A".into(),
                        role: Role::Author,
                        job: String::new(),
                        phone: None,
                    },
                    Utc::now(),
                )
            })
            .unwrap();
        (db, counter, owner.id)
    }

    #[test]
    fn test_record_view_leaves_modified_alone() {
        let (db, counter, owner) = setup();
        let created = db
            .with_conn_mut(|conn| {
                let cat = create_category(conn, "C", "")?;
                let mut input = CreatePostInput {
                    owner_id: owner,
                    category_id: cat.id,
                    title: "Draft".into(),
                    status: crate::db::PostStatus::Draft,
                    ..Default::default()
                };
                input.created_at = Some(Utc::now() - Duration::days(2));
                create_post(conn, &input, Utc::now())
            })
            .unwrap();

        assert_eq!(counter.record_view(created.id).unwrap().views, 1);
        let counts = counter.record_view(created.id).unwrap();
        assert_eq!(counts, ViewCounts { views: 2, weekly_views: 2 });

        let after = db.with_conn(|conn| require_post(conn, created.id)).unwrap();
        assert_eq!(after.updated_at, created.updated_at);
    }

    #[test]
    fn test_decay_unknown_owner_is_not_found() {
        let (_, counter, _) = setup();
        assert!(matches!(
            counter.decay_weekly_views(999),
            Err(EngagementError::NotFound(_))
        ));
    }

    #[test]
    fn test_decay_with_no_posts_is_noop() {
        let (_, counter, owner) = setup();
        assert_eq!(counter.decay_weekly_views(owner).unwrap(), 0);
    }

    #[test]
    fn test_oversized_window_is_rejected() {
        let now = Utc::now();
        assert_eq!(trailing_window_start(now, 7).unwrap(), now - Duration::days(7));
        assert!(matches!(
            trailing_window_start(now, i64::MAX / 2),
            Err(EngagementError::InvalidInput(_))
        ));
        assert!(matches!(
            trailing_window_start(now, -1),
            Err(EngagementError::InvalidInput(_))
        ));

        let db = Arc::new(ContentDb::open_in_memory().unwrap());
        let counter = ViewCounter::new(db, Arc::new(EventBus::new()), i64::MAX);
        assert!(matches!(
            counter.window_start(now),
            Err(EngagementError::InvalidInput(_))
        ));
    }
}
