//! Service layer for pastel-engagement
//!
//! Services sit between the HTTP handlers and the repositories. Each one
//! wraps database operations with:
//! - Role and ownership checks (always through RoleGate)
//! - Input validation
//! - Event emission for audit/notifications
//!
//! ## Architecture
//!
//! ```text
//! HTTP Handlers (thin)
//!     ↓
//! Service Layer (RoleGate, ViewCounter, RelatedContentRanker,
//!                StatsAggregator, DashboardComposer, ...)
//!     ↓
//! Repository Layer (db/*.rs)
//!     ↓
//! SQLite Database
//! ```

pub mod response;
pub mod events;
pub mod view_counter;
pub mod related;
pub mod stats;
pub mod dashboard;
pub mod content_service;
pub mod identity_service;

// Re-exports
pub use response::*;
pub use events::{EngagementEvent, EventBus};
pub use view_counter::ViewCounter;
pub use related::RelatedContentRanker;
pub use stats::StatsAggregator;
pub use dashboard::{AuthorPage, Dashboard, DashboardComposer};
pub use content_service::{ContentDetail, ContentService, Page};
pub use identity_service::{FollowCounts, IdentityService, ProfileUpdate};

use crate::config::Config;
use crate::db::ContentDb;
use crate::gate::RoleGate;
use std::sync::Arc;

/// Service container for dependency injection
///
/// Holds every service over one shared database handle.
/// Pass this to HttpServer for handler access.
pub struct Services {
    pub gate: Arc<RoleGate>,
    pub views: Arc<ViewCounter>,
    pub related: Arc<RelatedContentRanker>,
    pub stats: Arc<StatsAggregator>,
    pub dashboard: Arc<DashboardComposer>,
    pub content: Arc<ContentService>,
    pub identity: Arc<IdentityService>,
    pub events: Arc<EventBus>,
}

impl Services {
    pub fn new(content_db: Arc<ContentDb>, config: &Config) -> Self {
        let events = Arc::new(EventBus::new());
        let gate = Arc::new(RoleGate::from_config(config));
        let engagement = config.engagement.clone();

        let views = Arc::new(ViewCounter::new(
            content_db.clone(),
            events.clone(),
            engagement.trailing_window_days,
        ));
        let related = Arc::new(RelatedContentRanker::new(content_db.clone()));
        let stats = Arc::new(StatsAggregator::new(content_db.clone(), views.clone()));

        Self {
            dashboard: Arc::new(DashboardComposer::new(
                content_db.clone(),
                gate.clone(),
                stats.clone(),
                engagement.clone(),
            )),
            content: Arc::new(ContentService::new(
                content_db.clone(),
                events.clone(),
                gate.clone(),
                views.clone(),
                related.clone(),
                engagement,
            )),
            identity: Arc::new(IdentityService::new(content_db, events.clone(), gate.clone())),
            gate,
            views,
            related,
            stats,
            events,
        }
    }
}
