//! Pastel Engagement - engagement and recommendation core of the Pastel blog
//!
//! Counts views, ranks related posts, aggregates per-author statistics and
//! gates routes by role. HTML rendering, credential checks and uploads live
//! elsewhere; this crate serves JSON.
//!
//! ## Components
//!
//! - **RoleGate** (`gate`): role predicates, session policy, route guard
//! - **ViewCounter**: atomic increments, lazy weekly decay
//! - **RelatedContentRanker**: shared-tag / same-category ranking
//! - **StatsAggregator**: draft/published counts, comment activity, view totals
//! - **DashboardComposer**: dashboard and author page payloads
//!
//! ## Storage Layout
//!
//! ```text
//! ~/.local/share/pastel-engagement/
//! ├── pastel.db       # SQLite database (WAL mode)
//! └── config.toml     # Configuration
//! ```

pub mod config;
pub mod error;
pub mod slug;
pub mod db;
pub mod gate;
pub mod services;
pub mod views;
pub mod http;

pub use config::Config;
pub use db::ContentDb;
pub use error::{EngagementError, Result};
pub use gate::{Role, RoleGate, RouteDecision, SessionPolicy, Viewer};
pub use http::HttpServer;
pub use services::{
    ContentService, DashboardComposer, EventBus, IdentityService, RelatedContentRanker, Services,
    StatsAggregator, ViewCounter,
};
