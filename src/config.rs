//! Configuration for pastel-engagement

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::EngagementError;

/// Default storage directory
pub fn default_storage_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pastel-engagement")
}

/// Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the SQLite database
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,

    /// HTTP API port
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Header carrying the identity id, set by the upstream auth gateway
    #[serde(default = "default_identity_header")]
    pub identity_header: String,

    #[serde(default)]
    pub engagement: EngagementConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub routes: RouteConfig,
}

/// Windows and list sizes used by the ranker and the aggregator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngagementConfig {
    /// Trailing window for weekly views and recent comments
    #[serde(default = "default_window_days")]
    pub trailing_window_days: i64,

    #[serde(default = "default_related_limit")]
    pub related_limit: i64,

    #[serde(default = "default_recent_comments_limit")]
    pub recent_comments_limit: i64,

    /// Size of the "popular in category/tag" sidebars
    #[serde(default = "default_popular_limit")]
    pub popular_limit: i64,

    /// Posts per page on paginated listings
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

/// Session lifetime for non-author identities
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Rolling max-age for readers (14 days)
    #[serde(default = "default_reader_max_age")]
    pub reader_max_age_secs: u64,
}

/// Paths used by the route guard
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Reader-facing path prefixes authors get bounced from
    #[serde(default = "default_reader_prefixes")]
    pub reader_path_prefixes: Vec<String>,

    /// Author dashboard entry point
    #[serde(default = "default_dashboard_path")]
    pub author_dashboard_path: String,

    /// Prefix of the author-only area (login required)
    #[serde(default = "default_author_area_prefix")]
    pub author_area_prefix: String,

    #[serde(default = "default_login_path")]
    pub login_path: String,
}

fn default_http_port() -> u16 {
    8095
}

fn default_identity_header() -> String {
    "x-identity-id".to_string()
}

/// Largest accepted trailing window (about ten years)
pub const MAX_WINDOW_DAYS: i64 = 3650;

fn default_window_days() -> i64 {
    7
}

fn default_related_limit() -> i64 {
    3
}

fn default_recent_comments_limit() -> i64 {
    5
}

fn default_popular_limit() -> i64 {
    3
}

fn default_page_size() -> i64 {
    4
}

fn default_reader_max_age() -> u64 {
    1_209_600
}

fn default_reader_prefixes() -> Vec<String> {
    vec!["/blog/".to_string()]
}

fn default_dashboard_path() -> String {
    "/author/".to_string()
}

fn default_author_area_prefix() -> String {
    "/author/".to_string()
}

fn default_login_path() -> String {
    "/accounts/login/".to_string()
}

impl Default for EngagementConfig {
    fn default() -> Self {
        Self {
            trailing_window_days: default_window_days(),
            related_limit: default_related_limit(),
            recent_comments_limit: default_recent_comments_limit(),
            popular_limit: default_popular_limit(),
            page_size: default_page_size(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reader_max_age_secs: default_reader_max_age(),
        }
    }
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            reader_path_prefixes: default_reader_prefixes(),
            author_dashboard_path: default_dashboard_path(),
            author_area_prefix: default_author_area_prefix(),
            login_path: default_login_path(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            http_port: default_http_port(),
            identity_header: default_identity_header(),
            engagement: EngagementConfig::default(),
            session: SessionConfig::default(),
            routes: RouteConfig::default(),
        }
    }
}

impl Config {
    /// Load config from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, EngagementError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config =
            toml::from_str(&content).map_err(|e| EngagementError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), EngagementError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| EngagementError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject values the services would refuse at request time anyway
    pub fn validate(&self) -> Result<(), EngagementError> {
        let e = &self.engagement;
        for (name, value) in [
            ("engagement.trailing_window_days", e.trailing_window_days),
            ("engagement.related_limit", e.related_limit),
            ("engagement.recent_comments_limit", e.recent_comments_limit),
            ("engagement.popular_limit", e.popular_limit),
        ] {
            if value < 0 {
                return Err(EngagementError::Config(format!("{} must be >= 0", name)));
            }
        }
        if e.trailing_window_days > MAX_WINDOW_DAYS {
            return Err(EngagementError::Config(format!(
                "engagement.trailing_window_days must be <= {}",
                MAX_WINDOW_DAYS
            )));
        }
        if e.page_size < 1 {
            return Err(EngagementError::Config(
                "engagement.page_size must be >= 1".into(),
            ));
        }
        if self.routes.reader_path_prefixes.iter().any(|p| p.is_empty()) {
            return Err(EngagementError::Config(
                "routes.reader_path_prefixes must not contain empty prefixes".into(),
            ));
        }
        Ok(())
    }

    /// Get SQLite database path
    pub fn database_path(&self) -> PathBuf {
        self.storage_dir.join("pastel.db")
    }

    /// Get config file path
    pub fn config_path(&self) -> PathBuf {
        self.storage_dir.join("config.toml")
    }
}
