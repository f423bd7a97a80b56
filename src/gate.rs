//! RoleGate: role checks, session lifetime and route gating
//!
//! Every role-derived decision in the crate goes through [`RoleGate`];
//! nothing else inspects [`Role`] directly. All methods are pure.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{Config, RouteConfig, SessionConfig};
use crate::db::IdentityRow;
use crate::error::EngagementError;

/// Role of an identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Default for new identities
    #[default]
    Reader,
    Author,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Reader => "reader",
            Role::Author => "author",
        }
    }

    /// Lenient decode of a stored role. Anything that is not exactly
    /// `author` is a reader, so a bad value can never grant author rights.
    pub fn from_stored(raw: &str) -> Self {
        match raw {
            "author" => Role::Author,
            "reader" | "user" => Role::Reader,
            other => {
                warn!(role = %other, "Unknown stored role, treating as reader");
                Role::Reader
            }
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The caller of a request
#[derive(Debug, Clone, PartialEq)]
pub enum Viewer {
    Anonymous,
    Authenticated(IdentityRow),
}

impl Viewer {
    pub fn identity(&self) -> Option<&IdentityRow> {
        match self {
            Viewer::Anonymous => None,
            Viewer::Authenticated(identity) => Some(identity),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Viewer::Authenticated(_))
    }
}

/// Session lifetime applied by the caller right after login
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionPolicy {
    pub expire_on_client_close: bool,
    pub max_age_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    Allow,
    RedirectTo(String),
}

/// Role gate built from route and session configuration
#[derive(Debug, Clone)]
pub struct RoleGate {
    routes: RouteConfig,
    session: SessionConfig,
}

impl Default for RoleGate {
    fn default() -> Self {
        Self::new(RouteConfig::default(), SessionConfig::default())
    }
}

impl RoleGate {
    pub fn new(routes: RouteConfig, session: SessionConfig) -> Self {
        Self { routes, session }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.routes.clone(), config.session.clone())
    }

    /// Authenticated with the author role
    pub fn is_author(&self, viewer: &Viewer) -> bool {
        viewer.identity().is_some_and(|i| i.role == Role::Author)
    }

    /// Authenticated with the reader role
    pub fn is_reader(&self, viewer: &Viewer) -> bool {
        viewer.identity().is_some_and(|i| i.role == Role::Reader)
    }

    /// Policy for a freshly authenticated session.
    ///
    /// Authors: expire on browser close. Everyone else: rolling max-age.
    /// Anonymous callers get no policy.
    pub fn session_policy(&self, viewer: &Viewer) -> Option<SessionPolicy> {
        if !viewer.is_authenticated() {
            return None;
        }
        if self.is_author(viewer) {
            Some(SessionPolicy {
                expire_on_client_close: true,
                max_age_seconds: 0,
            })
        } else {
            Some(SessionPolicy {
                expire_on_client_close: false,
                max_age_seconds: self.session.reader_max_age_secs,
            })
        }
    }

    /// Keep authors out of the reader-facing site
    pub fn route_guard(&self, viewer: &Viewer, path: &str) -> RouteDecision {
        if !self.is_author(viewer) {
            return RouteDecision::Allow;
        }
        let on_reader_path = self
            .routes
            .reader_path_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()));

        if on_reader_path {
            debug!(path = %path, "Author on reader path, redirecting to dashboard");
            RouteDecision::RedirectTo(self.routes.author_dashboard_path.clone())
        } else {
            RouteDecision::Allow
        }
    }

    /// Login-required decision for pages that need an identity
    pub fn require_login(&self, viewer: &Viewer) -> RouteDecision {
        if viewer.is_authenticated() {
            RouteDecision::Allow
        } else {
            RouteDecision::RedirectTo(self.routes.login_path.clone())
        }
    }

    /// Whether a path belongs to the author-only area
    pub fn is_author_area(&self, path: &str) -> bool {
        path.starts_with(self.routes.author_area_prefix.as_str())
    }

    /// The permission check behind every author-only operation
    pub fn require_author<'a>(&self, viewer: &'a Viewer) -> Result<&'a IdentityRow, EngagementError> {
        match viewer.identity() {
            Some(identity) if identity.role == Role::Author => Ok(identity),
            Some(identity) => Err(EngagementError::PermissionDenied(format!(
                "identity {} is not an author",
                identity.id
            ))),
            None => Err(EngagementError::PermissionDenied(
                "authentication required".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn viewer(role: Role) -> Viewer {
        Viewer::Authenticated(IdentityRow {
            id: 1,
            email: "someone@pastel.io".into(),
            display_name: "Someone".into(),
            role,
            job: String::new(),
            phone: None,
            created_at: Utc::now(),
        })
    }

    #[test]
    fn test_role_predicates() {
        let gate = RoleGate::default();
        assert!(gate.is_author(&viewer(Role::Author)));
        assert!(!gate.is_reader(&viewer(Role::Author)));
        assert!(gate.is_reader(&viewer(Role::Reader)));
        assert!(!gate.is_author(&Viewer::Anonymous));
        assert!(!gate.is_reader(&Viewer::Anonymous));
    }

    #[test]
    fn test_stored_role_decoding() {
        assert_eq!(Role::from_stored("author"), Role::Author);
        assert_eq!(Role::from_stored("user"), Role::Reader);
        assert_eq!(Role::from_stored("Author"), Role::Reader);
        assert_eq!(Role::from_stored(""), Role::Reader);
    }

    #[test]
    fn test_session_policy() {
        let gate = RoleGate::default();
        assert_eq!(
            gate.session_policy(&viewer(Role::Author)),
            Some(SessionPolicy {
                expire_on_client_close: true,
                max_age_seconds: 0
            })
        );
        assert_eq!(
            gate.session_policy(&viewer(Role::Reader)),
            Some(SessionPolicy {
                expire_on_client_close: false,
                max_age_seconds: 1_209_600
            })
        );
        assert_eq!(gate.session_policy(&Viewer::Anonymous), None);
    }

    #[test]
    fn test_route_guard() {
        let gate = RoleGate::default();
        assert_eq!(
            gate.route_guard(&viewer(Role::Author), "/blog/posts/3"),
            RouteDecision::RedirectTo("/author/".into())
        );
        assert_eq!(
            gate.route_guard(&viewer(Role::Author), "/author/dashboard"),
            RouteDecision::Allow
        );
        assert_eq!(
            gate.route_guard(&viewer(Role::Reader), "/blog/posts/3"),
            RouteDecision::Allow
        );
        assert_eq!(
            gate.route_guard(&Viewer::Anonymous, "/blog/posts/3"),
            RouteDecision::Allow
        );
    }

    #[test]
    fn test_custom_reader_prefixes() {
        let routes = RouteConfig {
            reader_path_prefixes: vec!["/blog/".into(), "/tags/".into()],
            ..RouteConfig::default()
        };
        let gate = RoleGate::new(routes, SessionConfig::default());
        assert_eq!(
            gate.route_guard(&viewer(Role::Author), "/tags/rust"),
            RouteDecision::RedirectTo("/author/".into())
        );
    }

    #[test]
    fn test_require_login_and_author() {
        let gate = RoleGate::default();
        assert_eq!(
            gate.require_login(&Viewer::Anonymous),
            RouteDecision::RedirectTo("/accounts/login/".into())
        );
        assert_eq!(gate.require_login(&viewer(Role::Reader)), RouteDecision::Allow);

        assert!(gate.require_author(&viewer(Role::Author)).is_ok());
        assert!(matches!(
            gate.require_author(&viewer(Role::Reader)),
            Err(EngagementError::PermissionDenied(_))
        ));
        assert!(matches!(
            gate.require_author(&Viewer::Anonymous),
            Err(EngagementError::PermissionDenied(_))
        ));
    }
}
