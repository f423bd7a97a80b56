//! HTTP API for the engagement core
//!
//! ## Endpoints
//!
//! Reader side:
//! - `GET /health` - Liveness plus row counts
//! - `GET /session/policy` - Session policy for the caller (null when anonymous)
//! - `GET /blog/posts?page=N` - Published posts, paginated
//! - `GET /blog/posts/{id}` - Post detail (records a view)
//! - `GET /blog/posts/{id}/related?limit=N` - Related posts
//! - `GET|POST /blog/posts/{id}/comments` - Comment threads / comment as the caller
//! - `GET /blog/categories` - Categories with post counts
//! - `GET /blog/categories/{id}/tags` - Popular tags in a category
//! - `GET /blog/tags` - Tags with post counts
//! - `GET /authors/{slug}` - Public author page
//! - `GET /identities/{id}/follows` - Follower/following counts
//! - `POST|DELETE /identities/{id}/follow` - Follow / unfollow
//!
//! Author area (login required):
//! - `GET /author/` and `GET /author/dashboard` - Author dashboard
//! - `GET|POST /author/posts?status=draft|published` - Own posts / create
//! - `GET|PUT|DELETE /author/posts/{id}` - Owner's post detail, edit, delete
//! - `POST /author/categories`, `PUT /author/categories/{id}` - Categories
//! - `GET /author/comments`, `DELETE /author/comments/{id}` - Comments on own posts
//! - `GET|PUT /author/profile` - Own author profile
//!
//! The caller's identity id arrives in a header set by the upstream auth
//! gateway. Every request passes the route guard before routing; author-area
//! paths also require a login.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response};
use hyper_util::rt::TokioIo;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::db::{ContentDb, CreatePostInput, PostStatus, UpdatePostInput};
use crate::error::EngagementError;
use crate::gate::{RouteDecision, Viewer};
use crate::services::{response, ProfileUpdate, Services};
use crate::views::{
    AuthorPageView, CategorySummaryView, CategoryView, CommentThreadView, CommentView,
    ContentDetailView, DashboardView, FollowCountsView, PostPageView, PostView, ProfileView,
    RelatedPostView, SessionPolicyView, TagSummaryView,
};

type HttpResponse = Response<Full<Bytes>>;

#[derive(Debug, Default, Deserialize)]
struct RelatedParams {
    limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct PageParams {
    page: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct StatusParams {
    status: Option<PostStatus>,
}

#[derive(Debug, Deserialize)]
struct NewPostBody {
    category_id: i64,
    title: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    status: PostStatus,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct CategoryBody {
    title: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct CommentBody {
    #[serde(default)]
    parent_id: Option<i64>,
    body: String,
}

/// One request after header extraction
struct ApiRequest<'a> {
    method: &'a Method,
    query: &'a str,
    body: &'a [u8],
    viewer: Viewer,
}

/// HTTP server state
pub struct HttpServer {
    services: Arc<Services>,
    content_db: Arc<ContentDb>,
    bind_addr: SocketAddr,
    identity_header: String,
    related_limit: i64,
}

impl HttpServer {
    pub fn new(
        services: Arc<Services>,
        content_db: Arc<ContentDb>,
        bind_addr: SocketAddr,
        identity_header: impl Into<String>,
        related_limit: i64,
    ) -> Self {
        Self {
            services,
            content_db,
            bind_addr,
            identity_header: identity_header.into().to_ascii_lowercase(),
            related_limit,
        }
    }

    /// Accept connections until the listener fails
    pub async fn run(self: Arc<Self>) -> Result<(), EngagementError> {
        let listener = TcpListener::bind(self.bind_addr).await?;
        info!(addr = %self.bind_addr, "HTTP server listening");

        loop {
            let (stream, remote_addr) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let server = self.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    let server = server.clone();
                    async move { server.handle_request(req).await }
                });

                if let Err(err) = http1::Builder::new()
                    .serve_connection(io, service)
                    .await
                {
                    warn!(addr = %remote_addr, error = %err, "Connection error");
                }
            });
        }
    }

    async fn handle_request(&self, req: Request<Incoming>) -> Result<HttpResponse, hyper::Error> {
        let identity = req
            .headers()
            .get(self.identity_header.as_str())
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let method = req.method().clone();
        let uri = req.uri().clone();

        let body = match req.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                warn!(error = %e, "Failed to read request body");
                return Ok(response::bad_request("Failed to read request body"));
            }
        };

        Ok(self.dispatch(&method, uri.path(), uri.query(), identity.as_deref(), &body))
    }

    /// Gate and route one request. Separate from the socket handling so it
    /// can be driven directly.
    pub fn dispatch(
        &self,
        method: &Method,
        path: &str,
        query: Option<&str>,
        identity_header: Option<&str>,
        body: &[u8],
    ) -> HttpResponse {
        debug!(method = %method, path = %path, "Request");

        let viewer = match self.resolve_viewer(identity_header) {
            Ok(viewer) => viewer,
            Err(e) => return response::error_response(e),
        };

        let gate = &self.services.gate;
        if let RouteDecision::RedirectTo(target) = gate.route_guard(&viewer, path) {
            return response::redirect(&target);
        }
        if gate.is_author_area(path) {
            if let RouteDecision::RedirectTo(target) = gate.require_login(&viewer) {
                return response::redirect(&target);
            }
        }

        let req = ApiRequest {
            method,
            query: query.unwrap_or(""),
            body,
            viewer,
        };
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
        match segments.first().copied() {
            Some("author") => self.route_author(&segments[1..], &req),
            _ => self.route_public(&segments, &req),
        }
    }

    fn resolve_viewer(&self, identity_header: Option<&str>) -> Result<Viewer, EngagementError> {
        let id = match identity_header.map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(raw.parse::<i64>().map_err(|_| {
                EngagementError::InvalidInput(format!("Malformed {} header", self.identity_header))
            })?),
        };
        self.services.identity.resolve_viewer(id)
    }

    fn route_public(&self, segments: &[&str], req: &ApiRequest<'_>) -> HttpResponse {
        let services = &self.services;
        let viewer = &req.viewer;

        match segments {
            ["health"] => get_only(req, || {
                response::from_result(self.content_db.stats().map(|stats| {
                    serde_json::json!({ "status": "ok", "stats": stats })
                }))
            }),
            ["session", "policy"] => get_only(req, || {
                response::ok(
                    &services
                        .gate
                        .session_policy(viewer)
                        .map(SessionPolicyView::from),
                )
            }),
            ["blog", "posts"] => get_only(req, || {
                with_query(req, |params: PageParams| {
                    response::from_result(
                        services
                            .content
                            .published_page(params.page.unwrap_or(1))
                            .map(PostPageView::from),
                    )
                })
            }),
            ["blog", "posts", id] => get_only(req, || {
                with_id(id, |id| {
                    response::from_result(
                        services.content.content_detail(id).map(ContentDetailView::from),
                    )
                })
            }),
            ["blog", "posts", id, "related"] => get_only(req, || {
                with_id(id, |id| {
                    with_query(req, |params: RelatedParams| {
                        let limit = params.limit.unwrap_or(self.related_limit);
                        response::from_result(services.related.related_to(id, limit).map(
                            |ranked| ranked.into_iter().map(RelatedPostView::from).collect::<Vec<_>>(),
                        ))
                    })
                })
            }),
            ["blog", "posts", id, "comments"] => with_id(id, |id| match *req.method {
                Method::GET => response::from_result(services.content.comment_threads(id).map(
                    |threads| threads.into_iter().map(CommentThreadView::from).collect::<Vec<_>>(),
                )),
                Method::POST => with_body(req, |body: CommentBody| {
                    response::created_from_result(
                        services
                            .content
                            .add_comment(viewer, id, body.parent_id, &body.body)
                            .map(CommentView::from),
                    )
                }),
                _ => response::method_not_allowed(),
            }),
            ["blog", "categories"] => get_only(req, || {
                response::from_result(services.content.categories_with_counts().map(|rows| {
                    rows.into_iter().map(CategorySummaryView::from).collect::<Vec<_>>()
                }))
            }),
            ["blog", "categories", id, "tags"] => get_only(req, || {
                with_id(id, |id| {
                    response::from_result(services.content.popular_tags_in_category(id).map(
                        |rows| rows.into_iter().map(TagSummaryView::from).collect::<Vec<_>>(),
                    ))
                })
            }),
            ["blog", "tags"] => get_only(req, || {
                response::from_result(services.content.tags_with_counts().map(|rows| {
                    rows.into_iter().map(TagSummaryView::from).collect::<Vec<_>>()
                }))
            }),
            ["authors", slug] => get_only(req, || {
                response::from_result(
                    services.dashboard.author_page(slug).map(AuthorPageView::from),
                )
            }),
            ["identities", id, "follows"] => get_only(req, || {
                with_id(id, |id| {
                    response::from_result(
                        services.identity.follow_counts(id).map(FollowCountsView::from),
                    )
                })
            }),
            ["identities", id, "follow"] => with_id(id, |id| match *req.method {
                Method::POST => response::from_result(
                    services
                        .identity
                        .follow(viewer, id)
                        .map(|changed| serde_json::json!({ "changed": changed })),
                ),
                Method::DELETE => response::from_result(
                    services
                        .identity
                        .unfollow(viewer, id)
                        .map(|changed| serde_json::json!({ "changed": changed })),
                ),
                _ => response::method_not_allowed(),
            }),
            _ => response::not_found("Not found"),
        }
    }

    /// Routes under `/author/`; login has already been checked
    fn route_author(&self, segments: &[&str], req: &ApiRequest<'_>) -> HttpResponse {
        let services = &self.services;
        let viewer = &req.viewer;

        match segments {
            [] | [""] | ["dashboard"] => get_only(req, || {
                response::from_result(
                    services
                        .dashboard
                        .compose_dashboard(viewer)
                        .map(DashboardView::from),
                )
            }),
            ["posts"] => match *req.method {
                Method::GET => with_query(req, |params: StatusParams| {
                    let status = params.status.unwrap_or(PostStatus::Published);
                    response::from_result(services.content.owner_posts(viewer, status).map(
                        |rows| rows.into_iter().map(PostView::from).collect::<Vec<_>>(),
                    ))
                }),
                Method::POST => with_body(req, |body: NewPostBody| {
                    let input = CreatePostInput {
                        category_id: body.category_id,
                        title: body.title,
                        body: body.body,
                        status: body.status,
                        tags: body.tags,
                        ..Default::default()
                    };
                    response::created_from_result(
                        services.content.create_post(viewer, input).map(PostView::from),
                    )
                }),
                _ => response::method_not_allowed(),
            },
            ["posts", id] => with_id(id, |id| match *req.method {
                Method::GET => response::from_result(
                    services
                        .content
                        .owner_detail(viewer, id)
                        .map(ContentDetailView::from),
                ),
                Method::PUT => with_body(req, |input: UpdatePostInput| {
                    response::from_result(
                        services
                            .content
                            .update_post(viewer, id, &input)
                            .map(PostView::from),
                    )
                }),
                Method::DELETE => response::from_result(
                    services
                        .content
                        .delete_post(viewer, id)
                        .map(|()| serde_json::json!({ "deleted": id })),
                ),
                _ => response::method_not_allowed(),
            }),
            ["categories"] => match *req.method {
                Method::POST => with_body(req, |body: CategoryBody| {
                    response::created_from_result(
                        services
                            .content
                            .create_category(viewer, &body.title, &body.description)
                            .map(CategoryView::from),
                    )
                }),
                _ => response::method_not_allowed(),
            },
            ["categories", id] => with_id(id, |id| match *req.method {
                Method::PUT => with_body(req, |body: CategoryBody| {
                    response::from_result(
                        services
                            .content
                            .update_category(viewer, id, &body.title, &body.description)
                            .map(CategoryView::from),
                    )
                }),
                _ => response::method_not_allowed(),
            }),
            ["comments"] => get_only(req, || {
                let comments = services
                    .gate
                    .require_author(viewer)
                    .and_then(|author| services.stats.author_comments(author.id));
                response::from_result(
                    comments.map(|rows| rows.into_iter().map(CommentView::from).collect::<Vec<_>>()),
                )
            }),
            ["comments", id] => with_id(id, |id| match *req.method {
                Method::DELETE => response::from_result(
                    services
                        .content
                        .delete_comment(viewer, id)
                        .map(|()| serde_json::json!({ "deleted": id })),
                ),
                _ => response::method_not_allowed(),
            }),
            ["profile"] => match *req.method {
                Method::GET => response::from_result(
                    services
                        .identity
                        .get_or_create_profile(viewer)
                        .map(ProfileView::from),
                ),
                Method::PUT => with_body(req, |update: ProfileUpdate| {
                    response::from_result(
                        services
                            .identity
                            .update_profile(viewer, &update)
                            .map(ProfileView::from),
                    )
                }),
                _ => response::method_not_allowed(),
            },
            _ => response::not_found("Not found"),
        }
    }
}

fn get_only(req: &ApiRequest<'_>, handler: impl FnOnce() -> HttpResponse) -> HttpResponse {
    if *req.method != Method::GET {
        return response::method_not_allowed();
    }
    handler()
}

fn with_id(raw: &str, handler: impl FnOnce(i64) -> HttpResponse) -> HttpResponse {
    match raw.parse() {
        Ok(id) => handler(id),
        Err(_) => response::bad_request(&format!("Invalid id '{}'", raw)),
    }
}

fn with_query<T: DeserializeOwned>(
    req: &ApiRequest<'_>,
    handler: impl FnOnce(T) -> HttpResponse,
) -> HttpResponse {
    match serde_urlencoded::from_str(req.query) {
        Ok(params) => handler(params),
        Err(e) => response::bad_request(&format!("Invalid query: {}", e)),
    }
}

fn with_body<T: DeserializeOwned>(
    req: &ApiRequest<'_>,
    handler: impl FnOnce(T) -> HttpResponse,
) -> HttpResponse {
    match serde_json::from_slice(req.body) {
        Ok(body) => handler(body),
        Err(e) => response::bad_request(&format!("Invalid JSON body: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::{CreateIdentityInput, CreatePostInput, PostStatus};
    use crate::gate::Role;
    use hyper::{header, StatusCode};

    struct Fixture {
        server: HttpServer,
        author: String,
        reader: String,
        post_id: i64,
        category_id: i64,
    }

    fn fixture() -> Fixture {
        let db = Arc::new(ContentDb::open_in_memory().unwrap());
        let config = Config::default();
        let services = Arc::new(Services::new(db.clone(), &config));

        let register = |email: &str, role: Role| {
            services
                .identity
                .register(&CreateIdentityInput {
                    email: email.into(),
                    display_name: email.into(),
                    role,
                    job: String::new(),
                    phone: None,
                })
                .unwrap()
        };
        let author = register("author@pastel.io", Role::Author);
        let reader = register("reader@pastel.io", Role::Reader);

        let author_viewer = Viewer::Authenticated(author.clone());
        let category = services
            .content
            .create_category(&author_viewer, "Rust", "")
            .unwrap();
        let post = services
            .content
            .create_post(
                &author_viewer,
                CreatePostInput {
                    category_id: category.id,
                    title: "Ownership".into(),
                    status: PostStatus::Published,
                    tags: vec!["borrowck".into()],
                    ..Default::default()
                },
            )
            .unwrap();

        Fixture {
            server: HttpServer::new(services, db, "127.0.0.1:0".parse().unwrap(), "x-identity-id", 3),
            author: author.id.to_string(),
            reader: reader.id.to_string(),
            post_id: post.id,
            category_id: category.id,
        }
    }

    impl Fixture {
        fn get(&self, path: &str, query: Option<&str>, identity: Option<&str>) -> HttpResponse {
            self.server.dispatch(&Method::GET, path, query, identity, b"")
        }

        fn send(
            &self,
            method: Method,
            path: &str,
            identity: Option<&str>,
            body: serde_json::Value,
        ) -> HttpResponse {
            let body = serde_json::to_vec(&body).unwrap();
            self.server.dispatch(&method, path, None, identity, &body)
        }
    }

    async fn body_json(response: HttpResponse) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_author_redirected_from_reader_pages() {
        let f = fixture();
        let path = format!("/blog/posts/{}", f.post_id);
        let resp = f.get(&path, None, Some(&f.author));
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(resp.headers()[header::LOCATION], "/author/");
    }

    #[tokio::test]
    async fn test_reader_detail_counts_view() {
        let f = fixture();
        let path = format!("/blog/posts/{}", f.post_id);
        f.get(&path, None, Some(&f.reader));
        let resp = f.get(&path, None, None);
        assert_eq!(resp.status(), StatusCode::OK);

        let json = body_json(resp).await;
        assert_eq!(json["post"]["views"], 2);
        assert_eq!(json["related"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_dashboard_access() {
        let f = fixture();

        let anon = f.get("/author/dashboard", None, None);
        assert_eq!(anon.status(), StatusCode::FOUND);
        assert_eq!(anon.headers()[header::LOCATION], "/accounts/login/");

        let reader = f.get("/author/dashboard", None, Some(&f.reader));
        assert_eq!(reader.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            body_json(reader).await["error"],
            "You do not have access to this resource"
        );

        let author = f.get("/author/dashboard", None, Some(&f.author));
        assert_eq!(author.status(), StatusCode::OK);
        let json = body_json(author).await;
        assert_eq!(json["stats"]["totalPosts"], 1);
        assert_eq!(json["stats"]["totalPublished"], 1);
        assert_eq!(json["totalViews"]["week"], 0);
    }

    #[tokio::test]
    async fn test_unknown_identity_is_a_lookup_failure() {
        let f = fixture();
        let resp = f.get("/author/dashboard", None, Some("999"));
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(resp).await["error"], "identity 999 does not exist");
    }

    #[tokio::test]
    async fn test_related_limit_validation() {
        let f = fixture();
        let path = format!("/blog/posts/{}/related", f.post_id);
        let resp = f.get(&path, Some("limit=-1"), None);
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = f.get("/blog/posts/999/related", None, None);
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_page_out_of_range_is_rejected() {
        let f = fixture();
        let resp = f.get("/blog/posts", Some("page=9223372036854775807"), None);
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = f.get("/blog/posts", Some("page=0"), None);
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = f.get("/blog/posts", Some("page=1"), None);
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["totalItems"], 1);
    }

    #[tokio::test]
    async fn test_session_policy_endpoint() {
        let f = fixture();
        let json = body_json(f.get("/session/policy", None, Some(&f.author))).await;
        assert_eq!(json["expireOnClientClose"], true);
        assert_eq!(json["maxAgeSeconds"], 0);

        let anon = f.get("/session/policy", None, None);
        assert_eq!(body_json(anon).await, serde_json::Value::Null);
    }

    #[tokio::test]
    async fn test_bad_identity_header_and_method() {
        let f = fixture();
        let resp = f.get("/health", None, Some("abc"));
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = f.send(Method::POST, "/health", None, serde_json::json!({}));
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);

        let resp = f.get("/nowhere", None, None);
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_author_post_lifecycle() {
        let f = fixture();
        let created = f.send(
            Method::POST,
            "/author/posts",
            Some(&f.author),
            serde_json::json!({
                "category_id": f.category_id,
                "title": "Lifetimes",
                "status": "draft",
                "tags": ["borrowck"],
            }),
        );
        assert_eq!(created.status(), StatusCode::CREATED);
        let post = body_json(created).await;
        let id = post["id"].as_i64().unwrap();
        assert_eq!(post["status"], "draft");

        let drafts = body_json(f.get("/author/posts", Some("status=draft"), Some(&f.author))).await;
        assert_eq!(drafts.as_array().unwrap().len(), 1);

        let path = format!("/author/posts/{}", id);
        let updated = f.send(
            Method::PUT,
            &path,
            Some(&f.author),
            serde_json::json!({ "status": "published" }),
        );
        assert_eq!(updated.status(), StatusCode::OK);
        assert_eq!(body_json(updated).await["status"], "published");

        let bad = f.send(Method::PUT, &path, Some(&f.author), serde_json::json!({ "status": 3 }));
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);

        let deleted = f.send(Method::DELETE, &path, Some(&f.author), serde_json::Value::Null);
        assert_eq!(deleted.status(), StatusCode::OK);
        assert_eq!(f.get(&path, None, Some(&f.author)).status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_reader_cannot_write_posts() {
        let f = fixture();
        let resp = f.send(
            Method::POST,
            "/author/posts",
            Some(&f.reader),
            serde_json::json!({ "category_id": f.category_id, "title": "Nope" }),
        );
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let path = format!("/author/posts/{}", f.post_id);
        let resp = f.send(Method::DELETE, &path, Some(&f.reader), serde_json::Value::Null);
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_comment_and_moderate() {
        let f = fixture();
        let path = format!("/blog/posts/{}/comments", f.post_id);

        let anon = f.send(Method::POST, &path, None, serde_json::json!({ "body": "hi" }));
        assert_eq!(anon.status(), StatusCode::FORBIDDEN);

        let created = f.send(
            Method::POST,
            &path,
            Some(&f.reader),
            serde_json::json!({ "body": "Great post" }),
        );
        assert_eq!(created.status(), StatusCode::CREATED);
        let comment_id = body_json(created).await["id"].as_i64().unwrap();

        let threads = body_json(f.get(&path, None, None)).await;
        assert_eq!(threads.as_array().unwrap().len(), 1);

        let own = body_json(f.get("/author/comments", None, Some(&f.author))).await;
        assert_eq!(own.as_array().unwrap().len(), 1);

        let delete_path = format!("/author/comments/{}", comment_id);
        let resp = f.send(Method::DELETE, &delete_path, Some(&f.author), serde_json::Value::Null);
        assert_eq!(resp.status(), StatusCode::OK);
        let threads = body_json(f.get(&path, None, None)).await;
        assert_eq!(threads, serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_taxonomy_listings() {
        let f = fixture();
        let categories = body_json(f.get("/blog/categories", None, None)).await;
        assert_eq!(categories[0]["title"], "Rust");
        assert_eq!(categories[0]["postCount"], 1);

        let tags = body_json(f.get("/blog/tags", None, None)).await;
        assert_eq!(tags[0]["slug"], "borrowck");

        let path = format!("/blog/categories/{}/tags", f.category_id);
        let popular = body_json(f.get(&path, None, None)).await;
        assert_eq!(popular[0]["postCount"], 1);

        let renamed = f.send(
            Method::PUT,
            &format!("/author/categories/{}", f.category_id),
            Some(&f.author),
            serde_json::json!({ "title": "Rust Lang" }),
        );
        assert_eq!(body_json(renamed).await["slug"], "rust-lang");
    }

    #[tokio::test]
    async fn test_follow_and_profile() {
        let f = fixture();
        let path = format!("/identities/{}/follow", f.author);

        let resp = f.send(Method::POST, &path, Some(&f.reader), serde_json::Value::Null);
        assert_eq!(body_json(resp).await["changed"], true);
        let resp = f.send(Method::POST, &path, Some(&f.reader), serde_json::Value::Null);
        assert_eq!(body_json(resp).await["changed"], false);

        let counts_path = format!("/identities/{}/follows", f.author);
        let counts = body_json(f.get(&counts_path, None, None)).await;
        assert_eq!(counts["followers"], 1);

        let resp = f.send(Method::DELETE, &path, Some(&f.reader), serde_json::Value::Null);
        assert_eq!(body_json(resp).await["changed"], true);

        let profile = f.send(
            Method::PUT,
            "/author/profile",
            Some(&f.author),
            serde_json::json!({
                "bio": "Writes about Rust",
                "social_links": { "instagram": "https://instagram.com/pastel" },
            }),
        );
        assert_eq!(profile.status(), StatusCode::OK);
        let profile = body_json(profile).await;
        assert_eq!(profile["bio"], "Writes about Rust");
        assert_eq!(profile["socialLinks"]["instagram"], "https://instagram.com/pastel");

        let bad = f.send(
            Method::PUT,
            "/author/profile",
            Some(&f.author),
            serde_json::json!({ "social_links": { "instagram": "http://:80" } }),
        );
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
    }
}
