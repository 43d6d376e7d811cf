use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{HeaderName, Method, Request, StatusCode, header},
    response::Response,
};
use fernlog::application::feed::FeedService;
use fernlog::application::follow::FollowService;
use fernlog::application::groups::GroupService;
use fernlog::application::pagination::PageSize;
use fernlog::application::posts::PostService;
use fernlog::application::query::FeedQueryEngine;
use fernlog::cache::{CacheConfig, PageCache};
use fernlog::config::DEFAULT_IDENTITY_HEADER;
use fernlog::infra::http::{AdminState, HttpState, build_admin_router, build_router};
use fernlog::infra::memory::MemoryRepositories;
use http_body_util::BodyExt;
use tower::ServiceExt;

struct App {
    repo: Arc<MemoryRepositories>,
    public: Router,
    admin: Router,
}

fn app() -> App {
    let repo = Arc::new(MemoryRepositories::new());
    let engine = FeedQueryEngine::new(repo.clone(), repo.clone(), repo.clone());
    let feed = Arc::new(FeedService::new(
        engine,
        Arc::new(PageCache::new(CacheConfig::default())),
        PageSize::new(10).expect("positive page size"),
    ));
    let http_state = HttpState {
        feed: feed.clone(),
        posts: Arc::new(PostService::new(
            repo.clone(),
            repo.clone(),
            repo.clone(),
            repo.clone(),
        )),
        follows: Arc::new(FollowService::new(repo.clone())),
        identity_header: HeaderName::from_static(DEFAULT_IDENTITY_HEADER),
    };
    let admin_state = AdminState {
        feed,
        groups: Arc::new(GroupService::new(repo.clone())),
        db: None,
    };
    App {
        repo,
        public: build_router(http_state),
        admin: build_admin_router(admin_state),
    }
}

fn get(uri: &str, user: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(Method::GET).uri(uri);
    if let Some(user) = user {
        builder = builder.header(DEFAULT_IDENTITY_HEADER, user);
    }
    builder.body(Body::empty()).unwrap()
}

fn form(uri: &str, user: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(user) = user {
        builder = builder.header(DEFAULT_IDENTITY_HEADER, user);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn send(router: &Router, request: Request<Body>) -> Response {
    router.clone().oneshot(request).await.unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn unknown_group_returns_not_found() {
    let app = app();
    let response = send(&app.public, get("/group/does-not-exist/", None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn following_feed_requires_identity() {
    let app = app();
    let response = send(&app.public, get("/follow/", None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = send(&app.public, get("/follow/", Some("reader"))).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn writes_require_identity() {
    let app = app();
    let response = send(&app.public, form("/create/", None, "text=hello")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = send(&app.public, form("/profile/leo/follow/", None, "")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn self_follow_is_bad_request() {
    let app = app();
    let response = send(&app.public, form("/profile/me/follow/", Some("me"), "")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn follow_redirects_to_profile() {
    let app = app();
    let response = send(&app.public, form("/profile/anna/follow/", Some("leo"), "")).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "/profile/anna/"
    );

    let profile = body_text(send(&app.public, get("/profile/anna/", Some("leo"))).await).await;
    assert!(profile.contains("Unfollow"));
}

#[tokio::test]
async fn create_post_redirects_to_author_profile() {
    let app = app();
    let response = send(&app.public, form("/create/", Some("leo"), "text=hello+world")).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "/profile/leo/"
    );

    let profile = body_text(send(&app.public, get("/profile/leo/", None)).await).await;
    assert!(profile.contains("hello world"));
}

#[tokio::test]
async fn blank_post_or_unknown_group_is_rejected() {
    let app = app();
    let response = send(&app.public, form("/create/", Some("leo"), "text=+++")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(
        &app.public,
        form("/create/", Some("leo"), "text=hi&group=nowhere"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_page_parameter_falls_back_to_first_page() {
    let app = app();
    send(&app.public, form("/create/", Some("leo"), "text=first")).await;

    for uri in [
        "/?page=abc",
        "/?page=0",
        "/?page=-3",
        "/?page=2.5",
        "/?page",
        "/?page=%FF",
        "/?page=x&page=y",
        "/profile/leo/?page=x&page=y",
        "/",
    ] {
        let response = send(&app.public, get(uri, None)).await;
        assert_eq!(response.status(), StatusCode::OK, "{uri}");
        let html = body_text(response).await;
        assert!(html.contains("Page 1 of 1"), "{uri}");
        assert!(html.contains("first"), "{uri}");
    }

    let html = body_text(send(&app.public, get("/?page=7", None)).await).await;
    assert!(html.contains("Page 7 of 1"));
    assert!(html.contains("No posts yet."));

    let response = send(&app.public, get("/?page=1&page=2", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("Page 2 of 1"));
}

#[tokio::test]
async fn listing_stays_stale_until_admin_clears_cache() {
    let app = app();
    send(&app.public, form("/create/", Some("leo"), "text=one")).await;

    let html = body_text(send(&app.public, get("/", None)).await).await;
    assert!(html.contains("id=\"post-1\""));

    send(&app.public, form("/create/", Some("leo"), "text=two")).await;
    let html = body_text(send(&app.public, get("/", None)).await).await;
    assert!(!html.contains("id=\"post-2\""));

    let response = send(
        &app.admin,
        Request::builder()
            .method(Method::POST)
            .uri("/_admin/cache/clear")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let html = body_text(send(&app.public, get("/", None)).await).await;
    assert!(html.contains("id=\"post-2\""));
}

#[tokio::test]
async fn author_edit_redirects_and_listing_stays_stale_until_cleared() {
    let app = app();
    send(&app.public, form("/create/", Some("leo"), "text=draft")).await;
    let html = body_text(send(&app.public, get("/", None)).await).await;
    assert!(html.contains("draft"));

    let response = send(&app.public, form("/posts/1/edit/", Some("leo"), "text=final")).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "/posts/1/"
    );

    let detail = body_text(send(&app.public, get("/posts/1/", None)).await).await;
    assert!(detail.contains("final"));

    let html = body_text(send(&app.public, get("/", None)).await).await;
    assert!(html.contains("draft"));
    assert!(!html.contains("final"));

    send(
        &app.admin,
        Request::builder()
            .method(Method::POST)
            .uri("/_admin/cache/clear")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    let html = body_text(send(&app.public, get("/", None)).await).await;
    assert!(html.contains("final"));
    assert!(html.contains("Page 1 of 1"));
    assert!(!html.contains("id=\"post-2\""));
}

#[tokio::test]
async fn edit_is_limited_to_the_author() {
    let app = app();
    send(&app.public, form("/create/", Some("leo"), "text=mine")).await;

    let response = send(&app.public, form("/posts/1/edit/", Some("anna"), "text=theirs")).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(&app.public, form("/posts/1/edit/", None, "text=anon")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = send(&app.public, form("/posts/99/edit/", Some("leo"), "text=x")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let detail = body_text(send(&app.public, get("/posts/1/", None)).await).await;
    assert!(detail.contains("mine"));
    assert!(!detail.contains("theirs"));
}

#[tokio::test]
async fn admin_creates_group_used_by_listing() {
    let app = app();
    let response = send(
        &app.admin,
        Request::builder()
            .method(Method::POST)
            .uri("/_admin/groups")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"title":"Cats","description":"All about cats"}"#))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(created["slug"], "cats");

    send(
        &app.public,
        form("/create/", Some("leo"), "text=meow&group=cats"),
    )
    .await;
    let response = send(&app.public, get("/group/cats/", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("All about cats"));
    assert!(html.contains("meow"));
}

#[tokio::test]
async fn post_detail_and_comments() {
    let app = app();
    send(&app.public, form("/create/", Some("leo"), "text=hello")).await;

    let response = send(&app.public, form("/posts/1/comment/", Some("anna"), "text=nice")).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let html = body_text(send(&app.public, get("/posts/1/", None)).await).await;
    assert!(html.contains("nice"));

    let response = send(&app.public, get("/posts/99/", None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let response = send(&app.public, form("/posts/99/comment/", Some("anna"), "text=x")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn store_outage_maps_to_service_unavailable() {
    let app = app();
    app.repo.set_unavailable(true);
    let response = send(&app.public, get("/", None)).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn health_is_ok_on_in_memory_store() {
    let app = app();
    let response = send(&app.admin, get("/_health/db", None)).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}
