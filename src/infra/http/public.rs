use std::sync::Arc;

use axum::{
    Form, Router,
    extract::{FromRef, Path, Query, State},
    http::{HeaderName, StatusCode},
    middleware,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::Deserialize;

use crate::{
    application::{
        error::HttpError,
        feed::{FeedError, FeedService},
        follow::FollowService,
        pagination::PageIndex,
        posts::{PostCommand, PostError, PostService},
    },
    domain::{
        scope::FeedScope,
        types::{GroupSlug, Username},
    },
    presentation::views::{
        FeedTemplate, FeedView, FollowControl, LayoutChrome, LayoutContext, PostDetailView,
        PostTemplate, render_not_found_response, render_template_response,
    },
};

use super::{
    identity::{Identity, IdentityHeader, Viewer},
    middleware::{log_responses, set_request_context},
};

#[derive(Clone)]
pub struct HttpState {
    pub feed: Arc<FeedService>,
    pub posts: Arc<PostService>,
    pub follows: Arc<FollowService>,
    pub identity_header: HeaderName,
}

impl FromRef<HttpState> for IdentityHeader {
    fn from_ref(state: &HttpState) -> Self {
        IdentityHeader(state.identity_header.clone())
    }
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/group/{slug}/", get(group_index))
        .route("/profile/{username}/", get(profile_index))
        .route("/follow/", get(follow_index))
        .route("/posts/{id}/", get(post_detail))
        .route("/create/", post(create_post))
        .route("/posts/{id}/edit/", post(edit_post))
        .route("/posts/{id}/comment/", post(add_comment))
        .route("/profile/{username}/follow/", post(follow_profile))
        .route("/profile/{username}/unfollow/", post(unfollow_profile))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

/// Query pairs of a listing request; only `page` is read.
///
/// Decoded as a list so repeated keys never reject the request. The last
/// `page` value wins.
#[derive(Debug, Default, Deserialize)]
#[serde(transparent)]
struct PageQuery(Vec<(String, String)>);

impl PageQuery {
    fn index(&self) -> PageIndex {
        let page = self
            .0
            .iter()
            .rev()
            .find(|(key, _)| key == "page")
            .map(|(_, value)| value.as_str());
        PageIndex::from_query(page)
    }
}

#[derive(Debug, Deserialize)]
struct PostForm {
    #[serde(default)]
    text: String,
    #[serde(default)]
    group: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CommentForm {
    #[serde(default)]
    text: String,
}

async fn index(
    State(state): State<HttpState>,
    viewer: Viewer,
    Query(query): Query<PageQuery>,
) -> Response {
    let show_composer = viewer.username().is_some();
    render_feed(
        &state,
        &viewer,
        FeedScope::All,
        query.index(),
        FollowControl::hidden(),
        show_composer,
    )
    .await
}

async fn group_index(
    State(state): State<HttpState>,
    viewer: Viewer,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    let Ok(slug) = GroupSlug::parse(slug.as_str()) else {
        return render_not_found_response(
            LayoutChrome::new(viewer.username()),
            format!("`{slug}` is not a valid group slug"),
        );
    };
    render_feed(
        &state,
        &viewer,
        FeedScope::ByGroup(slug),
        query.index(),
        FollowControl::hidden(),
        false,
    )
    .await
}

async fn profile_index(
    State(state): State<HttpState>,
    viewer: Viewer,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    let Ok(profile) = Username::parse(username.as_str()) else {
        return render_not_found_response(
            LayoutChrome::new(viewer.username()),
            format!("`{username}` is not a valid username"),
        );
    };

    let follow = match viewer.username() {
        Some(me) if *me != profile => match state.follows.is_following(me, &profile).await {
            Ok(is_following) => FollowControl::for_profile(&profile, is_following),
            Err(err) => return HttpError::from(err).into_response(),
        },
        _ => FollowControl::hidden(),
    };

    render_feed(
        &state,
        &viewer,
        FeedScope::ByAuthor(profile),
        query.index(),
        follow,
        false,
    )
    .await
}

async fn follow_index(
    State(state): State<HttpState>,
    Identity(user): Identity,
    Query(query): Query<PageQuery>,
) -> Response {
    let viewer = Viewer(Some(user.clone()));
    render_feed(
        &state,
        &viewer,
        FeedScope::FollowingOf(user),
        query.index(),
        FollowControl::hidden(),
        false,
    )
    .await
}

async fn render_feed(
    state: &HttpState,
    viewer: &Viewer,
    scope: FeedScope,
    index: PageIndex,
    follow: FollowControl,
    show_composer: bool,
) -> Response {
    let chrome = LayoutChrome::new(viewer.username());
    match state.feed.render(&scope, index).await {
        Ok(page) => {
            let content = FeedView::new(&page, follow, show_composer);
            let title = content.heading.clone();
            let view = LayoutContext::new(chrome.with_title(title), content);
            render_template_response(FeedTemplate { view }, StatusCode::OK)
        }
        Err(err) => feed_error_to_response(err, chrome),
    }
}

fn feed_error_to_response(err: FeedError, chrome: LayoutChrome) -> Response {
    match err {
        FeedError::UnknownGroup(slug) => {
            render_not_found_response(chrome, format!("Group `{slug}` does not exist"))
        }
        err => HttpError::from(err).into_response(),
    }
}

async fn post_detail(
    State(state): State<HttpState>,
    viewer: Viewer,
    Path(id): Path<i64>,
) -> Response {
    let chrome = LayoutChrome::new(viewer.username());
    match state.posts.post_detail(id).await {
        Ok(detail) => {
            let content = PostDetailView::new(&detail, viewer.username());
            let title = format!("Post by {}", detail.post.author);
            let view = LayoutContext::new(chrome.with_title(title), content);
            render_template_response(PostTemplate { view }, StatusCode::OK)
        }
        Err(PostError::PostNotFound(id)) => {
            render_not_found_response(chrome, format!("Post {id} does not exist"))
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn create_post(
    State(state): State<HttpState>,
    Identity(user): Identity,
    Form(form): Form<PostForm>,
) -> Result<Redirect, HttpError> {
    let command = PostCommand {
        text: form.text,
        group: form.group,
    };
    state.posts.create_post(&user, command).await?;
    Ok(Redirect::to(&FeedScope::ByAuthor(user).base_path()))
}

async fn edit_post(
    State(state): State<HttpState>,
    Identity(user): Identity,
    Path(id): Path<i64>,
    Form(form): Form<PostForm>,
) -> Result<Redirect, HttpError> {
    let command = PostCommand {
        text: form.text,
        group: form.group,
    };
    state.posts.edit_post(id, &user, command).await?;
    Ok(Redirect::to(&format!("/posts/{id}/")))
}

async fn add_comment(
    State(state): State<HttpState>,
    Identity(user): Identity,
    Path(id): Path<i64>,
    Form(form): Form<CommentForm>,
) -> Result<Redirect, HttpError> {
    state.posts.add_comment(id, &user, &form.text).await?;
    Ok(Redirect::to(&format!("/posts/{id}/")))
}

async fn follow_profile(
    State(state): State<HttpState>,
    Identity(user): Identity,
    Path(username): Path<String>,
) -> Result<Redirect, HttpError> {
    let followee = parse_profile(&username)?;
    state.follows.follow(&user, &followee).await?;
    Ok(Redirect::to(&FeedScope::ByAuthor(followee).base_path()))
}

async fn unfollow_profile(
    State(state): State<HttpState>,
    Identity(user): Identity,
    Path(username): Path<String>,
) -> Result<Redirect, HttpError> {
    let followee = parse_profile(&username)?;
    state.follows.unfollow(&user, &followee).await?;
    Ok(Redirect::to(&FeedScope::ByAuthor(followee).base_path()))
}

fn parse_profile(raw: &str) -> Result<Username, HttpError> {
    Username::parse(raw).map_err(|err| {
        HttpError::from_error(
            "infra::http::parse_profile",
            StatusCode::NOT_FOUND,
            "User not found",
            &err,
        )
    })
}
