use crate::application::error::{ErrorReport, HttpError};
use crate::application::feed::FeedPage;
use crate::application::posts::PostDetail;
use crate::domain::entities::{CommentRecord, PostRecord};
use crate::domain::scope::FeedScope;
use crate::domain::types::Username;
use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use time::{OffsetDateTime, format_description::well_known::Rfc3339, macros::format_description};

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

/// Render the HTML 404 page and attach `detail` for the response logger.
pub fn render_not_found_response(chrome: LayoutChrome, detail: impl Into<String>) -> Response {
    let content = ErrorPageView::not_found();
    let view = LayoutContext::new(chrome.with_title("Not found"), content);
    let mut response = render_template_response(ErrorTemplate { view }, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        detail,
    )
    .attach(&mut response);
    response
}

/// Per-request page frame. Never cached; built from the request identity.
#[derive(Clone)]
pub struct LayoutChrome {
    pub title: String,
    pub viewer: String,
    pub is_signed_in: bool,
    pub profile_href: String,
}

impl LayoutChrome {
    pub fn new(viewer: Option<&Username>) -> Self {
        match viewer {
            Some(user) => Self {
                title: "fernlog".to_string(),
                viewer: user.to_string(),
                is_signed_in: true,
                profile_href: FeedScope::ByAuthor(user.clone()).base_path(),
            },
            None => Self {
                title: "fernlog".to_string(),
                viewer: String::new(),
                is_signed_in: false,
                profile_href: String::new(),
            },
        }
    }

    pub fn with_title(self, title: impl Into<String>) -> Self {
        Self {
            title: format!("{} · fernlog", title.into()),
            ..self
        }
    }
}

pub struct LayoutContext<T> {
    pub title: String,
    pub viewer: String,
    pub is_signed_in: bool,
    pub profile_href: String,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(chrome: LayoutChrome, content: T) -> Self {
        Self {
            title: chrome.title,
            viewer: chrome.viewer,
            is_signed_in: chrome.is_signed_in,
            profile_href: chrome.profile_href,
            content,
        }
    }
}

fn display_time(at: OffsetDateTime) -> String {
    at.format(format_description!(
        "[day].[month].[year] [hour]:[minute]"
    ))
    .unwrap_or_else(|_| at.unix_timestamp().to_string())
}

fn iso_time(at: OffsetDateTime) -> String {
    at.format(&Rfc3339)
        .unwrap_or_else(|_| at.unix_timestamp().to_string())
}

#[derive(Clone)]
pub struct PostCard {
    pub id: i64,
    pub author: String,
    pub author_href: String,
    pub has_group: bool,
    pub group_slug: String,
    pub group_href: String,
    pub text: String,
    pub published: String,
    pub iso_date: String,
    pub detail_href: String,
}

impl From<&PostRecord> for PostCard {
    fn from(post: &PostRecord) -> Self {
        let (has_group, group_slug, group_href) = match &post.group_slug {
            Some(slug) => (
                true,
                slug.to_string(),
                FeedScope::ByGroup(slug.clone()).base_path(),
            ),
            None => (false, String::new(), String::new()),
        };
        Self {
            id: post.id,
            author: post.author.to_string(),
            author_href: FeedScope::ByAuthor(post.author.clone()).base_path(),
            has_group,
            group_slug,
            group_href,
            text: post.text.clone(),
            published: display_time(post.created_at),
            iso_date: iso_time(post.created_at),
            detail_href: format!("/posts/{}/", post.id),
        }
    }
}

/// Follow / unfollow button on a profile listing.
pub struct FollowControl {
    pub visible: bool,
    pub action: String,
    pub label: String,
}

impl FollowControl {
    pub fn hidden() -> Self {
        Self {
            visible: false,
            action: String::new(),
            label: String::new(),
        }
    }

    pub fn for_profile(profile: &Username, is_following: bool) -> Self {
        let (verb, label) = if is_following {
            ("unfollow", "Unfollow")
        } else {
            ("follow", "Follow")
        };
        Self {
            visible: true,
            action: format!("/profile/{profile}/{verb}/"),
            label: label.to_string(),
        }
    }
}

pub struct FeedView {
    pub heading: String,
    pub description: String,
    pub posts: Vec<PostCard>,
    pub has_results: bool,
    pub page_index: u32,
    pub page_count: u64,
    pub total_count: u64,
    pub has_previous: bool,
    pub previous_href: String,
    pub has_next: bool,
    pub next_href: String,
    pub follow: FollowControl,
    pub show_composer: bool,
}

impl FeedView {
    pub fn new(page: &FeedPage, follow: FollowControl, show_composer: bool) -> Self {
        let (heading, description) = match (&page.scope, &page.group) {
            (_, Some(group)) => (group.title.clone(), group.description.clone()),
            (FeedScope::ByAuthor(user), None) => (format!("Posts by {user}"), String::new()),
            (FeedScope::FollowingOf(_), None) => ("Following".to_string(), String::new()),
            _ => ("Latest posts".to_string(), String::new()),
        };
        let base = page.scope.base_path();
        let paginated = &page.page;
        let href = |number: u32| format!("{base}?page={number}");

        Self {
            heading,
            description,
            posts: paginated.items.iter().map(PostCard::from).collect(),
            has_results: !paginated.items.is_empty(),
            page_index: paginated.page_index,
            page_count: paginated.page_count,
            total_count: paginated.total_count,
            has_previous: paginated.has_previous(),
            previous_href: paginated.previous_page().map(href).unwrap_or_default(),
            has_next: paginated.has_next(),
            next_href: paginated.next_page().map(href).unwrap_or_default(),
            follow,
            show_composer,
        }
    }
}

#[derive(Template)]
#[template(path = "feed.html")]
pub struct FeedTemplate {
    pub view: LayoutContext<FeedView>,
}

pub struct CommentView {
    pub author: String,
    pub author_href: String,
    pub text: String,
    pub published: String,
}

impl From<&CommentRecord> for CommentView {
    fn from(comment: &CommentRecord) -> Self {
        Self {
            author: comment.author.to_string(),
            author_href: FeedScope::ByAuthor(comment.author.clone()).base_path(),
            text: comment.text.clone(),
            published: display_time(comment.created_at),
        }
    }
}

pub struct PostDetailView {
    pub post: PostCard,
    pub comments: Vec<CommentView>,
    pub has_comments: bool,
    pub comment_action: String,
    pub can_comment: bool,
    /// Set only when the viewer wrote the post.
    pub can_edit: bool,
    pub edit_action: String,
}

impl PostDetailView {
    pub fn new(detail: &PostDetail, viewer: Option<&Username>) -> Self {
        Self {
            post: PostCard::from(&detail.post),
            comments: detail.comments.iter().map(CommentView::from).collect(),
            has_comments: !detail.comments.is_empty(),
            comment_action: format!("/posts/{}/comment/", detail.post.id),
            can_comment: viewer.is_some(),
            can_edit: viewer == Some(&detail.post.author),
            edit_action: format!("/posts/{}/edit/", detail.post.id),
        }
    }
}

#[derive(Template)]
#[template(path = "post.html")]
pub struct PostTemplate {
    pub view: LayoutContext<PostDetailView>,
}

pub struct ErrorPageView {
    pub heading: String,
    pub message: String,
}

impl ErrorPageView {
    pub fn not_found() -> Self {
        Self {
            heading: "Page Not Found".to_string(),
            message: "The page you requested does not exist.".to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub view: LayoutContext<ErrorPageView>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::pagination::Paginated;
    use crate::domain::types::GroupSlug;
    use time::macros::datetime;

    fn post(id: i64, group: Option<&str>) -> PostRecord {
        PostRecord {
            id,
            author: Username::parse("leo").unwrap(),
            group_id: group.map(|_| 1),
            group_slug: group.map(|slug| GroupSlug::parse(slug).unwrap()),
            text: "<b>hello</b>".to_string(),
            created_at: datetime!(2024-03-05 14:30 UTC),
        }
    }

    fn page(scope: FeedScope, items: Vec<PostRecord>, index: u32, count: u64) -> FeedPage {
        FeedPage {
            scope,
            group: None,
            page: Paginated {
                items,
                page_index: index,
                page_size: 10,
                total_count: count * 10,
                page_count: count,
            },
        }
    }

    #[test]
    fn post_card_links_author_and_group() {
        let card = PostCard::from(&post(7, Some("cats")));
        assert_eq!(card.author_href, "/profile/leo/");
        assert_eq!(card.group_href, "/group/cats/");
        assert_eq!(card.detail_href, "/posts/7/");
        assert_eq!(card.published, "05.03.2024 14:30");
        assert!(!PostCard::from(&post(8, None)).has_group);
    }

    #[test]
    fn feed_view_builds_navigation_links() {
        let user = Username::parse("leo").unwrap();
        let view = FeedView::new(
            &page(FeedScope::ByAuthor(user), vec![post(1, None)], 2, 3),
            FollowControl::hidden(),
            false,
        );
        assert_eq!(view.heading, "Posts by leo");
        assert_eq!(view.previous_href, "/profile/leo/?page=1");
        assert_eq!(view.next_href, "/profile/leo/?page=3");
    }

    #[test]
    fn rendered_feed_escapes_post_text() {
        let view = FeedView::new(
            &page(FeedScope::All, vec![post(1, None)], 1, 1),
            FollowControl::hidden(),
            false,
        );
        let html = FeedTemplate {
            view: LayoutContext::new(LayoutChrome::new(None), view),
        }
        .render()
        .expect("feed renders");
        assert!(html.contains("&#60;b&#62;hello&#60;/b&#62;"));
        assert!(!html.contains("<b>hello</b>"));
    }

    #[test]
    fn edit_form_is_offered_to_author_only() {
        let detail = PostDetail {
            post: post(4, Some("cats")),
            comments: Vec::new(),
        };
        let render = |viewer: Option<&str>| {
            let viewer = viewer.map(|name| Username::parse(name).unwrap());
            let content = PostDetailView::new(&detail, viewer.as_ref());
            PostTemplate {
                view: LayoutContext::new(LayoutChrome::new(viewer.as_ref()), content),
            }
            .render()
            .expect("post renders")
        };

        let author = render(Some("leo"));
        assert!(author.contains("Save changes"));
        assert!(author.contains("value=\"cats\""));

        assert!(!render(Some("anna")).contains("Save changes"));
        assert!(!render(None).contains("Save changes"));
    }

    #[test]
    fn follow_control_targets_profile() {
        let user = Username::parse("anna").unwrap();
        let control = FollowControl::for_profile(&user, true);
        assert_eq!(control.action, "/profile/anna/unfollow/");
        assert_eq!(control.label, "Unfollow");
    }
}
