use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::application::feed::FeedError;
use crate::application::follow::FollowError;
use crate::application::groups::GroupError;
use crate::application::posts::PostError;
use crate::application::repos::RepoError;
use crate::domain::error::DomainError;
use crate::infra::error::InfraError;

#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = vec![error.to_string()];
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    public_message: &'static str,
    report: ErrorReport,
}

impl HttpError {
    pub fn new(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        detail: impl Into<String>,
    ) -> Self {
        let report = ErrorReport::from_message(source, status, detail);
        Self {
            status,
            public_message,
            report,
        }
    }

    pub fn from_error(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        error: &dyn StdError,
    ) -> Self {
        let report = ErrorReport::from_error(source, status, error);
        Self {
            status,
            public_message,
            report,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    fn repo(source: &'static str, error: &RepoError) -> Self {
        match error {
            RepoError::Persistence(_) | RepoError::Timeout => Self::from_error(
                source,
                StatusCode::SERVICE_UNAVAILABLE,
                "Service temporarily unavailable",
                error,
            ),
            RepoError::NotFound => {
                Self::from_error(source, StatusCode::NOT_FOUND, "Not found", error)
            }
            RepoError::InvalidInput { .. } => Self::from_error(
                source,
                StatusCode::BAD_REQUEST,
                "Request could not be processed",
                error,
            ),
            RepoError::Duplicate { .. } | RepoError::Integrity { .. } => Self::from_error(
                source,
                StatusCode::CONFLICT,
                "Request conflicts with existing data",
                error,
            ),
        }
    }

    fn domain(source: &'static str, error: &DomainError) -> Self {
        match error {
            DomainError::NotFound { .. } => {
                Self::from_error(source, StatusCode::NOT_FOUND, "Not found", error)
            }
            DomainError::Validation { .. } => Self::from_error(
                source,
                StatusCode::BAD_REQUEST,
                "Request could not be processed",
                error,
            ),
            DomainError::Invariant { .. } => Self::from_error(
                source,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
                error,
            ),
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.public_message).into_response();
        self.report.attach(&mut response);
        response
    }
}

impl From<FeedError> for HttpError {
    fn from(error: FeedError) -> Self {
        const SOURCE: &str = "infra::http::feed_error_to_http_error";
        match error {
            FeedError::UnknownGroup(slug) => HttpError::new(
                SOURCE,
                StatusCode::NOT_FOUND,
                "Group not found",
                format!("Group `{slug}` does not exist"),
            ),
            FeedError::Repo(err) => HttpError::repo(SOURCE, &err),
        }
    }
}

impl From<FollowError> for HttpError {
    fn from(error: FollowError) -> Self {
        const SOURCE: &str = "infra::http::follow_error_to_http_error";
        match error {
            FollowError::InvalidEdge(user) => HttpError::new(
                SOURCE,
                StatusCode::BAD_REQUEST,
                "You cannot follow yourself",
                format!("`{user}` attempted to follow themselves"),
            ),
            FollowError::Repo(err) => HttpError::repo(SOURCE, &err),
        }
    }
}

impl From<PostError> for HttpError {
    fn from(error: PostError) -> Self {
        const SOURCE: &str = "infra::http::post_error_to_http_error";
        match error {
            PostError::Domain(err) => HttpError::domain(SOURCE, &err),
            PostError::UnknownGroup(slug) => HttpError::new(
                SOURCE,
                StatusCode::BAD_REQUEST,
                "Select a valid group",
                format!("Group `{slug}` does not exist"),
            ),
            PostError::PostNotFound(id) => HttpError::new(
                SOURCE,
                StatusCode::NOT_FOUND,
                "Post not found",
                format!("Post {id} does not exist"),
            ),
            PostError::NotAuthor { .. } => HttpError::from_error(
                SOURCE,
                StatusCode::FORBIDDEN,
                "Only the author can edit this post",
                &error,
            ),
            PostError::Repo(err) => HttpError::repo(SOURCE, &err),
        }
    }
}

impl From<GroupError> for HttpError {
    fn from(error: GroupError) -> Self {
        const SOURCE: &str = "infra::http::group_error_to_http_error";
        match error {
            GroupError::Domain(err) => HttpError::domain(SOURCE, &err),
            GroupError::SlugTaken(_) => HttpError::from_error(
                SOURCE,
                StatusCode::CONFLICT,
                "Group slug is already taken",
                &error,
            ),
            GroupError::Slug(_) => HttpError::from_error(
                SOURCE,
                StatusCode::BAD_REQUEST,
                "Group title cannot be turned into a slug",
                &error,
            ),
            GroupError::Repo(err) => HttpError::repo(SOURCE, &err),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{GroupSlug, Username};

    fn report(response: &Response) -> &ErrorReport {
        response
            .extensions()
            .get::<ErrorReport>()
            .expect("error report attached")
    }

    #[test]
    fn unknown_group_maps_to_not_found() {
        let slug = GroupSlug::parse("ghosts").unwrap();
        let response = HttpError::from(FeedError::UnknownGroup(slug)).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(report(&response).messages, vec!["Group `ghosts` does not exist"]);
    }

    #[test]
    fn store_failure_maps_to_service_unavailable() {
        let error = FeedError::Repo(RepoError::from_persistence("connection refused"));
        assert_eq!(HttpError::from(error).status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn self_follow_maps_to_bad_request() {
        let me = Username::parse("me").unwrap();
        assert_eq!(
            HttpError::from(FollowError::InvalidEdge(me)).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn report_collects_error_chain() {
        #[derive(Debug, Error)]
        #[error("outer")]
        struct Outer(#[source] RepoError);

        let report = ErrorReport::from_error(
            "test",
            StatusCode::INTERNAL_SERVER_ERROR,
            &Outer(RepoError::Timeout),
        );
        assert_eq!(report.messages, vec!["outer", "database timeout"]);
    }
}
