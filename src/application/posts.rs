//! Post authoring and detail views.
//!
//! Writes here never touch the page cache; listings pick new posts up once
//! their cached pages expire.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::application::repos::{
    CommentsRepo, CreateCommentParams, CreatePostParams, GroupsRepo, PostsRepo, PostsWriteRepo,
    RepoError, UpdatePostParams,
};
use crate::domain::entities::{CommentRecord, PostRecord};
use crate::domain::error::DomainError;
use crate::domain::types::{GroupSlug, Username, normalize_text};

#[derive(Debug, Error)]
pub enum PostError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("group `{0}` does not exist")]
    UnknownGroup(String),
    #[error("post {0} not found")]
    PostNotFound(i64),
    #[error("only the author may edit post {post_id}")]
    NotAuthor { post_id: i64 },
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Form input for creating or editing a post.
#[derive(Debug, Clone)]
pub struct PostCommand {
    pub text: String,
    /// Group slug; blank or absent publishes outside any group.
    pub group: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostDetail {
    pub post: PostRecord,
    pub comments: Vec<CommentRecord>,
}

#[derive(Clone)]
pub struct PostService {
    reader: Arc<dyn PostsRepo>,
    writer: Arc<dyn PostsWriteRepo>,
    groups: Arc<dyn GroupsRepo>,
    comments: Arc<dyn CommentsRepo>,
}

impl PostService {
    pub fn new(
        reader: Arc<dyn PostsRepo>,
        writer: Arc<dyn PostsWriteRepo>,
        groups: Arc<dyn GroupsRepo>,
        comments: Arc<dyn CommentsRepo>,
    ) -> Self {
        Self {
            reader,
            writer,
            groups,
            comments,
        }
    }

    pub async fn create_post(
        &self,
        author: &Username,
        command: PostCommand,
    ) -> Result<PostRecord, PostError> {
        let text = normalize_text("text", &command.text)?;
        let group_id = self.resolve_group(command.group.as_deref()).await?;

        let post = self
            .writer
            .create_post(CreatePostParams {
                author: author.clone(),
                group_id,
                text,
            })
            .await?;
        info!(
            target = "fernlog::posts",
            post_id = post.id,
            author = %post.author,
            group_id = ?post.group_id,
            "post created"
        );
        Ok(post)
    }

    /// Replace the text and group of a post. Only its author may do so.
    pub async fn edit_post(
        &self,
        post_id: i64,
        editor: &Username,
        command: PostCommand,
    ) -> Result<PostRecord, PostError> {
        let existing = self
            .reader
            .find_post(post_id)
            .await?
            .ok_or(PostError::PostNotFound(post_id))?;
        if &existing.author != editor {
            return Err(PostError::NotAuthor { post_id });
        }

        let text = normalize_text("text", &command.text)?;
        let group_id = self.resolve_group(command.group.as_deref()).await?;

        let post = self
            .writer
            .update_post(UpdatePostParams {
                id: post_id,
                group_id,
                text,
            })
            .await
            .map_err(|err| match err {
                RepoError::NotFound => PostError::PostNotFound(post_id),
                other => PostError::Repo(other),
            })?;
        info!(
            target = "fernlog::posts",
            post_id,
            author = %post.author,
            group_id = ?post.group_id,
            "post edited"
        );
        Ok(post)
    }

    pub async fn post_detail(&self, id: i64) -> Result<PostDetail, PostError> {
        let post = self
            .reader
            .find_post(id)
            .await?
            .ok_or(PostError::PostNotFound(id))?;
        let comments = self.comments.list_comments(id).await?;
        Ok(PostDetail { post, comments })
    }

    pub async fn add_comment(
        &self,
        post_id: i64,
        author: &Username,
        text: &str,
    ) -> Result<CommentRecord, PostError> {
        let text = normalize_text("text", text)?;
        if self.reader.find_post(post_id).await?.is_none() {
            return Err(PostError::PostNotFound(post_id));
        }

        let comment = self
            .comments
            .create_comment(CreateCommentParams {
                post_id,
                author: author.clone(),
                text,
            })
            .await
            .map_err(|err| match err {
                RepoError::NotFound => PostError::PostNotFound(post_id),
                other => PostError::Repo(other),
            })?;
        info!(
            target = "fernlog::posts",
            post_id,
            comment_id = comment.id,
            author = %comment.author,
            "comment added"
        );
        Ok(comment)
    }

    async fn resolve_group(&self, raw: Option<&str>) -> Result<Option<i64>, PostError> {
        let raw = match raw.map(str::trim) {
            Some(raw) if !raw.is_empty() => raw,
            _ => return Ok(None),
        };
        let slug = GroupSlug::parse(raw).map_err(|_| PostError::UnknownGroup(raw.to_string()))?;
        let group = self
            .groups
            .find_group_by_slug(&slug)
            .await?
            .ok_or_else(|| PostError::UnknownGroup(raw.to_string()))?;
        Ok(Some(group.id))
    }
}
