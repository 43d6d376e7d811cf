//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::{CommentRecord, GroupRecord, PostRecord};
use crate::domain::types::{GroupSlug, Username};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Store-level predicate for a resolved feed scope.
///
/// Group slugs and follow sets are already resolved by the query engine, so
/// the store only ever filters on concrete ids and author names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostFilter {
    All,
    Group(i64),
    Author(Username),
    Authors(Vec<Username>),
}

#[derive(Debug, Clone)]
pub struct CreatePostParams {
    pub author: Username,
    pub group_id: Option<i64>,
    pub text: String,
}

/// Replaces the editable fields of a post; author and creation time stay.
#[derive(Debug, Clone)]
pub struct UpdatePostParams {
    pub id: i64,
    pub group_id: Option<i64>,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct CreateGroupParams {
    pub slug: GroupSlug,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct CreateCommentParams {
    pub post_id: i64,
    pub author: Username,
    pub text: String,
}

#[async_trait]
pub trait PostsRepo: Send + Sync {
    /// Posts matching `filter`, newest first (`created_at DESC, id DESC`),
    /// skipping `offset` rows and returning at most `limit`.
    async fn list_posts(
        &self,
        filter: &PostFilter,
        offset: u64,
        limit: u32,
    ) -> Result<Vec<PostRecord>, RepoError>;

    async fn count_posts(&self, filter: &PostFilter) -> Result<u64, RepoError>;

    async fn find_post(&self, id: i64) -> Result<Option<PostRecord>, RepoError>;
}

#[async_trait]
pub trait PostsWriteRepo: Send + Sync {
    /// Insert a post; the store assigns id and creation time atomically.
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError>;

    /// Returns `RepoError::NotFound` when no post has `params.id`.
    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError>;
}

#[async_trait]
pub trait GroupsRepo: Send + Sync {
    async fn find_group_by_slug(&self, slug: &GroupSlug)
    -> Result<Option<GroupRecord>, RepoError>;

    async fn list_groups(&self) -> Result<Vec<GroupRecord>, RepoError>;

    async fn create_group(&self, params: CreateGroupParams) -> Result<GroupRecord, RepoError>;
}

#[async_trait]
pub trait FollowsRepo: Send + Sync {
    /// Insert the edge; inserting an existing edge is not an error.
    async fn insert_follow(&self, follower: &Username, followee: &Username)
    -> Result<(), RepoError>;

    /// Remove the edge; removing a missing edge is not an error.
    async fn delete_follow(&self, follower: &Username, followee: &Username)
    -> Result<(), RepoError>;

    async fn list_followees(&self, follower: &Username) -> Result<Vec<Username>, RepoError>;

    async fn follow_exists(
        &self,
        follower: &Username,
        followee: &Username,
    ) -> Result<bool, RepoError>;
}

#[async_trait]
pub trait CommentsRepo: Send + Sync {
    async fn create_comment(&self, params: CreateCommentParams)
    -> Result<CommentRecord, RepoError>;

    /// Comments on a post, newest first.
    async fn list_comments(&self, post_id: i64) -> Result<Vec<CommentRecord>, RepoError>;
}
