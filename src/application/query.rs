//! Scope resolution: turn a [`FeedScope`] into an ordered post sequence.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::application::feed::FeedError;
use crate::application::pagination::OrderedSequence;
use crate::application::repos::{FollowsRepo, GroupsRepo, PostFilter, PostsRepo, RepoError};
use crate::domain::entities::{GroupRecord, PostRecord};
use crate::domain::scope::FeedScope;

#[derive(Clone)]
pub struct FeedQueryEngine {
    posts: Arc<dyn PostsRepo>,
    groups: Arc<dyn GroupsRepo>,
    follows: Arc<dyn FollowsRepo>,
}

impl FeedQueryEngine {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        groups: Arc<dyn GroupsRepo>,
        follows: Arc<dyn FollowsRepo>,
    ) -> Self {
        Self {
            posts,
            groups,
            follows,
        }
    }

    /// Resolve `scope` against current store state.
    ///
    /// Nothing is fetched besides the group lookup or follow set; posts are
    /// read lazily through the returned sequence, newest first with id as the
    /// tie-break.
    pub async fn resolve(&self, scope: &FeedScope) -> Result<ResolvedFeed, FeedError> {
        let (filter, group) = match scope {
            FeedScope::All => (PostFilter::All, None),
            FeedScope::ByGroup(slug) => {
                let group = self
                    .groups
                    .find_group_by_slug(slug)
                    .await?
                    .ok_or_else(|| FeedError::UnknownGroup(slug.clone()))?;
                (PostFilter::Group(group.id), Some(group))
            }
            FeedScope::ByAuthor(author) => (PostFilter::Author(author.clone()), None),
            FeedScope::FollowingOf(user) => {
                let mut followees = self.follows.list_followees(user).await?;
                followees.sort();
                followees.dedup();
                debug!(
                    target = "fernlog::feed::query",
                    user = %user,
                    followees = followees.len(),
                    "resolved follow set"
                );
                (PostFilter::Authors(followees), None)
            }
        };

        Ok(ResolvedFeed {
            posts: self.posts.clone(),
            filter,
            group,
        })
    }
}

/// A scope bound to concrete store predicates, evaluated on demand.
pub struct ResolvedFeed {
    posts: Arc<dyn PostsRepo>,
    filter: PostFilter,
    group: Option<GroupRecord>,
}

impl ResolvedFeed {
    pub fn filter(&self) -> &PostFilter {
        &self.filter
    }

    pub fn group(&self) -> Option<&GroupRecord> {
        self.group.as_ref()
    }

    pub fn into_group(self) -> Option<GroupRecord> {
        self.group
    }

    fn is_trivially_empty(&self) -> bool {
        matches!(&self.filter, PostFilter::Authors(authors) if authors.is_empty())
    }
}

#[async_trait]
impl OrderedSequence for ResolvedFeed {
    type Item = PostRecord;

    async fn count(&self) -> Result<u64, RepoError> {
        if self.is_trivially_empty() {
            return Ok(0);
        }
        self.posts.count_posts(&self.filter).await
    }

    async fn slice(&self, offset: u64, limit: u32) -> Result<Vec<PostRecord>, RepoError> {
        if self.is_trivially_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        self.posts.list_posts(&self.filter, offset, limit).await
    }
}
