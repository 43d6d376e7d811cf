//! In-process repository implementation.
//!
//! Used when no database URL is configured and by the test suites. Semantics
//! match the Postgres adapter: ids are assigned sequentially, creation times
//! never decrease in id order, and follow edges are unique per pair.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::application::repos::{
    CommentsRepo, CreateCommentParams, CreateGroupParams, CreatePostParams, FollowsRepo,
    GroupsRepo, PostFilter, PostsRepo, PostsWriteRepo, RepoError, UpdatePostParams,
};
use crate::domain::entities::{CommentRecord, GroupRecord, PostRecord};
use crate::domain::types::{GroupSlug, Username};

#[derive(Debug, Clone, Copy)]
enum Clock {
    System,
    Fixed(OffsetDateTime),
}

impl Clock {
    fn now(self) -> OffsetDateTime {
        match self {
            Clock::System => OffsetDateTime::now_utc(),
            Clock::Fixed(at) => at,
        }
    }
}

#[derive(Default)]
struct MemoryState {
    posts: Vec<PostRecord>,
    groups: Vec<GroupRecord>,
    comments: Vec<CommentRecord>,
    follows: BTreeSet<(Username, Username)>,
    last_created_at: Option<OffsetDateTime>,
}

impl MemoryState {
    fn group_slug(&self, group_id: Option<i64>) -> Result<Option<GroupSlug>, RepoError> {
        let Some(group_id) = group_id else {
            return Ok(None);
        };
        self.groups
            .iter()
            .find(|group| group.id == group_id)
            .map(|group| Some(group.slug.clone()))
            .ok_or_else(|| RepoError::Integrity {
                message: format!("group {group_id} does not exist"),
            })
    }

    fn next_id(len: usize) -> i64 {
        i64::try_from(len).unwrap_or(i64::MAX - 1) + 1
    }

    /// Creation time for the next row; never earlier than the previous one.
    fn stamp(&mut self, clock: Clock) -> OffsetDateTime {
        let now = clock.now();
        let at = match self.last_created_at {
            Some(last) if last > now => last,
            _ => now,
        };
        self.last_created_at = Some(at);
        at
    }
}

pub struct MemoryRepositories {
    state: RwLock<MemoryState>,
    clock: Clock,
    unavailable: AtomicBool,
}

impl Default for MemoryRepositories {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRepositories {
    pub fn new() -> Self {
        Self::with_clock(Clock::System)
    }

    /// Every row gets the same creation time, so ordering falls back to ids.
    pub fn with_fixed_clock(at: OffsetDateTime) -> Self {
        Self::with_clock(Clock::Fixed(at))
    }

    fn with_clock(clock: Clock) -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
            clock,
            unavailable: AtomicBool::new(false),
        }
    }

    /// Make every call fail as if the backing store were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<(), RepoError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RepoError::from_persistence("in-memory store marked unavailable"));
        }
        Ok(())
    }
}

fn matches_filter(post: &PostRecord, filter: &PostFilter) -> bool {
    match filter {
        PostFilter::All => true,
        PostFilter::Group(group_id) => post.group_id == Some(*group_id),
        PostFilter::Author(author) => &post.author == author,
        PostFilter::Authors(authors) => authors.contains(&post.author),
    }
}

#[async_trait]
impl PostsRepo for MemoryRepositories {
    async fn list_posts(
        &self,
        filter: &PostFilter,
        offset: u64,
        limit: u32,
    ) -> Result<Vec<PostRecord>, RepoError> {
        self.ensure_available()?;
        let state = self.state.read().await;
        let mut posts: Vec<&PostRecord> = state
            .posts
            .iter()
            .filter(|post| matches_filter(post, filter))
            .collect();
        posts.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));

        Ok(posts
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn count_posts(&self, filter: &PostFilter) -> Result<u64, RepoError> {
        self.ensure_available()?;
        let state = self.state.read().await;
        let count = state
            .posts
            .iter()
            .filter(|post| matches_filter(post, filter))
            .count();
        Ok(count as u64)
    }

    async fn find_post(&self, id: i64) -> Result<Option<PostRecord>, RepoError> {
        self.ensure_available()?;
        let state = self.state.read().await;
        Ok(state.posts.iter().find(|post| post.id == id).cloned())
    }
}

#[async_trait]
impl PostsWriteRepo for MemoryRepositories {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        self.ensure_available()?;
        let mut state = self.state.write().await;

        let group_slug = state.group_slug(params.group_id)?;

        let record = PostRecord {
            id: MemoryState::next_id(state.posts.len()),
            author: params.author,
            group_id: params.group_id,
            group_slug,
            text: params.text,
            created_at: state.stamp(self.clock),
        };
        state.posts.push(record.clone());
        Ok(record)
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        self.ensure_available()?;
        let mut state = self.state.write().await;
        let group_slug = state.group_slug(params.group_id)?;

        let post = state
            .posts
            .iter_mut()
            .find(|post| post.id == params.id)
            .ok_or(RepoError::NotFound)?;
        post.group_id = params.group_id;
        post.group_slug = group_slug;
        post.text = params.text;
        Ok(post.clone())
    }
}

#[async_trait]
impl GroupsRepo for MemoryRepositories {
    async fn find_group_by_slug(
        &self,
        slug: &GroupSlug,
    ) -> Result<Option<GroupRecord>, RepoError> {
        self.ensure_available()?;
        let state = self.state.read().await;
        Ok(state.groups.iter().find(|group| &group.slug == slug).cloned())
    }

    async fn list_groups(&self) -> Result<Vec<GroupRecord>, RepoError> {
        self.ensure_available()?;
        let state = self.state.read().await;
        let mut groups = state.groups.clone();
        groups.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));
        Ok(groups)
    }

    async fn create_group(&self, params: CreateGroupParams) -> Result<GroupRecord, RepoError> {
        self.ensure_available()?;
        let mut state = self.state.write().await;
        if state.groups.iter().any(|group| group.slug == params.slug) {
            return Err(RepoError::Duplicate {
                constraint: "groups_slug_key".to_string(),
            });
        }

        let record = GroupRecord {
            id: MemoryState::next_id(state.groups.len()),
            slug: params.slug,
            title: params.title,
            description: params.description,
        };
        state.groups.push(record.clone());
        Ok(record)
    }
}

#[async_trait]
impl FollowsRepo for MemoryRepositories {
    async fn insert_follow(
        &self,
        follower: &Username,
        followee: &Username,
    ) -> Result<(), RepoError> {
        self.ensure_available()?;
        if follower == followee {
            return Err(RepoError::Integrity {
                message: "follow edge must join two distinct users".to_string(),
            });
        }
        let mut state = self.state.write().await;
        state.follows.insert((follower.clone(), followee.clone()));
        Ok(())
    }

    async fn delete_follow(
        &self,
        follower: &Username,
        followee: &Username,
    ) -> Result<(), RepoError> {
        self.ensure_available()?;
        let mut state = self.state.write().await;
        state.follows.remove(&(follower.clone(), followee.clone()));
        Ok(())
    }

    async fn list_followees(&self, follower: &Username) -> Result<Vec<Username>, RepoError> {
        self.ensure_available()?;
        let state = self.state.read().await;
        Ok(state
            .follows
            .iter()
            .filter(|(from, _)| from == follower)
            .map(|(_, to)| to.clone())
            .collect())
    }

    async fn follow_exists(
        &self,
        follower: &Username,
        followee: &Username,
    ) -> Result<bool, RepoError> {
        self.ensure_available()?;
        let state = self.state.read().await;
        Ok(state
            .follows
            .contains(&(follower.clone(), followee.clone())))
    }
}

#[async_trait]
impl CommentsRepo for MemoryRepositories {
    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        self.ensure_available()?;
        let mut state = self.state.write().await;
        if !state.posts.iter().any(|post| post.id == params.post_id) {
            return Err(RepoError::NotFound);
        }

        let record = CommentRecord {
            id: MemoryState::next_id(state.comments.len()),
            post_id: params.post_id,
            author: params.author,
            text: params.text,
            created_at: state.stamp(self.clock),
        };
        state.comments.push(record.clone());
        Ok(record)
    }

    async fn list_comments(&self, post_id: i64) -> Result<Vec<CommentRecord>, RepoError> {
        self.ensure_available()?;
        let state = self.state.read().await;
        let mut comments: Vec<CommentRecord> = state
            .comments
            .iter()
            .filter(|comment| comment.post_id == post_id)
            .cloned()
            .collect();
        comments.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(comments)
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    fn user(name: &str) -> Username {
        Username::parse(name).expect("valid username")
    }

    fn post_params(author: &str) -> CreatePostParams {
        CreatePostParams {
            author: user(author),
            group_id: None,
            text: "hello".into(),
        }
    }

    #[tokio::test]
    async fn assigns_sequential_ids_and_monotonic_times() {
        let repo = MemoryRepositories::new();
        let a = repo.create_post(post_params("leo")).await.unwrap();
        let b = repo.create_post(post_params("leo")).await.unwrap();

        assert_eq!((a.id, b.id), (1, 2));
        assert!(b.created_at >= a.created_at);
    }

    #[tokio::test]
    async fn post_in_unknown_group_is_rejected() {
        let repo = MemoryRepositories::new();
        let err = repo
            .create_post(CreatePostParams {
                group_id: Some(42),
                ..post_params("leo")
            })
            .await
            .expect_err("unknown group");
        assert!(matches!(err, RepoError::Integrity { .. }));
    }

    #[tokio::test]
    async fn update_keeps_author_and_creation_time() {
        let repo = MemoryRepositories::new();
        let original = repo.create_post(post_params("leo")).await.unwrap();

        let updated = repo
            .update_post(UpdatePostParams {
                id: original.id,
                group_id: None,
                text: "edited".into(),
            })
            .await
            .unwrap();

        assert_eq!(updated.text, "edited");
        assert_eq!(updated.author, original.author);
        assert_eq!(updated.created_at, original.created_at);
        assert_eq!(repo.find_post(original.id).await.unwrap(), Some(updated));

        let missing = repo
            .update_post(UpdatePostParams {
                id: 99,
                group_id: None,
                text: "x".into(),
            })
            .await;
        assert!(matches!(missing, Err(RepoError::NotFound)));
    }

    #[tokio::test]
    async fn duplicate_group_slug_is_rejected() {
        let repo = MemoryRepositories::new();
        let params = CreateGroupParams {
            slug: GroupSlug::parse("cats").unwrap(),
            title: "Cats".into(),
            description: String::new(),
        };
        repo.create_group(params.clone()).await.unwrap();
        let err = repo.create_group(params).await.expect_err("duplicate");
        assert!(matches!(err, RepoError::Duplicate { .. }));
    }

    #[tokio::test]
    async fn comments_list_newest_first() {
        let repo = MemoryRepositories::with_fixed_clock(datetime!(2024-01-01 0:00 UTC));
        let post = repo.create_post(post_params("leo")).await.unwrap();
        for text in ["first", "second"] {
            repo.create_comment(CreateCommentParams {
                post_id: post.id,
                author: user("reader"),
                text: text.into(),
            })
            .await
            .unwrap();
        }

        let comments = repo.list_comments(post.id).await.unwrap();
        let texts: Vec<&str> = comments.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["second", "first"]);
    }

    #[tokio::test]
    async fn unavailable_store_fails_every_call() {
        let repo = MemoryRepositories::new();
        repo.set_unavailable(true);
        assert!(matches!(
            repo.count_posts(&PostFilter::All).await,
            Err(RepoError::Persistence(_))
        ));

        repo.set_unavailable(false);
        assert_eq!(repo.count_posts(&PostFilter::All).await.unwrap(), 0);
    }
}
