//! Follow graph operations.

use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::application::repos::{FollowsRepo, RepoError};
use crate::domain::entities::FollowEdge;
use crate::domain::types::Username;

#[derive(Debug, Error)]
pub enum FollowError {
    #[error("`{0}` cannot follow themselves")]
    InvalidEdge(Username),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct FollowService {
    follows: Arc<dyn FollowsRepo>,
}

impl FollowService {
    pub fn new(follows: Arc<dyn FollowsRepo>) -> Self {
        Self { follows }
    }

    /// Add `follower -> followee`. Following twice is a no-op.
    pub async fn follow(&self, follower: &Username, followee: &Username) -> Result<(), FollowError> {
        let edge = FollowEdge::new(follower.clone(), followee.clone());
        if edge.is_self_loop() {
            debug!(
                target = "fernlog::follow",
                user = %follower,
                "rejected self-follow"
            );
            return Err(FollowError::InvalidEdge(edge.follower));
        }

        self.follows.insert_follow(follower, followee).await?;
        info!(
            target = "fernlog::follow",
            follower = %follower,
            followee = %followee,
            "follow recorded"
        );
        Ok(())
    }

    /// Remove `follower -> followee` if present.
    pub async fn unfollow(
        &self,
        follower: &Username,
        followee: &Username,
    ) -> Result<(), FollowError> {
        self.follows.delete_follow(follower, followee).await?;
        info!(
            target = "fernlog::follow",
            follower = %follower,
            followee = %followee,
            "follow removed"
        );
        Ok(())
    }

    pub async fn followees_of(&self, user: &Username) -> Result<HashSet<Username>, FollowError> {
        let followees = self.follows.list_followees(user).await?;
        Ok(followees.into_iter().collect())
    }

    pub async fn is_following(
        &self,
        follower: &Username,
        followee: &Username,
    ) -> Result<bool, FollowError> {
        Ok(self.follows.follow_exists(follower, followee).await?)
    }
}
