//! Domain entities mirrored from persistent storage.

use serde::Serialize;
use time::OffsetDateTime;

use super::types::{GroupSlug, Username};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostRecord {
    pub id: i64,
    pub author: Username,
    pub group_id: Option<i64>,
    pub group_slug: Option<GroupSlug>,
    pub text: String,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupRecord {
    pub id: i64,
    pub slug: GroupSlug,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentRecord {
    pub id: i64,
    pub post_id: i64,
    pub author: Username,
    pub text: String,
    pub created_at: OffsetDateTime,
}

/// Directed "follower sees followee's posts" relation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct FollowEdge {
    pub follower: Username,
    pub followee: Username,
}

impl FollowEdge {
    pub fn new(follower: Username, followee: Username) -> Self {
        Self { follower, followee }
    }

    pub fn is_self_loop(&self) -> bool {
        self.follower == self.followee
    }
}
