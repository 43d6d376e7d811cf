//! Listing scopes: which posts are eligible for a feed.

use std::fmt;

use super::types::{GroupSlug, Username};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FeedScope {
    All,
    ByGroup(GroupSlug),
    ByAuthor(Username),
    FollowingOf(Username),
}

impl FeedScope {
    /// Short label used in logs and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            FeedScope::All => "all",
            FeedScope::ByGroup(_) => "group",
            FeedScope::ByAuthor(_) => "author",
            FeedScope::FollowingOf(_) => "following",
        }
    }

    /// Deterministic cache key fragment. Equal scopes always produce equal keys,
    /// and the kind prefix keeps keys of different kinds disjoint.
    pub fn cache_key(&self) -> String {
        match self {
            FeedScope::All => "all".to_string(),
            FeedScope::ByGroup(slug) => format!("group:{slug}"),
            FeedScope::ByAuthor(user) => format!("author:{user}"),
            FeedScope::FollowingOf(user) => format!("following:{user}"),
        }
    }

    pub fn base_path(&self) -> String {
        match self {
            FeedScope::All => "/".to_string(),
            FeedScope::ByGroup(slug) => format!("/group/{slug}/"),
            FeedScope::ByAuthor(user) => format!("/profile/{user}/"),
            FeedScope::FollowingOf(_) => "/follow/".to_string(),
        }
    }
}

impl fmt::Display for FeedScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.cache_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(name: &str) -> Username {
        Username::parse(name).expect("valid username")
    }

    #[test]
    fn equal_scopes_share_keys() {
        let a = FeedScope::ByAuthor(user("leo"));
        let b = FeedScope::ByAuthor(user("leo"));
        assert_eq!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn kinds_never_collide() {
        let author = FeedScope::ByAuthor(user("leo"));
        let following = FeedScope::FollowingOf(user("leo"));
        assert_ne!(author.cache_key(), following.cache_key());
        assert_ne!(FeedScope::All.cache_key(), author.cache_key());
    }

    #[test]
    fn paths_match_routes() {
        let group = FeedScope::ByGroup(GroupSlug::parse("cats").expect("valid slug"));
        assert_eq!(group.base_path(), "/group/cats/");
        assert_eq!(FeedScope::All.base_path(), "/");
    }
}
