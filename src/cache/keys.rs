//! Page cache keys.

use std::fmt;

use crate::application::pagination::PageIndex;
use crate::domain::scope::FeedScope;

/// Identifies one rendered listing page.
///
/// Equal (scope, page) pairs always encode to the same string, and the page
/// number prefix keeps distinct pairs from colliding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageKey {
    pub scope: FeedScope,
    pub page: PageIndex,
}

impl PageKey {
    pub fn new(scope: FeedScope, page: PageIndex) -> Self {
        Self { scope, page }
    }

    pub fn encode(&self) -> String {
        format!("p{}/{}", self.page.get(), self.scope.cache_key())
    }
}

impl fmt::Display for PageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{GroupSlug, Username};

    #[test]
    fn equal_scopes_give_equal_keys() {
        let a = PageKey::new(FeedScope::ByAuthor(Username::parse("leo").unwrap()), PageIndex::new(2));
        let b = PageKey::new(FeedScope::ByAuthor(Username::parse("leo").unwrap()), PageIndex::new(2));
        assert_eq!(a.encode(), b.encode());
        assert_eq!(a.encode(), "p2/author:leo");
    }

    #[test]
    fn scope_kind_and_page_separate_keys() {
        let group = PageKey::new(
            FeedScope::ByGroup(GroupSlug::parse("leo").unwrap()),
            PageIndex::FIRST,
        );
        let author = PageKey::new(
            FeedScope::ByAuthor(Username::parse("leo").unwrap()),
            PageIndex::FIRST,
        );
        let following = PageKey::new(
            FeedScope::FollowingOf(Username::parse("leo").unwrap()),
            PageIndex::FIRST,
        );
        let all_one = PageKey::new(FeedScope::All, PageIndex::new(1));
        let all_eleven = PageKey::new(FeedScope::All, PageIndex::new(11));

        let keys = [
            group.encode(),
            author.encode(),
            following.encode(),
            all_one.encode(),
            all_eleven.encode(),
        ];
        for (i, a) in keys.iter().enumerate() {
            for b in keys.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }
}
