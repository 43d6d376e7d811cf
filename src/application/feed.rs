use std::sync::Arc;

use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;

use crate::application::pagination::{PageIndex, PageSize, Paginated, paginate};
use crate::application::query::FeedQueryEngine;
use crate::application::repos::RepoError;
use crate::cache::{PageCache, PageKey};
use crate::domain::entities::{GroupRecord, PostRecord};
use crate::domain::scope::FeedScope;
use crate::domain::types::GroupSlug;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("group `{0}` not found")]
    UnknownGroup(GroupSlug),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// One rendered listing page as stored in the page cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedPage {
    pub scope: FeedScope,
    /// Present for group listings; cached together with the posts.
    pub group: Option<GroupRecord>,
    pub page: Paginated<PostRecord>,
}

impl FeedPage {
    pub fn posts(&self) -> &[PostRecord] {
        &self.page.items
    }
}

#[derive(Clone)]
pub struct FeedService {
    engine: FeedQueryEngine,
    cache: Arc<PageCache<FeedPage>>,
    page_size: PageSize,
}

impl FeedService {
    pub fn new(engine: FeedQueryEngine, cache: Arc<PageCache<FeedPage>>, page_size: PageSize) -> Self {
        Self {
            engine,
            cache,
            page_size,
        }
    }

    /// Render page `index` of `scope`, serving a cached copy while it is fresh.
    ///
    /// Cached pages do not reflect writes made after they were computed.
    pub async fn render(&self, scope: &FeedScope, index: PageIndex) -> Result<Arc<FeedPage>, FeedError> {
        let key = PageKey::new(scope.clone(), index);
        self.cache
            .get_or_compute(&key, || self.compute(scope, index))
            .await
    }

    /// Drop every cached page.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    async fn compute(&self, scope: &FeedScope, index: PageIndex) -> Result<FeedPage, FeedError> {
        let started_at = Instant::now();
        let feed = self.engine.resolve(scope).await?;
        let page = paginate(&feed, index, self.page_size).await?;

        debug!(
            target = "fernlog::feed",
            scope = %scope,
            page = index.get(),
            items = page.items.len(),
            total = page.total_count,
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            "feed page computed"
        );

        Ok(FeedPage {
            scope: scope.clone(),
            group: feed.into_group(),
            page,
        })
    }
}
