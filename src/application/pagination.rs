//! Offset pagination over ordered sequences.

use std::num::NonZeroU32;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::application::repos::RepoError;

pub const DEFAULT_PAGE_SIZE: u32 = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PaginationError {
    #[error("page size must be positive, got {0}")]
    InvalidPageSize(i64),
}

/// Number of items per page; always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageSize(NonZeroU32);

impl PageSize {
    pub fn new(value: i64) -> Result<Self, PaginationError> {
        u32::try_from(value)
            .ok()
            .and_then(NonZeroU32::new)
            .map(Self)
            .ok_or(PaginationError::InvalidPageSize(value))
    }

    pub fn get(&self) -> u32 {
        self.0.get()
    }
}

impl Default for PageSize {
    fn default() -> Self {
        Self(NonZeroU32::new(DEFAULT_PAGE_SIZE).unwrap_or(NonZeroU32::MIN))
    }
}

impl From<NonZeroU32> for PageSize {
    fn from(value: NonZeroU32) -> Self {
        Self(value)
    }
}

/// 1-based page number. Values below 1 clamp to the first page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageIndex(u32);

impl PageIndex {
    pub const FIRST: PageIndex = PageIndex(1);

    pub fn new(value: i64) -> Self {
        if value < 1 {
            Self::FIRST
        } else {
            Self(u32::try_from(value).unwrap_or(u32::MAX))
        }
    }

    /// Parse the `page` query parameter; absent or non-numeric input means page 1.
    pub fn from_query(raw: Option<&str>) -> Self {
        raw.and_then(|value| value.trim().parse::<i64>().ok())
            .map(Self::new)
            .unwrap_or(Self::FIRST)
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl Default for PageIndex {
    fn default() -> Self {
        Self::FIRST
    }
}

/// Boundary arithmetic for one page of a sequence with a known length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub index: PageIndex,
    pub size: PageSize,
    pub total_count: u64,
    pub page_count: u64,
    pub offset: u64,
}

impl PageWindow {
    pub fn compute(total_count: u64, index: PageIndex, size: PageSize) -> Self {
        let per_page = u64::from(size.get());
        let page_count = total_count.div_ceil(per_page);
        let offset = u64::from(index.get() - 1).saturating_mul(per_page);
        Self {
            index,
            size,
            total_count,
            page_count,
            offset,
        }
    }

    /// True when the requested page lies beyond the last page.
    pub fn is_past_end(&self) -> bool {
        u64::from(self.index.get()) > self.page_count
    }
}

/// A slice of an ordered sequence plus the totals needed for page navigation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub page_index: u32,
    pub page_size: u32,
    pub total_count: u64,
    pub page_count: u64,
}

impl<T> Paginated<T> {
    pub fn empty(window: PageWindow) -> Self {
        Self {
            items: Vec::new(),
            page_index: window.index.get(),
            page_size: window.size.get(),
            total_count: window.total_count,
            page_count: window.page_count,
        }
    }

    pub fn has_previous(&self) -> bool {
        self.page_index > 1 && self.page_count > 0
    }

    pub fn has_next(&self) -> bool {
        u64::from(self.page_index) < self.page_count
    }

    pub fn previous_page(&self) -> Option<u32> {
        self.has_previous()
            .then(|| u32::try_from(self.page_count).unwrap_or(u32::MAX).min(self.page_index - 1))
    }

    pub fn next_page(&self) -> Option<u32> {
        self.has_next().then(|| self.page_index + 1)
    }
}

/// An ordered sequence that can be counted and sliced without materialising it.
#[async_trait]
pub trait OrderedSequence: Send + Sync {
    type Item: Send;

    async fn count(&self) -> Result<u64, RepoError>;

    async fn slice(&self, offset: u64, limit: u32) -> Result<Vec<Self::Item>, RepoError>;
}

/// Cut page `index` of `size` items out of `sequence`.
///
/// Pages past the end are empty but still report the real totals.
pub async fn paginate<S>(
    sequence: &S,
    index: PageIndex,
    size: PageSize,
) -> Result<Paginated<S::Item>, RepoError>
where
    S: OrderedSequence + ?Sized,
{
    let total = sequence.count().await?;
    let window = PageWindow::compute(total, index, size);
    if window.is_past_end() {
        return Ok(Paginated::empty(window));
    }

    let items = sequence.slice(window.offset, size.get()).await?;
    Ok(Paginated {
        items,
        ..Paginated::empty(window)
    })
}
