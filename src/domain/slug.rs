//! Group slug derivation.
//!
//! Titles are slugified with the `slug` crate (which transliterates non-ASCII
//! text, so "Кошки и собаки" becomes `koshki-i-sobaki`) and truncated to the
//! group slug length limit. Uniqueness is delegated to a caller-supplied
//! predicate so the derivation itself stays pure.

use std::future::Future;

use slug::slugify;
use thiserror::Error;

use super::types::{GROUP_SLUG_MAX_LEN, GroupSlug};

const MAX_SUFFIX_ATTEMPTS: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlugError {
    #[error("slug source text is empty")]
    EmptyInput,
    #[error("failed to derive slug from `{input}`")]
    Unrepresentable { input: String },
    #[error("exhausted attempts to find a unique slug for `{base}`")]
    Exhausted { base: String },
}

#[derive(Debug, Error)]
pub enum SlugAsyncError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    #[error(transparent)]
    Slug(#[from] SlugError),
    #[error(transparent)]
    Predicate(E),
}

/// Derive a base slug that fits the group slug limit.
pub fn derive_slug(input: &str) -> Result<String, SlugError> {
    if input.trim().is_empty() {
        return Err(SlugError::EmptyInput);
    }

    let candidate = truncate(&slugify(input), GROUP_SLUG_MAX_LEN);
    if candidate.is_empty() {
        return Err(SlugError::Unrepresentable {
            input: input.to_string(),
        });
    }

    Ok(candidate)
}

/// Find a slug accepted by `is_unique`, suffixing `-2`, `-3`, … on collision.
pub async fn generate_unique_slug_async<F, Fut, E>(
    input: &str,
    mut is_unique: F,
) -> Result<GroupSlug, SlugAsyncError<E>>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<bool, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    let base = derive_slug(input)?;

    if is_unique(base.clone())
        .await
        .map_err(SlugAsyncError::Predicate)?
    {
        return Ok(into_group_slug(base)?);
    }

    for attempt in 2..=MAX_SUFFIX_ATTEMPTS + 1 {
        let suffix = format!("-{attempt}");
        let stem = truncate(&base, GROUP_SLUG_MAX_LEN - suffix.len());
        let candidate = format!("{stem}{suffix}");
        if is_unique(candidate.clone())
            .await
            .map_err(SlugAsyncError::Predicate)?
        {
            return Ok(into_group_slug(candidate)?);
        }
    }

    Err(SlugAsyncError::Slug(SlugError::Exhausted { base }))
}

fn into_group_slug(value: String) -> Result<GroupSlug, SlugError> {
    GroupSlug::parse(value.clone()).map_err(|_| SlugError::Unrepresentable { input: value })
}

fn truncate(slug: &str, max: usize) -> String {
    let mut out: String = slug.chars().take(max).collect();
    while out.ends_with('-') {
        out.pop();
    }
    out
}
