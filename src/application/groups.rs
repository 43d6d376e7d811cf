use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::application::repos::{CreateGroupParams, GroupsRepo, RepoError};
use crate::domain::entities::GroupRecord;
use crate::domain::error::DomainError;
use crate::domain::slug::{SlugAsyncError, SlugError, generate_unique_slug_async};
use crate::domain::types::{GROUP_TITLE_MAX_LEN, GroupSlug};

#[derive(Debug, Error)]
pub enum GroupError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("slug `{0}` is already taken")]
    SlugTaken(GroupSlug),
    #[error("could not derive a slug: {0}")]
    Slug(#[from] SlugError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone)]
pub struct CreateGroupCommand {
    pub title: String,
    pub description: String,
    /// Explicit slug; derived from the title when absent.
    pub slug: Option<String>,
}

#[derive(Clone)]
pub struct GroupService {
    groups: Arc<dyn GroupsRepo>,
}

impl GroupService {
    pub fn new(groups: Arc<dyn GroupsRepo>) -> Self {
        Self { groups }
    }

    pub async fn list(&self) -> Result<Vec<GroupRecord>, GroupError> {
        Ok(self.groups.list_groups().await?)
    }

    pub async fn find(&self, slug: &GroupSlug) -> Result<Option<GroupRecord>, GroupError> {
        Ok(self.groups.find_group_by_slug(slug).await?)
    }

    pub async fn create(&self, command: CreateGroupCommand) -> Result<GroupRecord, GroupError> {
        let title = command.title.trim().to_string();
        if title.is_empty() {
            return Err(DomainError::validation("title", "must not be blank").into());
        }
        if title.chars().count() > GROUP_TITLE_MAX_LEN {
            return Err(DomainError::validation(
                "title",
                format!("must be at most {GROUP_TITLE_MAX_LEN} characters"),
            )
            .into());
        }

        let slug = match command.slug.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => {
                let slug = GroupSlug::parse(raw)?;
                if self.groups.find_group_by_slug(&slug).await?.is_some() {
                    return Err(GroupError::SlugTaken(slug));
                }
                slug
            }
            _ => self.unique_slug(&title).await?,
        };

        let group = self
            .groups
            .create_group(CreateGroupParams {
                slug,
                title,
                description: command.description.trim().to_string(),
            })
            .await?;
        info!(
            target = "fernlog::groups",
            group_id = group.id,
            slug = %group.slug,
            "group created"
        );
        Ok(group)
    }

    async fn unique_slug(&self, title: &str) -> Result<GroupSlug, GroupError> {
        let groups = self.groups.clone();
        generate_unique_slug_async(title, move |candidate| {
            let groups = groups.clone();
            async move {
                let Ok(slug) = GroupSlug::parse(candidate) else {
                    return Ok(false);
                };
                groups
                    .find_group_by_slug(&slug)
                    .await
                    .map(|existing| existing.is_none())
            }
        })
        .await
        .map_err(|err| match err {
            SlugAsyncError::Slug(err) => GroupError::Slug(err),
            SlugAsyncError::Predicate(err) => GroupError::Repo(err),
        })
    }
}
