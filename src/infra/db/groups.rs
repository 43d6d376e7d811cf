use async_trait::async_trait;

use crate::application::repos::{CreateGroupParams, GroupsRepo, RepoError};
use crate::domain::entities::GroupRecord;
use crate::domain::types::GroupSlug;

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct GroupRow {
    id: i64,
    slug: String,
    title: String,
    description: String,
}

impl TryFrom<GroupRow> for GroupRecord {
    type Error = RepoError;

    fn try_from(row: GroupRow) -> Result<Self, Self::Error> {
        let slug = GroupSlug::parse(row.slug).map_err(|err| RepoError::Integrity {
            message: format!("stored group slug is invalid: {err}"),
        })?;
        Ok(Self {
            id: row.id,
            slug,
            title: row.title,
            description: row.description,
        })
    }
}

#[async_trait]
impl GroupsRepo for PostgresRepositories {
    async fn find_group_by_slug(
        &self,
        slug: &GroupSlug,
    ) -> Result<Option<GroupRecord>, RepoError> {
        let row: Option<GroupRow> = sqlx::query_as(
            "SELECT id, slug, title, description FROM groups WHERE slug = $1",
        )
        .bind(slug.as_str())
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(GroupRecord::try_from).transpose()
    }

    async fn list_groups(&self) -> Result<Vec<GroupRecord>, RepoError> {
        let rows: Vec<GroupRow> = sqlx::query_as(
            "SELECT id, slug, title, description FROM groups ORDER BY title, id",
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(GroupRecord::try_from).collect()
    }

    async fn create_group(&self, params: CreateGroupParams) -> Result<GroupRecord, RepoError> {
        let row: GroupRow = sqlx::query_as(
            r#"
            INSERT INTO groups (slug, title, description)
            VALUES ($1, $2, $3)
            RETURNING id, slug, title, description
            "#,
        )
        .bind(params.slug.as_str())
        .bind(&params.title)
        .bind(&params.description)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        GroupRecord::try_from(row)
    }
}
