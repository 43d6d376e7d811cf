use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;

use crate::application::repos::{
    CreatePostParams, PostFilter, PostsRepo, PostsWriteRepo, RepoError, UpdatePostParams,
};
use crate::domain::entities::PostRecord;
use crate::domain::types::GroupSlug;

use super::{PostgresRepositories, map_sqlx_error, offset_to_i64, parse_username};

const POST_COLUMNS: &str =
    "SELECT p.id, p.author, p.group_id, g.slug AS group_slug, p.text, p.created_at";

#[derive(sqlx::FromRow)]
struct PostRow {
    id: i64,
    author: String,
    group_id: Option<i64>,
    group_slug: Option<String>,
    text: String,
    created_at: OffsetDateTime,
}

impl TryFrom<PostRow> for PostRecord {
    type Error = RepoError;

    fn try_from(row: PostRow) -> Result<Self, Self::Error> {
        let group_slug = row
            .group_slug
            .map(GroupSlug::parse)
            .transpose()
            .map_err(|err| RepoError::Integrity {
                message: format!("stored group slug is invalid: {err}"),
            })?;

        Ok(Self {
            id: row.id,
            author: parse_username(row.author)?,
            group_id: row.group_id,
            group_slug,
            text: row.text,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl PostsRepo for PostgresRepositories {
    async fn list_posts(
        &self,
        filter: &PostFilter,
        offset: u64,
        limit: u32,
    ) -> Result<Vec<PostRecord>, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new(POST_COLUMNS);
        qb.push(" FROM posts p LEFT JOIN groups g ON g.id = p.group_id WHERE TRUE");
        Self::apply_post_filter(&mut qb, filter);
        qb.push(" ORDER BY p.created_at DESC, p.id DESC LIMIT ");
        qb.push_bind(i64::from(limit));
        qb.push(" OFFSET ");
        qb.push_bind(offset_to_i64(offset));

        let rows: Vec<PostRow> = qb
            .build_query_as::<PostRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        rows.into_iter().map(PostRecord::try_from).collect()
    }

    async fn count_posts(&self, filter: &PostFilter) -> Result<u64, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM posts p WHERE TRUE");
        Self::apply_post_filter(&mut qb, filter);

        let count: i64 = qb
            .build_query_scalar::<i64>()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(count.max(0) as u64)
    }

    async fn find_post(&self, id: i64) -> Result<Option<PostRecord>, RepoError> {
        let sql = format!(
            "{POST_COLUMNS} FROM posts p LEFT JOIN groups g ON g.id = p.group_id WHERE p.id = $1"
        );
        let row: Option<PostRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        row.map(PostRecord::try_from).transpose()
    }
}

#[async_trait]
impl PostsWriteRepo for PostgresRepositories {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        // created_at never precedes the newest existing post.
        let row: PostRow = sqlx::query_as(
            r#"
            WITH inserted AS (
                INSERT INTO posts (author, group_id, text, created_at)
                VALUES (
                    $1, $2, $3,
                    GREATEST(clock_timestamp(), (SELECT MAX(created_at) FROM posts))
                )
                RETURNING id, author, group_id, text, created_at
            )
            SELECT i.id, i.author, i.group_id, g.slug AS group_slug, i.text, i.created_at
            FROM inserted i
            LEFT JOIN groups g ON g.id = i.group_id
            "#,
        )
        .bind(params.author.as_str())
        .bind(params.group_id)
        .bind(&params.text)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        PostRecord::try_from(row)
    }
    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let row: Option<PostRow> = sqlx::query_as(
            r#"
            WITH updated AS (
                UPDATE posts
                SET group_id = $2, text = $3
                WHERE id = $1
                RETURNING id, author, group_id, text, created_at
            )
            SELECT u.id, u.author, u.group_id, g.slug AS group_slug, u.text, u.created_at
            FROM updated u
            LEFT JOIN groups g ON g.id = u.group_id
            "#,
        )
        .bind(params.id)
        .bind(params.group_id)
        .bind(&params.text)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.ok_or(RepoError::NotFound).and_then(PostRecord::try_from)
    }
}
