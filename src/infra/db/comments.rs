use async_trait::async_trait;
use time::OffsetDateTime;

use crate::application::repos::{CommentsRepo, CreateCommentParams, RepoError};
use crate::domain::entities::CommentRecord;

use super::{PostgresRepositories, map_sqlx_error, parse_username};

#[derive(sqlx::FromRow)]
struct CommentRow {
    id: i64,
    post_id: i64,
    author: String,
    text: String,
    created_at: OffsetDateTime,
}

impl TryFrom<CommentRow> for CommentRecord {
    type Error = RepoError;

    fn try_from(row: CommentRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            post_id: row.post_id,
            author: parse_username(row.author)?,
            text: row.text,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl CommentsRepo for PostgresRepositories {
    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        let row: CommentRow = sqlx::query_as(
            r#"
            INSERT INTO comments (post_id, author, text)
            VALUES ($1, $2, $3)
            RETURNING id, post_id, author, text, created_at
            "#,
        )
        .bind(params.post_id)
        .bind(params.author.as_str())
        .bind(&params.text)
        .fetch_one(self.pool())
        .await
        .map_err(|err| match map_sqlx_error(err) {
            RepoError::InvalidInput { .. } => RepoError::NotFound,
            other => other,
        })?;

        CommentRecord::try_from(row)
    }

    async fn list_comments(&self, post_id: i64) -> Result<Vec<CommentRecord>, RepoError> {
        let rows: Vec<CommentRow> = sqlx::query_as(
            r#"
            SELECT id, post_id, author, text, created_at
            FROM comments
            WHERE post_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(post_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(CommentRecord::try_from).collect()
    }
}
