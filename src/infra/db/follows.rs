use async_trait::async_trait;

use crate::application::repos::{FollowsRepo, RepoError};
use crate::domain::types::Username;

use super::{PostgresRepositories, map_sqlx_error, parse_username};

#[async_trait]
impl FollowsRepo for PostgresRepositories {
    async fn insert_follow(
        &self,
        follower: &Username,
        followee: &Username,
    ) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO follows (follower, followee)
            VALUES ($1, $2)
            ON CONFLICT (follower, followee) DO NOTHING
            "#,
        )
        .bind(follower.as_str())
        .bind(followee.as_str())
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn delete_follow(
        &self,
        follower: &Username,
        followee: &Username,
    ) -> Result<(), RepoError> {
        sqlx::query("DELETE FROM follows WHERE follower = $1 AND followee = $2")
            .bind(follower.as_str())
            .bind(followee.as_str())
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn list_followees(&self, follower: &Username) -> Result<Vec<Username>, RepoError> {
        let rows: Vec<String> =
            sqlx::query_scalar("SELECT followee FROM follows WHERE follower = $1")
                .bind(follower.as_str())
                .fetch_all(self.pool())
                .await
                .map_err(map_sqlx_error)?;

        rows.into_iter().map(parse_username).collect()
    }

    async fn follow_exists(
        &self,
        follower: &Username,
        followee: &Username,
    ) -> Result<bool, RepoError> {
        sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM follows WHERE follower = $1 AND followee = $2)",
        )
        .bind(follower.as_str())
        .bind(followee.as_str())
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)
    }
}
