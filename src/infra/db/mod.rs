//! Postgres-backed repository implementations.

mod comments;
mod follows;
mod groups;
mod posts;
mod util;

pub use util::map_sqlx_error;

use std::sync::Arc;

use sqlx::{
    Postgres, QueryBuilder,
    postgres::{PgPool, PgPoolOptions},
    query,
};

use crate::application::repos::{PostFilter, RepoError};
use crate::domain::types::Username;

#[derive(Clone)]
pub struct PostgresRepositories {
    pool: Arc<PgPool>,
}

impl PostgresRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
    }

    pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn health_check(&self) -> Result<(), RepoError> {
        query("SELECT 1")
            .execute(self.pool())
            .await
            .map(|_| ())
            .map_err(map_sqlx_error)
    }

    /// Append the `WHERE` predicates for a resolved feed filter.
    fn apply_post_filter<'q>(qb: &mut QueryBuilder<'q, Postgres>, filter: &'q PostFilter) {
        match filter {
            PostFilter::All => {}
            PostFilter::Group(group_id) => {
                qb.push(" AND p.group_id = ");
                qb.push_bind(*group_id);
            }
            PostFilter::Author(author) => {
                qb.push(" AND p.author = ");
                qb.push_bind(author.as_str());
            }
            PostFilter::Authors(authors) => {
                qb.push(" AND p.author = ANY(");
                qb.push_bind(
                    authors
                        .iter()
                        .map(|author| author.as_str().to_string())
                        .collect::<Vec<String>>(),
                );
                qb.push(")");
            }
        }
    }
}

fn parse_username(value: String) -> Result<Username, RepoError> {
    Username::parse(value).map_err(|err| RepoError::Integrity {
        message: format!("stored username is invalid: {err}"),
    })
}

fn offset_to_i64(offset: u64) -> i64 {
    i64::try_from(offset).unwrap_or(i64::MAX)
}
