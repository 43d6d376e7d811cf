use std::sync::Arc;

use crate::application::{feed::FeedService, groups::GroupService};
use crate::infra::db::PostgresRepositories;

#[derive(Clone)]
pub struct AdminState {
    pub feed: Arc<FeedService>,
    pub groups: Arc<GroupService>,
    /// Absent when serving from the in-memory store.
    pub db: Option<Arc<PostgresRepositories>>,
}
