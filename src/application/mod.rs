//! Application services: feed assembly, follow graph and authoring.

pub mod error;
pub mod feed;
pub mod follow;
pub mod groups;
pub mod pagination;
pub mod posts;
pub mod query;
pub mod repos;
