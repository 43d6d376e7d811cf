use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;

use crate::application::{error::HttpError, groups::CreateGroupCommand};
use crate::domain::entities::GroupRecord;

use super::AdminState;

#[derive(Debug, Deserialize)]
pub(super) struct CreateGroupRequest {
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    slug: Option<String>,
}

pub(super) async fn list_groups(
    State(state): State<AdminState>,
) -> Result<Json<Vec<GroupRecord>>, HttpError> {
    Ok(Json(state.groups.list().await?))
}

pub(super) async fn create_group(
    State(state): State<AdminState>,
    Json(request): Json<CreateGroupRequest>,
) -> Result<(StatusCode, Json<GroupRecord>), HttpError> {
    let group = state
        .groups
        .create(CreateGroupCommand {
            title: request.title,
            description: request.description,
            slug: request.slug,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(group)))
}
