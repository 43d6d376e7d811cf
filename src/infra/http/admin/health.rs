use axum::{extract::State, response::Response};

use super::super::db_health_response;
use super::AdminState;

pub(super) async fn admin_health(State(state): State<AdminState>) -> Response {
    let result = match &state.db {
        Some(db) => db.health_check().await,
        None => Ok(()),
    };
    db_health_response(result)
}
