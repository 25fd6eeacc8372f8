use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};

use super::{ApiResult, AppState};
use crate::db_types::ConnectionProfile;

pub async fn list_connections(State(state): State<AppState>) -> ApiResult<Json<Vec<ConnectionProfile>>> {
    Ok(Json(state.store.list_connections().await?))
}

pub async fn save_connection(
    State(state): State<AppState>,
    Json(profile): Json<ConnectionProfile>,
) -> ApiResult<Json<ConnectionProfile>> {
    Ok(Json(state.store.save_connection(profile).await?))
}

pub async fn delete_connection(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    state.store.delete_connection(&id).await?;
    Ok(Json(json!({ "message": "Deleted" })))
}

/// Tries an unsaved profile without persisting it.
pub async fn test_connection(
    State(state): State<AppState>,
    Json(profile): Json<ConnectionProfile>,
) -> ApiResult<Json<Value>> {
    let message = state.broker.test_connection(&profile).await?;
    Ok(Json(json!({ "success": true, "message": message })))
}
