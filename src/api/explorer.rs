use axum::extract::{Path, State};
use axum::Json;
use futures::FutureExt;
use serde::Deserialize;

use super::{ApiResult, AppState};
use crate::db_types::TabularResult;
use crate::error::CoreError;

#[derive(Deserialize)]
pub struct QueryRequest {
    pub query: String,
}

pub async fn list_tables(
    State(state): State<AppState>,
    Path(connection_id): Path<String>,
) -> ApiResult<Json<Vec<String>>> {
    let tables = state
        .broker
        .with_connection(&connection_id, |handle| handle.list_tables().boxed())
        .await?;
    Ok(Json(tables))
}

pub async fn list_columns(
    State(state): State<AppState>,
    Path((connection_id, table_name)): Path<(String, String)>,
) -> ApiResult<Json<Vec<String>>> {
    let columns = state
        .broker
        .with_connection(&connection_id, move |handle| {
            async move { handle.list_columns(&table_name).await }.boxed()
        })
        .await?;
    Ok(Json(columns))
}

/// Ad-hoc SQL; multi-statement scripts return the last result set.
pub async fn run_query(
    State(state): State<AppState>,
    Path(connection_id): Path<String>,
    Json(request): Json<QueryRequest>,
) -> ApiResult<Json<TabularResult>> {
    if request.query.trim().is_empty() {
        return Err(CoreError::InvalidInput("Query is required".to_string()).into());
    }
    let result = state
        .broker
        .with_connection(&connection_id, move |handle| {
            async move { handle.execute_query(&request.query, &[]).await }.boxed()
        })
        .await?;
    Ok(Json(result))
}
