use axum::extract::{Multipart, Path, State};
use axum::Json;
use futures::FutureExt;
use serde::Serialize;
use serde_json::{json, Value};

use super::{ApiResult, AppState};
use crate::data_import::executor;
use crate::data_import::file_parser::{self, PREVIEW_ROWS};
use crate::data_import::mapper::{self, ColumnMapping};
use crate::data_import::models::{
    AutoMapRequest, FilePreview, ImportHistoryEntry, ImportRequest, MappingTemplate,
    SaveMappingRequest, SheetPreviewRequest,
};
use crate::data_import::sink::MetadataSink;
use crate::error::CoreError;

// --- Upload & Preview ---

pub async fn upload_file(State(state): State<AppState>, mut multipart: Multipart) -> ApiResult<Json<FilePreview>> {
    let mut upload: Option<(Vec<u8>, Option<String>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| CoreError::InvalidInput(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| CoreError::InvalidInput(format!("Failed to read upload: {}", e)))?;
        upload = Some((bytes.to_vec(), file_name));
    }
    let (bytes, file_name) =
        upload.ok_or_else(|| CoreError::InvalidInput("No file uploaded".to_string()))?;

    let stored = state.uploads.store_file(&bytes, file_name.as_deref()).await?;
    let parsed = match file_parser::parse_blocking(stored.format, bytes, None).await {
        Ok(parsed) => parsed,
        Err(e) => {
            state.uploads.delete_file(&stored.file_id).await?;
            return Err(e.into());
        }
    };

    let mut preview = FilePreview::from_parsed(&parsed, PREVIEW_ROWS);
    preview.file_id = Some(stored.file_id);
    preview.file_name = file_name;
    Ok(Json(preview))
}

/// Re-derives headers and preview for another sheet of a stored upload.
pub async fn sheet_preview(
    State(state): State<AppState>,
    Json(request): Json<SheetPreviewRequest>,
) -> ApiResult<Json<FilePreview>> {
    let format = state.uploads.format_of(&request.file_id)?;
    let bytes = state.uploads.read_file(&request.file_id).await?;
    let parsed = file_parser::parse_blocking(format, bytes, Some(request.sheet_name)).await?;

    let mut preview = FilePreview::from_parsed(&parsed, PREVIEW_ROWS);
    preview.file_id = Some(request.file_id);
    Ok(Json(preview))
}

// --- Mapping ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoMapResponse {
    pub mappings: ColumnMapping,
    pub columns: Vec<String>,
}

/// Proposes destination columns for each header from the live table.
pub async fn auto_map(
    State(state): State<AppState>,
    Path(connection_id): Path<String>,
    Json(request): Json<AutoMapRequest>,
) -> ApiResult<Json<AutoMapResponse>> {
    let table = request.table.trim().to_string();
    if table.is_empty() {
        return Err(CoreError::InvalidInput("Target table is required".to_string()).into());
    }
    let columns = state
        .broker
        .with_connection(&connection_id, move |handle| {
            async move { handle.list_columns(&table).await }.boxed()
        })
        .await?;

    let mappings = match request.mappings {
        Some(mut existing) => {
            for header in &request.headers {
                if existing.get(header).is_none() {
                    existing.set(header, "");
                }
            }
            mapper::auto_map_onto(existing, &columns)
        }
        None => mapper::auto_map(&request.headers, &columns),
    };
    Ok(Json(AutoMapResponse { mappings, columns }))
}

pub async fn save_mapping(
    State(state): State<AppState>,
    Path(connection_id): Path<String>,
    Json(request): Json<SaveMappingRequest>,
) -> ApiResult<Json<Value>> {
    let id = state.store.save_mapping_template(&connection_id, &request).await?;
    Ok(Json(json!({ "id": id, "success": true })))
}

pub async fn list_mappings(
    State(state): State<AppState>,
    Path((connection_id, table_name)): Path<(String, String)>,
) -> ApiResult<Json<Vec<MappingTemplate>>> {
    Ok(Json(
        state
            .store
            .list_mapping_templates(&connection_id, &table_name)
            .await?,
    ))
}

pub async fn get_template(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<MappingTemplate>> {
    Ok(Json(state.store.get_mapping_template(id).await?))
}

pub async fn delete_template(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<Value>> {
    state.store.delete_mapping_template(id).await?;
    Ok(Json(json!({ "message": "Deleted" })))
}

// --- Import ---

pub async fn execute_import(
    State(state): State<AppState>,
    Path(connection_id): Path<String>,
    Json(request): Json<ImportRequest>,
) -> ApiResult<Json<Value>> {
    let outcome = executor::execute_import(
        &state.broker,
        &state.uploads,
        state.store.as_ref(),
        &connection_id,
        request,
    )
    .await?;
    Ok(Json(json!({
        "success": true,
        "successCount": outcome.success_count,
        "errorCount": outcome.error_count,
    })))
}

pub async fn history(
    State(state): State<AppState>,
    Path(connection_id): Path<String>,
) -> ApiResult<Json<Vec<ImportHistoryEntry>>> {
    Ok(Json(state.store.list_import_history(&connection_id, None).await?))
}

pub async fn table_history(
    State(state): State<AppState>,
    Path((connection_id, table_name)): Path<(String, String)>,
) -> ApiResult<Json<Vec<ImportHistoryEntry>>> {
    Ok(Json(
        state
            .store
            .list_import_history(&connection_id, Some(&table_name))
            .await?,
    ))
}
