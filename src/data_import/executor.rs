// =====================================================
// BULK IMPORT EXECUTOR
// Authoritative rows -> batched multi-row INSERTs in one transaction
// =====================================================

use futures::FutureExt;
use std::collections::HashMap;

use crate::data_import::file_parser;
use crate::data_import::models::{ImportOutcome, ImportRecord, ImportRequest};
use crate::data_import::sink::MetadataSink;
use crate::data_import::uploads::UploadStore;
use crate::db::connections::ConnectionBroker;
use crate::db::engine::ConnectionHandle;
use crate::db_types::{EngineKind, Row, SqlParam};
use crate::error::{CoreError, CoreResult};

pub const BATCH_SIZE: usize = 1000;

fn max_bind_params(kind: EngineKind) -> usize {
    match kind {
        EngineKind::PostgreSQL | EngineKind::MySQL => 65_535,
        EngineKind::SqlServer => 2_000,
    }
}

/// Rows per INSERT: 1000, or fewer when the bind-parameter limit is hit first.
pub fn rows_per_batch(kind: EngineKind, column_count: usize) -> usize {
    if column_count == 0 {
        return BATCH_SIZE;
    }
    (max_bind_params(kind) / column_count).clamp(1, BATCH_SIZE)
}

// --- Statement Building ---

fn quote_identifier(kind: EngineKind, name: &str) -> String {
    match kind {
        EngineKind::PostgreSQL => format!("\"{}\"", name.replace('"', "\"\"")),
        EngineKind::MySQL | EngineKind::SqlServer => name.to_string(),
    }
}

fn placeholder(kind: EngineKind, index: usize, cast: Option<&str>) -> String {
    match kind {
        EngineKind::PostgreSQL => match cast {
            Some(cast) => format!("${}::{}", index, cast),
            None => format!("${}", index),
        },
        EngineKind::MySQL => "?".to_string(),
        EngineKind::SqlServer => format!("@P{}", index),
    }
}

/// Builds one parameterized multi-row INSERT per batch. `columns` holds the
/// finalized (source header, destination column) pairs; `column_types`
/// supplies Postgres placeholder casts keyed by destination column.
pub fn build_insert_batches(
    kind: EngineKind,
    table: &str,
    columns: &[(String, String)],
    rows: &[Row],
    column_types: &HashMap<String, String>,
) -> Vec<(String, Vec<SqlParam>)> {
    if columns.is_empty() || rows.is_empty() {
        return Vec::new();
    }

    let column_list = columns
        .iter()
        .map(|(_, target)| quote_identifier(kind, target))
        .collect::<Vec<_>>()
        .join(", ");
    let prefix = format!(
        "INSERT INTO {} ({}) VALUES ",
        quote_identifier(kind, table),
        column_list
    );
    let casts: Vec<Option<&str>> = columns
        .iter()
        .map(|(_, target)| column_types.get(target).map(String::as_str))
        .collect();

    rows.chunks(rows_per_batch(kind, columns.len()))
        .map(|batch| {
            let mut params = Vec::with_capacity(batch.len() * columns.len());
            let mut tuples = Vec::with_capacity(batch.len());
            for row in batch {
                let mut slots = Vec::with_capacity(columns.len());
                for ((source, _), cast) in columns.iter().zip(&casts) {
                    params.push(SqlParam::from_cell(row.get(source)));
                    slots.push(placeholder(kind, params.len(), *cast));
                }
                tuples.push(format!("({})", slots.join(", ")));
            }
            (format!("{}{}", prefix, tuples.join(", ")), params)
        })
        .collect()
}

// --- Execution ---

/// Runs every batch inside one transaction on `handle`. Any failure rolls
/// the whole import back and reports zero successes.
pub async fn run_import(
    handle: &mut ConnectionHandle,
    table: &str,
    columns: &[(String, String)],
    rows: &[Row],
) -> CoreResult<ImportOutcome> {
    let total = rows.len() as u64;
    let failed = |e: CoreError| CoreError::Import {
        message: e.detail(),
        success_count: 0,
        error_count: total,
    };

    let column_types = handle.column_types(table).await.map_err(failed)?;
    let batches = build_insert_batches(handle.kind(), table, columns, rows, &column_types);

    handle.begin_transaction().await.map_err(failed)?;

    let mut inserted = 0u64;
    for (index, (sql, params)) in batches.iter().enumerate() {
        if let Err(e) = handle.execute_query(sql, params).await {
            log::error!(
                "Import into {} failed on batch {} of {}: {}",
                table,
                index + 1,
                batches.len(),
                e
            );
            if let Err(rollback_err) = handle.rollback().await {
                log::warn!("Rollback after failed import also failed: {}", rollback_err);
            }
            return Err(failed(e));
        }
        inserted += (params.len() / columns.len().max(1)) as u64;
    }

    handle.commit().await.map_err(failed)?;

    log::info!("Imported {} rows into {} in {} batches", inserted, table, batches.len());
    Ok(ImportOutcome {
        success_count: inserted,
        error_count: 0,
    })
}

/// Full-file rows when a file id is given, otherwise the preview payload.
/// The upload is consumed by a successful read.
pub async fn resolve_rows(uploads: &UploadStore, request: &ImportRequest) -> CoreResult<Vec<Row>> {
    let Some(file_id) = request.normalized_file_id() else {
        return Ok(request.data.clone().unwrap_or_default());
    };

    let format = uploads.format_of(file_id)?;
    let bytes = uploads.read_file(file_id).await?;
    let parsed = file_parser::parse_blocking(format, bytes, request.sheet_name.clone()).await?;
    uploads.delete_file(file_id).await?;
    Ok(parsed.rows)
}

pub async fn execute_import(
    broker: &ConnectionBroker,
    uploads: &UploadStore,
    sink: &dyn MetadataSink,
    connection_id: &str,
    request: ImportRequest,
) -> CoreResult<ImportOutcome> {
    let table = request.normalized_table();
    if table.is_empty() {
        return Err(CoreError::InvalidInput("Target table is required".to_string()));
    }
    let columns = request.mappings.finalized();
    if columns.is_empty() {
        return Err(CoreError::InvalidInput(
            "At least one column must be mapped".to_string(),
        ));
    }

    let rows = resolve_rows(uploads, &request).await?;
    log::info!(
        "Starting import of {} rows into {} on connection {}",
        rows.len(),
        table,
        connection_id
    );

    let target = table.clone();
    let outcome = broker
        .with_connection(connection_id, move |handle| {
            async move { run_import(handle, &target, &columns, &rows).await }.boxed()
        })
        .await?;

    let record = ImportRecord {
        connection_id: connection_id.to_string(),
        table_name: table,
        file_label: request.file_label(),
        outcome,
    };
    if let Err(e) = sink.record_import(record).await {
        log::error!("Import committed but history was not recorded: {}", e);
    }
    Ok(outcome)
}
