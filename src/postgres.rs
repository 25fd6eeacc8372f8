// =====================================================
// POSTGRESQL ENGINE CLIENT
// =====================================================

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use sqlx::postgres::{PgConnectOptions, PgConnection, PgRow};
use sqlx::{Column, ConnectOptions, Connection, Either, Executor, Row, TypeInfo};
use std::collections::HashMap;

use crate::db::engine::EngineClient;
use crate::db::query_execution::{AffectedRows, ResultSetCollector};
use crate::db_types::{ConnectionProfile, EngineKind, SqlParam, TabularResult};
use crate::error::{CoreError, CoreResult};

const ENGINE: &str = "postgresql";

pub struct PostgresClient {
    conn: PgConnection,
}

// --- Connection ---

fn connect_options(profile: &ConnectionProfile) -> PgConnectOptions {
    let mut options = PgConnectOptions::new()
        .host(&profile.host)
        .port(profile.port)
        .username(&profile.username)
        .password(profile.password_or_empty());

    if let Some(db) = profile.database_name() {
        options = options.database(db);
    }

    options.log_statements(log::LevelFilter::Debug)
}

impl PostgresClient {
    pub async fn connect(profile: &ConnectionProfile) -> CoreResult<Self> {
        let conn = connect_options(profile).connect().await.map_err(|e| {
            let err_msg = e.to_string();
            if err_msg.contains("connection refused") || err_msg.contains("Connection refused") {
                return CoreError::connection(
                    ENGINE,
                    format!(
                        "Connection Refused. Check if PostgreSQL is running on {}:{}",
                        profile.host, profile.port
                    ),
                );
            }
            CoreError::connection(ENGINE, err_msg)
        })?;
        Ok(Self { conn })
    }
}

// --- Cell Decoding ---

fn opt<T: serde::Serialize>(value: Option<T>) -> Value {
    value.map(|v| json!(v)).unwrap_or(Value::Null)
}

pub(crate) fn decode_cell(row: &PgRow, index: usize) -> Value {
    let type_name = row.column(index).type_info().name().to_ascii_uppercase();

    let decoded: Result<Value, sqlx::Error> = match type_name.as_str() {
        "BOOL" => row.try_get::<Option<bool>, _>(index).map(opt),
        "INT2" => row.try_get::<Option<i16>, _>(index).map(opt),
        "INT4" => row.try_get::<Option<i32>, _>(index).map(opt),
        "INT8" => row.try_get::<Option<i64>, _>(index).map(opt),
        "OID" => row
            .try_get::<Option<sqlx::postgres::types::Oid>, _>(index)
            .map(|v| opt(v.map(|oid| oid.0))),
        "FLOAT4" => row.try_get::<Option<f32>, _>(index).map(opt),
        "FLOAT8" => row.try_get::<Option<f64>, _>(index).map(opt),
        "NUMERIC" => row
            .try_get::<Option<sqlx::types::BigDecimal>, _>(index)
            .map(|v| opt(v.map(|d| d.to_string()))),
        "JSON" | "JSONB" => row.try_get::<Option<Value>, _>(index).map(|v| v.unwrap_or(Value::Null)),
        "UUID" => row
            .try_get::<Option<sqlx::types::Uuid>, _>(index)
            .map(|v| opt(v.map(|u| u.to_string()))),
        "DATE" => row
            .try_get::<Option<chrono::NaiveDate>, _>(index)
            .map(|v| opt(v.map(|d| d.to_string()))),
        "TIME" => row
            .try_get::<Option<chrono::NaiveTime>, _>(index)
            .map(|v| opt(v.map(|t| t.to_string()))),
        "TIMESTAMP" => row
            .try_get::<Option<chrono::NaiveDateTime>, _>(index)
            .map(|v| opt(v.map(|t| t.format("%Y-%m-%dT%H:%M:%S%.f").to_string()))),
        "TIMESTAMPTZ" => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(index)
            .map(|v| opt(v.map(|t| t.to_rfc3339()))),
        "BYTEA" => row
            .try_get::<Option<Vec<u8>>, _>(index)
            .map(|v| opt(v.map(|bytes| format!("0x{}", hex::encode(bytes))))),
        _ => row.try_get::<Option<String>, _>(index).map(opt),
    };

    decoded
        .or_else(|_| row.try_get_unchecked::<Option<String>, _>(index).map(opt))
        .unwrap_or(Value::Null)
}

fn column_names(row: &PgRow) -> Vec<String> {
    row.columns().iter().map(|c| c.name().to_string()).collect()
}

// --- Engine Client ---

#[async_trait]
impl EngineClient for PostgresClient {
    fn kind(&self) -> EngineKind {
        EngineKind::PostgreSQL
    }

    async fn list_tables(&mut self) -> CoreResult<Vec<String>> {
        let rows = sqlx::query(
            "SELECT table_name::text AS table_name FROM information_schema.tables
             WHERE table_schema = 'public'
             ORDER BY table_name",
        )
        .fetch_all(&mut self.conn)
        .await
        .map_err(|e| CoreError::query(format!("Failed to fetch tables: {}", e)))?;

        Ok(rows
            .iter()
            .map(|row| row.try_get::<String, _>("table_name").unwrap_or_default())
            .collect())
    }

    async fn list_columns(&mut self, table: &str) -> CoreResult<Vec<String>> {
        let rows = sqlx::query(
            "SELECT column_name::text AS column_name FROM information_schema.columns
             WHERE table_schema = 'public' AND table_name = $1
             ORDER BY ordinal_position",
        )
        .bind(table)
        .fetch_all(&mut self.conn)
        .await
        .map_err(|e| CoreError::query(format!("Failed to fetch columns: {}", e)))?;

        Ok(rows
            .iter()
            .map(|row| row.try_get::<String, _>("column_name").unwrap_or_default())
            .collect())
    }

    /// Placeholder casts keyed by column. `format_type(oid, -1)` names the
    /// type without its modifier (`bpchar`, `"bit"`, `numeric`), so the
    /// column's own length and precision apply on assignment.
    async fn column_types(&mut self, table: &str) -> CoreResult<HashMap<String, String>> {
        let rows = sqlx::query(
            "SELECT a.attname::text AS column_name,
                    pg_catalog.format_type(a.atttypid, -1) AS cast_type
             FROM pg_catalog.pg_attribute a
             JOIN pg_catalog.pg_class c ON c.oid = a.attrelid
             JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
             WHERE n.nspname = 'public' AND c.relname = $1
               AND a.attnum > 0 AND NOT a.attisdropped",
        )
        .bind(table)
        .fetch_all(&mut self.conn)
        .await
        .map_err(|e| CoreError::query(format!("Failed to fetch column types: {}", e)))?;

        let mut types = HashMap::new();
        for row in rows {
            let name: String = row.try_get("column_name").unwrap_or_default();
            let cast: String = row.try_get("cast_type").unwrap_or_default();
            if !cast.is_empty() {
                types.insert(name, cast);
            }
        }
        Ok(types)
    }

    async fn execute(&mut self, sql: &str, params: &[SqlParam]) -> CoreResult<TabularResult> {
        let mut collector = ResultSetCollector::new();

        // Multi-statement scripts only run over the simple protocol (no binds).
        let mut stream = if params.is_empty() {
            (&mut self.conn).fetch_many(sqlx::raw_sql(sql))
        } else {
            let mut query = sqlx::query(sql);
            for param in params {
                query = query.bind(param.as_text());
            }
            (&mut self.conn).fetch_many(query)
        };

        while let Some(item) = stream.next().await {
            match item.map_err(|e| CoreError::query(e.to_string()))? {
                Either::Left(done) => collector.finish_statement(done.rows_affected()),
                Either::Right(row) => {
                    let values = (0..row.len()).map(|i| decode_cell(&row, i)).collect();
                    collector.push_row(|| column_names(&row), values);
                }
            }
        }

        Ok(collector.into_tabular(AffectedRows::LastReported))
    }

    async fn begin(&mut self) -> CoreResult<()> {
        Executor::execute(&mut self.conn, sqlx::raw_sql("BEGIN"))
            .await
            .map(|_| ())
            .map_err(|e| CoreError::query(e.to_string()))
    }

    async fn commit(&mut self) -> CoreResult<()> {
        Executor::execute(&mut self.conn, sqlx::raw_sql("COMMIT"))
            .await
            .map(|_| ())
            .map_err(|e| CoreError::query(e.to_string()))
    }

    async fn rollback(&mut self) -> CoreResult<()> {
        Executor::execute(&mut self.conn, sqlx::raw_sql("ROLLBACK"))
            .await
            .map(|_| ())
            .map_err(|e| CoreError::query(e.to_string()))
    }

    async fn close(self: Box<Self>) -> CoreResult<()> {
        self.conn
            .close()
            .await
            .map_err(|e| CoreError::query(format!("Failed to close connection: {}", e)))
    }
}

#[cfg(test)]
mod tests;
