// =====================================================
// MySQL ENGINE CLIENT
// =====================================================

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use sqlx::mysql::{MySqlArguments, MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column, ConnectOptions, Connection, Either, Executor, MySql, Row, TypeInfo};

use crate::db::engine::EngineClient;
use crate::db::query_execution::{trim_statement_terminators, AffectedRows, ResultSetCollector};
use crate::db_types::{ConnectionProfile, EngineKind, SqlParam, TabularResult};
use crate::error::{CoreError, CoreResult};

const ENGINE: &str = "mysql";

pub struct MySqlClient {
    conn: MySqlConnection,
}

// --- Connection ---

fn connect_options(profile: &ConnectionProfile) -> MySqlConnectOptions {
    let mut options = MySqlConnectOptions::new()
        .host(&profile.host)
        .port(profile.port)
        .username(&profile.username)
        .password(profile.password_or_empty());

    if let Some(db) = profile.database_name() {
        options = options.database(db);
    }

    options.log_statements(log::LevelFilter::Debug)
}

impl MySqlClient {
    pub async fn connect(profile: &ConnectionProfile) -> CoreResult<Self> {
        let conn = connect_options(profile).connect().await.map_err(|e| {
            let err_msg = e.to_string();
            if err_msg.contains("os error 111") {
                return CoreError::connection(
                    ENGINE,
                    format!(
                        "Connection Refused ({}). Check if MySQL is running on {}:{}",
                        err_msg, profile.host, profile.port
                    ),
                );
            }
            CoreError::connection(ENGINE, err_msg)
        })?;
        Ok(Self { conn })
    }
}

pub(crate) fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

fn bind_param<'q>(
    query: Query<'q, MySql, MySqlArguments>,
    param: &SqlParam,
) -> Query<'q, MySql, MySqlArguments> {
    match param {
        SqlParam::Null => query.bind(None::<String>),
        SqlParam::Bool(b) => query.bind(*b),
        SqlParam::Int(i) => query.bind(*i),
        SqlParam::Float(f) => query.bind(*f),
        SqlParam::Text(s) => query.bind(s.clone()),
    }
}

// --- Cell Decoding ---

fn opt<T: serde::Serialize>(value: Option<T>) -> Value {
    value.map(|v| json!(v)).unwrap_or(Value::Null)
}

/// Catalog statements sometimes report names as binary strings.
fn text_at(row: &MySqlRow, index: usize) -> String {
    row.try_get::<String, _>(index)
        .or_else(|_| {
            row.try_get_unchecked::<Vec<u8>, _>(index)
                .map(|bytes| String::from_utf8_lossy(&bytes).to_string())
        })
        .unwrap_or_default()
}

pub(crate) fn decode_cell(row: &MySqlRow, index: usize) -> Value {
    let type_name = row.column(index).type_info().name().to_ascii_uppercase();

    let decoded: Result<Value, sqlx::Error> = match type_name.as_str() {
        "BOOLEAN" => row.try_get::<Option<bool>, _>(index).map(opt),
        t if t.ends_with("UNSIGNED") || t == "BIT" || t == "YEAR" => {
            row.try_get::<Option<u64>, _>(index).map(opt)
        }
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
            row.try_get::<Option<i64>, _>(index).map(opt)
        }
        "FLOAT" => row.try_get::<Option<f32>, _>(index).map(opt),
        "DOUBLE" => row.try_get::<Option<f64>, _>(index).map(opt),
        "DECIMAL" => row
            .try_get::<Option<sqlx::types::BigDecimal>, _>(index)
            .map(|v| opt(v.map(|d| d.to_string()))),
        "JSON" => row.try_get::<Option<Value>, _>(index).map(|v| v.unwrap_or(Value::Null)),
        "DATE" => row
            .try_get::<Option<chrono::NaiveDate>, _>(index)
            .map(|v| opt(v.map(|d| d.to_string()))),
        "DATETIME" => row
            .try_get::<Option<chrono::NaiveDateTime>, _>(index)
            .map(|v| opt(v.map(|t| t.format("%Y-%m-%dT%H:%M:%S%.f").to_string()))),
        "TIMESTAMP" => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(index)
            .map(|v| opt(v.map(|t| t.to_rfc3339()))),
        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" => row
            .try_get::<Option<Vec<u8>>, _>(index)
            .map(|v| opt(v.map(|bytes| format!("0x{}", hex::encode(bytes))))),
        _ => row.try_get::<Option<String>, _>(index).map(opt),
    };

    decoded
        .or_else(|_| row.try_get_unchecked::<Option<String>, _>(index).map(opt))
        .or_else(|_| {
            row.try_get_unchecked::<Option<Vec<u8>>, _>(index)
                .map(|v| opt(v.map(|bytes| String::from_utf8_lossy(&bytes).to_string())))
        })
        .unwrap_or(Value::Null)
}

fn column_names(row: &MySqlRow) -> Vec<String> {
    row.columns().iter().map(|c| c.name().to_string()).collect()
}

// --- Engine Client ---

#[async_trait]
impl EngineClient for MySqlClient {
    fn kind(&self) -> EngineKind {
        EngineKind::MySQL
    }

    async fn list_tables(&mut self) -> CoreResult<Vec<String>> {
        let rows = Executor::fetch_all(&mut self.conn, sqlx::raw_sql("SHOW TABLES"))
            .await
            .map_err(|e| CoreError::query(format!("Failed to fetch tables: {}", e)))?;

        let mut tables: Vec<String> = rows.iter().map(|row| text_at(row, 0)).collect();
        tables.sort();
        Ok(tables)
    }

    async fn list_columns(&mut self, table: &str) -> CoreResult<Vec<String>> {
        let query = format!("SHOW COLUMNS FROM {}", quote_identifier(table));
        let rows = Executor::fetch_all(&mut self.conn, sqlx::raw_sql(&query))
            .await
            .map_err(|e| CoreError::query(e.to_string()))?;

        Ok(rows
            .iter()
            .map(|row| {
                row.try_get::<String, _>("Field")
                    .unwrap_or_else(|_| text_at(row, 0))
            })
            .collect())
    }

    async fn execute(&mut self, sql: &str, params: &[SqlParam]) -> CoreResult<TabularResult> {
        let sql = trim_statement_terminators(sql);
        let mut collector = ResultSetCollector::new();

        let mut stream = if params.is_empty() {
            (&mut self.conn).fetch_many(sqlx::raw_sql(sql))
        } else {
            let query = params
                .iter()
                .fold(sqlx::query(sql), |query, param| bind_param(query, param));
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

        Ok(collector.into_tabular(AffectedRows::LastShape))
    }

    async fn begin(&mut self) -> CoreResult<()> {
        Executor::execute(&mut self.conn, sqlx::raw_sql("START TRANSACTION"))
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
