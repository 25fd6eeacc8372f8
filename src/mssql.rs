// =====================================================
// MSSQL ENGINE CLIENT (via Tiberius)
// =====================================================

use async_trait::async_trait;
use futures::TryStreamExt;
use serde_json::{json, Value};
use std::borrow::Cow;
use tiberius::{AuthMethod, Client, ColumnData, Config, QueryItem, ToSql};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

use crate::db::engine::EngineClient;
use crate::db::query_execution::{batch_returns_rows, AffectedRows, ResultSetCollector};
use crate::db_types::{ConnectionProfile, EngineKind, SqlParam, TabularResult};
use crate::error::{CoreError, CoreResult};

const ENGINE: &str = "sqlserver";

pub struct SqlServerClient {
    client: Client<Compat<TcpStream>>,
}

// --- Connection ---

fn build_config(profile: &ConnectionProfile) -> Config {
    let mut config = Config::new();
    config.host(&profile.host);
    config.port(profile.port);
    config.authentication(AuthMethod::sql_server(
        &profile.username,
        profile.password_or_empty(),
    ));
    config.trust_cert();

    if let Some(db) = profile.database_name() {
        config.database(db);
    }
    config
}

impl SqlServerClient {
    pub async fn connect(profile: &ConnectionProfile) -> CoreResult<Self> {
        let config = build_config(profile);

        let tcp = TcpStream::connect(config.get_addr()).await.map_err(|e| {
            CoreError::connection(
                ENGINE,
                format!("Failed to reach {}:{} - {}", profile.host, profile.port, e),
            )
        })?;
        tcp.set_nodelay(true).ok();

        let client = Client::connect(config, tcp.compat_write())
            .await
            .map_err(|e| CoreError::connection(ENGINE, server_message(e)))?;
        Ok(Self { client })
    }
}

/// The server's own message for token errors, the driver's rendering otherwise.
fn server_message(err: tiberius::error::Error) -> String {
    match err {
        tiberius::error::Error::Server(token) => token.message().to_string(),
        other => other.to_string(),
    }
}

fn query_error(err: tiberius::error::Error) -> CoreError {
    CoreError::Query(server_message(err))
}

// --- Parameters ---

impl ToSql for SqlParam {
    fn to_sql(&self) -> ColumnData<'_> {
        match self {
            SqlParam::Null => ColumnData::String(None),
            SqlParam::Bool(b) => ColumnData::Bit(Some(*b)),
            SqlParam::Int(i) => ColumnData::I64(Some(*i)),
            SqlParam::Float(f) => ColumnData::F64(Some(*f)),
            SqlParam::Text(s) => ColumnData::String(Some(Cow::Borrowed(s.as_str()))),
        }
    }
}

// --- Cell Decoding ---

fn convert_column_data(data: &ColumnData<'_>) -> Value {
    match data {
        ColumnData::Bit(Some(b)) => json!(b),
        ColumnData::U8(Some(v)) => json!(v),
        ColumnData::I16(Some(v)) => json!(v),
        ColumnData::I32(Some(v)) => json!(v),
        ColumnData::I64(Some(v)) => json!(v),
        ColumnData::F32(Some(v)) => json!(v),
        ColumnData::F64(Some(v)) => json!(v),
        ColumnData::Numeric(Some(n)) => json!(n.to_string()),
        ColumnData::String(Some(s)) => json!(s.to_string()),
        ColumnData::Guid(Some(g)) => json!(g.to_string()),
        ColumnData::Binary(Some(b)) => json!(format!("0x{}", hex::encode(&**b))),
        ColumnData::Xml(Some(xml)) => json!(xml.to_string()),
        _ => Value::Null,
    }
}

pub(crate) fn convert_row(row: &tiberius::Row) -> Vec<Value> {
    row.cells()
        .enumerate()
        .map(|(i, (_column, data))| match data {
            ColumnData::DateTime(Some(_))
            | ColumnData::SmallDateTime(Some(_))
            | ColumnData::DateTime2(Some(_)) => row
                .try_get::<chrono::NaiveDateTime, _>(i)
                .ok()
                .flatten()
                .map(|dt| json!(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string()))
                .unwrap_or(Value::Null),
            ColumnData::DateTimeOffset(Some(_)) => row
                .try_get::<chrono::DateTime<chrono::Utc>, _>(i)
                .ok()
                .flatten()
                .map(|dt| json!(dt.to_rfc3339()))
                .unwrap_or(Value::Null),
            ColumnData::Date(Some(_)) => row
                .try_get::<chrono::NaiveDate, _>(i)
                .ok()
                .flatten()
                .map(|d| json!(d.format("%Y-%m-%d").to_string()))
                .unwrap_or(Value::Null),
            ColumnData::Time(Some(_)) => row
                .try_get::<chrono::NaiveTime, _>(i)
                .ok()
                .flatten()
                .map(|t| json!(t.format("%H:%M:%S%.f").to_string()))
                .unwrap_or(Value::Null),
            _ => convert_column_data(data),
        })
        .collect()
}

fn column_names(columns: &[tiberius::Column]) -> Vec<String> {
    columns.iter().map(|c| c.name().to_string()).collect()
}

impl SqlServerClient {
    async fn single_text_column(&mut self, sql: &str, params: &[&dyn ToSql]) -> CoreResult<Vec<String>> {
        let rows = self
            .client
            .query(sql, params)
            .await
            .map_err(query_error)?
            .into_first_result()
            .await
            .map_err(query_error)?;

        Ok(rows
            .iter()
            .map(|row| row.try_get::<&str, _>(0).ok().flatten().unwrap_or_default().to_string())
            .collect())
    }

    async fn run_simple(&mut self, sql: &str) -> CoreResult<()> {
        self.client
            .simple_query(sql)
            .await
            .map_err(query_error)?
            .into_results()
            .await
            .map_err(query_error)?;
        Ok(())
    }
}

// --- Engine Client ---

#[async_trait]
impl EngineClient for SqlServerClient {
    fn kind(&self) -> EngineKind {
        EngineKind::SqlServer
    }

    async fn list_tables(&mut self) -> CoreResult<Vec<String>> {
        self.single_text_column(
            "SELECT TABLE_NAME FROM INFORMATION_SCHEMA.TABLES WHERE TABLE_TYPE = 'BASE TABLE' ORDER BY TABLE_NAME",
            &[],
        )
        .await
    }

    async fn list_columns(&mut self, table: &str) -> CoreResult<Vec<String>> {
        self.single_text_column(
            "SELECT COLUMN_NAME FROM INFORMATION_SCHEMA.COLUMNS WHERE TABLE_NAME = @P1 ORDER BY ORDINAL_POSITION",
            &[&table],
        )
        .await
    }

    async fn execute(&mut self, sql: &str, params: &[SqlParam]) -> CoreResult<TabularResult> {
        let binds: Vec<&dyn ToSql> = params.iter().map(|p| p as &dyn ToSql).collect();
        let mut collector = ResultSetCollector::new();

        // Per-statement counts are only reported on the execute path. Batches
        // with a row set go through `query`, which sums returned rows per set
        // and drops the counts of DML statements mixed into the batch.
        if !batch_returns_rows(sql) {
            let outcome = self.client.execute(sql, &binds).await.map_err(query_error)?;
            for count in outcome.rows_affected() {
                collector.finish_statement(*count);
            }
            return Ok(collector.into_tabular(AffectedRows::Sum));
        }

        let mut stream = self.client.query(sql, &binds).await.map_err(query_error)?;
        while let Some(item) = stream.try_next().await.map_err(query_error)? {
            match item {
                QueryItem::Metadata(meta) => collector.start_set(column_names(meta.columns())),
                QueryItem::Row(row) => {
                    let values = convert_row(&row);
                    collector.push_row(|| column_names(row.columns()), values);
                }
            }
        }

        Ok(collector.into_tabular(AffectedRows::Sum))
    }

    async fn begin(&mut self) -> CoreResult<()> {
        self.run_simple("BEGIN TRANSACTION").await
    }

    async fn commit(&mut self) -> CoreResult<()> {
        self.run_simple("COMMIT TRANSACTION").await
    }

    async fn rollback(&mut self) -> CoreResult<()> {
        self.run_simple("ROLLBACK TRANSACTION").await
    }

    async fn close(self: Box<Self>) -> CoreResult<()> {
        self.client
            .close()
            .await
            .map_err(|e| CoreError::query(format!("Failed to close connection: {}", e)))
    }
}

#[cfg(test)]
mod tests;
