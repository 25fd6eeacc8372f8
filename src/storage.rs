// =====================================================
// METADATA STORE
// Saved connections, import history and mapping templates (SQLite)
// =====================================================

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{ConnectOptions, Pool, Row as _, Sqlite};
use std::path::Path;
use uuid::Uuid;

use crate::data_import::mapper::ColumnMapping;
use crate::data_import::models::{
    ImportHistoryEntry, ImportRecord, MappingTemplate, SaveMappingRequest,
};
use crate::data_import::sink::MetadataSink;
use crate::db::connections::ConnectionRegistry;
use crate::db::crypto::{self, PasswordCipher};
use crate::db_types::ConnectionProfile;
use crate::error::{CoreError, CoreResult};

const DB_FILE_NAME: &str = "datadock.db";

const SCHEMA: [&str; 5] = [
    r#"
    CREATE TABLE IF NOT EXISTS connections (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        type TEXT NOT NULL,
        host TEXT NOT NULL,
        port INTEGER NOT NULL,
        username TEXT NOT NULL,
        password TEXT,
        database TEXT,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS import_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        connection_id TEXT NOT NULL,
        table_name TEXT NOT NULL,
        file_name TEXT NOT NULL,
        row_count INTEGER NOT NULL,
        error_count INTEGER NOT NULL,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_import_history_connection ON import_history(connection_id, table_name)",
    r#"
    CREATE TABLE IF NOT EXISTS saved_mappings (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        connection_id TEXT NOT NULL,
        table_name TEXT NOT NULL,
        name TEXT NOT NULL,
        mappings TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_saved_mappings_connection ON saved_mappings(connection_id, table_name)",
];

fn db_error(context: &str) -> impl Fn(sqlx::Error) -> CoreError + '_ {
    move |e| CoreError::storage(format!("{}: {}", context, e))
}

pub struct MetadataStore {
    pool: Pool<Sqlite>,
    cipher: PasswordCipher,
}

impl MetadataStore {
    /// Opens `<data_dir>/datadock.db` in WAL mode, creating the key file and
    /// schema on first start.
    pub async fn open(data_dir: &Path) -> CoreResult<Self> {
        std::fs::create_dir_all(data_dir)
            .map_err(|e| CoreError::storage(format!("Failed to create data directory: {}", e)))?;
        let cipher = crypto::load_or_create_key(data_dir)?;

        let options = SqliteConnectOptions::new()
            .filename(data_dir.join(DB_FILE_NAME))
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .log_statements(log::LevelFilter::Debug);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(db_error("Failed to open metadata database"))?;

        Self::new(pool, cipher).await
    }

    pub async fn new(pool: Pool<Sqlite>, cipher: PasswordCipher) -> CoreResult<Self> {
        let store = Self { pool, cipher };
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn ensure_schema(&self) -> CoreResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(db_error("Failed to initialize metadata schema"))?;
        }
        Ok(())
    }

    // --- Connections ---

    /// Inserts or updates a profile. A blank id gets a fresh UUID; a missing
    /// password keeps the stored one.
    pub async fn save_connection(&self, mut profile: ConnectionProfile) -> CoreResult<ConnectionProfile> {
        if profile.engine_kind().is_none() {
            return Err(CoreError::InvalidInput(format!(
                "Unsupported database type: {}",
                profile.engine
            )));
        }
        if profile.host.trim().is_empty() {
            return Err(CoreError::InvalidInput("Host is required".to_string()));
        }
        if profile.id.trim().is_empty() {
            profile.id = Uuid::new_v4().to_string();
        }

        let encrypted = profile
            .password
            .as_deref()
            .map(|password| self.cipher.encrypt(password))
            .transpose()?;

        sqlx::query(
            r#"
            INSERT INTO connections (id, name, type, host, port, username, password, database)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                type = excluded.type,
                host = excluded.host,
                port = excluded.port,
                username = excluded.username,
                password = COALESCE(excluded.password, connections.password),
                database = excluded.database
            "#,
        )
        .bind(&profile.id)
        .bind(&profile.name)
        .bind(&profile.engine)
        .bind(&profile.host)
        .bind(i64::from(profile.port))
        .bind(&profile.username)
        .bind(encrypted)
        .bind(&profile.database)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to save connection"))?;

        log::info!("Saved connection {} ({})", profile.name, profile.id);
        profile.password = None;
        Ok(profile)
    }

    /// Saved profiles without passwords, by name.
    pub async fn list_connections(&self) -> CoreResult<Vec<ConnectionProfile>> {
        let rows = sqlx::query(
            "SELECT id, name, type, host, port, username, database FROM connections ORDER BY name, id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list connections"))?;

        rows.iter().map(|row| profile_from_row(row, None)).collect()
    }

    pub async fn get_connection(&self, connection_id: &str) -> CoreResult<ConnectionProfile> {
        let row = sqlx::query(
            "SELECT id, name, type, host, port, username, password, database FROM connections WHERE id = ?",
        )
        .bind(connection_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to load connection"))?
        .ok_or_else(|| CoreError::NotFound("Connection not found".to_string()))?;

        let stored: Option<String> = row.try_get("password").unwrap_or_default();
        let password = stored
            .as_deref()
            .map(|encrypted| self.cipher.decrypt(encrypted))
            .transpose()?;
        profile_from_row(&row, password)
    }

    pub async fn delete_connection(&self, connection_id: &str) -> CoreResult<()> {
        let result = sqlx::query("DELETE FROM connections WHERE id = ?")
            .bind(connection_id)
            .execute(&self.pool)
            .await
            .map_err(db_error("Failed to delete connection"))?;
        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound("Connection not found".to_string()));
        }
        Ok(())
    }

    // --- Import History ---

    pub async fn list_import_history(
        &self,
        connection_id: &str,
        table_name: Option<&str>,
    ) -> CoreResult<Vec<ImportHistoryEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, connection_id, table_name, file_name, row_count, error_count, created_at
            FROM import_history
            WHERE connection_id = ? AND (? IS NULL OR table_name = ?)
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(connection_id)
        .bind(table_name)
        .bind(table_name)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to load import history"))?;

        rows.iter().map(history_from_row).collect()
    }

    // --- Mapping Templates ---

    pub async fn get_mapping_template(&self, template_id: i64) -> CoreResult<MappingTemplate> {
        let row = sqlx::query(
            "SELECT id, connection_id, table_name, name, mappings, created_at FROM saved_mappings WHERE id = ?",
        )
        .bind(template_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to load mapping template"))?
        .ok_or_else(|| CoreError::NotFound("Mapping template not found".to_string()))?;
        template_from_row(&row)
    }

    pub async fn delete_mapping_template(&self, template_id: i64) -> CoreResult<()> {
        let result = sqlx::query("DELETE FROM saved_mappings WHERE id = ?")
            .bind(template_id)
            .execute(&self.pool)
            .await
            .map_err(db_error("Failed to delete mapping template"))?;
        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound("Mapping template not found".to_string()));
        }
        Ok(())
    }
}

fn profile_from_row(row: &sqlx::sqlite::SqliteRow, password: Option<String>) -> CoreResult<ConnectionProfile> {
    let invalid = db_error("Invalid connection row");
    let port: i64 = row.try_get("port").map_err(&invalid)?;
    Ok(ConnectionProfile {
        id: row.try_get("id").map_err(&invalid)?,
        name: row.try_get("name").map_err(&invalid)?,
        engine: row.try_get("type").map_err(&invalid)?,
        host: row.try_get("host").map_err(&invalid)?,
        port: u16::try_from(port)
            .map_err(|_| CoreError::storage(format!("Stored port out of range: {}", port)))?,
        username: row.try_get("username").map_err(&invalid)?,
        password,
        database: row.try_get("database").map_err(&invalid)?,
    })
}

fn history_from_row(row: &sqlx::sqlite::SqliteRow) -> CoreResult<ImportHistoryEntry> {
    let invalid = db_error("Invalid history row");
    Ok(ImportHistoryEntry {
        id: row.try_get("id").map_err(&invalid)?,
        connection_id: row.try_get("connection_id").map_err(&invalid)?,
        table_name: row.try_get("table_name").map_err(&invalid)?,
        file_name: row.try_get("file_name").map_err(&invalid)?,
        row_count: row.try_get("row_count").map_err(&invalid)?,
        error_count: row.try_get("error_count").map_err(&invalid)?,
        created_at: row.try_get("created_at").map_err(&invalid)?,
    })
}

fn template_from_row(row: &sqlx::sqlite::SqliteRow) -> CoreResult<MappingTemplate> {
    let invalid = db_error("Invalid mapping template row");
    let raw: String = row.try_get("mappings").map_err(&invalid)?;
    let mappings: ColumnMapping = serde_json::from_str(&raw)
        .map_err(|e| CoreError::storage(format!("Invalid stored mapping: {}", e)))?;
    Ok(MappingTemplate {
        id: row.try_get("id").map_err(&invalid)?,
        connection_id: row.try_get("connection_id").map_err(&invalid)?,
        table_name: row.try_get("table_name").map_err(&invalid)?,
        name: row.try_get("name").map_err(&invalid)?,
        mappings,
        created_at: row.try_get("created_at").map_err(&invalid)?,
    })
}

#[async_trait]
impl ConnectionRegistry for MetadataStore {
    async fn get_profile(&self, connection_id: &str) -> CoreResult<ConnectionProfile> {
        self.get_connection(connection_id).await
    }
}

#[async_trait]
impl MetadataSink for MetadataStore {
    async fn record_import(&self, record: ImportRecord) -> CoreResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO import_history (connection_id, table_name, file_name, row_count, error_count)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.connection_id)
        .bind(&record.table_name)
        .bind(&record.file_label)
        .bind(record.outcome.success_count as i64)
        .bind(record.outcome.error_count as i64)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to record import"))?;
        Ok(result.last_insert_rowid())
    }

    async fn save_mapping_template(
        &self,
        connection_id: &str,
        request: &SaveMappingRequest,
    ) -> CoreResult<i64> {
        let name = request.name.trim();
        if name.is_empty() || request.table_name.trim().is_empty() {
            return Err(CoreError::InvalidInput(
                "Template name and table name are required".to_string(),
            ));
        }
        let mappings = serde_json::to_string(&request.mappings)
            .map_err(|e| CoreError::storage(format!("Failed to serialize mapping: {}", e)))?;

        let result = sqlx::query(
            "INSERT INTO saved_mappings (connection_id, table_name, name, mappings) VALUES (?, ?, ?, ?)",
        )
        .bind(connection_id)
        .bind(request.table_name.trim())
        .bind(name)
        .bind(mappings)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to save mapping template"))?;
        Ok(result.last_insert_rowid())
    }

    async fn list_mapping_templates(
        &self,
        connection_id: &str,
        table_name: &str,
    ) -> CoreResult<Vec<MappingTemplate>> {
        let rows = sqlx::query(
            r#"
            SELECT id, connection_id, table_name, name, mappings, created_at
            FROM saved_mappings
            WHERE connection_id = ? AND table_name = ?
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(connection_id)
        .bind(table_name)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list mapping templates"))?;

        rows.iter().map(template_from_row).collect()
    }
}

#[cfg(test)]
mod tests;
