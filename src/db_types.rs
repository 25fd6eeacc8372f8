// =====================================================
// COMMON DATABASE TYPES AND STRUCTURES
// =====================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

// --- Engine Kind ---
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    PostgreSQL,
    MySQL,
    SqlServer,
}

impl EngineKind {
    /// Parses the `type` string stored on a connection profile.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "postgresql" | "postgres" | "pg" => Some(EngineKind::PostgreSQL),
            "mysql" | "mariadb" => Some(EngineKind::MySQL),
            "sqlserver" | "mssql" => Some(EngineKind::SqlServer),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::PostgreSQL => "postgresql",
            EngineKind::MySQL => "mysql",
            EngineKind::SqlServer => "sqlserver",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Connection Profile ---
#[derive(Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionProfile {
    #[serde(default)]
    pub id: String,
    pub name: String,
    /// Raw engine tag as stored; parsed once when a handle is opened.
    #[serde(rename = "type")]
    pub engine: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    pub database: Option<String>,
}

impl ConnectionProfile {
    pub fn engine_kind(&self) -> Option<EngineKind> {
        EngineKind::parse(&self.engine)
    }

    pub fn password_or_empty(&self) -> &str {
        self.password.as_deref().unwrap_or("")
    }

    pub fn database_name(&self) -> Option<&str> {
        self.database
            .as_deref()
            .map(str::trim)
            .filter(|db| !db.is_empty())
    }
}

impl fmt::Debug for ConnectionProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionProfile")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("engine", &self.engine)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("database", &self.database)
            .finish()
    }
}

// --- Query Result ---

/// One result row keyed by column name.
pub type Row = serde_json::Map<String, Value>;

/// Uniform result of any statement, whatever engine produced it.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct TabularResult {
    pub rows: Vec<Row>,
    #[serde(rename = "fields")]
    pub columns: Vec<String>,
    #[serde(rename = "affectedRows")]
    pub affected_rows: u64,
}

impl TabularResult {
    pub fn empty() -> Self {
        Self::default()
    }
}

// --- Bind Parameters ---

/// A value bound to a statement placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl SqlParam {
    /// Converts an import cell. Missing, null, empty and literal `NULL` cells bind as SQL NULL.
    pub fn from_cell(cell: Option<&Value>) -> Self {
        match cell {
            None | Some(Value::Null) => SqlParam::Null,
            Some(Value::String(s)) if s.is_empty() || s == "NULL" => SqlParam::Null,
            Some(Value::String(s)) => SqlParam::Text(s.clone()),
            Some(Value::Bool(b)) => SqlParam::Bool(*b),
            Some(Value::Number(n)) => match n.as_i64() {
                Some(i) => SqlParam::Int(i),
                None => n.as_f64().map(SqlParam::Float).unwrap_or(SqlParam::Null),
            },
            Some(other) => SqlParam::Text(other.to_string()),
        }
    }

    /// Text rendering used by engines that bind every value as text.
    pub fn as_text(&self) -> Option<String> {
        match self {
            SqlParam::Null => None,
            SqlParam::Bool(b) => Some(b.to_string()),
            SqlParam::Int(i) => Some(i.to_string()),
            SqlParam::Float(f) => Some(f.to_string()),
            SqlParam::Text(s) => Some(s.clone()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SqlParam::Null)
    }
}
