// =====================================================
// ERROR TAXONOMY
// =====================================================

use thiserror::Error;

/// Classified failure surfaced by every core operation.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Connect-time failure: unreachable host, bad credentials, unknown engine.
    #[error("Failed to connect to {engine}: {message}")]
    Connection { engine: String, message: String },

    /// Missing connection profile, mapping template or similar record.
    #[error("{0}")]
    NotFound(String),

    /// Uploaded file expired, consumed or never existed.
    #[error("File session expired or not found: {0}")]
    FileNotFound(String),

    /// The engine rejected a statement; message is the engine's own.
    #[error("{0}")]
    Query(String),

    /// Bulk import failed and was rolled back.
    #[error("Import failed: {message}")]
    Import {
        message: String,
        success_count: u64,
        error_count: u64,
    },

    #[error("{0}")]
    InvalidInput(String),

    /// Metadata store (SQLite) or upload store I/O failure.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl CoreError {
    pub fn connection(engine: impl Into<String>, message: impl ToString) -> Self {
        CoreError::Connection {
            engine: engine.into(),
            message: message.to_string(),
        }
    }

    pub fn query(message: impl ToString) -> Self {
        CoreError::Query(message.to_string())
    }

    pub fn storage(message: impl ToString) -> Self {
        CoreError::Storage(message.to_string())
    }

    /// Message without the variant prefix, as stored in history or logs.
    pub fn detail(&self) -> String {
        match self {
            CoreError::Import { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_error_names_the_engine() {
        let err = CoreError::connection("mysql", "Access denied for user 'root'");
        assert_eq!(
            err.to_string(),
            "Failed to connect to mysql: Access denied for user 'root'"
        );
    }

    #[test]
    fn import_detail_strips_prefix() {
        let err = CoreError::Import {
            message: "duplicate key value".to_string(),
            success_count: 0,
            error_count: 10,
        };
        assert_eq!(err.to_string(), "Import failed: duplicate key value");
        assert_eq!(err.detail(), "duplicate key value");
    }
}
