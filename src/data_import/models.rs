use serde::{Deserialize, Serialize};

use crate::data_import::mapper::ColumnMapping;
use crate::db_types::Row;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FileFormat {
    Csv,
    Workbook,
}

impl FileFormat {
    /// `csv`, `tsv` and `txt` read as CSV; everything else as a workbook.
    pub fn from_extension(extension: Option<&str>) -> Self {
        match extension.map(|ext| ext.to_ascii_lowercase()).as_deref() {
            Some("csv") | Some("tsv") | Some("txt") => FileFormat::Csv,
            _ => FileFormat::Workbook,
        }
    }
}

/// A decoded upload. `headers` come from the first data row only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedFile {
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
    pub sheet_names: Vec<String>,
    pub active_sheet: Option<String>,
}

impl ParsedFile {
    pub fn preview(&self, limit: usize) -> Vec<Row> {
        self.rows.iter().take(limit).cloned().collect()
    }

    pub fn total_rows(&self) -> usize {
        self.rows.len()
    }
}

/// Upload and sheet-preview payload.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FilePreview {
    pub headers: Vec<String>,
    pub preview: Vec<Row>,
    pub total_rows: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    pub sheets: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_sheet: Option<String>,
}

impl FilePreview {
    pub fn from_parsed(parsed: &ParsedFile, limit: usize) -> Self {
        Self {
            headers: parsed.headers.clone(),
            preview: parsed.preview(limit),
            total_rows: parsed.total_rows(),
            file_id: None,
            file_name: None,
            sheets: parsed.sheet_names.clone(),
            current_sheet: parsed.active_sheet.clone(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ImportRequest {
    pub table: String,
    pub mappings: ColumnMapping,
    /// Preview-stage rows, used only when no `file_id` is supplied.
    #[serde(default)]
    pub data: Option<Vec<Row>>,
    #[serde(default)]
    pub file_id: Option<String>,
    #[serde(default)]
    pub sheet_name: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
}

impl ImportRequest {
    pub fn normalized_table(&self) -> String {
        self.table.trim().to_string()
    }

    pub fn normalized_file_id(&self) -> Option<&str> {
        self.file_id
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    /// Label recorded in history: file name, else file id, else a placeholder.
    pub fn file_label(&self) -> String {
        self.file_name
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .or(self.normalized_file_id())
            .unwrap_or("Unknown File")
            .to_string()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ImportOutcome {
    pub success_count: u64,
    pub error_count: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImportHistoryEntry {
    pub id: i64,
    pub connection_id: String,
    pub table_name: String,
    pub file_name: String,
    pub row_count: i64,
    pub error_count: i64,
    pub created_at: String,
}

/// New history row, written after a committed import.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportRecord {
    pub connection_id: String,
    pub table_name: String,
    pub file_label: String,
    pub outcome: ImportOutcome,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MappingTemplate {
    pub id: i64,
    pub connection_id: String,
    pub table_name: String,
    pub name: String,
    pub mappings: ColumnMapping,
    pub created_at: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SaveMappingRequest {
    pub table_name: String,
    pub name: String,
    pub mappings: ColumnMapping,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SheetPreviewRequest {
    pub file_id: String,
    pub sheet_name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AutoMapRequest {
    pub table: String,
    pub headers: Vec<String>,
    #[serde(default)]
    pub mappings: Option<ColumnMapping>,
}
