// =====================================================
// TABULAR FILE PARSER
// CSV and spreadsheet workbooks -> headers + row mappings
// =====================================================

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::io::Cursor;

use crate::data_import::models::{FileFormat, ParsedFile};
use crate::db_types::Row;
use crate::error::{CoreError, CoreResult};

pub const PREVIEW_ROWS: usize = 5;
const EMPTY_HEADER: &str = "__EMPTY";
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

pub fn parse(format: FileFormat, bytes: Vec<u8>, sheet: Option<&str>) -> CoreResult<ParsedFile> {
    match format {
        FileFormat::Csv => parse_csv(&bytes),
        FileFormat::Workbook => parse_workbook(bytes, sheet),
    }
}

/// Runs [`parse`] on the blocking pool.
pub async fn parse_blocking(
    format: FileFormat,
    bytes: Vec<u8>,
    sheet: Option<String>,
) -> CoreResult<ParsedFile> {
    tokio::task::spawn_blocking(move || parse(format, bytes, sheet.as_deref()))
        .await
        .map_err(|e| CoreError::storage(format!("File parsing task failed: {}", e)))?
}

// --- CSV ---

pub fn parse_csv(bytes: &[u8]) -> CoreResult<ParsedFile> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(sniff_delimiter(bytes))
        .flexible(true)
        .from_reader(bytes);

    let header_record = reader
        .byte_headers()
        .map_err(|e| CoreError::InvalidInput(format!("Failed to parse CSV: {}", e)))?
        .clone();
    let columns: Vec<String> = header_record
        .iter()
        .map(|h| String::from_utf8_lossy(h).to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.byte_records() {
        let record =
            record.map_err(|e| CoreError::InvalidInput(format!("Failed to parse CSV: {}", e)))?;
        let mut row = Row::new();
        for (index, column) in columns.iter().enumerate() {
            let cell = record
                .get(index)
                .map(|raw| String::from_utf8_lossy(raw).to_string())
                .unwrap_or_default();
            row.insert(column.clone(), Value::String(cell));
        }
        rows.push(row);
    }

    let headers = rows
        .first()
        .map(|first| first.keys().cloned().collect())
        .unwrap_or_default();

    Ok(ParsedFile {
        headers,
        rows,
        sheet_names: Vec::new(),
        active_sheet: None,
    })
}

/// Tab-separated when the header line has tabs and no commas.
fn sniff_delimiter(bytes: &[u8]) -> u8 {
    let header_line = bytes.split(|b| *b == b'\n').next().unwrap_or_default();
    if header_line.contains(&b'\t') && !header_line.contains(&b',') {
        b'\t'
    } else {
        b','
    }
}

// --- Workbook ---

pub fn sheet_names(bytes: Vec<u8>) -> CoreResult<Vec<String>> {
    let workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| CoreError::InvalidInput(format!("Failed to read workbook: {}", e)))?;
    Ok(workbook.sheet_names())
}

/// Parses `sheet`, or the first sheet when none is named.
pub fn parse_workbook(bytes: Vec<u8>, sheet: Option<&str>) -> CoreResult<ParsedFile> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| CoreError::InvalidInput(format!("Failed to read workbook: {}", e)))?;
    let sheet_names = workbook.sheet_names();

    let active = match sheet.map(str::trim).filter(|s| !s.is_empty()) {
        Some(requested) => sheet_names
            .iter()
            .find(|name| name.as_str() == requested)
            .cloned()
            .ok_or_else(|| CoreError::InvalidInput("Sheet not found".to_string()))?,
        None => sheet_names
            .first()
            .cloned()
            .ok_or_else(|| CoreError::InvalidInput("Workbook has no sheets".to_string()))?,
    };

    let range = workbook
        .worksheet_range(&active)
        .map_err(|e| CoreError::InvalidInput(format!("Failed to read worksheet: {}", e)))?;
    let (headers, rows) = rows_from_range(&range);

    Ok(ParsedFile {
        headers,
        rows,
        sheet_names,
        active_sheet: Some(active),
    })
}

pub(crate) fn rows_from_range(range: &Range<Data>) -> (Vec<String>, Vec<Row>) {
    let mut cells = range.rows();
    let Some(header_cells) = cells.next() else {
        return (Vec::new(), Vec::new());
    };
    let names = header_names(header_cells);

    let rows: Vec<Row> = cells
        .map(|cells| row_mapping(&names, cells))
        .filter(|row| !row.is_empty())
        .collect();

    // Headers are the first data row's keys; its empty cells drop out.
    let headers = rows
        .first()
        .map(|first| first.keys().cloned().collect())
        .unwrap_or_default();
    (headers, rows)
}

/// Blank header cells become `__EMPTY`; repeated names get `_1`, `_2`, ...
pub(crate) fn header_names(cells: &[Data]) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    cells
        .iter()
        .map(|cell| {
            let base = match cell {
                Data::Empty => EMPTY_HEADER.to_string(),
                other => {
                    let text = cell_text(other);
                    if text.trim().is_empty() {
                        EMPTY_HEADER.to_string()
                    } else {
                        text
                    }
                }
            };
            let count = seen.entry(base.clone()).or_insert(0);
            let name = if *count == 0 {
                base
            } else {
                format!("{}_{}", base, count)
            };
            *count += 1;
            name
        })
        .collect()
}

fn row_mapping(headers: &[String], cells: &[Data]) -> Row {
    let mut row = Row::new();
    for (header, cell) in headers.iter().zip(cells) {
        if let Some(value) = cell_value(cell) {
            row.insert(header.clone(), value);
        }
    }
    row
}

fn cell_text(cell: &Data) -> String {
    match cell_value(cell) {
        Some(Value::String(s)) => s,
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

/// Typed JSON for one cell; `None` for empty cells.
pub(crate) fn cell_value(cell: &Data) -> Option<Value> {
    let value = match cell {
        Data::Empty => return None,
        Data::Int(i) => json!(i),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 9_007_199_254_740_992.0 => json!(*f as i64),
        Data::Float(f) => json!(f),
        Data::Bool(b) => json!(b),
        Data::String(s) => json!(s),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(ts) if ts.time() == chrono::NaiveTime::MIN => json!(ts.date().to_string()),
            Some(ts) => json!(ts.format("%Y-%m-%d %H:%M:%S").to_string()),
            None => json!(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => json!(s),
        Data::Error(e) => json!(e.to_string()),
    };
    Some(value)
}
