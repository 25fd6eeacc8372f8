// =====================================================
// RESULT NORMALIZATION
// Folds per-engine result streams into one TabularResult
// =====================================================

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

use crate::db_types::{Row, TabularResult};

static ROW_RETURNING_HEAD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(select|with|exec|execute|values|sp_\w+|show|describe|explain)\b").unwrap()
});

static OUTPUT_CLAUSE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\boutput\b").unwrap());

/// How a result's `affected_rows` is computed from the collected statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AffectedRows {
    /// Count reported by the driver for the last statement.
    LastReported,
    /// Row sets count their rows, status results their reported count.
    LastShape,
    /// Sum of every statement's count.
    Sum,
}

/// Output of one statement in a (possibly multi-statement) batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub rows_affected: u64,
}

impl ResultSet {
    pub fn is_row_set(&self) -> bool {
        !self.columns.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct ResultSetCollector {
    finished: Vec<ResultSet>,
    current: Option<ResultSet>,
}

impl ResultSetCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a new result set from column metadata, closing any open one.
    pub fn start_set(&mut self, columns: Vec<String>) {
        if let Some(mut open) = self.current.take() {
            open.rows_affected = open.rows.len() as u64;
            self.finished.push(open);
        }
        self.current = Some(ResultSet {
            columns,
            ..ResultSet::default()
        });
    }

    /// Appends a row; `columns` is only consulted when no set is open yet.
    pub fn push_row(&mut self, columns: impl FnOnce() -> Vec<String>, values: Vec<Value>) {
        let set = self.current.get_or_insert_with(|| ResultSet {
            columns: columns(),
            ..ResultSet::default()
        });
        set.rows.push(values);
    }

    /// Closes the open set (or records a status-only statement).
    pub fn finish_statement(&mut self, rows_affected: u64) {
        let mut set = self.current.take().unwrap_or_default();
        set.rows_affected = rows_affected;
        self.finished.push(set);
    }

    /// Closes the open set counting its rows as the affected count.
    pub fn finish_open_set(&mut self) {
        if let Some(mut open) = self.current.take() {
            open.rows_affected = open.rows.len() as u64;
            self.finished.push(open);
        }
    }

    pub fn into_sets(mut self) -> Vec<ResultSet> {
        self.finish_open_set();
        self.finished
    }

    pub fn into_tabular(self, policy: AffectedRows) -> TabularResult {
        normalize(self.into_sets(), policy)
    }
}

/// The last result set wins; `affected_rows` follows `policy`.
pub fn normalize(sets: Vec<ResultSet>, policy: AffectedRows) -> TabularResult {
    let total: u64 = sets.iter().map(|set| set.rows_affected).sum();
    let Some(last) = sets.into_iter().last() else {
        return TabularResult::empty();
    };

    let affected_rows = match policy {
        AffectedRows::LastReported => last.rows_affected,
        AffectedRows::LastShape if last.is_row_set() => last.rows.len() as u64,
        AffectedRows::LastShape => last.rows_affected,
        AffectedRows::Sum => total,
    };

    let rows = last
        .rows
        .into_iter()
        .map(|values| zip_row(&last.columns, values))
        .collect();

    TabularResult {
        rows,
        columns: last.columns,
        affected_rows,
    }
}

/// Duplicate column names collapse onto one key; the later value wins.
pub fn zip_row(columns: &[String], values: Vec<Value>) -> Row {
    let mut row = Row::new();
    for (column, value) in columns.iter().zip(values) {
        row.insert(column.clone(), value);
    }
    row
}

// --- Statement Inspection ---

/// Splits a batch on `;` outside quotes and comments. Literal, quoted
/// identifier and comment text is blanked so keyword checks only see code.
pub(crate) fn statement_skeletons(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            ';' => statements.push(std::mem::take(&mut current)),
            '\'' | '"' | '`' | '[' => {
                let close = if c == '[' { ']' } else { c };
                current.push(' ');
                while let Some(inner) = chars.next() {
                    if inner == close {
                        // Doubled delimiter is an escape.
                        if chars.peek() == Some(&close) {
                            chars.next();
                            continue;
                        }
                        break;
                    }
                }
                current.push(' ');
            }
            '-' if chars.peek() == Some(&'-') => {
                for inner in chars.by_ref() {
                    if inner == '\n' {
                        break;
                    }
                }
                current.push('\n');
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for inner in chars.by_ref() {
                    if prev == '*' && inner == '/' {
                        break;
                    }
                    prev = inner;
                }
                current.push(' ');
            }
            other => current.push(other),
        }
    }
    statements.push(current);

    statements.retain(|statement| !statement.trim().is_empty());
    statements
}

/// Heuristic: does any statement of the batch produce a row set?
pub(crate) fn batch_returns_rows(sql: &str) -> bool {
    statement_skeletons(sql).iter().any(|statement| {
        let head = statement.trim_start();
        ROW_RETURNING_HEAD.is_match(head) || OUTPUT_CLAUSE.is_match(head)
    })
}

pub(crate) fn trim_statement_terminators(sql: &str) -> &str {
    sql.trim_end_matches(|c: char| c == ';' || c.is_whitespace())
}
