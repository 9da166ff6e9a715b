// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{CorpusError, Result, StorageError};

/// One row of a snapshot: column name to value, in column order.
pub type Record = serde_json::Map<String, Value>;

/// Text stored under `key`, if the row has a string there.
pub fn text_value<'a>(row: &'a Record, key: &str) -> Option<&'a str> {
    row.get(key).and_then(Value::as_str)
}

/// An ordered list of records with named columns.
///
/// Rows need not share every column; [`Table::columns`] is the union in
/// first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Table {
    rows: Vec<Record>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: Vec<Record>) -> Self {
        Self { rows }
    }

    /// Single-column table, `None` becoming null.
    pub fn from_column(key: &str, values: Vec<Option<&str>>) -> Self {
        let rows = values
            .into_iter()
            .map(|value| {
                let mut row = Record::new();
                row.insert(
                    key.to_string(),
                    value.map_or(Value::Null, |v| Value::String(v.to_string())),
                );
                row
            })
            .collect();
        Self { rows }
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut [Record] {
        &mut self.rows
    }

    pub fn into_rows(self) -> Vec<Record> {
        self.rows
    }

    pub fn push(&mut self, row: Record) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column names in first-seen order.
    pub fn columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = Vec::new();
        for row in &self.rows {
            for key in row.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }
        columns
    }

    pub fn contains_column(&self, key: &str) -> bool {
        self.rows.iter().any(|row| row.contains_key(key))
    }

    /// Keep only the first `limit` rows. Zero keeps everything.
    pub fn truncate(&mut self, limit: usize) {
        if limit > 0 {
            self.rows.truncate(limit);
        }
    }

    /// Values of `key` for every row, `Null` where absent.
    pub fn column(&self, key: &str) -> Vec<Value> {
        self.rows
            .iter()
            .map(|row| row.get(key).cloned().unwrap_or(Value::Null))
            .collect()
    }

    /// Set `key` on every row from `values`, positionally.
    pub fn set_column(&mut self, key: &str, values: Vec<Value>) -> Result<()> {
        if values.len() != self.rows.len() {
            return Err(CorpusError::Data(format!(
                "column '{}' has {} values for {} rows",
                key,
                values.len(),
                self.rows.len()
            )));
        }
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.insert(key.to_string(), value);
        }
        Ok(())
    }

    /// Fail if a stage's output column already exists.
    pub fn ensure_absent(&self, key: &str) -> std::result::Result<(), StorageError> {
        if self.contains_column(key) {
            return Err(StorageError::KeyCollision {
                key: key.to_string(),
            });
        }
        Ok(())
    }

    /// Fail if a stage's input column is missing. An empty table has no
    /// columns to check and passes.
    pub fn ensure_present(&self, key: &str) -> std::result::Result<(), StorageError> {
        if !self.is_empty() && !self.contains_column(key) {
            return Err(StorageError::MissingColumn {
                key: key.to_string(),
            });
        }
        Ok(())
    }
}

impl From<Vec<Record>> for Table {
    fn from(rows: Vec<Record>) -> Self {
        Self::from_rows(rows)
    }
}
