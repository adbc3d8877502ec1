//! Structured query results.
//!
//! The engine hands rows over one at a time; a [`Collector`] accumulates
//! them into a [`ResultSet`] instead of printing them.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::sqlite::Value;

/// Columns and rows produced by one statement.
///
/// Column names are recorded once and are present even when no rows were
/// produced, as long as the statement had a result shape.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl ResultSet {
    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Value at `row` in the column called `column`.
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let index = self.column_index(column)?;
        self.rows.get(row)?.get(index)
    }

    /// Rows keyed by column name. Duplicate column names keep the last value.
    pub fn to_maps(&self) -> Vec<HashMap<String, Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect()
            })
            .collect()
    }
}

/// Row sink for one statement.
#[derive(Debug, Default)]
pub struct Collector {
    columns: Option<Vec<String>>,
    rows: Vec<Vec<Value>>,
}

impl Collector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the column names of a statement, whether or not it yields rows.
    pub fn on_shape(&mut self, columns: &[String]) {
        if self.columns.is_none() {
            self.columns = Some(columns.to_vec());
        }
    }

    /// Append one row. Column names are captured on the first call.
    pub fn on_row(&mut self, columns: &[String], values: Vec<Value>) {
        self.on_shape(columns);
        debug_assert_eq!(values.len(), columns.len());
        self.rows.push(values);
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn finish(self) -> ResultSet {
        ResultSet {
            columns: self.columns.unwrap_or_default(),
            rows: self.rows,
        }
    }
}
