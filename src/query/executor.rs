//! Relational executor contract consumed by the board.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::Result;
use crate::query::{assembler::SqlQuery, Value};

/// Single output row represented as a mapping from column to value.
pub type Row = BTreeMap<String, Value>;

/// Materialised result of one statement.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RowSet {
    /// Column names in projection order.
    pub columns: Vec<String>,
    /// Rows, each with one value per column.
    pub rows: Vec<Vec<Value>>,
}

impl RowSet {
    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` when the statement produced no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of `column` in the projection.
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Value at (`row`, `column`), if both exist.
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)
    }

    /// Rows keyed by column name.
    pub fn records(&self) -> Vec<Row> {
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

    /// Consumes the set, returning rows keyed by column name.
    pub fn into_records(self) -> Vec<Row> {
        let columns = self.columns;
        self.rows
            .into_iter()
            .map(|row| columns.iter().cloned().zip(row).collect())
            .collect()
    }
}

/// Synchronous, parameterized statement execution over a single connection.
pub trait QueryExecutor {
    /// Runs `query`, binding its parameters positionally.
    fn execute(&self, query: &SqlQuery) -> Result<RowSet>;
}

impl<E: QueryExecutor + ?Sized> QueryExecutor for &E {
    fn execute(&self, query: &SqlQuery) -> Result<RowSet> {
        (**self).execute(query)
    }
}
