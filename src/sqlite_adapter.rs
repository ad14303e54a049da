//! rusqlite-backed [`QueryExecutor`].

use std::path::Path;
use std::time::Instant;

use parking_lot::Mutex;
use rusqlite::{
    params_from_iter,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
    Connection, OpenFlags, ToSql,
};
use tracing::debug;

use crate::error::{JobscopeError, Result};
use crate::query::{
    executor::{QueryExecutor, RowSet},
    profile::{profile_timer, record_profile_timer, QueryProfileKind},
    SqlQuery, Value,
};

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Value::Int(v) => ToSqlOutput::Borrowed(ValueRef::Integer(*v)),
            Value::Float(v) => ToSqlOutput::Borrowed(ValueRef::Real(*v)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Bytes(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

impl FromSql for Value {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        Ok(match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(v) => Value::Int(v),
            ValueRef::Real(v) => Value::Float(v),
            ValueRef::Text(bytes) => Value::Text(
                std::str::from_utf8(bytes)
                    .map_err(|err| FromSqlError::Other(Box::new(err)))?
                    .to_owned(),
            ),
            ValueRef::Blob(bytes) => Value::Bytes(bytes.to_vec()),
        })
    }
}

/// Single-connection executor. Statements are serialized through a mutex.
pub struct SqliteExecutor {
    conn: Mutex<Connection>,
}

impl SqliteExecutor {
    /// Opens an existing database file read-only.
    pub fn open_read_only(path: &Path) -> Result<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(path, flags).map_err(|err| {
            JobscopeError::query_failed(&format!("open {}", path.display()), &[], err)
        })?;
        Ok(Self::from_connection(conn))
    }

    /// Wraps an already opened connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Returns `true` when a table named `name` exists.
    pub fn table_exists(&self, name: &str) -> Result<bool> {
        let query = SqlQuery::new(
            "SELECT COUNT(*) AS n FROM sqlite_master WHERE type = 'table' AND name = ?",
            vec![Value::from(name)],
        );
        let rows = self.execute(&query)?;
        Ok(rows
            .get(0, "n")
            .and_then(Value::as_i64)
            .is_some_and(|n| n > 0))
    }

    /// Column names of `table` in declaration order.
    pub fn table_columns(&self, table: &str) -> Result<Vec<String>> {
        let query = SqlQuery::new(
            "SELECT name FROM pragma_table_info(?)",
            vec![Value::from(table)],
        );
        Ok(self
            .execute(&query)?
            .rows
            .into_iter()
            .filter_map(|row| row.into_iter().next().and_then(Value::into_string))
            .collect())
    }
}

impl QueryExecutor for SqliteExecutor {
    fn execute(&self, query: &SqlQuery) -> Result<RowSet> {
        let start = profile_timer();
        let began = Instant::now();
        let fail = |err: rusqlite::Error| JobscopeError::query_failed(&query.sql, &query.params, err);
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(&query.sql).map_err(fail)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(str::to_owned).collect();
        let width = columns.len();
        let mut rows = stmt
            .query(params_from_iter(query.params.iter()))
            .map_err(fail)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(fail)? {
            let mut values = Vec::with_capacity(width);
            for idx in 0..width {
                values.push(row.get::<_, Value>(idx).map_err(fail)?);
            }
            out.push(values);
        }
        record_profile_timer(QueryProfileKind::Execute, start);
        debug!(
            fingerprint = %format!("{:016x}", query.fingerprint()),
            rows = out.len(),
            elapsed_us = began.elapsed().as_micros() as u64,
            "query executed"
        );
        Ok(RowSet { columns, rows: out })
    }
}
