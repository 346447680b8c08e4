//! In-memory SQLite storage for integration tests.

#![allow(dead_code)]

use gridtable::{Connection, DATETIME_FORMAT, Error, Result, Row, StorageError, Value};
use rusqlite::types::{Value as SqlValue, ValueRef};
use std::cell::RefCell;

/// A `Connection` over an in-memory SQLite database.
pub struct SqliteDb {
    conn: rusqlite::Connection,
}

impl SqliteDb {
    pub fn open(schema: &str) -> Self {
        let conn = rusqlite::Connection::open_in_memory().expect("open sqlite memory db");
        conn.execute_batch(schema).expect("create schema");
        Self { conn }
    }

    /// Read one integer column of `table` ordered by id.
    pub fn column_i64(&self, table: &str, column: &str) -> Vec<(i64, i64)> {
        let sql = format!("SELECT \"id\", \"{column}\" FROM \"{table}\" ORDER BY \"id\"");
        let mut stmt = self.conn.prepare(&sql).expect("prepare");
        stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .expect("query")
            .collect::<std::result::Result<_, _>>()
            .expect("rows")
    }
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Int(i) => SqlValue::Integer(i64::from(*i)),
        Value::BigInt(i) => SqlValue::Integer(*i),
        Value::Double(f) => SqlValue::Real(*f),
        Value::Decimal(s) | Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Bytes(b) => SqlValue::Blob(b.clone()),
        Value::DateTime(dt) => SqlValue::Text(dt.format(DATETIME_FORMAT).to_string()),
        Value::Json(j) => SqlValue::Text(j.to_string()),
    }
}

fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::BigInt(i),
        ValueRef::Real(f) => Value::Double(f),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Bytes(b.to_vec()),
    }
}

fn storage_error(sql: &str, err: rusqlite::Error) -> Error {
    Error::Storage(
        StorageError::new(err.to_string())
            .with_sql(sql)
            .with_source(err),
    )
}

impl Connection for SqliteDb {
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let mut stmt = self.conn.prepare(sql).map_err(|e| storage_error(sql, e))?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rows = stmt
            .query(rusqlite::params_from_iter(params.iter().map(to_sql)))
            .map_err(|e| storage_error(sql, e))?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(|e| storage_error(sql, e))? {
            let mut values = Vec::with_capacity(names.len());
            for i in 0..names.len() {
                values.push(from_sql(row.get_ref(i).map_err(|e| storage_error(sql, e))?));
            }
            out.push(Row::new(names.clone(), values));
        }
        Ok(out)
    }

    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        let affected = self
            .conn
            .execute(sql, rusqlite::params_from_iter(params.iter().map(to_sql)))
            .map_err(|e| storage_error(sql, e))?;
        Ok(affected as u64)
    }

    fn execute_all(&self, statements: &[(String, Vec<Value>)]) -> Result<u64> {
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|e| storage_error("BEGIN", e))?;
        let mut affected = 0;
        for (sql, params) in statements {
            affected += self.execute(sql, params)?;
        }
        tx.commit().map_err(|e| storage_error("COMMIT", e))?;
        Ok(affected)
    }
}

/// Wraps a connection and records every statement it sees.
pub struct Recording<'a, C: Connection> {
    inner: &'a C,
    pub queries: RefCell<Vec<String>>,
    pub executed: RefCell<Vec<String>>,
}

impl<'a, C: Connection> Recording<'a, C> {
    pub fn new(inner: &'a C) -> Self {
        Self {
            inner,
            queries: RefCell::new(Vec::new()),
            executed: RefCell::new(Vec::new()),
        }
    }
}

impl<C: Connection> Connection for Recording<'_, C> {
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.queries.borrow_mut().push(sql.to_string());
        self.inner.query(sql, params)
    }

    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        self.executed.borrow_mut().push(sql.to_string());
        self.inner.execute(sql, params)
    }

    fn execute_all(&self, statements: &[(String, Vec<Value>)]) -> Result<u64> {
        self.executed
            .borrow_mut()
            .extend(statements.iter().map(|(sql, _)| sql.clone()));
        self.inner.execute_all(statements)
    }
}

pub const SCHEMA: &str = r#"
CREATE TABLE departments (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL
);
CREATE TABLE users (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT NOT NULL,
    department_id INTEGER REFERENCES departments(id),
    created_at TEXT NOT NULL,
    "order" INTEGER NOT NULL
);
INSERT INTO departments (id, name) VALUES (1, 'Engineering'), (2, 'Sales');
INSERT INTO users (id, name, email, department_id, created_at, "order") VALUES
    (1, 'Ada', 'ada@example.com', 1, '2024-03-09 08:00:00', 1),
    (2, 'Grace', 'grace@example.com', 1, '2024-03-01 09:30:00', 2),
    (3, 'Linus', 'linus@example.com', 2, '2024-02-11 10:00:00', 3),
    (4, 'Barbara', 'barbara@example.com', 2, '2023-12-24 18:00:00', 4),
    (5, 'Edsger', 'edsger@example.com', NULL, '2024-03-10 07:45:00', 5);
"#;

/// Sample database with two departments and five users.
pub fn sample_db() -> SqliteDb {
    SqliteDb::open(SCHEMA)
}

/// Route `RUST_LOG` filtered tracing output through the test writer.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
