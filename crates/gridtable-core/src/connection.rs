//! Storage capability consumed by the engine.
//!
//! The engine never talks to a database driver directly. Hosts implement
//! [`Connection`] over whatever driver they use; every call is synchronous
//! from the engine's point of view and any failure is surfaced as
//! [`Error::Storage`](crate::Error::Storage) without retry.

use crate::error::Result;
use crate::row::Row;
use crate::value::Value;

/// A synchronous connection to the storage collaborator.
pub trait Connection {
    /// Execute a query and return all rows.
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>>;

    /// Execute a statement (UPDATE, DELETE, ...) and return rows affected.
    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64>;

    /// Execute a query and return the first row, if any.
    fn query_one(&self, sql: &str, params: &[Value]) -> Result<Option<Row>> {
        Ok(self.query(sql, params)?.into_iter().next())
    }

    /// Execute several statements as one unit.
    ///
    /// The default runs them in order and stops at the first failure.
    /// Drivers with transaction support should override this so a failure
    /// leaves no statement committed.
    fn execute_all(&self, statements: &[(String, Vec<Value>)]) -> Result<u64> {
        let mut affected = 0;
        for (sql, params) in statements {
            affected += self.execute(sql, params)?;
        }
        Ok(affected)
    }
}

impl<C: Connection + ?Sized> Connection for &C {
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        (**self).query(sql, params)
    }

    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        (**self).execute(sql, params)
    }

    fn query_one(&self, sql: &str, params: &[Value]) -> Result<Option<Row>> {
        (**self).query_one(sql, params)
    }

    fn execute_all(&self, statements: &[(String, Vec<Value>)]) -> Result<u64> {
        (**self).execute_all(statements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct Recording {
        executed: RefCell<Vec<String>>,
    }

    impl Connection for Recording {
        fn query(&self, _sql: &str, _params: &[Value]) -> Result<Vec<Row>> {
            Ok(vec![
                Row::from_pairs([("id", 1_i64)]),
                Row::from_pairs([("id", 2_i64)]),
            ])
        }

        fn execute(&self, sql: &str, _params: &[Value]) -> Result<u64> {
            self.executed.borrow_mut().push(sql.to_string());
            Ok(1)
        }
    }

    #[test]
    fn test_query_one_takes_first_row() {
        let conn = Recording {
            executed: RefCell::new(Vec::new()),
        };
        let row = conn.query_one("SELECT", &[]).unwrap().unwrap();
        assert_eq!(row.get_by_name("id"), Some(&Value::BigInt(1)));
    }

    #[test]
    fn test_execute_all_runs_in_order() {
        let conn = Recording {
            executed: RefCell::new(Vec::new()),
        };
        let affected = conn
            .execute_all(&[
                ("UPDATE a".to_string(), Vec::new()),
                ("UPDATE b".to_string(), Vec::new()),
            ])
            .unwrap();
        assert_eq!(affected, 2);
        assert_eq!(*conn.executed.borrow(), vec!["UPDATE a", "UPDATE b"]);
    }
}
