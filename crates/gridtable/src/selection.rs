//! Bulk row selection.
//!
//! A selection is either an explicit id set or "every row matching the
//! current query except these". Checked state is always derived from that
//! pair, never cached per page, so it stays right across pagination.

use gridtable_core::{Connection, Result, Row, Value};
use gridtable_query::{Dialect, Expr, SelectQuery};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::trace;

/// Primary-key value of a row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RowId {
    Int(i64),
    Text(String),
}

impl RowId {
    /// Read an id from a stored value; integer-looking text becomes `Int`.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Int(_) | Value::BigInt(_) | Value::Bool(_) => value.as_i64().map(RowId::Int),
            Value::Text(s) => Some(
                s.trim()
                    .parse::<i64>()
                    .map_or_else(|_| RowId::Text(s.clone()), RowId::Int),
            ),
            other => Some(RowId::Text(other.to_string())),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            RowId::Int(v) => Value::BigInt(*v),
            RowId::Text(s) => Value::Text(s.clone()),
        }
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowId::Int(v) => write!(f, "{}", v),
            RowId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for RowId {
    fn from(v: i64) -> Self {
        RowId::Int(v)
    }
}

impl From<&str> for RowId {
    fn from(v: &str) -> Self {
        RowId::Text(v.to_string())
    }
}

/// Persisted selection.
///
/// With `select_all` set, `explicit_ids` is empty and `exceptions` lists the
/// unchecked rows; otherwise `exceptions` is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionState {
    pub explicit_ids: BTreeSet<RowId>,
    pub select_all: bool,
    pub exceptions: BTreeSet<RowId>,
    /// Ids on the page last rendered, shown checked when select-all turns on.
    pub page_seed: Vec<RowId>,
}

/// Tracks bulk selection across pages.
#[derive(Debug, Clone, Default)]
pub struct BulkSelectionTracker {
    state: SelectionState,
}

impl BulkSelectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_state(state: SelectionState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    /// Turn select-all on (seeded from the current page) or clear everything.
    pub fn toggle_select_all(&mut self, value: bool, page_ids: impl IntoIterator<Item = RowId>) {
        if value {
            self.state.select_all = true;
            self.state.explicit_ids.clear();
            self.state.exceptions.clear();
            self.state.page_seed = page_ids.into_iter().collect();
        } else {
            self.clear();
        }
    }

    /// Check or uncheck one row.
    pub fn toggle_row(&mut self, id: RowId, selected: bool) {
        if self.state.select_all {
            if selected {
                self.state.exceptions.remove(&id);
            } else {
                self.state.exceptions.insert(id);
            }
        } else if selected {
            self.state.explicit_ids.insert(id);
        } else {
            self.state.explicit_ids.remove(&id);
        }
    }

    /// Record the ids of the page just rendered.
    pub fn refresh_seed(&mut self, page_ids: impl IntoIterator<Item = RowId>) {
        self.state.page_seed = page_ids.into_iter().collect();
    }

    pub fn is_checked(&self, id: &RowId) -> bool {
        if self.state.select_all {
            !self.state.exceptions.contains(id)
        } else {
            self.state.explicit_ids.contains(id)
        }
    }

    pub fn is_select_all(&self) -> bool {
        self.state.select_all
    }

    pub fn has_selection(&self) -> bool {
        self.state.select_all || !self.state.explicit_ids.is_empty()
    }

    pub fn clear(&mut self) {
        self.state = SelectionState::default();
    }

    /// Restrict `query` to the selected rows.
    pub fn materialize(&self, query: SelectQuery, primary_key: Expr) -> SelectQuery {
        if self.state.select_all {
            if self.state.exceptions.is_empty() {
                return query;
            }
            let ids: Vec<Value> = self.state.exceptions.iter().map(RowId::to_value).collect();
            query.filter(primary_key.not_in_list(ids))
        } else {
            let ids: Vec<Value> = self.state.explicit_ids.iter().map(RowId::to_value).collect();
            query.filter(primary_key.in_list(ids))
        }
    }
}

/// Lazily fetches the rows of a query in primary-key order.
///
/// With a chunk size, each step runs one keyset query
/// (`pk > last ORDER BY pk LIMIT chunk`); without one, a single query
/// returns everything.
pub struct ChunkedRows<'c, C: Connection + ?Sized> {
    conn: &'c C,
    query: SelectQuery,
    primary_key: Expr,
    key_name: String,
    dialect: Dialect,
    chunk: Option<u64>,
    last: Option<Value>,
    done: bool,
}

impl<'c, C: Connection + ?Sized> ChunkedRows<'c, C> {
    pub fn new(
        conn: &'c C,
        query: SelectQuery,
        primary_key: Expr,
        key_name: impl Into<String>,
        dialect: Dialect,
        chunk: Option<u64>,
    ) -> Self {
        Self {
            conn,
            query,
            primary_key,
            key_name: key_name.into(),
            dialect,
            chunk: chunk.filter(|c| *c > 0),
            last: None,
            done: false,
        }
    }

    /// Flatten into row ids.
    pub fn ids(self) -> impl Iterator<Item = Result<RowId>> + 'c
    where
        C: 'c,
    {
        let key_name = self.key_name.clone();
        self.flat_map(move |chunk| match chunk {
            Ok(rows) => rows
                .iter()
                .filter_map(|row| row.get_by_name(&key_name).and_then(RowId::from_value))
                .map(Ok)
                .collect::<Vec<_>>(),
            Err(err) => vec![Err(err)],
        })
    }

    fn next_query(&self) -> SelectQuery {
        let mut query = self.query.clone().without_pagination();
        query.order_by.clear();
        if let Some(last) = &self.last {
            query = query.filter(self.primary_key.clone().gt(last.clone()));
        }
        query = query.order_by(self.primary_key.clone().asc());
        match self.chunk {
            Some(size) => query.limit(size),
            None => query,
        }
    }
}

impl<C: Connection + ?Sized> Iterator for ChunkedRows<'_, C> {
    type Item = Result<Vec<Row>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let (sql, params) = self.next_query().build_with_dialect(self.dialect);
        trace!(sql = %sql, "selection chunk");

        let rows = match self.conn.query(&sql, &params) {
            Ok(rows) => rows,
            Err(err) => {
                self.done = true;
                return Some(Err(err));
            }
        };

        match self.chunk {
            Some(size) if rows.len() as u64 == size => {
                self.last = rows
                    .last()
                    .and_then(|row| row.get_by_name(&self.key_name))
                    .cloned();
                self.done = self.last.is_none();
            }
            _ => self.done = true,
        }

        if rows.is_empty() { None } else { Some(Ok(rows)) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pk() -> Expr {
        Expr::qualified("users", "id")
    }

    #[test]
    fn test_select_all_with_exception_round_trip() {
        let mut tracker = BulkSelectionTracker::new();
        tracker.toggle_select_all(true, [RowId::Int(1), RowId::Int(2)]);
        tracker.toggle_row(RowId::Int(5), false);
        assert!(!tracker.is_checked(&RowId::Int(5)));
        assert!(tracker.is_checked(&RowId::Int(6)));

        let (sql, params) = tracker
            .materialize(SelectQuery::new("users"), pk())
            .build_with_dialect(Dialect::Sqlite);
        assert_eq!(sql, "SELECT * FROM \"users\" WHERE \"users\".\"id\" NOT IN (?1)");
        assert_eq!(params, vec![Value::BigInt(5)]);

        tracker.toggle_row(RowId::Int(5), true);
        assert!(tracker.state().exceptions.is_empty());
        let (sql, _) = tracker
            .materialize(SelectQuery::new("users"), pk())
            .build_with_dialect(Dialect::Sqlite);
        assert_eq!(sql, "SELECT * FROM \"users\"");
    }

    #[test]
    fn test_explicit_selection() {
        let mut tracker = BulkSelectionTracker::new();
        assert!(!tracker.has_selection());
        tracker.toggle_row(RowId::Int(3), true);
        tracker.toggle_row(RowId::Int(1), true);
        tracker.toggle_row(RowId::Int(3), false);
        tracker.toggle_row(RowId::Int(4), true);

        let (sql, params) = tracker
            .materialize(SelectQuery::new("users"), pk())
            .build_with_dialect(Dialect::Sqlite);
        assert_eq!(sql, "SELECT * FROM \"users\" WHERE \"users\".\"id\" IN (?1, ?2)");
        assert_eq!(params, vec![Value::BigInt(1), Value::BigInt(4)]);
    }

    #[test]
    fn test_empty_explicit_selection_matches_nothing() {
        let tracker = BulkSelectionTracker::new();
        let (sql, _) = tracker
            .materialize(SelectQuery::new("users"), pk())
            .build_with_dialect(Dialect::Sqlite);
        assert_eq!(sql, "SELECT * FROM \"users\" WHERE 1 = 0");
    }

    #[test]
    fn test_turning_select_all_off_clears_state() {
        let mut tracker = BulkSelectionTracker::new();
        tracker.toggle_row(RowId::Int(9), true);
        tracker.toggle_select_all(true, [RowId::Int(1)]);
        assert!(tracker.state().explicit_ids.is_empty());
        assert_eq!(tracker.state().page_seed, vec![RowId::Int(1)]);

        tracker.toggle_row(RowId::Int(1), false);
        tracker.toggle_select_all(false, []);
        assert_eq!(tracker.state(), &SelectionState::default());
    }

    #[test]
    fn test_row_id_from_value() {
        assert_eq!(RowId::from_value(&Value::Int(4)), Some(RowId::Int(4)));
        assert_eq!(
            RowId::from_value(&Value::Text("12".to_string())),
            Some(RowId::Int(12))
        );
        assert_eq!(
            RowId::from_value(&Value::Text("ab-1".to_string())),
            Some(RowId::Text("ab-1".to_string()))
        );
        assert_eq!(RowId::from_value(&Value::Null), None);
    }

    #[test]
    fn test_selection_state_json() {
        let mut tracker = BulkSelectionTracker::new();
        tracker.toggle_select_all(true, []);
        tracker.toggle_row(RowId::from("x"), false);
        let json = serde_json::to_string(tracker.state()).unwrap();
        let restored: SelectionState = serde_json::from_str(&json).unwrap();
        assert_eq!(&restored, tracker.state());
    }
}
