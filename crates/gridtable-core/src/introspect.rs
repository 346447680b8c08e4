//! Schema introspection capability.
//!
//! Used for the zero-configuration path: when a table definition declares
//! no columns, the engine asks the host for the physical columns of the
//! base table and synthesizes a column set from them.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A physical column as reported by the schema introspector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaColumn {
    /// Column name
    pub name: String,
}

impl SchemaColumn {
    /// Create a schema column entry.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Lists the physical columns of a table, in schema order.
pub trait SchemaIntrospector {
    /// Get the columns of `table`.
    fn columns_of(&self, table: &str) -> Result<Vec<SchemaColumn>>;
}

/// In-memory introspector backed by a fixed table map.
#[derive(Debug, Clone, Default)]
pub struct StaticSchema {
    tables: HashMap<String, Vec<SchemaColumn>>,
}

impl StaticSchema {
    /// Create an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table with its column names in order.
    #[must_use]
    pub fn table<I, S>(mut self, name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tables.insert(
            name.into(),
            columns.into_iter().map(SchemaColumn::new).collect(),
        );
        self
    }
}

impl SchemaIntrospector for StaticSchema {
    fn columns_of(&self, table: &str) -> Result<Vec<SchemaColumn>> {
        Ok(self.tables.get(table).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_schema_keeps_order() {
        let schema = StaticSchema::new().table("users", ["id", "name", "dept_id"]);
        let cols = schema.columns_of("users").unwrap();
        let names: Vec<_> = cols.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "name", "dept_id"]);
        assert!(schema.columns_of("missing").unwrap().is_empty());
    }
}
