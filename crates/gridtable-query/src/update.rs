//! UPDATE statement builder.

use crate::clause::Where;
use crate::expr::{Dialect, Expr};
use gridtable_core::Value;

/// An UPDATE over one table with expression-valued assignments.
#[derive(Debug, Clone)]
pub struct UpdateQuery {
    table: String,
    assignments: Vec<(String, Expr)>,
    where_clause: Option<Where>,
}

impl UpdateQuery {
    /// Create a new UPDATE builder for `table`.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            assignments: Vec::new(),
            where_clause: None,
        }
    }

    /// Assign `column = value`.
    #[must_use]
    pub fn set(mut self, column: impl Into<String>, value: impl Into<Expr>) -> Self {
        self.assignments.push((column.into(), value.into()));
        self
    }

    /// Add a WHERE condition (AND-ed with existing ones).
    #[must_use]
    pub fn filter(mut self, expr: Expr) -> Self {
        self.where_clause = Some(match self.where_clause {
            Some(existing) => existing.and(expr),
            None => Where::new(expr),
        });
        self
    }

    /// Build the UPDATE SQL and parameters with default dialect (Postgres).
    pub fn build(&self) -> (String, Vec<Value>) {
        self.build_with_dialect(Dialect::default())
    }

    /// Build the UPDATE SQL and parameters with specific dialect.
    pub fn build_with_dialect(&self, dialect: Dialect) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let set_clauses: Vec<_> = self
            .assignments
            .iter()
            .map(|(column, value)| {
                format!(
                    "{} = {}",
                    dialect.quote_identifier(column),
                    value.build_with_dialect(dialect, &mut params, 0)
                )
            })
            .collect();

        let mut sql = format!(
            "UPDATE {} SET {}",
            dialect.quote_identifier(&self.table),
            set_clauses.join(", ")
        );

        if let Some(where_clause) = &self.where_clause {
            let where_sql = where_clause.build_with_dialect(dialect, &mut params, 0);
            sql.push_str(" WHERE ");
            sql.push_str(&where_sql);
        }

        (sql, params)
    }
}
