//! SELECT query builder.
//!
//! [`SelectQuery`] is an immutable-by-convention query description: builder
//! methods consume and return it, and SQL is generated only when a dialect
//! is supplied. The same value renders as a row query, a `COUNT(*)` query
//! or an `EXISTS` subquery.

use crate::clause::{Limit, Offset, OrderBy, Where};
use crate::expr::{Dialect, Expr};
use crate::join::Join;
use gridtable_core::Value;

/// One item of the SELECT list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    /// `"table"."name" [AS "alias"]`
    Column {
        table: String,
        name: String,
        alias: Option<String>,
    },
    /// `'' AS "alias"`: a constant empty cell that never touches storage.
    Empty { alias: String },
}

impl Projection {
    /// Name the column will carry in the result set.
    pub fn output_name(&self) -> &str {
        match self {
            Projection::Column { name, alias, .. } => alias.as_deref().unwrap_or(name),
            Projection::Empty { alias } => alias,
        }
    }

    fn to_sql(&self, dialect: Dialect) -> String {
        match self {
            Projection::Column { table, name, alias } => {
                let mut sql = format!(
                    "{}.{}",
                    dialect.quote_identifier(table),
                    dialect.quote_identifier(name)
                );
                if let Some(alias) = alias {
                    sql.push_str(" AS ");
                    sql.push_str(&dialect.quote_identifier(alias));
                }
                sql
            }
            Projection::Empty { alias } => {
                format!("'' AS {}", dialect.quote_identifier(alias))
            }
        }
    }
}

/// A SELECT query over one base table.
#[derive(Debug, Clone)]
pub struct SelectQuery {
    /// Table name for FROM clause
    pub table: String,
    /// Optional alias for the FROM table
    pub alias: Option<String>,
    /// Columns to select (empty = all)
    pub projections: Vec<Projection>,
    /// JOIN clauses
    pub joins: Vec<Join>,
    /// WHERE clause conditions
    pub where_clause: Option<Where>,
    /// ORDER BY clauses
    pub order_by: Vec<OrderBy>,
    /// LIMIT clause
    pub limit: Option<Limit>,
    /// OFFSET clause
    pub offset: Option<Offset>,
}

impl SelectQuery {
    /// Create a new SELECT over `table`.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            alias: None,
            projections: Vec::new(),
            joins: Vec::new(),
            where_clause: None,
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// Alias the FROM table.
    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Name the FROM table is referenced by.
    pub fn reference(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.table)
    }

    /// Add a projection unless an identical one is already present.
    #[must_use]
    pub fn select(mut self, projection: Projection) -> Self {
        if !self.projections.contains(&projection) {
            self.projections.push(projection);
        }
        self
    }

    /// Whether a result column with this output name is projected.
    pub fn projects(&self, output_name: &str) -> bool {
        self.projections
            .iter()
            .any(|p| p.output_name() == output_name)
    }

    /// Add a JOIN clause.
    #[must_use]
    pub fn join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    /// Whether a join with this reference name exists.
    pub fn has_join(&self, reference: &str) -> bool {
        self.joins.iter().any(|j| j.reference() == reference)
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

    /// Add ORDER BY clause.
    #[must_use]
    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by.push(order);
        self
    }

    /// Set LIMIT.
    #[must_use]
    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(Limit(n));
        self
    }

    /// Set OFFSET.
    #[must_use]
    pub fn offset(mut self, n: u64) -> Self {
        self.offset = Some(Offset(n));
        self
    }

    /// Drop LIMIT and OFFSET.
    #[must_use]
    pub fn without_pagination(mut self) -> Self {
        self.limit = None;
        self.offset = None;
        self
    }

    /// Build the SQL query and parameters with default dialect (Postgres).
    pub fn build(&self) -> (String, Vec<Value>) {
        self.build_with_dialect(Dialect::default())
    }

    /// Build the SQL query and parameters with a specific dialect.
    #[tracing::instrument(level = "trace", skip(self), fields(table = %self.table))]
    pub fn build_with_dialect(&self, dialect: Dialect) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let sql = self.build_into(dialect, &mut params, 0);
        (sql, params)
    }

    /// Build into a shared parameter list.
    pub fn build_into(&self, dialect: Dialect, params: &mut Vec<Value>, offset: usize) -> String {
        let mut sql = String::from("SELECT ");

        if self.projections.is_empty() {
            sql.push('*');
        } else {
            let cols: Vec<_> = self
                .projections
                .iter()
                .map(|p| p.to_sql(dialect))
                .collect();
            sql.push_str(&cols.join(", "));
        }

        self.push_from_where(&mut sql, dialect, params, offset);

        // ORDER BY
        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            let order_strs: Vec<_> = self
                .order_by
                .iter()
                .map(|o| o.build(dialect, params, offset))
                .collect();
            sql.push_str(&order_strs.join(", "));
        }

        // LIMIT
        if let Some(Limit(n)) = self.limit {
            sql.push_str(&format!(" LIMIT {}", n));
        }

        // OFFSET
        if let Some(Offset(n)) = self.offset {
            sql.push_str(&format!(" OFFSET {}", n));
        }

        sql
    }

    /// Build a `COUNT(*)` over the same FROM/JOIN/WHERE.
    pub fn build_count_with_dialect(&self, dialect: Dialect) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let mut sql = String::from("SELECT COUNT(*) AS ");
        sql.push_str(&dialect.quote_identifier("aggregate"));
        self.push_from_where(&mut sql, dialect, &mut params, 0);
        (sql, params)
    }

    /// Build an EXISTS body (SELECT 1 instead of SELECT *).
    ///
    /// ORDER BY, LIMIT and OFFSET have no effect inside EXISTS and are omitted.
    pub fn build_exists_into(
        &self,
        dialect: Dialect,
        params: &mut Vec<Value>,
        offset: usize,
    ) -> String {
        let mut sql = String::from("SELECT 1");
        self.push_from_where(&mut sql, dialect, params, offset);
        sql
    }

    fn push_from_where(
        &self,
        sql: &mut String,
        dialect: Dialect,
        params: &mut Vec<Value>,
        offset: usize,
    ) {
        // FROM
        sql.push_str(" FROM ");
        sql.push_str(&dialect.quote_identifier(&self.table));
        if let Some(alias) = &self.alias {
            sql.push_str(" AS ");
            sql.push_str(&dialect.quote_identifier(alias));
        }

        // JOINs
        for join in &self.joins {
            sql.push_str(&join.build_with_dialect(dialect, params, offset));
        }

        // WHERE
        if let Some(where_clause) = &self.where_clause {
            let where_sql = where_clause.build_with_dialect(dialect, params, offset);
            sql.push_str(" WHERE ");
            sql.push_str(&where_sql);
        }
    }
}
