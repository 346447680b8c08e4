//! SQL clause types (WHERE, ORDER BY, LIMIT, OFFSET).

use crate::expr::{Dialect, Expr};
use gridtable_core::Value;

/// WHERE clause.
#[derive(Debug, Clone)]
pub struct Where {
    expr: Expr,
}

impl Where {
    /// Create a new WHERE clause with the given expression.
    pub fn new(expr: Expr) -> Self {
        Self { expr }
    }

    /// Add an AND condition.
    pub fn and(self, expr: Expr) -> Self {
        Self {
            expr: self.expr.and(expr),
        }
    }

    /// Borrow the combined expression.
    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Build the WHERE clause into a shared parameter list.
    pub fn build_with_dialect(
        &self,
        dialect: Dialect,
        params: &mut Vec<Value>,
        offset: usize,
    ) -> String {
        self.expr.build_with_dialect(dialect, params, offset)
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

impl OrderDirection {
    /// SQL keyword for this direction.
    pub const fn as_str(self) -> &'static str {
        match self {
            OrderDirection::Asc => "ASC",
            OrderDirection::Desc => "DESC",
        }
    }
}

/// ORDER BY term.
#[derive(Debug, Clone)]
pub struct OrderBy {
    pub expr: Expr,
    pub direction: OrderDirection,
}

impl OrderBy {
    /// Create an ORDER BY term.
    pub fn new(expr: Expr, direction: OrderDirection) -> Self {
        Self { expr, direction }
    }

    /// Generate SQL for this ORDER BY term.
    pub fn build(&self, dialect: Dialect, params: &mut Vec<Value>, offset: usize) -> String {
        let expr_sql = self.expr.build_with_dialect(dialect, params, offset);
        format!("{expr_sql} {}", self.direction.as_str())
    }
}

/// LIMIT clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit(pub u64);

/// OFFSET clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Offset(pub u64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_where_and_chains() {
        let clause = Where::new(Expr::col("a").eq(1)).and(Expr::col("b").eq(2));
        let mut params = Vec::new();
        let sql = clause.build_with_dialect(Dialect::Postgres, &mut params, 0);
        assert_eq!(sql, "\"a\" = $1 AND \"b\" = $2");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_order_by_sql() {
        let mut params = Vec::new();
        let asc = Expr::qualified("users", "name").asc();
        assert_eq!(
            asc.build(Dialect::Sqlite, &mut params, 0),
            "\"users\".\"name\" ASC"
        );
        let desc = Expr::col("id").desc();
        assert_eq!(desc.build(Dialect::Postgres, &mut params, 0), "\"id\" DESC");
    }
}
