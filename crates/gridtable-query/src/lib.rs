//! Dialect-aware SQL builder for GridTable.
//!
//! `gridtable-query` turns planner decisions into SQL text plus bound
//! parameters:
//!
//! - [`Expr`] for predicates, arithmetic and `EXISTS` subqueries
//! - [`SelectQuery`] for row, count and existence queries
//! - [`UpdateQuery`] for renumbering statements
//! - [`Dialect`] for placeholder and identifier quoting rules
//!
//! Parameters are collected into one shared list while building, so nested
//! subqueries never need placeholder renumbering.

pub mod clause;
pub mod expr;
pub mod join;
pub mod select;
pub mod update;

pub use clause::{Limit, Offset, OrderBy, OrderDirection, Where};
pub use expr::{BinaryOp, Dialect, Expr};
pub use join::{Join, JoinType};
pub use select::{Projection, SelectQuery};
pub use update::UpdateQuery;
