//! Drag-and-drop renumbering of an ordinal column.

use crate::selection::RowId;
use gridtable_core::{Connection, DataErrorKind, Error, Result, Row, Value};
use gridtable_query::{Dialect, Expr, Projection, SelectQuery, UpdateQuery};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// A drop reported by the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderEvent {
    pub moved_id: RowId,
    /// Row the moved row was dropped next to.
    pub sibling_id: RowId,
    pub sibling_is_last: bool,
}

/// Rows in `[from, to]` move by `delta`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShiftRange {
    pub from: i64,
    pub to: i64,
    pub delta: i64,
}

/// Position change of the moved row and the rows it displaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReorderPlan {
    pub old_position: i64,
    pub new_position: i64,
    pub shift: Option<ShiftRange>,
}

impl ReorderPlan {
    /// Compute the move from the moved row's position and its sibling's.
    ///
    /// Moving down next to a sibling that is not last lands one slot
    /// before the sibling's position.
    pub fn compute(old_position: i64, reference_position: i64, sibling_is_last: bool) -> Self {
        let new_position = if !sibling_is_last && old_position < reference_position {
            reference_position - 1
        } else {
            reference_position
        };

        let shift = match new_position.cmp(&old_position) {
            std::cmp::Ordering::Less => Some(ShiftRange {
                from: new_position,
                to: old_position - 1,
                delta: 1,
            }),
            std::cmp::Ordering::Greater => Some(ShiftRange {
                from: old_position + 1,
                to: new_position,
                delta: -1,
            }),
            std::cmp::Ordering::Equal => None,
        };

        Self {
            old_position,
            new_position,
            shift,
        }
    }
}

/// Host override for renumbering; returning `true` skips the default updates.
pub type OnReorder = Arc<dyn Fn(&ReorderPlan, &Row) -> Result<bool> + Send + Sync>;

/// Applies drops to the ordinal column of one table.
#[derive(Clone)]
pub struct ReorderingEngine {
    table: String,
    primary_key: String,
    column: String,
    dialect: Dialect,
    on_reorder: Option<OnReorder>,
}

impl ReorderingEngine {
    pub fn new(
        table: impl Into<String>,
        primary_key: impl Into<String>,
        column: impl Into<String>,
        dialect: Dialect,
    ) -> Self {
        Self {
            table: table.into(),
            primary_key: primary_key.into(),
            column: column.into(),
            dialect,
            on_reorder: None,
        }
    }

    #[must_use]
    pub fn on_reorder(mut self, callback: Option<OnReorder>) -> Self {
        self.on_reorder = callback;
        self
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    /// Load both rows, compute the move and commit the renumbering.
    ///
    /// A missing row aborts before anything is written.
    #[tracing::instrument(level = "debug", skip(self, conn), fields(table = %self.table))]
    pub fn apply<C: Connection + ?Sized>(
        &self,
        conn: &C,
        event: &ReorderEvent,
    ) -> Result<ReorderPlan> {
        let rows = self.load(conn, event)?;
        let moved = self.find(&rows, &event.moved_id)?;
        let sibling = self.find(&rows, &event.sibling_id)?;

        let plan = ReorderPlan::compute(
            self.position(moved)?,
            self.position(sibling)?,
            event.sibling_is_last,
        );

        if let Some(callback) = &self.on_reorder {
            if callback(&plan, moved)? {
                info!(
                    table = %self.table,
                    moved = %event.moved_id,
                    "reorder handled by host callback"
                );
                return Ok(plan);
            }
        }

        let statements = self.statements(&event.moved_id, &plan);
        conn.execute_all(&statements)?;

        info!(
            table = %self.table,
            moved = %event.moved_id,
            old = plan.old_position,
            new = plan.new_position,
            "reordered row"
        );
        Ok(plan)
    }

    /// UPDATE statements for `plan`: the moved row first, then the shift.
    pub fn statements(&self, moved_id: &RowId, plan: &ReorderPlan) -> Vec<(String, Vec<Value>)> {
        let mut statements = vec![
            UpdateQuery::new(&self.table)
                .set(&self.column, plan.new_position)
                .filter(Expr::col(&self.primary_key).eq(moved_id.to_value()))
                .build_with_dialect(self.dialect),
        ];

        if let Some(shift) = plan.shift {
            statements.push(
                UpdateQuery::new(&self.table)
                    .set(&self.column, Expr::col(&self.column).add(shift.delta))
                    .filter(Expr::col(&self.column).between(shift.from, shift.to))
                    .filter(Expr::col(&self.primary_key).ne(moved_id.to_value()))
                    .build_with_dialect(self.dialect),
            );
        }
        statements
    }

    fn load<C: Connection + ?Sized>(&self, conn: &C, event: &ReorderEvent) -> Result<Vec<Row>> {
        let query = SelectQuery::new(&self.table)
            .select(Projection::Column {
                table: self.table.clone(),
                name: self.primary_key.clone(),
                alias: None,
            })
            .select(Projection::Column {
                table: self.table.clone(),
                name: self.column.clone(),
                alias: None,
            })
            .filter(
                Expr::qualified(&self.table, &self.primary_key)
                    .in_list(vec![event.moved_id.to_value(), event.sibling_id.to_value()]),
            );
        let (sql, params) = query.build_with_dialect(self.dialect);
        conn.query(&sql, &params)
    }

    fn find<'r>(&self, rows: &'r [Row], id: &RowId) -> Result<&'r Row> {
        rows.iter()
            .find(|row| {
                row.get_by_name(&self.primary_key)
                    .and_then(RowId::from_value)
                    .as_ref()
                    == Some(id)
            })
            .ok_or_else(|| {
                Error::data(
                    DataErrorKind::RowNotFound,
                    format!("row {id} not found in '{}'", self.table),
                )
            })
    }

    fn position(&self, row: &Row) -> Result<i64> {
        row.require(&self.column)?.as_i64().ok_or_else(|| {
            Error::data(
                DataErrorKind::UnexpectedValue,
                format!("'{}' is not an integer position", self.column),
            )
        })
    }
}

impl fmt::Debug for ReorderingEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReorderingEngine")
            .field("table", &self.table)
            .field("primary_key", &self.primary_key)
            .field("column", &self.column)
            .field("dialect", &self.dialect)
            .field("on_reorder", &self.on_reorder.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_move_up_before_sibling() {
        let plan = ReorderPlan::compute(5, 2, false);
        assert_eq!(plan.new_position, 2);
        assert_eq!(
            plan.shift,
            Some(ShiftRange {
                from: 2,
                to: 4,
                delta: 1
            })
        );
    }

    #[test]
    fn test_move_down_before_sibling() {
        let plan = ReorderPlan::compute(2, 5, false);
        assert_eq!(plan.new_position, 4);
        assert_eq!(
            plan.shift,
            Some(ShiftRange {
                from: 3,
                to: 4,
                delta: -1
            })
        );
    }

    #[test]
    fn test_move_down_after_last_sibling() {
        let plan = ReorderPlan::compute(2, 5, true);
        assert_eq!(plan.new_position, 5);
        assert_eq!(
            plan.shift,
            Some(ShiftRange {
                from: 3,
                to: 5,
                delta: -1
            })
        );
    }

    #[test]
    fn test_drop_in_place_shifts_nothing() {
        let plan = ReorderPlan::compute(3, 4, false);
        assert_eq!(plan.new_position, 3);
        assert_eq!(plan.shift, None);
    }

    #[test]
    fn test_statements() {
        let engine = ReorderingEngine::new("tasks", "id", "order", Dialect::Sqlite);
        let plan = ReorderPlan::compute(5, 2, false);
        let statements = engine.statements(&RowId::Int(9), &plan);
        assert_eq!(statements.len(), 2);
        assert_eq!(
            statements[0].0,
            "UPDATE \"tasks\" SET \"order\" = ?1 WHERE \"id\" = ?2"
        );
        assert_eq!(statements[0].1, vec![Value::BigInt(2), Value::BigInt(9)]);
        assert_eq!(
            statements[1].0,
            "UPDATE \"tasks\" SET \"order\" = \"order\" + ?1 \
             WHERE \"order\" BETWEEN ?2 AND ?3 AND \"id\" <> ?4"
        );
        assert_eq!(
            statements[1].1,
            vec![
                Value::BigInt(1),
                Value::BigInt(2),
                Value::BigInt(4),
                Value::BigInt(9)
            ]
        );
    }
}
