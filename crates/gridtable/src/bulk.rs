//! Bulk actions offered on the selected rows.

use crate::selection::{ChunkedRows, RowId};
use gridtable_core::{Connection, Result};
use gridtable_query::{Dialect, Expr, SelectQuery};
use std::fmt;
use std::sync::Arc;

/// Callback run when a bulk action is dispatched.
pub type BulkCallback = Arc<dyn Fn(&BulkActionContext<'_>) -> Result<()> + Send + Sync>;

/// One named bulk action.
#[derive(Clone)]
pub struct BulkAction {
    pub name: String,
    pub label: String,
    /// Ask the user before dispatching.
    pub require_confirmation: bool,
    callback: BulkCallback,
}

impl BulkAction {
    pub fn new<F>(name: impl Into<String>, label: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&BulkActionContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            label: label.into(),
            require_confirmation: true,
            callback: Arc::new(callback),
        }
    }

    #[must_use]
    pub fn confirm(mut self, require: bool) -> Self {
        self.require_confirmation = require;
        self
    }

    pub fn run(&self, ctx: &BulkActionContext<'_>) -> Result<()> {
        (self.callback)(ctx)
    }
}

impl fmt::Debug for BulkAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BulkAction")
            .field("name", &self.name)
            .field("label", &self.label)
            .field("require_confirmation", &self.require_confirmation)
            .finish_non_exhaustive()
    }
}

/// A labelled group of actions, rendered as a submenu.
#[derive(Debug, Clone)]
pub struct BulkActionGroup {
    pub label: String,
    pub entries: Vec<BulkActionEntry>,
}

impl BulkActionGroup {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            entries: Vec::new(),
        }
    }

    #[must_use]
    pub fn action(mut self, action: BulkAction) -> Self {
        self.entries.push(BulkActionEntry::Action(action));
        self
    }

    #[must_use]
    pub fn group(mut self, group: BulkActionGroup) -> Self {
        self.entries.push(BulkActionEntry::Group(group));
        self
    }
}

#[derive(Debug, Clone)]
pub enum BulkActionEntry {
    Action(BulkAction),
    Group(BulkActionGroup),
}

/// Top-level bulk action menu.
#[derive(Debug, Clone, Default)]
pub struct BulkActionSet {
    entries: Vec<BulkActionEntry>,
}

impl BulkActionSet {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn action(mut self, action: BulkAction) -> Self {
        self.entries.push(BulkActionEntry::Action(action));
        self
    }

    #[must_use]
    pub fn group(mut self, group: BulkActionGroup) -> Self {
        self.entries.push(BulkActionEntry::Group(group));
        self
    }

    pub fn entries(&self) -> &[BulkActionEntry] {
        &self.entries
    }

    /// Find an action by name, searching groups recursively.
    pub fn find(&self, name: &str) -> Option<&BulkAction> {
        find_in(&self.entries, name)
    }
}

fn find_in<'a>(entries: &'a [BulkActionEntry], name: &str) -> Option<&'a BulkAction> {
    entries.iter().find_map(|entry| match entry {
        BulkActionEntry::Action(action) if action.name == name => Some(action),
        BulkActionEntry::Action(_) => None,
        BulkActionEntry::Group(group) => find_in(&group.entries, name),
    })
}

/// What a bulk action callback can see: the selected rows' query.
pub struct BulkActionContext<'a> {
    conn: &'a dyn Connection,
    query: SelectQuery,
    primary_key: Expr,
    key_name: String,
    dialect: Dialect,
}

impl<'a> BulkActionContext<'a> {
    pub fn new(
        conn: &'a dyn Connection,
        query: SelectQuery,
        primary_key: Expr,
        key_name: impl Into<String>,
        dialect: Dialect,
    ) -> Self {
        Self {
            conn,
            query,
            primary_key,
            key_name: key_name.into(),
            dialect,
        }
    }

    /// The unpaged query restricted to the selection.
    pub fn query(&self) -> &SelectQuery {
        &self.query
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn connection(&self) -> &'a dyn Connection {
        self.conn
    }

    /// Selected rows, fetched lazily in chunks of `chunk` (all at once if `None`).
    pub fn selected_rows(&self, chunk: Option<u64>) -> ChunkedRows<'a, dyn Connection + 'a> {
        ChunkedRows::new(
            self.conn,
            self.query.clone(),
            self.primary_key.clone(),
            self.key_name.clone(),
            self.dialect,
            chunk,
        )
    }

    /// Selected row ids, fetched lazily.
    pub fn selected_ids(&self, chunk: Option<u64>) -> impl Iterator<Item = Result<RowId>> + 'a {
        self.selected_rows(chunk).ids()
    }
}

impl fmt::Debug for BulkActionContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BulkActionContext")
            .field("table", &self.query.table)
            .field("key_name", &self.key_name)
            .field("dialect", &self.dialect)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &BulkActionContext<'_>) -> Result<()> {
        Ok(())
    }

    #[test]
    fn test_find_walks_groups() {
        let set = BulkActionSet::new()
            .action(BulkAction::new("delete", "Delete", noop))
            .group(
                BulkActionGroup::new("Status").group(
                    BulkActionGroup::new("Advanced")
                        .action(BulkAction::new("archive", "Archive", noop).confirm(false)),
                ),
            );

        assert_eq!(set.find("delete").unwrap().label, "Delete");
        let archive = set.find("archive").unwrap();
        assert!(!archive.require_confirmation);
        assert!(set.find("missing").is_none());
    }

    #[test]
    fn test_actions_require_confirmation_by_default() {
        let action = BulkAction::new("delete", "Delete", noop);
        assert!(action.require_confirmation);
    }
}
