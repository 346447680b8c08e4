//! Explicit sort state and the click toggle cycle.

use gridtable_query::OrderDirection;
use serde::{Deserialize, Serialize};

/// Direction of an explicit column sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Unset,
    Asc,
    Desc,
}

impl SortDirection {
    /// Next direction on click: `unset | asc -> desc`, `desc -> asc`.
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            SortDirection::Unset | SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }

    /// SQL direction, `None` when unset.
    pub const fn to_order(self) -> Option<OrderDirection> {
        match self {
            SortDirection::Unset => None,
            SortDirection::Asc => Some(OrderDirection::Asc),
            SortDirection::Desc => Some(OrderDirection::Desc),
        }
    }
}

/// The user's explicit sort plus the reorder-mode lock.
///
/// An explicit click and reorder mode override each other: entering
/// reorder mode drops the explicit column, and clicking a column releases
/// the reorder lock.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SortState {
    pub column: Option<String>,
    pub direction: SortDirection,
    pub reorder_lock: bool,
}

impl SortState {
    /// Apply a header click on `column` (a source field or relationship path).
    pub fn click(&mut self, column: &str) {
        if self.column.as_deref() == Some(column) {
            self.direction = self.direction.toggled();
        } else {
            self.column = Some(column.to_string());
            self.direction = SortDirection::Unset.toggled();
        }
        self.reorder_lock = false;
    }

    /// Enter or leave reorder mode.
    pub fn set_reorder_lock(&mut self, locked: bool) {
        self.reorder_lock = locked;
        if locked {
            self.column = None;
            self.direction = SortDirection::Unset;
        }
    }

    /// The explicit column and direction, if one has been chosen.
    pub fn explicit(&self) -> Option<(&str, OrderDirection)> {
        let direction = self.direction.to_order()?;
        self.column.as_deref().map(|c| (c, direction))
    }

    /// Whether the user has clicked any column.
    pub fn is_explicit(&self) -> bool {
        self.explicit().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_cycle() {
        assert_eq!(SortDirection::Unset.toggled(), SortDirection::Desc);
        assert_eq!(SortDirection::Desc.toggled(), SortDirection::Asc);
        assert_eq!(SortDirection::Asc.toggled(), SortDirection::Desc);
    }

    #[test]
    fn test_click_same_and_new_column() {
        let mut sort = SortState::default();
        assert!(!sort.is_explicit());

        sort.click("name");
        assert_eq!(sort.explicit(), Some(("name", OrderDirection::Desc)));
        sort.click("name");
        assert_eq!(sort.explicit(), Some(("name", OrderDirection::Asc)));
        sort.click("name");
        assert_eq!(sort.explicit(), Some(("name", OrderDirection::Desc)));

        sort.click("dept.name");
        assert_eq!(sort.explicit(), Some(("dept.name", OrderDirection::Desc)));
    }

    #[test]
    fn test_reorder_lock_and_click_override_each_other() {
        let mut sort = SortState::default();
        sort.click("name");
        sort.set_reorder_lock(true);
        assert!(sort.reorder_lock);
        assert!(!sort.is_explicit());

        sort.click("email");
        assert!(!sort.reorder_lock);
        assert_eq!(sort.explicit(), Some(("email", OrderDirection::Desc)));
    }
}
