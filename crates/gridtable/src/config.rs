//! Table options.
//!
//! Options are plain serde structs so hosts can keep them next to the rest
//! of their configuration and load them from JSON.

use gridtable_core::{ConfigErrorKind, Error, PaginationRack, Result};
use gridtable_query::Dialect;
use serde::{Deserialize, Serialize};

/// Where pagination links are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RackPosition {
    None,
    Top,
    #[default]
    Bottom,
    Both,
}

impl RackPosition {
    pub fn flags(self) -> PaginationRack {
        match self {
            RackPosition::None => PaginationRack::NONE,
            RackPosition::Top => PaginationRack::TOP,
            RackPosition::Bottom => PaginationRack::BOTTOM,
            RackPosition::Both => PaginationRack::TOP | PaginationRack::BOTTOM,
        }
    }
}

/// Per-table options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableOptions {
    /// Initial page size.
    pub rows_per_page: u64,
    /// Page sizes offered to the user.
    pub rows_per_page_options: Vec<u64>,
    pub pagination_rack: RackPosition,
    /// SQL dialect of the storage collaborator.
    pub dialect: Dialect,
    /// Search input debounce, for the UI layer.
    pub search_debounce_ms: u64,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            rows_per_page: 20,
            rows_per_page_options: vec![20, 40, 60, 80, 100],
            pagination_rack: RackPosition::default(),
            dialect: Dialect::default(),
            search_debounce_ms: 500,
        }
    }
}

impl TableOptions {
    /// Parse options from JSON; absent keys take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    #[must_use]
    pub fn rows_per_page(mut self, rows: u64) -> Self {
        self.rows_per_page = rows;
        self
    }

    #[must_use]
    pub fn rows_per_page_options(mut self, options: impl Into<Vec<u64>>) -> Self {
        self.rows_per_page_options = options.into();
        self
    }

    #[must_use]
    pub fn pagination_rack(mut self, rack: RackPosition) -> Self {
        self.pagination_rack = rack;
        self
    }

    #[must_use]
    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// The page size must be non-zero and one of the offered options.
    pub fn validate(&self) -> Result<()> {
        if self.rows_per_page == 0 || self.rows_per_page_options.contains(&0) {
            return Err(Error::config(
                ConfigErrorKind::InvalidOption,
                "page sizes must be greater than zero",
            ));
        }
        if !self.rows_per_page_options.contains(&self.rows_per_page) {
            return Err(Error::config(
                ConfigErrorKind::InvalidOption,
                format!(
                    "rows_per_page {} is not one of {:?}",
                    self.rows_per_page, self.rows_per_page_options
                ),
            ));
        }
        Ok(())
    }

    /// Whether `rows` may be selected by the user.
    pub fn allows_page_size(&self, rows: u64) -> bool {
        rows > 0 && self.rows_per_page_options.contains(&rows)
    }
}
