//! Ordered column registry.

use crate::column::Column;
use convert_case::{Case, Casing};
use gridtable_core::{ColumnSettings, ConfigErrorKind, Error, Result, SchemaColumn};

/// Suffix that marks a physical column as a foreign key.
const FOREIGN_KEY_SUFFIX: &str = "_id";

/// Columns in declaration order, each with a stable index.
#[derive(Debug, Clone, Default)]
pub struct ColumnRegistry {
    columns: Vec<Column>,
}

impl ColumnRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a batch of columns in order.
    pub fn from_columns(columns: impl IntoIterator<Item = Column>) -> Result<Self> {
        let mut registry = Self::new();
        for column in columns {
            registry.add(column)?;
        }
        Ok(registry)
    }

    /// Zero-configuration columns synthesized from a table's schema.
    ///
    /// Foreign-key columns are skipped; every other column gets a humanized
    /// title and SORTABLE, and the first one also gets DEFAULT_SORT.
    pub fn from_schema(schema: &[SchemaColumn]) -> Result<Self> {
        let mut registry = Self::new();
        for physical in schema
            .iter()
            .filter(|c| !c.name.ends_with(FOREIGN_KEY_SUFFIX))
        {
            let mut settings = ColumnSettings::EXPORTABLE | ColumnSettings::SORTABLE;
            if registry.is_empty() {
                settings |= ColumnSettings::DEFAULT_SORT;
            }
            let column = Column::new(physical.name.to_case(Case::Title))
                .field(physical.name.clone())
                .with_settings(settings);
            registry.add(column)?;
        }
        Ok(registry)
    }

    /// Append a column and return its index.
    ///
    /// Rejects a column whose result alias is already taken. Visible
    /// default-sort columns are made SORTABLE.
    pub fn add(&mut self, mut column: Column) -> Result<usize> {
        let alias = column.alias();
        if let Some(existing) = self
            .columns
            .iter()
            .find(|c| !c.is_empty_column() && c.alias() == alias)
        {
            return Err(Error::config(
                ConfigErrorKind::AliasCollision,
                format!(
                    "columns '{}' and '{}' both resolve to result alias '{}'",
                    existing.title(),
                    column.title(),
                    alias
                ),
            ));
        }

        if column.settings().has_default_sort() && !column.is_hidden() {
            column.settings_mut().insert(ColumnSettings::SORTABLE);
        }

        let index = self.columns.len();
        column.index = index;
        self.columns.push(column);
        Ok(index)
    }

    /// Column at `index`, or `None` when out of range.
    pub fn at(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    /// First column reading `field`.
    pub fn find_by_source_field(&self, field: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.source_field() == field)
    }

    /// First column (in registry order) carrying a default-sort flag.
    pub fn default_sort_column(&self) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| c.settings().has_default_sort())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Source fields of every SEARCHABLE column.
    pub fn searchable_fields(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.is_searchable() && !c.is_empty_column())
            .map(|c| c.source_field().to_string())
            .collect()
    }
}
