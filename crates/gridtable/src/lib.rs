//! GridTable - query and state synthesis for server-rendered data tables.
//!
//! GridTable turns a declarative table definition plus the user's
//! interaction state into storage queries, and turns the results into
//! rendered rows, exports and bulk operations:
//!
//! - Column flags, relationship paths and cell rendering
//! - Search, single/multi/date filters and sorting
//! - Pagination with a count query
//! - Select-all-with-exceptions bulk selection and chunked bulk actions
//! - Drag-and-drop renumbering of an ordinal column
//! - Spreadsheet-style export projection
//!
//! # Quick Start
//!
//! ```ignore
//! use gridtable::prelude::*;
//!
//! fn users_page(conn: &impl Connection) -> Result<RenderedPage> {
//!     let definition = TableDefinition::new("UsersTable", "users")
//!         .columns([
//!             Column::new("Name").with_default_settings().default_sort(),
//!             Column::new("Department").field("department.name").sortable(),
//!         ])
//!         .filter(FilterBuilder::new("department.name").as_type(FilterKind::Multi).build())
//!         .date_filter(DateFilterSettings::new("created_at", DateRangePreset::ALL_RANGES));
//!
//!     let schema = StaticSchema::new();
//!     let relationships = StaticRelationships::new().with(
//!         "users",
//!         RelationshipInfo::belongs_to("department", "departments", "department_id", "id"),
//!     );
//!
//!     let mut table = GridTable::mount(definition, &schema, &relationships)?;
//!     table.search("ada");
//!     table.render(conn)
//! }
//! ```

pub mod bulk;
pub mod column;
pub mod config;
pub mod date_range;
pub mod export;
pub mod filter;
pub mod planner;
pub mod registry;
pub mod relation;
pub mod reorder;
pub mod selection;
pub mod sort;
pub mod table;

// Re-export the building blocks from sub-crates
pub use gridtable_core::{
    ColumnSettings, ConfigErrorKind, Connection, DATETIME_FORMAT, DataErrorKind, Error,
    PaginationRack, RelationshipInfo, RelationshipResolver, Result, Row, SchemaColumn,
    SchemaIntrospector, StaticRelationships, StaticSchema, StorageError, UsageErrorKind, Value,
};
pub use gridtable_query::{Dialect, Expr, OrderDirection, SelectQuery, UpdateQuery};

pub use bulk::{BulkAction, BulkActionContext, BulkActionEntry, BulkActionGroup, BulkActionSet};
pub use column::{CellRenderer, Column, HrefTarget, MappedRoute, RouteResolver};
pub use config::{RackPosition, TableOptions};
pub use date_range::{Clock, DateRange, DateRangePreset, FixedClock, SystemClock};
pub use export::{
    CsvExportWriter, ExportArtifact, ExportHandler, ExportProjector, ExportSettings, ExportTable,
    ExportWriter,
};
pub use filter::{
    AppliedFilters, DateFilterSettings, FilterBuilder, FilterChip, FilterDefinition, FilterKind,
    FilterRegistry,
};
pub use planner::{InjectedParams, Page, PlanContext, PlanPurpose, QueryPlanner};
pub use registry::ColumnRegistry;
pub use reorder::{ReorderEvent, ReorderPlan, ReorderingEngine};
pub use selection::{BulkSelectionTracker, ChunkedRows, RowId, SelectionState};
pub use sort::{SortDirection, SortState};
pub use table::{
    ActionColumn, GridTable, HeaderCell, RenderedPage, RenderedRow, Reordering, TableDefinition,
    TableState,
};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::{
        // Table component
        ActionColumn,
        // Bulk actions
        BulkAction,
        BulkActionContext,
        BulkActionGroup,
        BulkActionSet,
        // Columns
        Column,
        ColumnSettings,
        // Core
        Connection,
        CsvExportWriter,
        DateFilterSettings,
        DateRangePreset,
        Dialect,
        Error,
        ExportHandler,
        ExportSettings,
        Expr,
        FilterBuilder,
        FilterKind,
        GridTable,
        MappedRoute,
        RackPosition,
        RelationshipInfo,
        RenderedPage,
        ReorderEvent,
        Reordering,
        Result,
        RouteResolver,
        Row,
        RowId,
        SelectQuery,
        StaticRelationships,
        StaticSchema,
        TableDefinition,
        TableOptions,
        TableState,
        Value,
    };
}
