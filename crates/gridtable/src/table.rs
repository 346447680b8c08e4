//! Table definitions and the live component.
//!
//! A [`TableDefinition`] is what a host declares: columns (or none, to
//! synthesize them from the schema), filters, and the optional
//! capabilities it supports. [`GridTable::mount`] validates it once and
//! yields the component that handles interactions and renders pages.

use crate::bulk::{BulkActionContext, BulkActionSet};
use crate::column::{Column, RouteResolver};
use crate::config::TableOptions;
use crate::date_range::{Clock, SystemClock};
use crate::export::{ExportArtifact, ExportHandler, ExportProjector};
use crate::filter::{
    AppliedFilters, DateFilterSettings, FilterChip, FilterDefinition, FilterKind, FilterRegistry,
};
use crate::planner::{InjectedParams, PlanContext, PlanPurpose, QueryHook, QueryPlanner};
use crate::registry::ColumnRegistry;
use crate::reorder::{OnReorder, ReorderEvent, ReorderPlan, ReorderingEngine};
use crate::selection::{BulkSelectionTracker, RowId, SelectionState};
use crate::sort::{SortDirection, SortState};
use chrono::NaiveDateTime;
use gridtable_core::{
    ColumnSettings, ConfigErrorKind, Connection, Error, PaginationRack, RelationshipResolver,
    Result, Row, SchemaIntrospector, UsageErrorKind,
};
use gridtable_query::SelectQuery;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Default ordinal column for drag-and-drop reordering.
pub const DEFAULT_REORDER_COLUMN: &str = "order";

/// Renders the action cell of a row.
pub type ActionView = Arc<dyn Fn(&Row) -> String + Send + Sync>;

/// Per-row action controls.
#[derive(Clone)]
pub struct ActionColumn {
    /// Position among the visible columns; `None` renders it last.
    pub index: Option<usize>,
    view: ActionView,
}

impl ActionColumn {
    pub fn new<F>(view: F) -> Self
    where
        F: Fn(&Row) -> String + Send + Sync + 'static,
    {
        Self {
            index: None,
            view: Arc::new(view),
        }
    }

    #[must_use]
    pub fn at(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    pub fn render(&self, row: &Row) -> String {
        (self.view)(row)
    }
}

/// Drag-and-drop reordering capability.
#[derive(Clone)]
pub struct Reordering {
    pub column: String,
    pub on_reorder: Option<OnReorder>,
}

impl Default for Reordering {
    fn default() -> Self {
        Self {
            column: DEFAULT_REORDER_COLUMN.to_string(),
            on_reorder: None,
        }
    }
}

impl Reordering {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = column.into();
        self
    }

    /// Host callback; returning `true` suppresses the default renumbering.
    #[must_use]
    pub fn on_reorder<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ReorderPlan, &Row) -> Result<bool> + Send + Sync + 'static,
    {
        self.on_reorder = Some(Arc::new(callback));
        self
    }
}

/// A host's declarative table description.
///
/// Every capability is an optional field; the component branches on which
/// ones are present.
#[derive(Clone)]
pub struct TableDefinition {
    pub name: String,
    pub table: String,
    pub primary_key: String,
    /// Declared columns; `None` synthesizes them from the schema.
    pub columns: Option<Vec<Column>>,
    pub single_filters: Vec<FilterDefinition>,
    pub multi_filters: Vec<FilterDefinition>,
    pub date_filter: Option<DateFilterSettings>,
    pub action_column: Option<ActionColumn>,
    pub reordering: Option<Reordering>,
    pub export: Option<ExportHandler>,
    pub bulk_actions: Option<BulkActionSet>,
    pub on_query: Option<QueryHook>,
    pub routes: Option<Arc<dyn RouteResolver>>,
    pub loading_indicator: bool,
    pub options: TableOptions,
}

impl TableDefinition {
    /// A definition named `name` over `table`, keyed by `id`.
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            primary_key: "id".to_string(),
            columns: None,
            single_filters: Vec::new(),
            multi_filters: Vec::new(),
            date_filter: None,
            action_column: None,
            reordering: None,
            export: None,
            bulk_actions: None,
            on_query: None,
            routes: None,
            loading_indicator: false,
            options: TableOptions::default(),
        }
    }

    #[must_use]
    pub fn primary_key(mut self, key: impl Into<String>) -> Self {
        self.primary_key = key.into();
        self
    }

    #[must_use]
    pub fn columns(mut self, columns: impl IntoIterator<Item = Column>) -> Self {
        self.columns = Some(columns.into_iter().collect());
        self
    }

    /// Add a filter; its kind decides whether it is single or multi selection.
    #[must_use]
    pub fn filter(mut self, filter: FilterDefinition) -> Self {
        match filter.kind {
            FilterKind::Multi => self.multi_filters.push(filter),
            _ => self.single_filters.push(filter),
        }
        self
    }

    #[must_use]
    pub fn date_filter(mut self, settings: DateFilterSettings) -> Self {
        self.date_filter = Some(settings);
        self
    }

    #[must_use]
    pub fn action_column(mut self, column: ActionColumn) -> Self {
        self.action_column = Some(column);
        self
    }

    #[must_use]
    pub fn reordering(mut self, reordering: Reordering) -> Self {
        self.reordering = Some(reordering);
        self
    }

    #[must_use]
    pub fn export(mut self, handler: ExportHandler) -> Self {
        self.export = Some(handler);
        self
    }

    #[must_use]
    pub fn bulk_actions(mut self, actions: BulkActionSet) -> Self {
        self.bulk_actions = Some(actions);
        self
    }

    /// Customize the query after search and filters are applied.
    #[must_use]
    pub fn on_query<F>(mut self, hook: F) -> Self
    where
        F: Fn(SelectQuery, &InjectedParams) -> SelectQuery + Send + Sync + 'static,
    {
        self.on_query = Some(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn routes(mut self, resolver: impl RouteResolver + 'static) -> Self {
        self.routes = Some(Arc::new(resolver));
        self
    }

    #[must_use]
    pub fn loading_indicator(mut self, custom: bool) -> Self {
        self.loading_indicator = custom;
        self
    }

    #[must_use]
    pub fn options(mut self, options: TableOptions) -> Self {
        self.options = options;
        self
    }
}

impl fmt::Debug for TableDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableDefinition")
            .field("name", &self.name)
            .field("table", &self.table)
            .field("primary_key", &self.primary_key)
            .field("columns", &self.columns)
            .field("single_filters", &self.single_filters.len())
            .field("multi_filters", &self.multi_filters.len())
            .field("date_filter", &self.date_filter)
            .field("action_column", &self.action_column.is_some())
            .field("reordering", &self.reordering.as_ref().map(|r| &r.column))
            .field("export", &self.export)
            .field("bulk_actions", &self.bulk_actions.is_some())
            .field("on_query", &self.on_query.is_some())
            .field("routes", &self.routes.is_some())
            .field("loading_indicator", &self.loading_indicator)
            .field("options", &self.options)
            .finish()
    }
}

// ==================== Component state ====================

/// Everything a host persists between round trips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableState {
    pub sort: SortState,
    pub search: String,
    pub search_columns: Vec<String>,
    pub filters: AppliedFilters,
    pub selection: SelectionState,
    pub page: u64,
    pub rows_per_page: u64,
    pub reordering: bool,
    pub injected: InjectedParams,
}

impl Default for TableState {
    fn default() -> Self {
        Self {
            sort: SortState::default(),
            search: String::new(),
            search_columns: Vec::new(),
            filters: AppliedFilters::default(),
            selection: SelectionState::default(),
            page: 1,
            rows_per_page: TableOptions::default().rows_per_page,
            reordering: false,
            injected: InjectedParams::new(),
        }
    }
}

/// Header cell of a visible column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderCell {
    pub title: String,
    pub field: String,
    pub sortable: bool,
    /// Direction when this column holds the explicit sort.
    pub sorted: Option<SortDirection>,
    pub toggle_visibility: bool,
}

/// One rendered row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedRow {
    pub id: Option<RowId>,
    pub cells: Vec<String>,
    pub checked: bool,
    pub actions: Option<String>,
}

/// One rendered page of the grid.
#[derive(Debug, Clone, Serialize)]
pub struct RenderedPage {
    pub headers: Vec<HeaderCell>,
    pub rows: Vec<RenderedRow>,
    pub total: u64,
    pub current_page: u64,
    pub last_page: u64,
    pub per_page: u64,
    pub filters: Vec<FilterChip>,
    /// Position of the action column among the visible columns.
    pub action_index: Option<usize>,
    #[serde(skip)]
    pub pagination: PaginationRack,
    pub reordering: bool,
}

// ==================== Component ====================

/// A mounted table component.
pub struct GridTable {
    id: Uuid,
    page_name: String,
    definition: TableDefinition,
    planner: QueryPlanner,
    filters: FilterRegistry,
    selection: BulkSelectionTracker,
    reorderer: Option<ReorderingEngine>,
    exporter: Option<ExportProjector>,
    sort: SortState,
    search: String,
    search_columns: Vec<String>,
    page: u64,
    rows_per_page: u64,
    reordering: bool,
    injected: InjectedParams,
    clock: Arc<dyn Clock>,
}

impl GridTable {
    /// Validate `definition` and build the component.
    ///
    /// Every configuration problem surfaces here: invalid options, an
    /// unresolvable relationship path, colliding aliases, a route without a
    /// resolver, or a table with no columns at all.
    #[tracing::instrument(level = "debug", skip_all, fields(table = %definition.table))]
    pub fn mount(
        definition: TableDefinition,
        schema: &dyn SchemaIntrospector,
        relationships: &dyn RelationshipResolver,
    ) -> Result<Self> {
        definition.options.validate()?;
        if definition.table.is_empty() || definition.primary_key.is_empty() {
            return Err(Error::config(
                ConfigErrorKind::MissingSetting,
                "table definitions need a table and a primary key",
            ));
        }

        let (columns, synthesized) = match definition.columns.as_ref().filter(|c| !c.is_empty()) {
            Some(declared) => (ColumnRegistry::from_columns(declared.iter().cloned())?, false),
            None => {
                let physical = schema.columns_of(&definition.table)?;
                if physical.is_empty() {
                    return Err(Error::config(
                        ConfigErrorKind::MissingSetting,
                        format!("no columns declared and none found for '{}'", definition.table),
                    ));
                }
                (ColumnRegistry::from_schema(&physical)?, true)
            }
        };

        if definition.routes.is_none() {
            if let Some(column) = columns
                .iter()
                .find(|c| c.mapped_route().is_some_and(|r| !r.params.is_empty()))
            {
                return Err(Error::config(
                    ConfigErrorKind::MissingSetting,
                    format!(
                        "column '{}' links to a route but no route resolver is set",
                        column.title()
                    ),
                ));
            }
        }

        let visible = columns.iter().filter(|c| !c.is_hidden()).count();
        if let Some(index) = definition.action_column.as_ref().and_then(|a| a.index) {
            if index > visible {
                return Err(Error::config(
                    ConfigErrorKind::InvalidOption,
                    format!("action column index {index} is past the {visible} visible columns"),
                ));
            }
        }

        let filters = FilterRegistry::new(
            definition.single_filters.clone(),
            definition.multi_filters.clone(),
            definition.date_filter.clone(),
        )?;

        if filters.columns().any(str::is_empty) {
            return Err(Error::config(
                ConfigErrorKind::MissingSetting,
                "a filter is declared without a column",
            ));
        }

        let dialect = definition.options.dialect;
        let planner = QueryPlanner::new(
            &definition.table,
            &definition.primary_key,
            columns,
            &filters,
            relationships,
            dialect,
        )?
        .with_hook(definition.on_query.clone());

        let reorderer = match &definition.reordering {
            Some(reordering) if reordering.column.is_empty() => {
                return Err(Error::config(
                    ConfigErrorKind::MissingSetting,
                    "reordering needs an ordering column",
                ));
            }
            Some(reordering) => Some(
                ReorderingEngine::new(
                    &definition.table,
                    &definition.primary_key,
                    &reordering.column,
                    dialect,
                )
                .on_reorder(reordering.on_reorder.clone()),
            ),
            None => None,
        };
        planner.ensure_distinct_aliases(reorderer.as_ref().map(ReorderingEngine::column))?;

        let exporter = definition
            .export
            .as_ref()
            .map(|handler| ExportProjector::new(handler.settings.clone()))
            .transpose()?;

        let search_columns = planner.columns().searchable_fields();
        let rows_per_page = definition.options.rows_per_page;
        let page_name = definition.name.to_lowercase();

        debug!(
            table = %definition.table,
            columns = planner.columns().len(),
            synthesized,
            "mounted table"
        );

        Ok(Self {
            id: Uuid::new_v4(),
            page_name,
            definition,
            planner,
            filters,
            selection: BulkSelectionTracker::new(),
            reorderer,
            exporter,
            sort: SortState::default(),
            search: String::new(),
            search_columns,
            page: 1,
            rows_per_page,
            reordering: false,
            injected: InjectedParams::new(),
            clock: Arc::new(SystemClock),
        })
    }

    /// Use `clock` for date-range resolution.
    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    // ==================== Accessors ====================

    /// Instance id, unique per mount.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Pagination query-string key.
    pub fn page_name(&self) -> &str {
        &self.page_name
    }

    pub fn definition(&self) -> &TableDefinition {
        &self.definition
    }

    pub fn columns(&self) -> &ColumnRegistry {
        self.planner.columns()
    }

    pub fn planner(&self) -> &QueryPlanner {
        &self.planner
    }

    pub fn filters(&self) -> &FilterRegistry {
        &self.filters
    }

    pub fn selection(&self) -> &BulkSelectionTracker {
        &self.selection
    }

    pub fn sort(&self) -> &SortState {
        &self.sort
    }

    pub fn search_keyword(&self) -> &str {
        &self.search
    }

    pub fn search_columns(&self) -> &[String] {
        &self.search_columns
    }

    pub fn current_page(&self) -> u64 {
        self.page
    }

    pub fn rows_per_page(&self) -> u64 {
        self.rows_per_page
    }

    pub fn is_reordering(&self) -> bool {
        self.reordering
    }

    pub fn injected(&self) -> &InjectedParams {
        &self.injected
    }

    pub fn pagination_rack(&self) -> PaginationRack {
        self.definition.options.pagination_rack.flags()
    }

    pub fn has_custom_loading_indicator(&self) -> bool {
        self.definition.loading_indicator
    }

    pub fn bulk_actions(&self) -> Option<&BulkActionSet> {
        self.definition.bulk_actions.as_ref()
    }

    /// Position of the action column among the visible columns.
    pub fn action_index(&self) -> Option<usize> {
        let action = self.definition.action_column.as_ref()?;
        let visible = self.columns().iter().filter(|c| !c.is_hidden()).count();
        Some(action.index.unwrap_or(visible))
    }

    fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    fn context(&self, now: NaiveDateTime) -> PlanContext<'_> {
        PlanContext {
            search: Some(self.search.as_str()),
            search_columns: &self.search_columns,
            filters: &self.filters,
            sort: &self.sort,
            reorder_column: self.reorderer.as_ref().map(ReorderingEngine::column),
            now,
            injected: &self.injected,
        }
    }

    fn reset_page(&mut self) {
        self.page = 1;
    }

    // ==================== Interactions ====================

    /// Header click on the column reading `field`.
    ///
    /// Clicks on non-sortable columns are ignored.
    pub fn sort_by(&mut self, field: &str) -> Result<()> {
        let column = self.planner.columns().find_by_source_field(field).ok_or_else(|| {
            Error::usage(
                UsageErrorKind::UnknownColumn,
                format!("no column reads '{field}'"),
            )
        })?;
        if !column.is_sortable() {
            warn!(
                table = %self.definition.table,
                column = %field,
                "ignoring sort on a non-sortable column"
            );
            return Ok(());
        }
        self.sort.click(field);
        self.reordering = false;
        Ok(())
    }

    pub fn search(&mut self, keyword: impl Into<String>) {
        self.search = keyword.into();
        self.reset_page();
    }

    /// Choose which searchable columns the keyword is matched against.
    ///
    /// An empty choice clears the search.
    pub fn set_search_columns<I, S>(&mut self, fields: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        for field in &fields {
            let searchable = self
                .planner
                .columns()
                .find_by_source_field(field)
                .is_some_and(Column::is_searchable);
            if !searchable {
                return Err(Error::usage(
                    UsageErrorKind::UnknownColumn,
                    format!("'{field}' is not a searchable column"),
                ));
            }
        }
        if fields.is_empty() {
            self.clear_search();
        } else {
            self.search_columns = fields;
            self.reset_page();
        }
        Ok(())
    }

    /// Drop the keyword and search every searchable column again.
    pub fn clear_search(&mut self) {
        self.search.clear();
        self.search_columns = self.planner.columns().searchable_fields();
        self.reset_page();
    }

    pub fn set_rows_per_page(&mut self, rows: u64) -> Result<()> {
        if !self.definition.options.allows_page_size(rows) {
            return Err(Error::usage(
                UsageErrorKind::InvalidPage,
                format!(
                    "{rows} rows per page is not one of {:?}",
                    self.definition.options.rows_per_page_options
                ),
            ));
        }
        self.rows_per_page = rows;
        self.reset_page();
        Ok(())
    }

    pub fn go_to_page(&mut self, page: u64) -> Result<()> {
        if page == 0 {
            return Err(Error::usage(UsageErrorKind::InvalidPage, "pages start at 1"));
        }
        self.page = page;
        Ok(())
    }

    pub fn apply_single_filter_json(&mut self, payload: &str) -> Result<()> {
        self.filters.apply_single_json(payload)?;
        self.reset_page();
        Ok(())
    }

    pub fn add_multi_filter_json(&mut self, payload: &str) -> Result<()> {
        self.filters.add_multi_json(payload)?;
        self.reset_page();
        Ok(())
    }

    pub fn set_date_filter_json(&mut self, payload: &str) -> Result<()> {
        self.filters.set_date_json(payload)?;
        self.reset_page();
        Ok(())
    }

    pub fn set_custom_date_range(
        &mut self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<()> {
        self.filters.set_custom_date_range(start, end)?;
        self.reset_page();
        Ok(())
    }

    pub fn remove_filter(
        &mut self,
        kind: FilterKind,
        column: &str,
        value: Option<&serde_json::Value>,
    ) -> bool {
        let removed = self.filters.remove(kind, column, value);
        if removed {
            self.reset_page();
        }
        removed
    }

    pub fn clear_filters(&mut self) {
        self.filters.clear();
        self.reset_page();
    }

    /// Enter or leave drag-and-drop mode. Returns the new mode.
    pub fn toggle_reordering(&mut self) -> Result<bool> {
        if self.reorderer.is_none() {
            return Err(Error::config(
                ConfigErrorKind::MissingSetting,
                format!("table '{}' does not support reordering", self.definition.name),
            ));
        }
        self.reordering = !self.reordering;
        self.sort.set_reorder_lock(self.reordering);
        Ok(self.reordering)
    }

    /// Select every matching row (seeded from the page last rendered) or none.
    pub fn toggle_select_all(&mut self, value: bool) {
        let seed = self.selection.state().page_seed.clone();
        self.selection.toggle_select_all(value, seed);
    }

    pub fn toggle_row(&mut self, id: RowId, selected: bool) {
        self.selection.toggle_row(id, selected);
    }

    /// Merge host arguments; they reach the query hook on every plan.
    pub fn inject_params(&mut self, params: InjectedParams) {
        self.injected.extend(params);
    }

    // ==================== Storage-backed operations ====================

    /// Plan and fetch the current page.
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(table = %self.definition.table, page = self.page)
    )]
    pub fn render<C: Connection + ?Sized>(&mut self, conn: &C) -> Result<RenderedPage> {
        let now = self.now();
        let page = self
            .planner
            .fetch_page(conn, &self.context(now), self.page, self.rows_per_page)?;

        let routes = self.definition.routes.as_deref();
        let visible: Vec<&Column> = self.columns().iter().filter(|c| !c.is_hidden()).collect();
        let explicit = self.sort.explicit().map(|(field, _)| field.to_string());

        let headers = visible
            .iter()
            .map(|c| HeaderCell {
                title: c.title().to_string(),
                field: c.source_field().to_string(),
                sortable: c.is_sortable(),
                sorted: (explicit.as_deref() == Some(c.source_field()))
                    .then_some(self.sort.direction),
                toggle_visibility: c.is(ColumnSettings::TOGGLE_VISIBILITY),
            })
            .collect();

        let primary_key = self.planner.primary_key();
        let rows: Vec<RenderedRow> = page
            .rows
            .iter()
            .map(|row| {
                let id = row.get_by_name(primary_key).and_then(RowId::from_value);
                RenderedRow {
                    checked: id.as_ref().is_some_and(|id| self.selection.is_checked(id)),
                    id,
                    cells: visible.iter().map(|c| c.render(row, routes)).collect(),
                    actions: self.definition.action_column.as_ref().map(|a| a.render(row)),
                }
            })
            .collect();

        let filters = self.filters.chips(now)?;
        let action_index = self.action_index();
        let ids: Vec<RowId> = rows.iter().filter_map(|r| r.id.clone()).collect();
        self.selection.refresh_seed(ids);

        Ok(RenderedPage {
            headers,
            rows,
            total: page.total,
            current_page: page.current_page,
            last_page: page.last_page(),
            per_page: page.per_page,
            filters,
            action_index,
            pagination: self.pagination_rack(),
            reordering: self.reordering,
        })
    }

    /// Apply a drag-and-drop drop.
    pub fn reorder<C: Connection + ?Sized>(
        &mut self,
        conn: &C,
        event: &ReorderEvent,
    ) -> Result<ReorderPlan> {
        let engine = self.reorderer.as_ref().ok_or_else(|| {
            Error::config(
                ConfigErrorKind::MissingSetting,
                format!("table '{}' does not support reordering", self.definition.name),
            )
        })?;
        engine.apply(conn, event)
    }

    /// The unpaged query restricted to the current selection.
    pub fn selected_query(&self) -> Result<SelectQuery> {
        let query = self.planner.plan(&self.context(self.now()), PlanPurpose::Render)?;
        Ok(self
            .selection
            .materialize(query, self.planner.primary_key_expr()))
    }

    /// Dispatch the bulk action named `name` over the selection.
    #[tracing::instrument(
        level = "debug",
        skip(self, conn),
        fields(table = %self.definition.table)
    )]
    pub fn run_bulk_action<C: Connection>(&self, conn: &C, name: &str) -> Result<()> {
        let action = self
            .definition
            .bulk_actions
            .as_ref()
            .and_then(|set| set.find(name))
            .ok_or_else(|| {
                Error::usage(
                    UsageErrorKind::UnknownBulkAction,
                    format!("no bulk action named '{name}'"),
                )
            })?;

        let ctx = BulkActionContext::new(
            conn,
            self.selected_query()?,
            self.planner.primary_key_expr(),
            self.planner.primary_key(),
            self.planner.dialect(),
        );
        action.run(&ctx)?;

        info!(
            table = %self.definition.table,
            action = %name,
            select_all = self.selection.is_select_all(),
            "dispatched bulk action"
        );
        Ok(())
    }

    /// Export every matching row.
    #[tracing::instrument(level = "debug", skip_all, fields(table = %self.definition.table))]
    pub fn export<C: Connection + ?Sized>(&self, conn: &C) -> Result<ExportArtifact> {
        let (handler, projector) = match (&self.definition.export, &self.exporter) {
            (Some(handler), Some(projector)) => (handler, projector),
            _ => {
                return Err(Error::config(
                    ConfigErrorKind::MissingSetting,
                    format!("table '{}' does not support export", self.definition.name),
                ));
            }
        };

        let query = self.planner.plan(&self.context(self.now()), PlanPurpose::Export)?;
        let (sql, params) = query.build_with_dialect(self.planner.dialect());
        let rows = conn.query(&sql, &params)?;

        let table = projector.project(self.columns(), &rows);
        debug!(rows = table.rows.len(), columns = table.headers.len(), "projected export");
        handler.writer.write(&table, projector.settings())
    }

    // ==================== Persistence ====================

    /// Snapshot of the interaction state.
    pub fn state(&self) -> TableState {
        TableState {
            sort: self.sort.clone(),
            search: self.search.clone(),
            search_columns: self.search_columns.clone(),
            filters: self.filters.applied().clone(),
            selection: self.selection.state().clone(),
            page: self.page,
            rows_per_page: self.rows_per_page,
            reordering: self.reordering,
            injected: self.injected.clone(),
        }
    }

    /// Restore a snapshot taken from a component mounted with the same definition.
    pub fn restore(&mut self, state: TableState) -> Result<()> {
        if state.page == 0 || !self.definition.options.allows_page_size(state.rows_per_page) {
            return Err(Error::usage(
                UsageErrorKind::InvalidPage,
                format!("page {} of size {} is not restorable", state.page, state.rows_per_page),
            ));
        }
        if state.reordering && self.reorderer.is_none() {
            return Err(Error::config(
                ConfigErrorKind::MissingSetting,
                "restored state is reordering but the table does not support it",
            ));
        }
        if let Some(field) = state
            .search_columns
            .iter()
            .find(|f| self.planner.columns().find_by_source_field(f).is_none())
        {
            return Err(Error::usage(
                UsageErrorKind::UnknownColumn,
                format!("restored search column '{field}' is not registered"),
            ));
        }
        if let Some(field) = state.sort.column.as_deref() {
            let sortable = self
                .planner
                .columns()
                .find_by_source_field(field)
                .is_some_and(Column::is_sortable);
            if !sortable {
                return Err(Error::usage(
                    UsageErrorKind::UnknownColumn,
                    format!("restored sort column '{field}' is not a sortable column"),
                ));
            }
        }
        self.filters.restore(state.filters)?;

        self.sort = state.sort;
        self.search = state.search;
        self.search_columns = state.search_columns;
        self.selection = BulkSelectionTracker::from_state(state.selection);
        self.page = state.page;
        self.rows_per_page = state.rows_per_page;
        self.reordering = state.reordering;
        self.injected = state.injected;
        Ok(())
    }
}

impl fmt::Debug for GridTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GridTable")
            .field("id", &self.id)
            .field("page_name", &self.page_name)
            .field("table", &self.definition.table)
            .field("sort", &self.sort)
            .field("search", &self.search)
            .field("page", &self.page)
            .field("rows_per_page", &self.rows_per_page)
            .field("reordering", &self.reordering)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::MappedRoute;
    use crate::filter::FilterBuilder;
    use gridtable_core::{RelationshipInfo, StaticRelationships, StaticSchema};

    fn schema() -> StaticSchema {
        StaticSchema::new().table("users", ["id", "name", "dept_id", "email"])
    }

    fn relationships() -> StaticRelationships {
        StaticRelationships::new().with(
            "users",
            RelationshipInfo::belongs_to("dept", "departments", "dept_id", "id"),
        )
    }

    fn definition() -> TableDefinition {
        TableDefinition::new("UsersTable", "users")
            .columns([
                Column::new("Name").with_default_settings(),
                Column::new("Email").searchable(),
                Column::new("Dept Name").field("dept.name").sortable(),
            ])
            .filter(FilterBuilder::new("dept.name").as_type(FilterKind::Multi).build())
    }

    #[test]
    fn test_mount_declared_columns() {
        let table = GridTable::mount(definition(), &schema(), &relationships()).unwrap();
        assert_eq!(table.page_name(), "userstable");
        assert_eq!(table.columns().len(), 3);
        assert_eq!(table.search_columns(), ["name", "email"]);
        assert_eq!(table.rows_per_page(), 20);
        assert_eq!(table.current_page(), 1);
    }

    #[test]
    fn test_mount_ids_are_unique() {
        let a = GridTable::mount(definition(), &schema(), &relationships()).unwrap();
        let b = GridTable::mount(definition(), &schema(), &relationships()).unwrap();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_mount_synthesizes_columns_from_schema() {
        let table = GridTable::mount(
            TableDefinition::new("Users", "users"),
            &schema(),
            &relationships(),
        )
        .unwrap();
        let fields: Vec<_> = table.columns().iter().map(Column::source_field).collect();
        assert_eq!(fields, vec!["id", "name", "email"]);

        let err = GridTable::mount(
            TableDefinition::new("Ghost", "ghosts"),
            &schema(),
            &relationships(),
        )
        .unwrap_err();
        assert_eq!(err.config_kind(), Some(ConfigErrorKind::MissingSetting));
    }

    #[test]
    fn test_mount_rejects_bad_configuration() {
        let unresolved = TableDefinition::new("Users", "users")
            .columns([Column::new("Team").field("team.name")]);
        let err = GridTable::mount(unresolved, &schema(), &relationships()).unwrap_err();
        assert_eq!(
            err.config_kind(),
            Some(ConfigErrorKind::UnresolvedRelationship)
        );

        let unrouted = TableDefinition::new("Users", "users").columns([
            Column::new("Name").route(MappedRoute::new("users.show").param("id", ":id")),
        ]);
        let err = GridTable::mount(unrouted, &schema(), &relationships()).unwrap_err();
        assert_eq!(err.config_kind(), Some(ConfigErrorKind::MissingSetting));

        let bad_options = definition().options(TableOptions::default().rows_per_page(7));
        assert!(GridTable::mount(bad_options, &schema(), &relationships()).is_err());

        let bad_action =
            definition().action_column(ActionColumn::new(|_: &Row| String::new()).at(9));
        let err = GridTable::mount(bad_action, &schema(), &relationships()).unwrap_err();
        assert_eq!(err.config_kind(), Some(ConfigErrorKind::InvalidOption));
    }

    #[test]
    fn test_interactions_reset_page() {
        let mut table = GridTable::mount(definition(), &schema(), &relationships()).unwrap();
        table.go_to_page(4).unwrap();
        table.search("ada");
        assert_eq!(table.current_page(), 1);

        table.go_to_page(3).unwrap();
        table
            .add_multi_filter_json(r#"{"column":"dept.name","value":"ops"}"#)
            .unwrap();
        assert_eq!(table.current_page(), 1);

        table.go_to_page(2).unwrap();
        table.set_rows_per_page(40).unwrap();
        assert_eq!(table.current_page(), 1);
        assert!(table.set_rows_per_page(33).is_err());
        assert!(table.go_to_page(0).is_err());

        table.go_to_page(2).unwrap();
        table.set_search_columns(["email"]).unwrap();
        assert_eq!(table.current_page(), 1);
        assert!(table.set_search_columns(["dept.name"]).is_err());

        table.set_search_columns(Vec::<String>::new()).unwrap();
        assert_eq!(table.search_keyword(), "");
        assert_eq!(table.search_columns(), ["name", "email"]);
    }

    #[test]
    fn test_sort_click_rules() {
        let mut table = GridTable::mount(definition(), &schema(), &relationships()).unwrap();
        table.sort_by("email").unwrap();
        assert!(!table.sort().is_explicit());

        table.sort_by("dept.name").unwrap();
        assert_eq!(table.sort().direction, SortDirection::Desc);
        table.sort_by("dept.name").unwrap();
        assert_eq!(table.sort().direction, SortDirection::Asc);

        let err = table.sort_by("nope").unwrap_err();
        assert_eq!(err.usage_kind(), Some(UsageErrorKind::UnknownColumn));
    }

    #[test]
    fn test_reordering_mode() {
        let mut plain = GridTable::mount(definition(), &schema(), &relationships()).unwrap();
        assert!(plain.toggle_reordering().is_err());

        let mut table = GridTable::mount(
            definition().reordering(Reordering::new()),
            &schema(),
            &relationships(),
        )
        .unwrap();
        table.sort_by("name").unwrap();
        assert!(table.toggle_reordering().unwrap());
        assert!(table.sort().reorder_lock);
        assert!(!table.sort().is_explicit());

        table.sort_by("name").unwrap();
        assert!(!table.sort().reorder_lock);
        assert!(!table.is_reordering());
    }

    #[test]
    fn test_state_round_trip() {
        let mut table = GridTable::mount(definition(), &schema(), &relationships()).unwrap();
        table.search("ada");
        table.sort_by("name").unwrap();
        table.toggle_row(RowId::Int(3), true);
        table.go_to_page(2).unwrap();
        let mut params = InjectedParams::new();
        params.insert("tenant".to_string(), serde_json::json!(7));
        table.inject_params(params);

        let json = serde_json::to_string(&table.state()).unwrap();
        let state: TableState = serde_json::from_str(&json).unwrap();

        let mut fresh = GridTable::mount(definition(), &schema(), &relationships()).unwrap();
        fresh.restore(state).unwrap();
        assert_eq!(fresh.state(), table.state());
        assert!(fresh.selection().is_checked(&RowId::Int(3)));
    }

    #[test]
    fn test_restore_rejects_invalid_state() {
        let mut table = GridTable::mount(definition(), &schema(), &relationships()).unwrap();
        let state = TableState {
            rows_per_page: 13,
            ..TableState::default()
        };
        assert!(table.restore(state).is_err());

        let state = TableState {
            reordering: true,
            ..TableState::default()
        };
        assert!(table.restore(state).unwrap_err().is_config());

        let mut state = TableState::default();
        state.sort.click("nickname");
        let err = table.restore(state).unwrap_err();
        assert_eq!(err.usage_kind(), Some(UsageErrorKind::UnknownColumn));

        let mut source = GridTable::mount(definition(), &schema(), &relationships()).unwrap();
        source
            .add_multi_filter_json(r#"{"column":"dept.name","value":"ops"}"#)
            .unwrap();
        let mut state = source.state();
        state.filters.multi[0].column = "email".to_string();
        state.page = 4;
        let err = table.restore(state).unwrap_err();
        assert_eq!(err.usage_kind(), Some(UsageErrorKind::UnknownFilter));
        assert_eq!(table.current_page(), 1);
        assert!(table.state().filters.is_empty());
    }

    #[test]
    fn test_mount_rejects_alias_shadowing_projected_key() {
        let shadowing = definition().columns([
            Column::new("Name").with_default_settings(),
            Column::new("Dept Id").field("dept.name"),
        ]);
        let err = GridTable::mount(shadowing, &schema(), &relationships()).unwrap_err();
        assert_eq!(err.config_kind(), Some(ConfigErrorKind::AliasCollision));

        let shadowing_order = definition()
            .columns([
                Column::new("Name").with_default_settings(),
                Column::new("Position").field("dept.name"),
            ])
            .reordering(Reordering::new().column("position"));
        let err = GridTable::mount(shadowing_order, &schema(), &relationships()).unwrap_err();
        assert_eq!(err.config_kind(), Some(ConfigErrorKind::AliasCollision));
    }

    #[test]
    fn test_action_index_defaults_to_last() {
        let table = GridTable::mount(
            definition().action_column(ActionColumn::new(|_: &Row| "edit".to_string())),
            &schema(),
            &relationships(),
        )
        .unwrap();
        assert_eq!(table.action_index(), Some(3));
    }
}
