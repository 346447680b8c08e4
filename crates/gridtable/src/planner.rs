//! Query planning.
//!
//! [`QueryPlanner`] turns the column set plus the current interaction state
//! (search, filters, sort, reorder lock) into one [`SelectQuery`]. Every
//! relationship path the table can touch is resolved when the planner is
//! built, so an unknown relation fails at mount rather than mid-session.

use crate::filter::{FilterPredicate, FilterRegistry};
use crate::registry::ColumnRegistry;
use crate::relation::ResolvedPath;
use crate::sort::SortState;
use chrono::NaiveDateTime;
use gridtable_core::{
    ConfigErrorKind, Connection, Error, RelationshipResolver, Result, Row, UsageErrorKind, Value,
};
use gridtable_query::{Dialect, Expr, OrderBy, OrderDirection, Projection, SelectQuery};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// Host arguments injected into the component (see `GridTable::inject_params`).
pub type InjectedParams = IndexMap<String, serde_json::Value>;

/// Host customization applied after search and filters.
pub type QueryHook = Arc<dyn Fn(SelectQuery, &InjectedParams) -> SelectQuery + Send + Sync>;

/// What the planned query feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanPurpose {
    /// The HTML grid: visible columns only.
    Render,
    /// Spreadsheet export: hidden columns are projected when exportable.
    Export,
}

/// Interaction state the planner reads on each render.
#[derive(Debug, Clone, Copy)]
pub struct PlanContext<'a> {
    pub search: Option<&'a str>,
    /// Source fields the keyword is matched against.
    pub search_columns: &'a [String],
    pub filters: &'a FilterRegistry,
    pub sort: &'a SortState,
    /// Ordering column when drag-and-drop reordering is enabled.
    pub reorder_column: Option<&'a str>,
    pub now: NaiveDateTime,
    pub injected: &'a InjectedParams,
}

/// One page of rows plus the total match count.
#[derive(Debug, Clone)]
pub struct Page {
    pub rows: Vec<Row>,
    pub total: u64,
    pub current_page: u64,
    pub per_page: u64,
}

impl Page {
    /// Last page number (at least 1).
    pub fn last_page(&self) -> u64 {
        if self.per_page == 0 {
            return 1;
        }
        self.total.div_ceil(self.per_page).max(1)
    }

    pub fn has_more_pages(&self) -> bool {
        self.current_page < self.last_page()
    }
}

/// Builds the table's query from columns and interaction state.
#[derive(Clone)]
pub struct QueryPlanner {
    table: String,
    primary_key: String,
    columns: ColumnRegistry,
    paths: HashMap<String, ResolvedPath>,
    hook: Option<QueryHook>,
    dialect: Dialect,
}

impl QueryPlanner {
    /// Resolve every relationship path used by a column or a filter.
    pub fn new(
        table: impl Into<String>,
        primary_key: impl Into<String>,
        columns: ColumnRegistry,
        filters: &FilterRegistry,
        relationships: &dyn RelationshipResolver,
        dialect: Dialect,
    ) -> Result<Self> {
        let table = table.into();
        let mut paths = HashMap::new();

        let fields = columns
            .iter()
            .filter(|c| !c.is_empty_column())
            .map(|c| c.source_field())
            .chain(filters.columns());
        for field in fields {
            if field.contains('.') && !paths.contains_key(field) {
                let path = ResolvedPath::resolve(&table, field, relationships)?;
                paths.insert(field.to_string(), path);
            }
        }

        Ok(Self {
            table,
            primary_key: primary_key.into(),
            columns,
            paths,
            hook: None,
            dialect,
        })
    }

    /// Install the host query hook.
    #[must_use]
    pub fn with_hook(mut self, hook: Option<QueryHook>) -> Self {
        self.hook = hook;
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    pub fn columns(&self) -> &ColumnRegistry {
        &self.columns
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// The primary key qualified by the base table.
    pub fn primary_key_expr(&self) -> Expr {
        Expr::qualified(&self.table, &self.primary_key)
    }

    /// Reject relationship aliases that shadow a column the query always reads.
    ///
    /// Besides the declared columns, every query projects the primary key,
    /// the base-table key of each relationship path and the reorder column.
    pub fn ensure_distinct_aliases(&self, reorder_column: Option<&str>) -> Result<()> {
        let mut implicit: Vec<&str> = vec![self.primary_key.as_str()];
        implicit.extend(reorder_column);
        for column in self.columns.iter().filter(|c| !c.is_empty_column()) {
            match self.paths.get(column.source_field()) {
                Some(path) => implicit.extend(path.base_key()),
                None => implicit.push(column.source_field()),
            }
        }

        let relationship_columns = self
            .columns
            .iter()
            .filter(|c| c.is_relationship() && !c.is_empty_column());
        for column in relationship_columns {
            let alias = column.alias();
            if implicit.contains(&alias.as_str()) {
                return Err(Error::config(
                    ConfigErrorKind::AliasCollision,
                    format!(
                        "column '{}' is aliased '{alias}', which '{}' already projects",
                        column.title(),
                        self.table
                    ),
                ));
            }
        }
        Ok(())
    }

    fn path(&self, field: &str) -> Result<&ResolvedPath> {
        self.paths.get(field).ok_or_else(|| {
            Error::usage(
                UsageErrorKind::UnknownColumn,
                format!("'{field}' is not a registered relationship column"),
            )
        })
    }

    /// Predicate on `field`, scoped through EXISTS for relationship paths.
    fn scoped(&self, field: &str, predicate: impl FnOnce(Expr) -> Expr) -> Result<Expr> {
        if field.contains('.') {
            Ok(self.path(field)?.scoped_predicate(predicate))
        } else {
            Ok(predicate(Expr::qualified(&self.table, field)))
        }
    }

    /// Order `query` by `field`, joining relationship paths as needed.
    fn order_by_field(
        &self,
        query: SelectQuery,
        field: &str,
        direction: OrderDirection,
    ) -> Result<SelectQuery> {
        if field.contains('.') {
            let path = self.path(field)?;
            let query = path.attach_joins(query);
            Ok(query.order_by(OrderBy::new(path.target(), direction)))
        } else {
            Ok(query.order_by(OrderBy::new(Expr::qualified(&self.table, field), direction)))
        }
    }

    // ==================== Planning ====================

    /// Plan the unpaged query.
    pub fn plan(&self, ctx: &PlanContext<'_>, purpose: PlanPurpose) -> Result<SelectQuery> {
        let mut query = self.project(SelectQuery::new(&self.table), ctx, purpose);
        query = self.apply_search(query, ctx)?;
        query = self.apply_filters(query, ctx)?;
        if let Some(hook) = &self.hook {
            query = hook(query, ctx.injected);
        }
        query = self.apply_sort(query, ctx)?;

        debug!(
            table = %self.table,
            joins = query.joins.len(),
            projections = query.projections.len(),
            "planned table query"
        );
        Ok(query)
    }

    /// Plan one page (1-based).
    pub fn plan_page(
        &self,
        ctx: &PlanContext<'_>,
        page: u64,
        per_page: u64,
    ) -> Result<SelectQuery> {
        if page == 0 || per_page == 0 {
            return Err(Error::usage(
                UsageErrorKind::InvalidPage,
                format!("page {page} of size {per_page} is out of range"),
            ));
        }
        let offset = (page - 1)
            .checked_mul(per_page)
            .filter(|offset| i64::try_from(*offset).is_ok())
            .ok_or_else(|| {
                Error::usage(
                    UsageErrorKind::InvalidPage,
                    format!("page {page} of size {per_page} is past the addressable rows"),
                )
            })?;
        Ok(self
            .plan(ctx, PlanPurpose::Render)?
            .limit(per_page)
            .offset(offset))
    }

    /// Run the count and page queries.
    #[tracing::instrument(level = "debug", skip(self, conn, ctx), fields(table = %self.table))]
    pub fn fetch_page<C: Connection + ?Sized>(
        &self,
        conn: &C,
        ctx: &PlanContext<'_>,
        page: u64,
        per_page: u64,
    ) -> Result<Page> {
        let query = self.plan_page(ctx, page, per_page)?;

        let (count_sql, count_params) = query.build_count_with_dialect(self.dialect);
        trace!(sql = %count_sql, "count query");
        let total = conn
            .query_one(&count_sql, &count_params)?
            .and_then(|row| row.get(0).and_then(Value::as_i64))
            .unwrap_or(0);

        let (sql, params) = query.build_with_dialect(self.dialect);
        trace!(sql = %sql, params = params.len(), "page query");
        let rows = conn.query(&sql, &params)?;

        Ok(Page {
            rows,
            total: u64::try_from(total).unwrap_or(0),
            current_page: page,
            per_page,
        })
    }

    fn project(
        &self,
        mut query: SelectQuery,
        ctx: &PlanContext<'_>,
        purpose: PlanPurpose,
    ) -> SelectQuery {
        query = query.select(Projection::Column {
            table: self.table.clone(),
            name: self.primary_key.clone(),
            alias: None,
        });
        if let Some(order) = ctx.reorder_column {
            query = query.select(Projection::Column {
                table: self.table.clone(),
                name: order.to_string(),
                alias: None,
            });
        }

        for column in self.columns.iter() {
            let included = match purpose {
                PlanPurpose::Render => !column.is_hidden(),
                PlanPurpose::Export => !column.is_hidden() || column.is_exportable(),
            };
            if !included {
                continue;
            }

            if column.is_empty_column() {
                query = query.select(Projection::Empty {
                    alias: column.alias(),
                });
                continue;
            }

            match self.paths.get(column.source_field()) {
                Some(path) => {
                    if let Some(key) = path.base_key() {
                        query = query.select(Projection::Column {
                            table: self.table.clone(),
                            name: key.to_string(),
                            alias: None,
                        });
                    }
                    query = path.attach_joins(query).select(Projection::Column {
                        table: path.final_reference().to_string(),
                        name: path.column.clone(),
                        alias: Some(column.alias()),
                    });
                }
                None => {
                    query = query.select(Projection::Column {
                        table: self.table.clone(),
                        name: column.source_field().to_string(),
                        alias: None,
                    });
                }
            }
        }
        query
    }

    fn apply_search(&self, query: SelectQuery, ctx: &PlanContext<'_>) -> Result<SelectQuery> {
        let Some(keyword) = ctx.search.map(str::trim).filter(|k| !k.is_empty()) else {
            return Ok(query);
        };

        let mut predicates = Vec::with_capacity(ctx.search_columns.len());
        for field in ctx.search_columns {
            let storage_backed = self
                .columns
                .find_by_source_field(field)
                .is_none_or(|c| !c.is_empty_column());
            if storage_backed {
                predicates.push(self.scoped(field, |col| col.contains(keyword))?);
            }
        }

        Ok(match Expr::any_of(predicates) {
            Some(group) => query.filter(group),
            None => query,
        })
    }

    fn apply_filters(&self, mut query: SelectQuery, ctx: &PlanContext<'_>) -> Result<SelectQuery> {
        for condition in ctx.filters.conditions(ctx.now)? {
            let predicate = condition.predicate;
            let expr = self.scoped(&condition.column, move |col| match predicate {
                FilterPredicate::Eq(value) => col.eq(value),
                FilterPredicate::In(values) => col.in_list(values),
                FilterPredicate::Between(low, high) => col.between(low, high),
            })?;
            query = query.filter(expr);
        }
        Ok(query)
    }

    /// Explicit click, then the reorder lock, then the first default-sort column.
    fn apply_sort(&self, query: SelectQuery, ctx: &PlanContext<'_>) -> Result<SelectQuery> {
        if let Some((field, direction)) = ctx.sort.explicit() {
            return self.order_by_field(query, field, direction);
        }

        if ctx.sort.reorder_lock {
            if let Some(order) = ctx.reorder_column {
                return self.order_by_field(query, order, OrderDirection::Asc);
            }
        }

        if let Some(column) = self.columns.default_sort_column() {
            if !column.is_empty_column() {
                let direction = match column.default_sort_descending() {
                    Some(true) => OrderDirection::Desc,
                    _ => OrderDirection::Asc,
                };
                return self.order_by_field(query, column.source_field(), direction);
            }
        }
        Ok(query)
    }
}

impl fmt::Debug for QueryPlanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryPlanner")
            .field("table", &self.table)
            .field("primary_key", &self.primary_key)
            .field("columns", &self.columns.len())
            .field("paths", &self.paths.len())
            .field("hook", &self.hook.is_some())
            .field("dialect", &self.dialect)
            .finish()
    }
}
