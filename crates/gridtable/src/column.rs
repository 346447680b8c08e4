//! Column definitions.
//!
//! A [`Column`] is one declared projection: a title, a source field that may
//! be a dot-separated relationship path, a [`ColumnSettings`] bitmask, and
//! optional presentation hooks (route binding, formatter, custom renderer).

use convert_case::{Case, Casing};
use gridtable_core::{ColumnSettings, Row, Value};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Formats a cell from the whole row.
pub type CellFormatter = Arc<dyn Fn(&Row) -> String + Send + Sync>;

/// Renders a cell's markup, replacing every other presentation step.
pub trait CellRenderer: Send + Sync {
    /// Produce the cell content for `row`.
    fn render(&self, row: &Row, column: &Column) -> String;
}

impl<F> CellRenderer for F
where
    F: Fn(&Row, &Column) -> String + Send + Sync,
{
    fn render(&self, row: &Row, column: &Column) -> String {
        self(row, column)
    }
}

/// Turns a named route plus parameters into a URL.
pub trait RouteResolver: Send + Sync {
    /// Build the URL for `route`.
    fn url(&self, route: &str, params: &IndexMap<String, String>) -> String;
}

/// Link target of a route anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HrefTarget {
    #[serde(rename = "_blank")]
    Blank,
    #[serde(rename = "_parent")]
    Parent,
    #[default]
    #[serde(rename = "_self")]
    SelfFrame,
    #[serde(rename = "_top")]
    Top,
}

impl HrefTarget {
    /// The HTML `target` attribute value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            HrefTarget::Blank => "_blank",
            HrefTarget::Parent => "_parent",
            HrefTarget::SelfFrame => "_self",
            HrefTarget::Top => "_top",
        }
    }
}

/// A column's link to a host route.
///
/// A parameter value starting with `:` is a placeholder bound to the row
/// field named after the colon; any other value is passed through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedRoute {
    pub route: String,
    pub params: IndexMap<String, String>,
    pub label: Option<String>,
    pub target: HrefTarget,
}

impl MappedRoute {
    /// Link to `route` with no parameters.
    pub fn new(route: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            params: IndexMap::new(),
            label: None,
            target: HrefTarget::default(),
        }
    }

    /// Add a route parameter.
    #[must_use]
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Use a fixed anchor label instead of the cell value.
    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the anchor target.
    #[must_use]
    pub fn target(mut self, target: HrefTarget) -> Self {
        self.target = target;
        self
    }

    /// Parameters with `:field` placeholders replaced by row values.
    pub fn bind(&self, row: &Row) -> IndexMap<String, String> {
        self.params
            .iter()
            .map(|(name, value)| {
                let bound = match value.strip_prefix(':') {
                    Some(field) => row
                        .get_by_name(field)
                        .map(ToString::to_string)
                        .unwrap_or_default(),
                    None => value.clone(),
                };
                (name.clone(), bound)
            })
            .collect()
    }

    /// Resolve the URL for `row`; a route without parameters links to `##`.
    pub fn href(&self, row: &Row, resolver: Option<&dyn RouteResolver>) -> String {
        if self.params.is_empty() {
            return "##".to_string();
        }
        match resolver {
            Some(resolver) => resolver.url(&self.route, &self.bind(row)),
            None => "##".to_string(),
        }
    }
}

/// One declared table column.
#[derive(Clone)]
pub struct Column {
    title: String,
    field: String,
    settings: ColumnSettings,
    route: Option<MappedRoute>,
    formatter: Option<CellFormatter>,
    renderer: Option<Arc<dyn CellRenderer>>,
    pub(crate) index: usize,
}

impl Column {
    /// A column titled `title`, reading `snake_case(title)`, exportable.
    pub fn new(title: impl Into<String>) -> Self {
        let title = title.into();
        let field = title.to_case(Case::Snake);
        Self {
            title,
            field,
            settings: ColumnSettings::default(),
            route: None,
            formatter: None,
            renderer: None,
            index: 0,
        }
    }

    // ==================== Builder ====================

    /// Read from `field` (a plain column or a `relation.column` path).
    #[must_use]
    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.field = field.into();
        self
    }

    /// Replace the settings bitmask (sort bits are sanitized).
    #[must_use]
    pub fn with_settings(mut self, settings: ColumnSettings) -> Self {
        self.settings = settings.sanitize_sort_flags();
        self
    }

    /// Add SEARCHABLE, SORTABLE and TOGGLE_VISIBILITY.
    #[must_use]
    pub fn with_default_settings(self) -> Self {
        self.with_flag(
            ColumnSettings::SEARCHABLE
                | ColumnSettings::SORTABLE
                | ColumnSettings::TOGGLE_VISIBILITY,
        )
    }

    #[must_use]
    pub fn hide(self) -> Self {
        self.with_flag(ColumnSettings::HIDDEN)
    }

    #[must_use]
    pub fn sortable(self) -> Self {
        self.with_flag(ColumnSettings::SORTABLE)
    }

    #[must_use]
    pub fn searchable(self) -> Self {
        self.with_flag(ColumnSettings::SEARCHABLE)
    }

    #[must_use]
    pub fn toggle_visibility(self) -> Self {
        self.with_flag(ColumnSettings::TOGGLE_VISIBILITY)
    }

    #[must_use]
    pub fn default_sort(self) -> Self {
        self.with_flag(ColumnSettings::DEFAULT_SORT)
    }

    #[must_use]
    pub fn default_sort_asc(self) -> Self {
        self.with_flag(ColumnSettings::DEFAULT_SORT_ASC)
    }

    #[must_use]
    pub fn default_sort_desc(self) -> Self {
        self.with_flag(ColumnSettings::DEFAULT_SORT_DESC)
    }

    /// Render an empty cell; the column is never read from storage.
    #[must_use]
    pub fn empty(self) -> Self {
        self.with_flag(ColumnSettings::EMPTY)
    }

    #[must_use]
    pub fn not_exportable(mut self) -> Self {
        self.settings.remove(ColumnSettings::EXPORTABLE);
        self
    }

    /// Link the cell to a host route.
    #[must_use]
    pub fn route(mut self, route: MappedRoute) -> Self {
        self.route = Some(route);
        self
    }

    /// Format the cell from the row.
    #[must_use]
    pub fn formatter<F>(mut self, formatter: F) -> Self
    where
        F: Fn(&Row) -> String + Send + Sync + 'static,
    {
        self.formatter = Some(Arc::new(formatter));
        self
    }

    /// Render the cell with a custom renderer.
    #[must_use]
    pub fn renderer(mut self, renderer: impl CellRenderer + 'static) -> Self {
        self.renderer = Some(Arc::new(renderer));
        self
    }

    fn with_flag(mut self, flag: ColumnSettings) -> Self {
        self.settings = self.settings.union(flag).sanitize_sort_flags();
        self
    }

    // ==================== Accessors ====================

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Source field as declared (may be a relationship path).
    pub fn source_field(&self) -> &str {
        &self.field
    }

    pub fn settings(&self) -> ColumnSettings {
        self.settings
    }

    pub(crate) fn settings_mut(&mut self) -> &mut ColumnSettings {
        &mut self.settings
    }

    /// Registry position, stable for the table's lifetime.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn mapped_route(&self) -> Option<&MappedRoute> {
        self.route.as_ref()
    }

    pub fn has_formatter(&self) -> bool {
        self.formatter.is_some()
    }

    pub fn is(&self, flag: ColumnSettings) -> bool {
        self.settings.contains(flag)
    }

    pub fn is_hidden(&self) -> bool {
        self.is(ColumnSettings::HIDDEN)
    }

    pub fn is_sortable(&self) -> bool {
        self.is(ColumnSettings::SORTABLE)
    }

    pub fn is_searchable(&self) -> bool {
        self.is(ColumnSettings::SEARCHABLE)
    }

    pub fn is_exportable(&self) -> bool {
        self.is(ColumnSettings::EXPORTABLE)
    }

    pub fn is_empty_column(&self) -> bool {
        self.is(ColumnSettings::EMPTY)
    }

    /// Whether the source field walks at least one relationship.
    pub fn is_relationship(&self) -> bool {
        self.field.contains('.')
    }

    /// Relation names followed by the remote column, for path fields.
    pub fn relationship_path(&self) -> Option<Vec<&str>> {
        self.is_relationship()
            .then(|| self.field.split('.').collect())
    }

    /// Name the column carries in query results.
    ///
    /// Relationship columns are aliased by their snake-cased title so two
    /// remote columns with the same name never collide.
    pub fn alias(&self) -> String {
        if self.is_relationship() {
            self.title.to_case(Case::Snake)
        } else {
            self.field.clone()
        }
    }

    /// Direction of this column's default sort, if it has one.
    pub fn default_sort_descending(&self) -> Option<bool> {
        let settings = self.settings.sanitize_sort_flags();
        if settings.contains(ColumnSettings::DEFAULT_SORT_DESC) {
            Some(true)
        } else if settings.has_default_sort() {
            Some(false)
        } else {
            None
        }
    }

    // ==================== Cells ====================

    /// Raw stored value of this column in `row`.
    pub fn raw_value<'r>(&self, row: &'r Row) -> Option<&'r Value> {
        row.get_by_name(&self.alias())
    }

    /// Plain value: the stored value as text (empty when absent or NULL).
    pub fn display_value(&self, row: &Row) -> String {
        self.raw_value(row)
            .map(ToString::to_string)
            .unwrap_or_default()
    }

    /// Formatted value: the formatter output if registered, else the display value.
    pub fn value(&self, row: &Row) -> String {
        match &self.formatter {
            Some(formatter) => formatter(row),
            None => self.display_value(row),
        }
    }

    /// Cell content for the HTML grid.
    ///
    /// Precedence: custom renderer, formatter, route anchor, display value.
    pub fn render(&self, row: &Row, routes: Option<&dyn RouteResolver>) -> String {
        if self.is_empty_column() {
            return String::new();
        }
        if let Some(renderer) = &self.renderer {
            return renderer.render(row, self);
        }
        if let Some(formatter) = &self.formatter {
            return formatter(row);
        }
        if let Some(route) = &self.route {
            let label = route
                .label
                .clone()
                .unwrap_or_else(|| self.display_value(row));
            return format!(
                "<a href=\"{}\" target=\"{}\">{}</a>",
                route.href(row, routes),
                route.target.as_str(),
                label
            );
        }
        self.display_value(row)
    }
}

impl fmt::Debug for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("title", &self.title)
            .field("field", &self.field)
            .field("settings", &self.settings)
            .field("route", &self.route)
            .field("formatter", &self.formatter.is_some())
            .field("renderer", &self.renderer.is_some())
            .field("index", &self.index)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestRoutes;

    impl RouteResolver for TestRoutes {
        fn url(&self, route: &str, params: &IndexMap<String, String>) -> String {
            let query: Vec<String> = params.iter().map(|(k, v)| format!("{k}={v}")).collect();
            format!("/{}?{}", route, query.join("&"))
        }
    }

    fn row() -> Row {
        Row::from_pairs([
            ("id", Value::BigInt(7)),
            ("name", Value::Text("Ada".to_string())),
            ("department_name", Value::Text("Research".to_string())),
        ])
    }

    #[test]
    fn test_new_column_defaults() {
        let column = Column::new("Full Name");
        assert_eq!(column.source_field(), "full_name");
        assert_eq!(column.settings(), ColumnSettings::EXPORTABLE);
        assert!(!column.is_relationship());
        assert_eq!(column.alias(), "full_name");

        let column = column.with_default_settings();
        assert!(column.is_searchable());
        assert!(column.is_sortable());
        assert!(column.is(ColumnSettings::TOGGLE_VISIBILITY));
        assert!(column.is_exportable());
    }

    #[test]
    fn test_relationship_alias_uses_snake_title() {
        let column = Column::new("Department Name").field("dept.name");
        assert!(column.is_relationship());
        assert_eq!(column.relationship_path(), Some(vec!["dept", "name"]));
        assert_eq!(column.alias(), "department_name");
    }

    #[test]
    fn test_builder_sanitizes_sort_flags() {
        let column = Column::new("Name").default_sort().default_sort_desc();
        assert!(column.is(ColumnSettings::DEFAULT_SORT_DESC));
        assert!(!column.is(ColumnSettings::DEFAULT_SORT));
        assert_eq!(column.default_sort_descending(), Some(true));

        let column = Column::new("Name").default_sort();
        assert_eq!(column.default_sort_descending(), Some(false));
        assert_eq!(Column::new("Name").default_sort_descending(), None);
    }

    #[test]
    fn test_render_precedence() {
        let plain = Column::new("Name");
        assert_eq!(plain.render(&row(), None), "Ada");

        let linked = Column::new("Name").route(
            MappedRoute::new("users.show")
                .param("user", ":id")
                .param("tab", "profile")
                .target(HrefTarget::Blank),
        );
        assert_eq!(
            linked.render(&row(), Some(&TestRoutes)),
            "<a href=\"/users.show?user=7&tab=profile\" target=\"_blank\">Ada</a>"
        );

        let formatted = linked.clone().formatter(|row: &Row| {
            let id = row.get_by_name("id").map(ToString::to_string);
            format!("#{}", id.unwrap_or_default())
        });
        assert_eq!(formatted.render(&row(), Some(&TestRoutes)), "#7");

        let rendered =
            formatted.renderer(|_: &Row, column: &Column| format!("<b>{}</b>", column.title()));
        assert_eq!(rendered.render(&row(), Some(&TestRoutes)), "<b>Name</b>");
    }

    #[test]
    fn test_route_without_params_links_nowhere() {
        let column = Column::new("Name").route(MappedRoute::new("home").label("Open"));
        assert_eq!(
            column.render(&row(), Some(&TestRoutes)),
            "<a href=\"##\" target=\"_self\">Open</a>"
        );
    }

    #[test]
    fn test_empty_column_renders_nothing() {
        let column = Column::new("Name").empty();
        assert_eq!(column.render(&row(), None), "");
    }

    #[test]
    fn test_value_reads_relationship_alias() {
        let column = Column::new("Department Name").field("dept.name");
        assert_eq!(column.value(&row()), "Research");
        assert_eq!(Column::new("Missing").value(&row()), "");
    }
}
