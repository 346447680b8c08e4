//! Relationship path resolution.
//!
//! A path like `dept.manager.name` is resolved once, at mount, into a chain
//! of join edges ending in a remote column. Each edge is aliased by the path
//! prefix that reaches it (`dept`, `dept__manager`), so two columns sharing
//! a prefix share the edge and the planner joins it once.

use gridtable_core::{
    ConfigErrorKind, Error, RelationshipKind, RelationshipResolver, Result,
};
use gridtable_query::{Expr, Join, SelectQuery};

/// Separator between path segments in a join alias.
const ALIAS_SEPARATOR: &str = "__";

/// One resolved relationship hop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinEdge {
    /// Table the hop lands on.
    pub table: String,
    /// Alias of the landed table; also the edge's identity.
    pub alias: String,
    /// Reference (table or alias) the hop starts from.
    pub source_ref: String,
    /// Column on the source side of the join.
    pub source_column: String,
    /// Column on the landed table.
    pub target_column: String,
    pub kind: RelationshipKind,
}

impl JoinEdge {
    fn on(&self) -> Expr {
        Expr::qualified(&self.alias, &self.target_column)
            .eq(Expr::qualified(&self.source_ref, &self.source_column))
    }

    fn join(&self) -> Join {
        Join::left(&self.table, self.on()).alias(&self.alias)
    }
}

/// A relationship path resolved into join edges plus the remote column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    pub edges: Vec<JoinEdge>,
    pub column: String,
}

impl ResolvedPath {
    /// Resolve `path` starting at `base_table`.
    ///
    /// Every segment but the last must name a relationship on the model
    /// reached so far; an unknown segment is a configuration error.
    pub fn resolve(
        base_table: &str,
        path: &str,
        resolver: &dyn RelationshipResolver,
    ) -> Result<Self> {
        let segments: Vec<&str> = path.split('.').collect();
        if segments.len() < 2 || segments.iter().any(|s| s.is_empty()) {
            return Err(Error::config(
                ConfigErrorKind::UnresolvedRelationship,
                format!("'{path}' is not a relation.column path"),
            ));
        }

        let (column, relations) = segments
            .split_last()
            .map(|(last, rest)| (last.to_string(), rest))
            .ok_or_else(|| {
                Error::config(ConfigErrorKind::UnresolvedRelationship, "empty path")
            })?;

        let mut edges = Vec::with_capacity(relations.len());
        let mut current_table = base_table.to_string();
        let mut current_ref = base_table.to_string();

        for (depth, name) in relations.iter().enumerate() {
            let info = resolver.relationship(&current_table, name).ok_or_else(|| {
                Error::config(
                    ConfigErrorKind::UnresolvedRelationship,
                    format!("relationship '{name}' not found on '{current_table}' (path '{path}')"),
                )
            })?;
            let alias = relations[..=depth].join(ALIAS_SEPARATOR);
            edges.push(JoinEdge {
                table: info.related_table.clone(),
                alias: alias.clone(),
                source_ref: current_ref,
                source_column: info.source_column().to_string(),
                target_column: info.target_column().to_string(),
                kind: info.kind,
            });
            current_table = info.related_table;
            current_ref = alias;
        }

        Ok(Self { edges, column })
    }

    /// Column on the base table that the first hop joins through.
    pub fn base_key(&self) -> Option<&str> {
        self.edges.first().map(|e| e.source_column.as_str())
    }

    /// Reference of the table holding the remote column.
    pub fn final_reference(&self) -> &str {
        self.edges
            .last()
            .map(|e| e.alias.as_str())
            .unwrap_or_default()
    }

    /// The remote column, qualified by its join alias.
    pub fn target(&self) -> Expr {
        Expr::qualified(self.final_reference(), &self.column)
    }

    /// Add the LEFT JOINs for this path, skipping edges already joined.
    pub fn attach_joins(&self, mut query: SelectQuery) -> SelectQuery {
        for edge in &self.edges {
            if !query.has_join(&edge.alias) {
                query = query.join(edge.join());
            }
        }
        query
    }

    /// Nested `EXISTS` that holds when some related row satisfies `predicate`.
    ///
    /// `predicate` receives the remote column expression. Used for search and
    /// filters so that several relationship predicates combine per branch
    /// instead of collapsing onto one joined row.
    pub fn scoped_predicate(&self, predicate: impl FnOnce(Expr) -> Expr) -> Expr {
        let mut inner = predicate(self.target());
        for edge in self.edges.iter().rev() {
            let sub = SelectQuery::new(&edge.table)
                .alias(&edge.alias)
                .filter(edge.on())
                .filter(inner);
            inner = Expr::exists(sub);
        }
        inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridtable_core::{RelationshipInfo, StaticRelationships};
    use gridtable_query::Dialect;

    fn relationships() -> StaticRelationships {
        StaticRelationships::new()
            .with(
                "users",
                RelationshipInfo::belongs_to("dept", "departments", "dept_id", "id"),
            )
            .with(
                "users",
                RelationshipInfo::has_one("profile", "profiles", "user_id", "id"),
            )
            .with(
                "departments",
                RelationshipInfo::belongs_to("manager", "users", "manager_id", "id"),
            )
    }

    #[test]
    fn test_resolve_belongs_to_chain() {
        let path = ResolvedPath::resolve("users", "dept.manager.name", &relationships()).unwrap();
        assert_eq!(path.edges.len(), 2);
        assert_eq!(path.base_key(), Some("dept_id"));
        assert_eq!(path.final_reference(), "dept__manager");
        assert_eq!(path.edges[1].source_ref, "dept");
        assert_eq!(path.edges[1].source_column, "manager_id");
        assert_eq!(path.column, "name");
    }

    #[test]
    fn test_has_one_joins_on_owner_key() {
        let path = ResolvedPath::resolve("users", "profile.bio", &relationships()).unwrap();
        let edge = &path.edges[0];
        assert_eq!(edge.kind, RelationshipKind::HasOne);
        assert_eq!(edge.source_column, "id");
        assert_eq!(edge.target_column, "user_id");
    }

    #[test]
    fn test_unresolved_segment_is_config_error() {
        let err = ResolvedPath::resolve("users", "team.name", &relationships()).unwrap_err();
        assert_eq!(
            err.config_kind(),
            Some(ConfigErrorKind::UnresolvedRelationship)
        );
        let err = ResolvedPath::resolve("users", "dept..name", &relationships()).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_shared_prefix_joins_once() {
        let name = ResolvedPath::resolve("users", "dept.name", &relationships()).unwrap();
        let code = ResolvedPath::resolve("users", "dept.code", &relationships()).unwrap();
        let query = code.attach_joins(name.attach_joins(SelectQuery::new("users")));
        assert_eq!(query.joins.len(), 1);

        let (sql, _) = query.build_with_dialect(Dialect::Sqlite);
        assert_eq!(
            sql,
            "SELECT * FROM \"users\" LEFT JOIN \"departments\" AS \"dept\" \
             ON \"dept\".\"id\" = \"users\".\"dept_id\""
        );
    }

    #[test]
    fn test_scoped_predicate_nests_exists() {
        let path = ResolvedPath::resolve("users", "dept.manager.name", &relationships()).unwrap();
        let expr = path.scoped_predicate(|col| col.contains("ann"));
        let query = SelectQuery::new("users").filter(expr);
        let (sql, params) = query.build_with_dialect(Dialect::Sqlite);
        assert_eq!(
            sql,
            "SELECT * FROM \"users\" WHERE EXISTS (SELECT 1 FROM \"departments\" AS \"dept\" \
             WHERE \"dept\".\"id\" = \"users\".\"dept_id\" AND EXISTS (SELECT 1 FROM \"users\" \
             AS \"dept__manager\" WHERE \"dept__manager\".\"id\" = \"dept\".\"manager_id\" \
             AND \"dept__manager\".\"name\" LIKE ?1))"
        );
        assert_eq!(params.len(), 1);
    }
}
