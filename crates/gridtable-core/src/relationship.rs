//! Relationship metadata and the resolver capability.
//!
//! A column whose source field is a dot path (`dept.name`) walks one
//! relationship per segment. The engine asks a [`RelationshipResolver`]
//! for each hop and turns the answer into a join edge.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The kind of a single relationship hop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationshipKind {
    /// Many-to-one: the source row holds the foreign key.
    BelongsTo,
    /// One-to-one: the related row holds the foreign key.
    HasOne,
}

/// Metadata about one relationship on one model.
///
/// `local_key` always lives on the referenced ("owner") side and
/// `foreign_key` on the referencing side, whichever table that is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationshipInfo {
    /// Name of the relationship (the path segment).
    pub name: String,
    /// The related model's table name.
    pub related_table: String,
    /// Kind of relationship.
    pub kind: RelationshipKind,
    /// Key on the owner side (usually its primary key).
    pub local_key: String,
    /// Referencing column.
    pub foreign_key: String,
}

impl RelationshipInfo {
    /// A many-to-one hop: `source.foreign_key = related.owner_key`.
    pub fn belongs_to(
        name: impl Into<String>,
        related_table: impl Into<String>,
        foreign_key: impl Into<String>,
        owner_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            related_table: related_table.into(),
            kind: RelationshipKind::BelongsTo,
            local_key: owner_key.into(),
            foreign_key: foreign_key.into(),
        }
    }

    /// A one-to-one hop: `source.local_key = related.foreign_key`.
    pub fn has_one(
        name: impl Into<String>,
        related_table: impl Into<String>,
        foreign_key: impl Into<String>,
        local_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            related_table: related_table.into(),
            kind: RelationshipKind::HasOne,
            local_key: local_key.into(),
            foreign_key: foreign_key.into(),
        }
    }

    /// Column on the source table that participates in the join.
    pub fn source_column(&self) -> &str {
        match self.kind {
            RelationshipKind::BelongsTo => &self.foreign_key,
            RelationshipKind::HasOne => &self.local_key,
        }
    }

    /// Column on the related table that participates in the join.
    pub fn target_column(&self) -> &str {
        match self.kind {
            RelationshipKind::BelongsTo => &self.local_key,
            RelationshipKind::HasOne => &self.foreign_key,
        }
    }
}

/// Resolves a relation name on a model (identified by its table).
pub trait RelationshipResolver {
    /// Look up relationship `name` declared on `table`.
    fn relationship(&self, table: &str, name: &str) -> Option<RelationshipInfo>;
}

/// Relationship registry declared up front by the host.
#[derive(Debug, Clone, Default)]
pub struct StaticRelationships {
    entries: HashMap<(String, String), RelationshipInfo>,
}

impl StaticRelationships {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a relationship on `table`.
    #[must_use]
    pub fn with(mut self, table: impl Into<String>, info: RelationshipInfo) -> Self {
        self.entries.insert((table.into(), info.name.clone()), info);
        self
    }

    /// Number of declared relationships.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no relationship is declared.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl RelationshipResolver for StaticRelationships {
    fn relationship(&self, table: &str, name: &str) -> Option<RelationshipInfo> {
        self.entries
            .get(&(table.to_string(), name.to_string()))
            .cloned()
    }
}
