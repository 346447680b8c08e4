//! Core types and capabilities for GridTable.
//!
//! This crate provides the foundations the table engine builds on:
//!
//! - `Error` taxonomy and `Result` alias
//! - `Value` and `Row` for dynamic cells
//! - `Connection` capability for the storage collaborator
//! - `SchemaIntrospector` and `RelationshipResolver` capabilities
//! - `ColumnSettings` / `PaginationRack` flag sets

pub mod connection;
pub mod error;
pub mod flags;
pub mod introspect;
pub mod relationship;
pub mod row;
pub mod value;

pub use connection::Connection;
pub use error::{
    ConfigError, ConfigErrorKind, DataError, DataErrorKind, Error, Result, StorageError,
    UsageError, UsageErrorKind,
};
pub use flags::{ColumnSettings, PaginationRack};
pub use introspect::{SchemaColumn, SchemaIntrospector, StaticSchema};
pub use relationship::{
    RelationshipInfo, RelationshipKind, RelationshipResolver, StaticRelationships,
};
pub use row::{ColumnInfo, Row};
pub use value::{DATETIME_FORMAT, Value};
