//! Error types for GridTable operations.
//!
//! Errors fall into four families that map onto how a host should react:
//! configuration errors surface at mount time, usage errors at the point of
//! resolution, data errors abort a single interaction, and storage errors
//! are propagated unmodified from the database collaborator.

use std::fmt;

/// The primary error type for all GridTable operations.
#[derive(Debug)]
pub enum Error {
    /// Table definition is invalid (detected at mount time)
    Config(ConfigError),
    /// An operation was invoked with an invalid argument
    Usage(UsageError),
    /// Row-level data problem (e.g. a reordered row disappeared)
    Data(DataError),
    /// Failure reported by the storage collaborator
    Storage(StorageError),
    /// Wire-format (JSON) and export serialization errors
    Serde(String),
}

#[derive(Debug)]
pub struct ConfigError {
    pub kind: ConfigErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigErrorKind {
    /// A required setting is absent
    MissingSetting,
    /// A relationship segment could not be resolved on its model
    UnresolvedRelationship,
    /// Two columns resolve to the same result alias
    AliasCollision,
    /// A referenced column does not exist
    UnknownColumn,
    /// An option holds a value outside its allowed domain
    InvalidOption,
}

#[derive(Debug)]
pub struct UsageError {
    pub kind: UsageErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageErrorKind {
    /// CUSTOM_RANGE resolved without explicit bounds
    CustomRangeWithoutBounds,
    /// The ALL_RANGES pseudo value was passed to resolution
    AllRangesNotResolvable,
    /// Not exactly one known preset bit
    UnknownPreset,
    /// Applied-filter payload could not be understood
    InvalidFilterPayload,
    /// Filter references an undeclared column
    UnknownFilter,
    /// Interaction references a column that is not registered
    UnknownColumn,
    /// Date arithmetic left the representable range
    DateOutOfRange,
    /// No bulk action with the requested name
    UnknownBulkAction,
    /// Page number or page size out of range
    InvalidPage,
}

#[derive(Debug)]
pub struct DataError {
    pub kind: DataErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataErrorKind {
    /// A row addressed by id was not found
    RowNotFound,
    /// A value had an unexpected type
    UnexpectedValue,
}

#[derive(Debug)]
pub struct StorageError {
    pub message: String,
    pub sql: Option<String>,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ConfigError {
    /// Create a configuration error of the given kind.
    pub fn new(kind: ConfigErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl UsageError {
    /// Create a usage error of the given kind.
    pub fn new(kind: UsageErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl DataError {
    /// Create a data error of the given kind.
    pub fn new(kind: DataErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl StorageError {
    /// Create a storage error with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            sql: None,
            source: None,
        }
    }

    /// Attach the SQL text that failed.
    #[must_use]
    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.sql = Some(sql.into());
        self
    }

    /// Attach the driver error that caused this failure.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl Error {
    /// Shorthand for a configuration error.
    pub fn config(kind: ConfigErrorKind, message: impl Into<String>) -> Self {
        Error::Config(ConfigError::new(kind, message))
    }

    /// Shorthand for a usage error.
    pub fn usage(kind: UsageErrorKind, message: impl Into<String>) -> Self {
        Error::Usage(UsageError::new(kind, message))
    }

    /// Shorthand for a data error.
    pub fn data(kind: DataErrorKind, message: impl Into<String>) -> Self {
        Error::Data(DataError::new(kind, message))
    }

    /// Is this a mount-time configuration error?
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_))
    }

    /// Is this an invalid-argument usage error?
    pub fn is_usage(&self) -> bool {
        matches!(self, Error::Usage(_))
    }

    /// Get the configuration error kind, if any.
    pub fn config_kind(&self) -> Option<ConfigErrorKind> {
        match self {
            Error::Config(e) => Some(e.kind),
            _ => None,
        }
    }

    /// Get the usage error kind, if any.
    pub fn usage_kind(&self) -> Option<UsageErrorKind> {
        match self {
            Error::Usage(e) => Some(e.kind),
            _ => None,
        }
    }

    /// Get the data error kind, if any.
    pub fn data_kind(&self) -> Option<DataErrorKind> {
        match self {
            Error::Data(e) => Some(e.kind),
            _ => None,
        }
    }

    /// Get the SQL that caused this error, if available
    pub fn sql(&self) -> Option<&str> {
        match self {
            Error::Storage(e) => e.sql.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(e) => write!(f, "Configuration error: {}", e.message),
            Error::Usage(e) => write!(f, "Invalid argument: {}", e.message),
            Error::Data(e) => write!(f, "Data error: {}", e.message),
            Error::Storage(e) => {
                if let Some(sql) = &e.sql {
                    write!(f, "Storage error: {} (while executing: {})", e.message, sql)
                } else {
                    write!(f, "Storage error: {}", e.message)
                }
            }
            Error::Serde(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Storage(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for UsageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for DataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

impl From<UsageError> for Error {
    fn from(err: UsageError) -> Self {
        Error::Usage(err)
    }
}

impl From<DataError> for Error {
    fn from(err: DataError) -> Self {
        Error::Data(err)
    }
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        Error::Storage(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serde(err.to_string())
    }
}

/// Result type alias for GridTable operations.
pub type Result<T> = std::result::Result<T, Error>;
