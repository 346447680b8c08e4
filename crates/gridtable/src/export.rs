//! Spreadsheet export projection.
//!
//! [`ExportProjector`] turns query rows plus the column set into a
//! header row and a row-major value matrix. Writing the file is delegated
//! to an [`ExportWriter`]; [`CsvExportWriter`] is the built-in one.

use crate::registry::ColumnRegistry;
use gridtable_core::{ConfigErrorKind, Error, Result, Row};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Default sheet title.
pub const DEFAULT_SHEET_TITLE: &str = "Worksheet-1";

/// How an export is projected and named.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    /// Apply column formatters instead of raw values.
    pub use_formatters: bool,
    /// HTML tags removed from every value (opening and closing forms).
    pub strip_tags: Vec<String>,
    pub title: String,
    /// Artifact file name; derived from the title when absent.
    pub file_name: Option<String>,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            use_formatters: true,
            strip_tags: Vec::new(),
            title: DEFAULT_SHEET_TITLE.to_string(),
            file_name: None,
        }
    }
}

impl ExportSettings {
    #[must_use]
    pub fn use_formatters(mut self, enabled: bool) -> Self {
        self.use_formatters = enabled;
        self
    }

    #[must_use]
    pub fn strip_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.strip_tags = tags.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    #[must_use]
    pub fn file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }
}

/// Headers plus row-major values, ready for a writer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportTable {
    pub title: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Projects rows into an [`ExportTable`].
#[derive(Debug, Clone)]
pub struct ExportProjector {
    settings: ExportSettings,
    strip: Option<Regex>,
}

impl ExportProjector {
    /// Compile the tag-stripping pattern for `settings`.
    pub fn new(settings: ExportSettings) -> Result<Self> {
        let tags: Vec<String> = settings
            .strip_tags
            .iter()
            .map(|t| t.trim().trim_matches(|c| c == '<' || c == '>' || c == '/'))
            .filter(|t| !t.is_empty())
            .map(regex::escape)
            .collect();

        let strip = if tags.is_empty() {
            None
        } else {
            let pattern = format!(r"(?i)</?(?:{})\b[^>]*>", tags.join("|"));
            let regex = Regex::new(&pattern).map_err(|e| {
                Error::config(
                    ConfigErrorKind::InvalidOption,
                    format!("invalid strip_tags list: {e}"),
                )
            })?;
            Some(regex)
        };

        Ok(Self { settings, strip })
    }

    pub fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    /// Exportable, storage-backed columns in registry order.
    pub fn project(&self, columns: &ColumnRegistry, rows: &[Row]) -> ExportTable {
        let exported: Vec<_> = columns
            .iter()
            .filter(|c| c.is_exportable() && !c.is_empty_column())
            .collect();

        let headers = exported.iter().map(|c| c.title().to_string()).collect();
        let rows = rows
            .iter()
            .map(|row| {
                exported
                    .iter()
                    .map(|column| {
                        let value = if self.settings.use_formatters {
                            column.value(row)
                        } else {
                            column.display_value(row)
                        };
                        self.strip(value)
                    })
                    .collect()
            })
            .collect();

        ExportTable {
            title: self.settings.title.clone(),
            headers,
            rows,
        }
    }

    fn strip(&self, value: String) -> String {
        match &self.strip {
            Some(regex) => regex.replace_all(&value, "").into_owned(),
            None => value,
        }
    }
}

/// A downloadable export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// Writes an [`ExportTable`] into a file format.
pub trait ExportWriter: Send + Sync {
    fn write(&self, table: &ExportTable, settings: &ExportSettings) -> Result<ExportArtifact>;
}

/// Host-side export configuration.
#[derive(Clone)]
pub struct ExportHandler {
    pub settings: ExportSettings,
    pub writer: Arc<dyn ExportWriter>,
}

impl ExportHandler {
    pub fn new(settings: ExportSettings, writer: impl ExportWriter + 'static) -> Self {
        Self {
            settings,
            writer: Arc::new(writer),
        }
    }

    /// CSV export with default settings.
    pub fn csv() -> Self {
        Self::new(ExportSettings::default(), CsvExportWriter::default())
    }
}

impl std::fmt::Debug for ExportHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportHandler")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// Comma-separated export.
#[derive(Debug, Clone, Copy)]
pub struct CsvExportWriter {
    pub delimiter: u8,
}

impl Default for CsvExportWriter {
    fn default() -> Self {
        Self { delimiter: b',' }
    }
}

impl ExportWriter for CsvExportWriter {
    fn write(&self, table: &ExportTable, settings: &ExportSettings) -> Result<ExportArtifact> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .from_writer(Vec::new());

        writer.write_record(&table.headers).map_err(csv_error)?;
        for row in &table.rows {
            writer.write_record(row).map_err(csv_error)?;
        }
        writer
            .flush()
            .map_err(|e| Error::Serde(format!("csv flush failed: {e}")))?;
        let bytes = writer
            .into_inner()
            .map_err(|e| Error::Serde(format!("csv writer failed: {e}")))?;

        let file_name = settings
            .file_name
            .clone()
            .unwrap_or_else(|| format!("{}.csv", table.title));
        Ok(ExportArtifact {
            file_name,
            mime: "text/csv".to_string(),
            bytes,
        })
    }
}

fn csv_error(e: csv::Error) -> Error {
    Error::Serde(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::Column;
    use gridtable_core::Value;
    use pretty_assertions::assert_eq;

    fn columns() -> ColumnRegistry {
        ColumnRegistry::from_columns([
            Column::new("Name"),
            Column::new("Bio"),
            Column::new("Actions").empty(),
            Column::new("Internal").not_exportable(),
        ])
        .unwrap()
    }

    fn rows() -> Vec<Row> {
        (1..=3)
            .map(|i| {
                Row::from_pairs([
                    ("id", Value::BigInt(i)),
                    ("name", Value::Text(format!("user {i}"))),
                    ("bio", Value::Text(format!("<b>bold</b> <i>{i}</i>"))),
                    ("internal", Value::Text("x".to_string())),
                ])
            })
            .collect()
    }

    #[test]
    fn test_projection_shape() {
        let projector = ExportProjector::new(ExportSettings::default()).unwrap();
        let table = projector.project(&columns(), &rows());
        assert_eq!(table.headers, vec!["Name", "Bio"]);
        assert_eq!(table.rows.len(), 3);
        assert!(table.rows.iter().all(|r| r.len() == 2));
        assert_eq!(table.title, "Worksheet-1");
    }

    #[test]
    fn test_strip_tags_allow_list() {
        let settings = ExportSettings::default().strip_tags(["b", "<i>"]);
        let projector = ExportProjector::new(settings).unwrap();
        let table = projector.project(&columns(), &rows());
        assert_eq!(table.rows[0][1], "bold 1");

        let settings = ExportSettings::default().strip_tags(["i"]);
        let table = ExportProjector::new(settings)
            .unwrap()
            .project(&columns(), &rows());
        assert_eq!(table.rows[0][1], "<b>bold</b> 1");
    }

    #[test]
    fn test_formatters_toggle() {
        let shout = Column::new("Name").formatter(|row: &Row| {
            row.get_by_name("name")
                .map(|v| v.to_string().to_uppercase())
                .unwrap_or_default()
        });
        let columns = ColumnRegistry::from_columns([shout]).unwrap();

        let with = ExportProjector::new(ExportSettings::default())
            .unwrap()
            .project(&columns, &rows());
        assert_eq!(with.rows[0][0], "USER 1");

        let without = ExportProjector::new(ExportSettings::default().use_formatters(false))
            .unwrap()
            .project(&columns, &rows());
        assert_eq!(without.rows[0][0], "user 1");
    }

    #[test]
    fn test_csv_writer() {
        let table = ExportTable {
            title: "Users".to_string(),
            headers: vec!["Name".to_string(), "Note".to_string()],
            rows: vec![vec!["Ada".to_string(), "a, b".to_string()]],
        };
        let artifact = CsvExportWriter::default()
            .write(&table, &ExportSettings::default().title("Users"))
            .unwrap();
        assert_eq!(artifact.file_name, "Users.csv");
        assert_eq!(artifact.mime, "text/csv");
        assert_eq!(
            String::from_utf8(artifact.bytes).unwrap(),
            "Name,Note\nAda,\"a, b\"\n"
        );
    }
}
