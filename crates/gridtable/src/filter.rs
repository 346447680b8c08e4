//! Declared filters and their applied state.
//!
//! The UI exchanges applied filters as small JSON records
//! (`{"column", "value", "label"}`; date filters carry `customLabel` and
//! `showLabel` too). [`FilterRegistry`] parses them against the declared
//! filters and turns the applied set into [`FilterCondition`]s for the
//! planner.

use crate::date_range::{DateRange, DateRangePreset};
use chrono::NaiveDateTime;
use gridtable_core::{ConfigErrorKind, Error, Result, UsageErrorKind, Value};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Kind of a declared filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    Single,
    Multi,
    Date,
}

impl FilterKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            FilterKind::Single => "single",
            FilterKind::Multi => "multi",
            FilterKind::Date => "date",
        }
    }
}

/// A single- or multi-selection filter offered to the user.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterDefinition {
    pub column: String,
    pub kind: FilterKind,
    /// Options in display order, label to value.
    pub values: IndexMap<String, serde_json::Value>,
    pub show_label: bool,
    pub custom_label: Option<String>,
}

impl FilterDefinition {
    /// Label of the option holding `value`.
    pub fn label_for(&self, value: &serde_json::Value) -> Option<&str> {
        self.values
            .iter()
            .find(|(_, v)| json_eq(v, value))
            .map(|(label, _)| label.as_str())
    }
}

/// Typed builder for [`FilterDefinition`].
#[derive(Debug, Clone)]
pub struct FilterBuilder {
    definition: FilterDefinition,
}

impl FilterBuilder {
    /// Start a single-selection filter on `column`.
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            definition: FilterDefinition {
                column: column.into(),
                kind: FilterKind::Single,
                values: IndexMap::new(),
                show_label: true,
                custom_label: None,
            },
        }
    }

    /// Add options as `(label, value)` pairs.
    #[must_use]
    pub fn with_values<L, V>(mut self, values: impl IntoIterator<Item = (L, V)>) -> Self
    where
        L: Into<String>,
        V: Into<serde_json::Value>,
    {
        self.definition
            .values
            .extend(values.into_iter().map(|(l, v)| (l.into(), v.into())));
        self
    }

    #[must_use]
    pub fn as_type(mut self, kind: FilterKind) -> Self {
        self.definition.kind = kind;
        self
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.definition.custom_label = Some(label.into());
        self
    }

    #[must_use]
    pub fn show_label(mut self, show: bool) -> Self {
        self.definition.show_label = show;
        self
    }

    pub fn build(self) -> FilterDefinition {
        self.definition
    }
}

/// The date-range filter of a table.
#[derive(Debug, Clone, PartialEq)]
pub struct DateFilterSettings {
    pub column: String,
    /// Presets offered in the UI.
    pub presets: DateRangePreset,
    pub show_label: bool,
    pub custom_label: String,
}

impl DateFilterSettings {
    pub fn new(column: impl Into<String>, presets: DateRangePreset) -> Self {
        let column = column.into();
        let custom_label = format!("{column}: ");
        Self {
            column,
            presets,
            show_label: true,
            custom_label,
        }
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.custom_label = label.into();
        self
    }

    #[must_use]
    pub fn show_label(mut self, show: bool) -> Self {
        self.show_label = show;
        self
    }
}

// ==================== Wire records ====================

/// Applied single/multi filter as exchanged with the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterRecord {
    pub column: String,
    pub value: serde_json::Value,
    #[serde(default)]
    pub label: String,
}

/// Applied date filter as exchanged with the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateFilterRecord {
    pub column: String,
    /// Preset bit.
    pub value: u32,
    #[serde(default)]
    pub custom_label: String,
    #[serde(default = "default_true")]
    pub show_label: bool,
}

fn default_true() -> bool {
    true
}

/// The chosen date range: a preset resolved at query time, or explicit bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateSelection {
    Preset(u32),
    Custom(DateRange),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedDateFilter {
    pub column: String,
    pub selection: DateSelection,
    pub custom_label: String,
    pub show_label: bool,
}

impl AppliedDateFilter {
    /// Resolve the selection against `now`.
    pub fn range(&self, now: NaiveDateTime) -> Result<DateRange> {
        match &self.selection {
            DateSelection::Preset(bits) => DateRangePreset::from_bits_retain(*bits).resolve_at(now),
            DateSelection::Custom(range) => Ok(*range),
        }
    }
}

/// Every applied filter; persisted between round trips.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppliedFilters {
    /// At most one record per column.
    pub single: IndexMap<String, FilterRecord>,
    pub multi: Vec<FilterRecord>,
    pub date: Option<AppliedDateFilter>,
}

impl AppliedFilters {
    pub fn is_empty(&self) -> bool {
        self.single.is_empty() && self.multi.is_empty() && self.date.is_none()
    }
}

// ==================== Planner output ====================

/// Predicate a filter contributes, before relationship scoping.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterPredicate {
    Eq(Value),
    In(Vec<Value>),
    Between(Value, Value),
}

/// A predicate on one column (plain or relationship path).
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCondition {
    pub column: String,
    pub predicate: FilterPredicate,
}

/// Display chip for an applied filter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterChip {
    pub kind: FilterKind,
    pub column: String,
    pub label: String,
    pub value: serde_json::Value,
    pub show_label: bool,
    pub custom_label: Option<String>,
}

// ==================== Registry ====================

/// Declared filters plus their applied values.
#[derive(Debug, Clone, Default)]
pub struct FilterRegistry {
    single: Vec<FilterDefinition>,
    multi: Vec<FilterDefinition>,
    date: Option<DateFilterSettings>,
    applied: AppliedFilters,
}

impl FilterRegistry {
    /// Register the declared filters.
    ///
    /// A definition declared under the wrong kind is a configuration error.
    pub fn new(
        single: Vec<FilterDefinition>,
        multi: Vec<FilterDefinition>,
        date: Option<DateFilterSettings>,
    ) -> Result<Self> {
        for (defs, kind) in [(&single, FilterKind::Single), (&multi, FilterKind::Multi)] {
            if let Some(bad) = defs.iter().find(|d| d.kind != kind) {
                return Err(Error::config(
                    ConfigErrorKind::InvalidOption,
                    format!(
                        "filter on '{}' is declared as {} but registered as {}",
                        bad.column,
                        bad.kind.as_str(),
                        kind.as_str()
                    ),
                ));
            }
        }
        if let Some(settings) = &date {
            if settings.presets.is_empty() {
                return Err(Error::config(
                    ConfigErrorKind::MissingSetting,
                    format!("date filter on '{}' offers no presets", settings.column),
                ));
            }
        }
        Ok(Self {
            single,
            multi,
            date,
            applied: AppliedFilters::default(),
        })
    }

    /// Columns referenced by any declared filter.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.single
            .iter()
            .chain(self.multi.iter())
            .map(|d| d.column.as_str())
            .chain(self.date.iter().map(|d| d.column.as_str()))
    }

    pub fn single_definitions(&self) -> &[FilterDefinition] {
        &self.single
    }

    pub fn multi_definitions(&self) -> &[FilterDefinition] {
        &self.multi
    }

    pub fn date_settings(&self) -> Option<&DateFilterSettings> {
        self.date.as_ref()
    }

    pub fn applied(&self) -> &AppliedFilters {
        &self.applied
    }

    /// Replace the applied state (restoring a persisted component).
    ///
    /// Every record must name a declared filter of its kind, and a date
    /// selection must be one the date filter offers.
    pub fn restore(&mut self, applied: AppliedFilters) -> Result<()> {
        for (column, record) in &applied.single {
            find_definition(&self.single, column, FilterKind::Single)?;
            if record.column != *column {
                return Err(Error::usage(
                    UsageErrorKind::InvalidFilterPayload,
                    format!(
                        "single filter keyed '{column}' holds a record for '{}'",
                        record.column
                    ),
                ));
            }
        }
        for record in &applied.multi {
            find_definition(&self.multi, &record.column, FilterKind::Multi)?;
        }
        if let Some(date) = &applied.date {
            let settings = self.date_for(&date.column)?;
            let preset = match date.selection {
                DateSelection::Preset(bits) => DateRangePreset::from_bits_retain(bits),
                DateSelection::Custom(_) => DateRangePreset::CUSTOM_RANGE,
            };
            ensure_offered(settings, preset)?;
        }
        self.applied = applied;
        Ok(())
    }

    // ==================== Mutations ====================

    /// Apply a single-selection record; a value of `-1` clears the column.
    pub fn apply_single_json(&mut self, payload: &str) -> Result<()> {
        let record: FilterRecord = serde_json::from_str(payload)?;
        let definition = find_definition(&self.single, &record.column, FilterKind::Single)?;
        ensure_scalar(&record)?;

        if is_clear_value(&record.value) {
            self.applied.single.shift_remove(&record.column);
            return Ok(());
        }
        let record = with_option_label(record, definition);
        self.applied.single.insert(record.column.clone(), record);
        Ok(())
    }

    /// Add a record to the multi-selection set.
    pub fn add_multi_json(&mut self, payload: &str) -> Result<()> {
        let record: FilterRecord = serde_json::from_str(payload)?;
        let definition = find_definition(&self.multi, &record.column, FilterKind::Multi)?;
        ensure_scalar(&record)?;

        let exists = self
            .applied
            .multi
            .iter()
            .any(|r| r.column == record.column && json_eq(&r.value, &record.value));
        if !exists {
            let record = with_option_label(record, definition);
            self.applied.multi.push(record);
        }
        Ok(())
    }

    /// Select a date preset.
    pub fn set_date_json(&mut self, payload: &str) -> Result<()> {
        let record: DateFilterRecord = serde_json::from_str(payload)?;
        let settings = self.date_for(&record.column)?;

        let preset = DateRangePreset::from_bits_retain(record.value);
        if preset == DateRangePreset::CUSTOM_RANGE {
            return Err(Error::usage(
                UsageErrorKind::CustomRangeWithoutBounds,
                "CUSTOM_RANGE must be applied with explicit start and end",
            ));
        }
        if preset == DateRangePreset::ALL_RANGES {
            return Err(Error::usage(
                UsageErrorKind::AllRangesNotResolvable,
                "ALL_RANGES cannot be applied as a filter",
            ));
        }
        ensure_offered(settings, preset)?;

        let custom_label = if record.custom_label.is_empty() {
            settings.custom_label.clone()
        } else {
            record.custom_label
        };
        self.applied.date = Some(AppliedDateFilter {
            column: record.column,
            selection: DateSelection::Preset(preset.bits()),
            custom_label,
            show_label: record.show_label,
        });
        Ok(())
    }

    /// Select an explicit date range on the date filter.
    pub fn set_custom_date_range(
        &mut self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<()> {
        let range = DateRange::new(start, end)?;
        let settings = self.date.as_ref().ok_or_else(|| {
            Error::usage(UsageErrorKind::UnknownFilter, "table declares no date filter")
        })?;
        ensure_offered(settings, DateRangePreset::CUSTOM_RANGE)?;
        self.applied.date = Some(AppliedDateFilter {
            column: settings.column.clone(),
            selection: DateSelection::Custom(range),
            custom_label: settings.custom_label.clone(),
            show_label: settings.show_label,
        });
        Ok(())
    }

    /// Remove an applied filter. Returns whether anything changed.
    ///
    /// `value` selects the multi-selection record to drop and is ignored for
    /// the other kinds.
    pub fn remove(
        &mut self,
        kind: FilterKind,
        column: &str,
        value: Option<&serde_json::Value>,
    ) -> bool {
        match kind {
            FilterKind::Single => self.applied.single.shift_remove(column).is_some(),
            FilterKind::Multi => {
                let before = self.applied.multi.len();
                self.applied.multi.retain(|r| {
                    r.column != column || value.is_some_and(|v| !json_eq(&r.value, v))
                });
                self.applied.multi.len() != before
            }
            FilterKind::Date => {
                let matches = self.applied.date.as_ref().is_some_and(|d| d.column == column);
                if matches {
                    self.applied.date = None;
                }
                matches
            }
        }
    }

    /// Drop every applied filter.
    pub fn clear(&mut self) {
        self.applied = AppliedFilters::default();
    }

    // ==================== Outputs ====================

    /// Predicates for the applied filters.
    ///
    /// Multi-selection records on one column are OR-ed into a single IN;
    /// different columns are AND-ed by the planner.
    pub fn conditions(&self, now: NaiveDateTime) -> Result<Vec<FilterCondition>> {
        let mut conditions: Vec<FilterCondition> = self
            .applied
            .single
            .values()
            .map(|r| FilterCondition {
                column: r.column.clone(),
                predicate: FilterPredicate::Eq(Value::from_json(&r.value)),
            })
            .collect();

        let mut grouped: IndexMap<&str, Vec<Value>> = IndexMap::new();
        for record in &self.applied.multi {
            grouped
                .entry(record.column.as_str())
                .or_default()
                .push(Value::from_json(&record.value));
        }
        conditions.extend(grouped.into_iter().map(|(column, values)| FilterCondition {
            column: column.to_string(),
            predicate: FilterPredicate::In(values),
        }));

        if let Some(date) = &self.applied.date {
            let range = date.range(now)?;
            conditions.push(FilterCondition {
                column: date.column.clone(),
                predicate: FilterPredicate::Between(
                    Value::DateTime(range.start),
                    Value::DateTime(range.end),
                ),
            });
        }
        Ok(conditions)
    }

    /// Display chips for every applied filter.
    pub fn chips(&self, now: NaiveDateTime) -> Result<Vec<FilterChip>> {
        let mut chips = Vec::new();
        for (kind, defs, records) in [
            (
                FilterKind::Single,
                &self.single,
                self.applied.single.values().collect::<Vec<_>>(),
            ),
            (
                FilterKind::Multi,
                &self.multi,
                self.applied.multi.iter().collect(),
            ),
        ] {
            for record in records {
                let definition = defs.iter().find(|d| d.column == record.column);
                chips.push(FilterChip {
                    kind,
                    column: record.column.clone(),
                    label: record.label.clone(),
                    value: record.value.clone(),
                    show_label: definition.is_none_or(|d| d.show_label),
                    custom_label: definition.and_then(|d| d.custom_label.clone()),
                });
            }
        }

        if let Some(date) = &self.applied.date {
            let range = date.range(now)?;
            let value = match &date.selection {
                DateSelection::Preset(bits) => serde_json::Value::from(*bits),
                DateSelection::Custom(_) => {
                    serde_json::Value::from(DateRangePreset::CUSTOM_RANGE.bits())
                }
            };
            chips.push(FilterChip {
                kind: FilterKind::Date,
                column: date.column.clone(),
                label: range.to_string(),
                value,
                show_label: date.show_label,
                custom_label: Some(date.custom_label.clone()),
            });
        }
        Ok(chips)
    }

    fn date_for(&self, column: &str) -> Result<&DateFilterSettings> {
        match &self.date {
            Some(settings) if settings.column == column => Ok(settings),
            _ => {
                warn!(column = %column, "date filter payload references an undeclared column");
                Err(Error::usage(
                    UsageErrorKind::UnknownFilter,
                    format!("no date filter declared on '{column}'"),
                ))
            }
        }
    }
}

fn find_definition<'a>(
    defs: &'a [FilterDefinition],
    column: &str,
    kind: FilterKind,
) -> Result<&'a FilterDefinition> {
    defs.iter().find(|d| d.column == column).ok_or_else(|| {
        warn!(
            column = %column,
            kind = kind.as_str(),
            "filter payload references an undeclared column"
        );
        Error::usage(
            UsageErrorKind::UnknownFilter,
            format!("no {} filter declared on '{column}'", kind.as_str()),
        )
    })
}

/// `preset` must be a single preset listed in the date filter's settings.
fn ensure_offered(settings: &DateFilterSettings, preset: DateRangePreset) -> Result<()> {
    if preset.bits().count_ones() != 1 || !settings.presets.contains(preset) {
        return Err(Error::usage(
            UsageErrorKind::UnknownPreset,
            format!(
                "preset {} is not offered by the date filter on '{}'",
                preset.bits(),
                settings.column
            ),
        ));
    }
    Ok(())
}

fn ensure_scalar(record: &FilterRecord) -> Result<()> {
    if record.value.is_array() || record.value.is_object() {
        return Err(Error::usage(
            UsageErrorKind::InvalidFilterPayload,
            format!("filter value for '{}' must be a scalar", record.column),
        ));
    }
    Ok(())
}

fn with_option_label(mut record: FilterRecord, definition: &FilterDefinition) -> FilterRecord {
    if record.label.is_empty() {
        if let Some(label) = definition.label_for(&record.value) {
            record.label = label.to_string();
        }
    }
    record
}

fn is_clear_value(value: &serde_json::Value) -> bool {
    value.as_i64() == Some(-1) || value.as_str() == Some("-1")
}

/// Compare option values loosely: `1` and `"1"` are the same option.
fn json_eq(a: &serde_json::Value, b: &serde_json::Value) -> bool {
    match (a, b) {
        (serde_json::Value::String(x), serde_json::Value::String(y)) => x == y,
        (serde_json::Value::String(s), other) | (other, serde_json::Value::String(s)) => {
            *s == other.to_string()
        }
        _ => a == b,
    }
}
