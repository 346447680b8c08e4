//! Named date-range presets and their resolution to `[start, end]` pairs.

use bitflags::bitflags;
use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime};
use gridtable_core::{DATETIME_FORMAT, Error, Result, UsageErrorKind};
use serde::{Deserialize, Serialize};
use std::fmt;

bitflags! {
    /// Catalog of date-range presets offered by a date filter.
    ///
    /// A filter setting may hold several presets (the ones shown in the UI);
    /// resolution only accepts a single concrete preset.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DateRangePreset: u32 {
        const LAST_24_HOURS = 1 << 1;
        const LAST_48_HOURS = 1 << 2;
        const LAST_72_HOURS = 1 << 3;
        const LAST_7_DAYS = 1 << 4;
        const LAST_14_DAYS = 1 << 5;
        const THIS_MONTH = 1 << 6;
        const LAST_2_MONTHS = 1 << 7;
        const LAST_3_MONTHS = 1 << 8;
        const LAST_6_MONTHS = 1 << 9;
        const PAST_MONTH = 1 << 10;
        const PAST_2_MONTHS = 1 << 11;
        const PAST_4_MONTHS = 1 << 12;
        const PAST_6_MONTHS = 1 << 13;
        const THIS_YEAR = 1 << 14;
        const LAST_2_YEARS = 1 << 15;
        const PAST_YEAR = 1 << 16;
        const CUSTOM_RANGE = 1 << 17;
        const SO_FAR_THIS_MONTH = 1 << 18;
    }
}

/// Display order and descriptions of the concrete presets.
const CATALOG: &[(DateRangePreset, &str)] = &[
    (DateRangePreset::LAST_24_HOURS, "Last 24 hours"),
    (DateRangePreset::LAST_48_HOURS, "Last 48 hours"),
    (DateRangePreset::LAST_72_HOURS, "Last 72 hours"),
    (DateRangePreset::LAST_7_DAYS, "Last 7 days"),
    (DateRangePreset::LAST_14_DAYS, "Last 14 days"),
    (DateRangePreset::THIS_MONTH, "This full month"),
    (
        DateRangePreset::SO_FAR_THIS_MONTH,
        "From the start of this month until today",
    ),
    (DateRangePreset::LAST_2_MONTHS, "Last 2 months"),
    (DateRangePreset::LAST_3_MONTHS, "Last 3 months"),
    (DateRangePreset::LAST_6_MONTHS, "Last 6 months"),
    (DateRangePreset::PAST_MONTH, "Last month"),
    (DateRangePreset::PAST_2_MONTHS, "The previous 2 months"),
    (DateRangePreset::PAST_4_MONTHS, "The previous 4 months"),
    (DateRangePreset::PAST_6_MONTHS, "The previous 6 months"),
    (DateRangePreset::THIS_YEAR, "This year"),
    (DateRangePreset::LAST_2_YEARS, "Last 2 years"),
    (DateRangePreset::PAST_YEAR, "Last year"),
    (DateRangePreset::CUSTOM_RANGE, "Custom range"),
];

impl DateRangePreset {
    /// Every concrete preset, for UI display only.
    pub const ALL_RANGES: Self = Self::all().difference(Self::CUSTOM_RANGE);

    /// Human description of a single preset.
    pub fn description(self) -> Option<&'static str> {
        if self == Self::ALL_RANGES {
            return Some("All ranges");
        }
        CATALOG
            .iter()
            .find(|(preset, _)| *preset == self)
            .map(|(_, text)| *text)
    }

    /// The presets contained in this set, in display order.
    pub fn iter_presets(self) -> impl Iterator<Item = DateRangePreset> {
        CATALOG
            .iter()
            .map(|(preset, _)| *preset)
            .filter(move |preset| self.contains(*preset))
    }

    /// Resolve a single preset against `now`.
    ///
    /// CUSTOM_RANGE needs explicit bounds (see [`DateRange::new`]) and
    /// ALL_RANGES is a display-only value; both are usage errors here.
    pub fn resolve_at(self, now: NaiveDateTime) -> Result<DateRange> {
        if self == Self::ALL_RANGES {
            return Err(Error::usage(
                UsageErrorKind::AllRangesNotResolvable,
                "ALL_RANGES enumerates presets for display and cannot be resolved",
            ));
        }
        if self == Self::CUSTOM_RANGE {
            return Err(Error::usage(
                UsageErrorKind::CustomRangeWithoutBounds,
                "CUSTOM_RANGE requires an explicit start and end",
            ));
        }
        if self.bits().count_ones() != 1 || !Self::all().contains(self) {
            return Err(Error::usage(
                UsageErrorKind::UnknownPreset,
                format!("{} is not a single date-range preset", self.bits()),
            ));
        }

        let today = now.date();
        let this_month = first_of_month(today)?;

        let range = match self {
            Self::LAST_24_HOURS => DateRange::raw(now - Duration::hours(24), now),
            Self::LAST_48_HOURS => DateRange::raw(now - Duration::hours(48), now),
            Self::LAST_72_HOURS => DateRange::raw(now - Duration::hours(72), now),
            Self::LAST_7_DAYS => DateRange::raw(now - Duration::days(7), now),
            Self::LAST_14_DAYS => DateRange::raw(now - Duration::days(14), now),
            Self::THIS_MONTH => DateRange::raw(
                start_of_day(this_month),
                end_of_day(last_of_month(this_month)?),
            ),
            Self::SO_FAR_THIS_MONTH => DateRange::raw(start_of_day(this_month), now),
            Self::LAST_2_MONTHS => months_back(this_month, 1)?,
            Self::LAST_3_MONTHS => months_back(this_month, 2)?,
            Self::LAST_6_MONTHS => months_back(this_month, 5)?,
            Self::PAST_MONTH => months_back(this_month, 1)?,
            Self::PAST_2_MONTHS => months_back(this_month, 2)?,
            Self::PAST_4_MONTHS => months_back(this_month, 4)?,
            Self::PAST_6_MONTHS => months_back(this_month, 6)?,
            Self::THIS_YEAR => whole_year(today.year())?,
            Self::LAST_2_YEARS | Self::PAST_YEAR => whole_year(today.year() - 1)?,
            _ => {
                return Err(Error::usage(
                    UsageErrorKind::UnknownPreset,
                    format!("{} is not a resolvable preset", self.bits()),
                ));
            }
        };
        Ok(range)
    }
}

/// A closed `[start, end]` interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl DateRange {
    /// An explicit (custom) range; `start` must not be after `end`.
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self> {
        if start > end {
            return Err(Error::usage(
                UsageErrorKind::InvalidFilterPayload,
                format!(
                    "date range start {} is after end {}",
                    start.format(DATETIME_FORMAT),
                    end.format(DATETIME_FORMAT)
                ),
            ));
        }
        Ok(Self { start, end })
    }

    fn raw(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {}",
            self.start.format(DATETIME_FORMAT),
            self.end.format(DATETIME_FORMAT)
        )
    }
}

/// Source of "now" for preset resolution.
pub trait Clock: Send + Sync {
    /// Current local time.
    fn now(&self) -> NaiveDateTime;
}

/// Wall clock in the host's local time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

fn out_of_range() -> Error {
    Error::usage(
        UsageErrorKind::DateOutOfRange,
        "date-range arithmetic left the supported calendar",
    )
}

fn start_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

fn end_of_day(date: NaiveDate) -> NaiveDateTime {
    // 23:59:59 is always a valid time.
    date.and_time(NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN))
}

fn first_of_month(date: NaiveDate) -> Result<NaiveDate> {
    date.with_day(1).ok_or_else(out_of_range)
}

fn last_of_month(first: NaiveDate) -> Result<NaiveDate> {
    first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .ok_or_else(out_of_range)
}

/// From the first day `n` months before `this_month` through the end of last month.
fn months_back(this_month: NaiveDate, n: u32) -> Result<DateRange> {
    let start = this_month
        .checked_sub_months(Months::new(n))
        .ok_or_else(out_of_range)?;
    let end = this_month.pred_opt().ok_or_else(out_of_range)?;
    Ok(DateRange::raw(start_of_day(start), end_of_day(end)))
}

fn whole_year(year: i32) -> Result<DateRange> {
    let start = NaiveDate::from_ymd_opt(year, 1, 1).ok_or_else(out_of_range)?;
    let end = NaiveDate::from_ymd_opt(year, 12, 31).ok_or_else(out_of_range)?;
    Ok(DateRange::raw(start_of_day(start), end_of_day(end)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn at(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn test_last_7_days() {
        let now = at(2024, 3, 10, 12, 0, 0);
        let range = DateRangePreset::LAST_7_DAYS.resolve_at(now).unwrap();
        assert_eq!(range.start, at(2024, 3, 3, 12, 0, 0));
        assert_eq!(range.end, now);
    }

    #[test]
    fn test_hours_presets() {
        let now = at(2024, 3, 10, 12, 0, 0);
        let range = DateRangePreset::LAST_48_HOURS.resolve_at(now).unwrap();
        assert_eq!(range.start, at(2024, 3, 8, 12, 0, 0));
        assert_eq!(range.end, now);
    }

    #[test]
    fn test_month_presets() {
        let now = at(2024, 3, 10, 12, 0, 0);

        let this_month = DateRangePreset::THIS_MONTH.resolve_at(now).unwrap();
        assert_eq!(this_month.start, at(2024, 3, 1, 0, 0, 0));
        assert_eq!(this_month.end, at(2024, 3, 31, 23, 59, 59));

        let so_far = DateRangePreset::SO_FAR_THIS_MONTH.resolve_at(now).unwrap();
        assert_eq!(so_far.start, at(2024, 3, 1, 0, 0, 0));
        assert_eq!(so_far.end, now);

        let past = DateRangePreset::PAST_MONTH.resolve_at(now).unwrap();
        assert_eq!(past.start, at(2024, 2, 1, 0, 0, 0));
        assert_eq!(past.end, at(2024, 2, 29, 23, 59, 59));

        let last_3 = DateRangePreset::LAST_3_MONTHS.resolve_at(now).unwrap();
        assert_eq!(last_3.start, at(2024, 1, 1, 0, 0, 0));
        assert_eq!(last_3.end, at(2024, 2, 29, 23, 59, 59));

        let past_4 = DateRangePreset::PAST_4_MONTHS.resolve_at(now).unwrap();
        assert_eq!(past_4.start, at(2023, 11, 1, 0, 0, 0));
        assert_eq!(past_4.end, at(2024, 2, 29, 23, 59, 59));
    }

    #[test]
    fn test_year_presets() {
        let now = at(2024, 3, 10, 12, 0, 0);
        let this_year = DateRangePreset::THIS_YEAR.resolve_at(now).unwrap();
        assert_eq!(this_year.start, at(2024, 1, 1, 0, 0, 0));
        assert_eq!(this_year.end, at(2024, 12, 31, 23, 59, 59));

        let last_year = DateRangePreset::PAST_YEAR.resolve_at(now).unwrap();
        assert_eq!(last_year.start, at(2023, 1, 1, 0, 0, 0));
        assert_eq!(last_year.end, at(2023, 12, 31, 23, 59, 59));
    }

    #[test]
    fn test_custom_and_all_ranges_are_usage_errors() {
        let now = at(2024, 3, 10, 12, 0, 0);
        let err = DateRangePreset::CUSTOM_RANGE.resolve_at(now).unwrap_err();
        assert_eq!(
            err.usage_kind(),
            Some(UsageErrorKind::CustomRangeWithoutBounds)
        );

        let err = DateRangePreset::ALL_RANGES.resolve_at(now).unwrap_err();
        assert_eq!(err.usage_kind(), Some(UsageErrorKind::AllRangesNotResolvable));

        let combo = DateRangePreset::LAST_7_DAYS | DateRangePreset::THIS_YEAR;
        let err = combo.resolve_at(now).unwrap_err();
        assert_eq!(err.usage_kind(), Some(UsageErrorKind::UnknownPreset));

        let err = DateRangePreset::empty().resolve_at(now).unwrap_err();
        assert_eq!(err.usage_kind(), Some(UsageErrorKind::UnknownPreset));
    }

    #[test]
    fn test_all_ranges_lists_every_concrete_preset() {
        let listed: Vec<_> = DateRangePreset::ALL_RANGES.iter_presets().collect();
        assert_eq!(listed.len(), 17);
        assert!(!listed.contains(&DateRangePreset::CUSTOM_RANGE));
        assert_eq!(DateRangePreset::ALL_RANGES.description(), Some("All ranges"));
        assert_eq!(
            DateRangePreset::THIS_MONTH.description(),
            Some("This full month")
        );
    }

    #[test]
    fn test_custom_range_validation_and_display() {
        let start = at(2024, 1, 1, 0, 0, 0);
        let end = at(2024, 1, 31, 23, 59, 59);
        let range = DateRange::new(start, end).unwrap();
        assert_eq!(range.to_string(), "2024-01-01 00:00:00 - 2024-01-31 23:59:59");
        assert!(DateRange::new(end, start).is_err());
    }
}
