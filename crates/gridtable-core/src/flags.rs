//! Bitmask settings for columns and pagination placement.

use bitflags::bitflags;

bitflags! {
    /// Per-column behavior switches.
    ///
    /// Each bit is independent; the three default-sort bits are
    /// reconciled by [`ColumnSettings::sanitize_sort_flags`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ColumnSettings: u32 {
        const SORTABLE = 1 << 1;
        const EXPORTABLE = 1 << 2;
        const SEARCHABLE = 1 << 3;
        const HIDDEN = 1 << 4;
        const TOGGLE_VISIBILITY = 1 << 5;
        const DEFAULT_SORT = 1 << 6;
        const DEFAULT_SORT_ASC = 1 << 7;
        const DEFAULT_SORT_DESC = 1 << 8;
        /// Render an empty cell; never read from storage.
        const EMPTY = 1 << 9;
    }
}

bitflags! {
    /// Where the pagination links are rendered.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PaginationRack: u32 {
        const NONE = 0;
        const TOP = 1 << 1;
        const BOTTOM = 1 << 2;
    }
}

impl ColumnSettings {
    /// All default-sort bits.
    pub const SORT_DEFAULTS: Self = Self::DEFAULT_SORT
        .union(Self::DEFAULT_SORT_ASC)
        .union(Self::DEFAULT_SORT_DESC);

    /// Keep only the highest default-sort bit when more than one is set.
    ///
    /// With zero or one default-sort bit the input is returned unchanged.
    #[must_use]
    pub fn sanitize_sort_flags(self) -> Self {
        let sort_bits = self.intersection(Self::SORT_DEFAULTS);
        if sort_bits.bits().count_ones() <= 1 {
            return self;
        }
        let highest = 1_u32 << (31 - sort_bits.bits().leading_zeros());
        self.difference(Self::SORT_DEFAULTS)
            .union(Self::from_bits_truncate(highest))
    }

    /// Whether any default-sort bit is set.
    pub fn has_default_sort(self) -> bool {
        self.intersects(Self::SORT_DEFAULTS)
    }
}

impl Default for ColumnSettings {
    /// New columns are exportable unless told otherwise.
    fn default() -> Self {
        Self::EXPORTABLE
    }
}

impl Default for PaginationRack {
    fn default() -> Self {
        Self::BOTTOM
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_keeps_highest_sort_bit() {
        let all = ColumnSettings::SORTABLE | ColumnSettings::SORT_DEFAULTS;
        assert_eq!(
            all.sanitize_sort_flags(),
            ColumnSettings::SORTABLE | ColumnSettings::DEFAULT_SORT_DESC
        );

        let two = ColumnSettings::DEFAULT_SORT | ColumnSettings::DEFAULT_SORT_ASC;
        assert_eq!(two.sanitize_sort_flags(), ColumnSettings::DEFAULT_SORT_ASC);

        let low_and_high = ColumnSettings::DEFAULT_SORT
            | ColumnSettings::DEFAULT_SORT_DESC
            | ColumnSettings::HIDDEN;
        assert_eq!(
            low_and_high.sanitize_sort_flags(),
            ColumnSettings::DEFAULT_SORT_DESC | ColumnSettings::HIDDEN
        );
    }

    #[test]
    fn test_sanitize_leaves_single_or_none_untouched() {
        for flags in [
            ColumnSettings::empty(),
            ColumnSettings::SEARCHABLE,
            ColumnSettings::DEFAULT_SORT | ColumnSettings::EMPTY,
            ColumnSettings::DEFAULT_SORT_ASC,
        ] {
            assert_eq!(flags.sanitize_sort_flags(), flags);
        }
    }

    #[test]
    fn test_defaults() {
        assert_eq!(ColumnSettings::default(), ColumnSettings::EXPORTABLE);
        assert_eq!(PaginationRack::default(), PaginationRack::BOTTOM);
        assert_eq!(ColumnSettings::EMPTY.bits(), 512);
    }
}
