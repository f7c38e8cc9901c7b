//! Real/virtual attribute handle translation
//!
//! The master sees the slave's attribute database with every hidden
//! attribute cut out, so handles above a hidden one shift down. The
//! translator keeps the hidden handles as ascending, non-overlapping,
//! inclusive ranges and converts in both directions:
//!
//! - `real_to_virtual(h)` subtracts the size of every range below `h`, or
//!   returns `None` when `h` itself is hidden.
//! - `virtual_to_real(h)` walks the ranges in ascending order and adds the
//!   size of each range starting at or below the running value.
//!
//! `0xFFFF` marks the end of the attribute space in range requests and is
//! never translated.

use crate::att::{HandleMapper, ATT_HANDLE_MAX};
use crate::discovery::DiscoverySnapshot;
use crate::rules::UuidFilter;
use log::debug;
use std::fmt;

/// Inclusive range of hidden real handles
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct HandleRange {
    pub start: u16,
    pub end: u16,
}

impl HandleRange {
    pub fn new(start: u16, end: u16) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    /// A range covering one handle
    pub fn single(handle: u16) -> Self {
        Self::new(handle, handle)
    }

    /// Number of handles in the range
    pub fn size(&self) -> u32 {
        u32::from(self.end) - u32::from(self.start) + 1
    }

    pub fn contains(&self, handle: u16) -> bool {
        self.start <= handle && handle <= self.end
    }
}

impl fmt::Display for HandleRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04X}-0x{:04X}", self.start, self.end)
    }
}

/// Bidirectional handle mapping between the slave (real) and the master (virtual)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandleTranslator {
    ranges: Vec<HandleRange>,
    uuid_filter: UuidFilter,
}

impl HandleTranslator {
    /// Build from arbitrary ranges; they are sorted and overlapping or
    /// adjacent ranges are merged.
    pub fn new(ranges: impl IntoIterator<Item = HandleRange>, uuid_filter: UuidFilter) -> Self {
        let mut sorted: Vec<HandleRange> = ranges.into_iter().collect();
        sorted.sort();

        let mut merged: Vec<HandleRange> = Vec::with_capacity(sorted.len());
        for range in sorted {
            match merged.last_mut() {
                Some(last) if u32::from(range.start) <= u32::from(last.end) + 1 => {
                    last.end = last.end.max(range.end);
                }
                _ => merged.push(range),
            }
        }

        Self {
            ranges: merged,
            uuid_filter,
        }
    }

    /// Hide every discovered handle carrying a filtered UUID
    pub fn from_discovery(snapshot: &DiscoverySnapshot, uuid_filter: UuidFilter) -> Self {
        let hidden = snapshot
            .iter()
            .filter(|(_, uuids)| uuid_filter.intersects(uuids.iter()))
            .map(|(handle, _)| HandleRange::single(handle))
            .collect::<Vec<_>>();
        let translator = Self::new(hidden, uuid_filter);

        debug!(
            "Hiding {} handles in {} ranges (max discovered handle {:?})",
            translator.hidden_count(),
            translator.ranges.len(),
            snapshot.max_handle()
        );
        for range in &translator.ranges {
            debug!("Hidden range {}", range);
        }

        translator
    }

    /// The hidden ranges, ascending and disjoint
    pub fn ranges(&self) -> &[HandleRange] {
        &self.ranges
    }

    pub fn uuid_filter(&self) -> &UuidFilter {
        &self.uuid_filter
    }

    /// Total number of hidden handles
    pub fn hidden_count(&self) -> u32 {
        self.ranges.iter().map(HandleRange::size).sum()
    }

    /// Whether a real handle is hidden from the master
    pub fn is_hidden(&self, handle: u16) -> bool {
        handle != ATT_HANDLE_MAX && self.ranges.iter().any(|range| range.contains(handle))
    }

    /// Number of hidden handles strictly below `handle`
    fn hidden_below(&self, handle: u16) -> u32 {
        self.ranges
            .iter()
            .take_while(|range| range.start < handle)
            .map(|range| {
                if range.end < handle {
                    range.size()
                } else {
                    u32::from(handle - range.start)
                }
            })
            .sum()
    }

    /// Virtual handle of a real handle, `None` when it is hidden
    pub fn real_to_virtual(&self, handle: u16) -> Option<u16> {
        if handle == ATT_HANDLE_MAX {
            return Some(handle);
        }
        if self.is_hidden(handle) {
            return None;
        }
        Some((u32::from(handle) - self.hidden_below(handle)) as u16)
    }

    /// Virtual value of a hidden-or-not upper bound: the last visible handle at or below it
    pub fn real_to_virtual_floor(&self, handle: u16) -> u16 {
        if handle == ATT_HANDLE_MAX {
            return handle;
        }
        let hidden_through = self.hidden_below(handle) + u32::from(self.is_hidden(handle));
        u32::from(handle).saturating_sub(hidden_through) as u16
    }

    /// Virtual value of a hidden-or-not lower bound: the first visible handle at or above it
    pub fn real_to_virtual_ceil(&self, handle: u16) -> u16 {
        if handle == ATT_HANDLE_MAX {
            return handle;
        }
        (u32::from(handle) - self.hidden_below(handle)) as u16
    }

    /// Real handle of a virtual handle
    pub fn virtual_to_real(&self, handle: u16) -> u16 {
        if handle == ATT_HANDLE_MAX {
            return handle;
        }
        let mut real = u32::from(handle);
        for range in &self.ranges {
            if u32::from(range.start) <= real {
                real += range.size();
            } else {
                break;
            }
        }
        real.min(u32::from(ATT_HANDLE_MAX)) as u16
    }
}

impl HandleMapper for HandleTranslator {
    fn map_handle(&self, handle: u16) -> Option<u16> {
        self.real_to_virtual(handle)
    }

    fn map_range_end(&self, handle: u16) -> u16 {
        self.real_to_virtual_floor(handle)
    }

    fn is_hidden_type(&self, type_id: u128) -> bool {
        self.uuid_filter.contains(type_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn translator(ranges: &[(u16, u16)]) -> HandleTranslator {
        HandleTranslator::new(
            ranges.iter().map(|&(start, end)| HandleRange::new(start, end)),
            UuidFilter::new(),
        )
    }

    #[test]
    fn test_empty_translator_is_identity() {
        let t = HandleTranslator::default();
        for h in [0x0001, 0x0010, 0x1234, 0xFFFE] {
            assert_eq!(t.real_to_virtual(h), Some(h));
            assert_eq!(t.virtual_to_real(h), h);
        }
    }

    #[test]
    fn test_unit_ranges() {
        // 0x10 and 0x11 hidden
        let t = translator(&[(0x10, 0x10), (0x11, 0x11)]);
        assert_eq!(t.ranges(), &[HandleRange::new(0x10, 0x11)]);

        assert_eq!(t.real_to_virtual(0x0F), Some(0x0F));
        assert_eq!(t.real_to_virtual(0x10), None);
        assert_eq!(t.real_to_virtual(0x11), None);
        assert_eq!(t.real_to_virtual(0x12), Some(0x10));

        assert_eq!(t.virtual_to_real(0x0F), 0x0F);
        assert_eq!(t.virtual_to_real(0x10), 0x12);
        assert_eq!(t.virtual_to_real(0x11), 0x13);
    }

    #[test]
    fn test_unsorted_ranges_are_sorted() {
        let t = translator(&[(0x30, 0x31), (0x05, 0x05), (0x20, 0x22)]);
        assert_eq!(
            t.ranges(),
            &[
                HandleRange::new(0x05, 0x05),
                HandleRange::new(0x20, 0x22),
                HandleRange::new(0x30, 0x31)
            ]
        );
        assert_eq!(t.virtual_to_real(0x05), 0x06);
        assert_eq!(t.virtual_to_real(0x1F), 0x23);
        assert_eq!(t.real_to_virtual(0x32), Some(0x32 - 6));
    }

    #[test]
    fn test_overlapping_ranges_are_merged() {
        let t = translator(&[(0x10, 0x15), (0x12, 0x18), (0x19, 0x19), (0x30, 0x30)]);
        assert_eq!(
            t.ranges(),
            &[HandleRange::new(0x10, 0x19), HandleRange::new(0x30, 0x30)]
        );
        assert_eq!(t.hidden_count(), 11);
    }

    #[test]
    fn test_sentinel_is_never_translated() {
        let t = translator(&[(0x01, 0x20), (0xFFF0, 0xFFFF)]);
        assert_eq!(t.real_to_virtual(ATT_HANDLE_MAX), Some(ATT_HANDLE_MAX));
        assert_eq!(t.virtual_to_real(ATT_HANDLE_MAX), ATT_HANDLE_MAX);
        assert_eq!(t.real_to_virtual_floor(ATT_HANDLE_MAX), ATT_HANDLE_MAX);
        assert!(!t.is_hidden(ATT_HANDLE_MAX));
    }

    #[test]
    fn test_range_bounds_clamp_to_visible_handles() {
        let t = translator(&[(0x05, 0x07)]);
        // 0x04 stays, 0x08 becomes 0x05
        assert_eq!(t.real_to_virtual_floor(0x06), 0x04);
        assert_eq!(t.real_to_virtual_ceil(0x06), 0x05);
        assert_eq!(t.real_to_virtual_floor(0x08), 0x05);
        assert_eq!(t.real_to_virtual_ceil(0x08), 0x05);
        assert_eq!(t.real_to_virtual_floor(0x04), 0x04);
    }

    #[test]
    fn test_floor_of_range_at_handle_zero() {
        let t = translator(&[(0x0000, 0x0002)]);
        assert_eq!(t.real_to_virtual_floor(0x0000), 0x0000);
        assert_eq!(t.real_to_virtual_floor(0x0002), 0x0000);
        assert_eq!(t.real_to_virtual_floor(0x0005), 0x0002);
    }

    #[test]
    fn test_virtual_to_real_saturates() {
        let t = translator(&[(0x0001, 0x0010)]);
        assert_eq!(t.virtual_to_real(0xFFF8), ATT_HANDLE_MAX);
    }

    #[test]
    fn test_random_round_trip_and_monotonicity() {
        let mut rng = StdRng::seed_from_u64(0x5EED);

        for _ in 0..50 {
            let count = rng.gen_range(0..20);
            let ranges: Vec<HandleRange> = (0..count)
                .map(|_| {
                    let start = rng.gen_range(1..0x0200u16);
                    HandleRange::new(start, start + rng.gen_range(0..4))
                })
                .collect();
            let t = HandleTranslator::new(ranges.clone(), UuidFilter::new());

            let mut previous = 0;
            for virt in 1..0x0300u16 {
                let real = t.virtual_to_real(virt);
                assert!(real >= previous, "virtual_to_real must not decrease");
                previous = real;

                assert!(!t.is_hidden(real));
                assert_eq!(t.real_to_virtual(real), Some(virt));
            }

            for range in &ranges {
                for h in range.start..=range.end {
                    assert_eq!(t.real_to_virtual(h), None);
                }
            }
        }
    }
}
