//! The compressed set engine seam.
//!
//! [`SetHandle`](crate::SetHandle) never touches container internals. All of
//! its work goes through [`SetEngine`], which is implemented for
//! [`RoaringBitmap`]. Materializing calls return `Option` so that an engine
//! which can fail to build a container is representable; the roaring engine
//! always succeeds.

use roaring::bitmap::Statistics;
use roaring::{MultiOps, RoaringBitmap};
use std::ops::RangeInclusive;

/// Container layout and value summary of one set.
///
/// An empty set reports `min_value == u32::MAX` and `max_value == 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetStatistics {
    pub containers: u64,
    pub array_containers: u64,
    pub run_containers: u64,
    pub bitset_containers: u64,
    pub values_in_array_containers: u64,
    pub values_in_run_containers: u64,
    pub values_in_bitset_containers: u64,
    pub bytes_in_array_containers: u64,
    pub bytes_in_run_containers: u64,
    pub bytes_in_bitset_containers: u64,
    pub min_value: u32,
    pub max_value: u32,
    pub sum_of_values: u64,
    pub size: u64,
}

impl From<Statistics> for SetStatistics {
    fn from(stats: Statistics) -> Self {
        Self {
            containers: u64::from(stats.n_containers),
            array_containers: u64::from(stats.n_array_containers),
            run_containers: u64::from(stats.n_run_containers),
            bitset_containers: u64::from(stats.n_bitset_containers),
            values_in_array_containers: u64::from(stats.n_values_array_containers),
            values_in_run_containers: u64::from(stats.n_values_run_containers),
            values_in_bitset_containers: u64::from(stats.n_values_bitset_containers),
            bytes_in_array_containers: u64::from(stats.n_bytes_array_containers),
            bytes_in_run_containers: u64::from(stats.n_bytes_run_containers),
            bytes_in_bitset_containers: u64::from(stats.n_bytes_bitset_containers),
            min_value: stats.min_value.unwrap_or(u32::MAX),
            max_value: stats.max_value.unwrap_or(0),
            sum_of_values: 0,
            size: stats.cardinality,
        }
    }
}

/// Width of one container's value block.
const CONTAINER_SPAN: u32 = 1 << 16;

pub trait SetEngine: Default + Send + Sync + 'static {
    type Iter<'a>: Iterator<Item = u32>
    where
        Self: 'a;

    /// A new empty container.
    fn try_new() -> Option<Self>;

    /// A deep copy of this container.
    fn try_clone(&self) -> Option<Self>;

    /// Returns true if the value was absent.
    fn insert(&mut self, value: u32) -> bool;

    /// Returns true if the value was present.
    fn remove(&mut self, value: u32) -> bool;

    fn contains(&self, value: u32) -> bool;

    fn cardinality(&self) -> u64;

    fn insert_many(&mut self, values: &[u32]);

    fn insert_range(&mut self, range: RangeInclusive<u32>);

    fn remove_range(&mut self, range: RangeInclusive<u32>);

    /// Complements membership of every value in `range`.
    fn flip_range(&mut self, range: RangeInclusive<u32>);

    fn union_with(&mut self, other: &Self);

    fn intersect_with(&mut self, other: &Self);

    fn difference_with(&mut self, other: &Self);

    fn symmetric_difference_with(&mut self, other: &Self);

    fn try_union(&self, other: &Self) -> Option<Self>;

    fn try_intersection(&self, other: &Self) -> Option<Self>;

    fn try_difference(&self, other: &Self) -> Option<Self>;

    fn try_symmetric_difference(&self, other: &Self) -> Option<Self>;

    /// Union of every set in one pass.
    fn try_union_many(sets: &[&Self]) -> Option<Self>;

    fn min(&self) -> Option<u32>;

    fn max(&self) -> Option<u32>;

    /// Number of members `<= value`.
    fn rank(&self, value: u32) -> u64;

    /// The `n`th smallest member, zero based.
    fn select(&self, n: u32) -> Option<u32>;

    fn iter(&self) -> Self::Iter<'_>;

    fn statistics(&self) -> SetStatistics;
}

impl SetEngine for RoaringBitmap {
    type Iter<'a> = roaring::bitmap::Iter<'a>;

    fn try_new() -> Option<Self> {
        Some(RoaringBitmap::new())
    }

    fn try_clone(&self) -> Option<Self> {
        Some(self.clone())
    }

    fn insert(&mut self, value: u32) -> bool {
        RoaringBitmap::insert(self, value)
    }

    fn remove(&mut self, value: u32) -> bool {
        RoaringBitmap::remove(self, value)
    }

    fn contains(&self, value: u32) -> bool {
        RoaringBitmap::contains(self, value)
    }

    fn cardinality(&self) -> u64 {
        self.len()
    }

    fn insert_many(&mut self, values: &[u32]) {
        self.extend(values.iter().copied());
    }

    fn insert_range(&mut self, range: RangeInclusive<u32>) {
        RoaringBitmap::insert_range(self, range);
    }

    fn remove_range(&mut self, range: RangeInclusive<u32>) {
        RoaringBitmap::remove_range(self, range);
    }

    // The mask covers one container at a time so peak extra memory stays
    // bounded whatever the width of the range.
    fn flip_range(&mut self, range: RangeInclusive<u32>) {
        let (start, end) = (*range.start(), *range.end());
        if start > end {
            return;
        }

        let mut lower = start;
        loop {
            let upper = (lower | (CONTAINER_SPAN - 1)).min(end);
            let mut mask = RoaringBitmap::new();
            mask.insert_range(lower..=upper);
            *self ^= mask;

            if upper == end {
                break;
            }
            lower = upper + 1;
        }
    }

    fn union_with(&mut self, other: &Self) {
        *self |= other;
    }

    fn intersect_with(&mut self, other: &Self) {
        *self &= other;
    }

    fn difference_with(&mut self, other: &Self) {
        *self -= other;
    }

    fn symmetric_difference_with(&mut self, other: &Self) {
        *self ^= other;
    }

    fn try_union(&self, other: &Self) -> Option<Self> {
        Some(self | other)
    }

    fn try_intersection(&self, other: &Self) -> Option<Self> {
        Some(self & other)
    }

    fn try_difference(&self, other: &Self) -> Option<Self> {
        Some(self - other)
    }

    fn try_symmetric_difference(&self, other: &Self) -> Option<Self> {
        Some(self ^ other)
    }

    fn try_union_many(sets: &[&Self]) -> Option<Self> {
        Some(sets.iter().copied().union())
    }

    fn min(&self) -> Option<u32> {
        RoaringBitmap::min(self)
    }

    fn max(&self) -> Option<u32> {
        RoaringBitmap::max(self)
    }

    fn rank(&self, value: u32) -> u64 {
        RoaringBitmap::rank(self, value)
    }

    fn select(&self, n: u32) -> Option<u32> {
        RoaringBitmap::select(self, n)
    }

    fn iter(&self) -> Self::Iter<'_> {
        RoaringBitmap::iter(self)
    }

    fn statistics(&self) -> SetStatistics {
        SetStatistics {
            sum_of_values: RoaringBitmap::iter(self).map(u64::from).sum(),
            ..SetStatistics::from(RoaringBitmap::statistics(self))
        }
    }
}
