use std::ops::RangeInclusive;

/// Exclusive upper limit of any range operation, one past `u32::MAX`.
pub const RANGE_LIMIT: u64 = 1 << 32;

/// A non-empty half-open range `[lower, upper)` within `[0, 2^32]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClampedRange {
    lower: u64,
    upper: u64,
}

impl ClampedRange {
    /// Normalizes host supplied bounds.
    ///
    /// A NaN bound yields `None`. Negative bounds become 0, an upper bound
    /// past [`RANGE_LIMIT`] becomes `RANGE_LIMIT`, and fractions are
    /// truncated. An empty result yields `None`.
    pub fn new(lower: f64, upper: f64) -> Option<Self> {
        if lower.is_nan() || upper.is_nan() {
            return None;
        }

        let lower = lower.max(0.0) as u64;
        let upper = upper.clamp(0.0, RANGE_LIMIT as f64) as u64;

        (lower < upper).then_some(Self { lower, upper })
    }

    pub fn lower(&self) -> u64 {
        self.lower
    }

    pub fn upper(&self) -> u64 {
        self.upper
    }

    pub fn width(&self) -> u64 {
        self.upper - self.lower
    }

    /// The same range as closed `u32` bounds.
    pub fn to_inclusive(self) -> RangeInclusive<u32> {
        // lower < upper <= 2^32, so both fit.
        (self.lower as u32)..=((self.upper - 1) as u32)
    }
}
