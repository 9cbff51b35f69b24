// THEORY:
// Detection finds every connected component, including the single stray pixels
// and long thin streaks that a classifier produces at class borders. The
// `RegionFilter` is the post-processing step that discards them. It is a plain
// record of optional ranges; a missing range accepts everything, and a region
// passes only when it passes every configured range. Because the test is a pure
// conjunction, the order in which filters are combined never changes the result.

use crate::core_modules::region::Region;

/// Inclusive `[min, max]` range.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ValueRange<T> {
    pub min: T,
    pub max: T,
}

impl<T: PartialOrd + Copy> ValueRange<T> {
    pub fn new(min: T, max: T) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn contains(&self, value: T) -> bool {
        value >= self.min && value <= self.max
    }

    /// The overlap of both ranges. May be empty (`min > max`), which contains nothing.
    pub fn intersect(&self, other: &Self) -> Self {
        let min = if other.min > self.min { other.min } else { self.min };
        let max = if other.max < self.max { other.max } else { self.max };
        Self { min, max }
    }
}

impl ValueRange<usize> {
    pub const UNBOUNDED: ValueRange<usize> = ValueRange {
        min: 0,
        max: usize::MAX,
    };
}

/// Conjunction of optional value, size and form-factor ranges.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RegionFilter {
    pub value: Option<ValueRange<u8>>,
    pub size: Option<ValueRange<usize>>,
    pub form_factor: Option<ValueRange<f64>>,
}

impl RegionFilter {
    /// Accepts every region.
    pub fn unconstrained() -> Self {
        Self::default()
    }

    pub fn with_value(mut self, min: u8, max: u8) -> Self {
        self.value = Some(ValueRange::new(min, max));
        self
    }

    pub fn with_size(mut self, min: usize, max: usize) -> Self {
        self.size = Some(ValueRange::new(min, max));
        self
    }

    pub fn with_form_factor(mut self, min: f64, max: f64) -> Self {
        self.form_factor = Some(ValueRange::new(min, max));
        self
    }

    /// A filter accepting exactly the regions accepted by both `self` and `other`.
    pub fn and(&self, other: &RegionFilter) -> RegionFilter {
        RegionFilter {
            value: intersect_option(self.value, other.value),
            size: intersect_option(self.size, other.size),
            form_factor: intersect_option(self.form_factor, other.form_factor),
        }
    }

    pub fn matches(&self, region: &Region) -> bool {
        self.value.is_none_or(|range| range.contains(region.value()))
            && self.size.is_none_or(|range| range.contains(region.size()))
            // Checked last: it is the only test that traces the boundary.
            && self
                .form_factor
                .is_none_or(|range| range.contains(region.form_factor()))
    }

    /// Matching regions, in input order.
    pub fn apply<'r>(&self, regions: &'r [Region]) -> Vec<&'r Region> {
        regions.iter().filter(|region| self.matches(region)).collect()
    }
}

fn intersect_option<T: PartialOrd + Copy>(
    a: Option<ValueRange<T>>,
    b: Option<ValueRange<T>>,
) -> Option<ValueRange<T>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.intersect(&b)),
        (a, None) => a,
        (None, b) => b,
    }
}
