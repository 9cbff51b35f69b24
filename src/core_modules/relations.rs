//! Containment and adjacency between regions.
//!
//! These work on any two regions, whether they come from the same pass, from
//! nested value bands over one image, or from different frames. The detection
//! session builds its cached parent/children/neighbour queries on top of them.

use crate::core_modules::region::Region;

/// `inner` is a sub-region of `outer` when every run of `inner` overlaps a run of
/// `outer` on the same row. An empty region is not a sub-region of anything.
pub fn is_sub_region(inner: &Region, outer: &Region) -> bool {
    !inner.is_empty()
        && inner.runs().iter().all(|run| {
            outer
                .runs_in_row(run.row)
                .iter()
                .any(|candidate| candidate.overlaps_x(run))
        })
}

/// Inverse of [`is_sub_region`].
pub fn is_surrounding_region(outer: &Region, inner: &Region) -> bool {
    is_sub_region(inner, outer)
}

/// Two regions are neighbours when their values differ and at least one pixel of
/// `a` is 4-adjacent to a pixel of `b`.
pub fn are_neighbours(a: &Region, b: &Region) -> bool {
    if a.value() == b.value() {
        return false;
    }
    a.runs().iter().any(|run| {
        let same_row = b.runs_in_row(run.row).iter().any(|other| other.abuts_x(run));
        let above = run.row > 0
            && b.runs_in_row(run.row - 1)
                .iter()
                .any(|other| other.overlaps_x(run));
        let below = b
            .runs_in_row(run.row + 1)
            .iter()
            .any(|other| other.overlaps_x(run));
        same_row || above || below
    })
}

/// Pairs `(inner index, outer index)` for every region of `inner` contained in a
/// region of `outer`.
pub fn containment_pairs(inner: &[Region], outer: &[Region]) -> Vec<(usize, usize)> {
    let mut pairs = Vec::new();
    for (i, candidate) in inner.iter().enumerate() {
        if let Some(o) = outer.iter().position(|region| is_sub_region(candidate, region)) {
            pairs.push((i, o));
        }
    }
    pairs
}
