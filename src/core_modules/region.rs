// THEORY:
// A `Region` is the finished, queryable record of one connected component in one
// detection pass. It owns the exact scanline runs of the component, so every
// geometric property can be derived without going back to the image.
//
// Key architectural principles:
// 1.  **Runs Are the Truth**: The only stored data is the value and the run list,
//     kept sorted by (row, start). Point lookups binary-search that list.
// 2.  **Lazy Features**: Center of gravity, bounding box and principal axes are
//     computed together in one pass over the region's pixels the first time any
//     of them is read, and cached. The boundary polygon has its own cache because
//     tracing it costs more and many callers never ask for it.
// 3.  **Dirty Means Empty**: The caches are `OnceCell`s. Any mutation empties them,
//     which is the dirty flag; reads after the first one reuse the cached values.
// 4.  **Defined Sentinels**: A region without pixels reports center (-1, -1), a
//     bounding box of (-1, -1, -1, -1), zero axis lengths and zero angles. No
//     division is performed on an empty region, so no NaN can escape.

use crate::core_modules::scanline::ScanlineRun;
use std::cell::OnceCell;
use std::collections::HashMap;
use std::f64::consts::{FRAC_PI_2, PI};

/// Axis-aligned bounding box in pixel units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BoundingBox {
    /// Reported by regions without pixels.
    pub const EMPTY: BoundingBox = BoundingBox {
        x: -1,
        y: -1,
        width: -1,
        height: -1,
    };
}

/// Principal axes of a region's pixel distribution.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PrincipalAxes {
    pub major_length: f64,
    pub minor_length: f64,
    /// Radians, measured from the +x axis towards +y (image rows grow downwards).
    pub major_angle: f64,
    /// Always `major_angle + π/2`.
    pub minor_angle: f64,
}

impl PrincipalAxes {
    pub const ZERO: PrincipalAxes = PrincipalAxes {
        major_length: 0.0,
        minor_length: 0.0,
        major_angle: 0.0,
        minor_angle: 0.0,
    };
}

#[derive(Debug, Clone, Copy)]
struct Features {
    center: (f64, f64),
    bounding_box: BoundingBox,
    axes: PrincipalAxes,
}

#[derive(Debug, Clone)]
struct Boundary {
    polygon: Vec<(i32, i32)>,
    length: usize,
}

/// One connected component of equal (or band-equal) value.
#[derive(Debug, Clone)]
pub struct Region {
    value: u8,
    runs: Vec<ScanlineRun>,
    size: usize,
    features: OnceCell<Features>,
    boundary: OnceCell<Boundary>,
}

impl Region {
    /// Builds a region from its runs. The runs are sorted by (row, start).
    pub fn from_runs(value: u8, mut runs: Vec<ScanlineRun>) -> Self {
        runs.sort_unstable_by_key(|run| (run.row, run.start));
        let size = runs.iter().map(|run| run.len as usize).sum();
        Self {
            value,
            runs,
            size,
            features: OnceCell::new(),
            boundary: OnceCell::new(),
        }
    }

    /// A region with no pixels.
    pub fn empty(value: u8) -> Self {
        Self::from_runs(value, Vec::new())
    }

    pub fn value(&self) -> u8 {
        self.value
    }

    /// Runs sorted by row, then start column.
    pub fn runs(&self) -> &[ScanlineRun] {
        &self.runs
    }

    /// Number of pixels.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Adds a run and marks every cached feature stale.
    pub fn push_run(&mut self, run: ScanlineRun) {
        let at = self
            .runs
            .partition_point(|r| (r.row, r.start) < (run.row, run.start));
        self.runs.insert(at, run);
        self.size += run.len as usize;
        self.invalidate();
    }

    /// Moves every run of `other` into this region.
    pub fn absorb(&mut self, other: Region) {
        self.runs.extend(other.runs);
        self.runs.sort_unstable_by_key(|run| (run.row, run.start));
        self.size += other.size;
        self.invalidate();
    }

    fn invalidate(&mut self) {
        self.features.take();
        self.boundary.take();
    }

    /// Runs on row `y`.
    pub fn runs_in_row(&self, y: u32) -> &[ScanlineRun] {
        let from = self.runs.partition_point(|run| run.row < y);
        let to = from + self.runs[from..].partition_point(|run| run.row == y);
        &self.runs[from..to]
    }

    /// Point-in-scanline lookup.
    pub fn contains_point(&self, x: i32, y: i32) -> bool {
        if x < 0 || y < 0 {
            return false;
        }
        let (x, y) = (x as u32, y as u32);
        let at = self
            .runs
            .partition_point(|run| run.row < y || (run.row == y && run.end() <= x));
        self.runs
            .get(at)
            .is_some_and(|run| run.row == y && run.start <= x)
    }

    /// Length-weighted center of gravity in sub-pixel coordinates.
    pub fn center_of_gravity(&self) -> (f64, f64) {
        self.features().center
    }

    /// Center of gravity rounded to the nearest pixel.
    pub fn center(&self) -> (i32, i32) {
        let (x, y) = self.center_of_gravity();
        (x.round() as i32, y.round() as i32)
    }

    pub fn bounding_box(&self) -> BoundingBox {
        self.features().bounding_box
    }

    pub fn principal_axes(&self) -> PrincipalAxes {
        self.features().axes
    }

    /// Outer contour as a closed polygon of pixel-corner vertices, clockwise on
    /// screen (y grows downwards). Only corners are listed.
    pub fn boundary(&self) -> &[(i32, i32)] {
        &self.traced_boundary().polygon
    }

    /// Number of unit pixel edges on the outer contour.
    pub fn boundary_length(&self) -> usize {
        self.traced_boundary().length
    }

    /// `boundary_length² / (4π·size)`. 1.0 for a perfect disc, larger for
    /// elongated or ragged shapes, 0.0 for an empty region.
    pub fn form_factor(&self) -> f64 {
        if self.size == 0 {
            return 0.0;
        }
        let length = self.boundary_length() as f64;
        length * length / (4.0 * PI * self.size as f64)
    }

    fn features(&self) -> &Features {
        self.features.get_or_init(|| self.compute_features())
    }

    fn traced_boundary(&self) -> &Boundary {
        self.boundary.get_or_init(|| self.trace_boundary())
    }

    fn compute_features(&self) -> Features {
        if self.size == 0 {
            return Features {
                center: (-1.0, -1.0),
                bounding_box: BoundingBox::EMPTY,
                axes: PrincipalAxes::ZERO,
            };
        }

        let n = self.size as f64;
        let mut row_sum = 0.0;
        let mut mid_sum = 0.0;
        for run in &self.runs {
            let len = run.len as f64;
            row_sum += len * run.row as f64;
            mid_sum += len * (run.start as f64 + (len - 1.0) / 2.0);
        }

        let (mut min_x, mut min_y) = (u32::MAX, u32::MAX);
        let (mut max_x, mut max_y) = (0u32, 0u32);
        let (mut sx, mut sy, mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0, 0.0, 0.0);
        for run in &self.runs {
            for (x, y) in run.pixels() {
                min_x = min_x.min(x);
                min_y = min_y.min(y);
                max_x = max_x.max(x);
                max_y = max_y.max(y);

                let (fx, fy) = (x as f64, y as f64);
                sx += fx;
                sy += fy;
                sxx += fx * fx;
                syy += fy * fy;
                sxy += fx * fy;
            }
        }

        let (mx, my) = (sx / n, sy / n);
        let cxx = sxx / n - mx * mx;
        let cyy = syy / n - my * my;
        let cxy = sxy / n - mx * my;

        let p = (cxx + cyy) / 2.0;
        let d = (((cxx - cyy) / 2.0).powi(2) + cxy * cxy).sqrt();
        let major_angle = (p + d - cxx).atan2(cxy);

        Features {
            center: (mid_sum / n, row_sum / n),
            bounding_box: BoundingBox {
                x: min_x as i32,
                y: min_y as i32,
                width: (max_x - min_x + 1) as i32,
                height: (max_y - min_y + 1) as i32,
            },
            axes: PrincipalAxes {
                major_length: 2.0 * (p + d).max(0.0).sqrt(),
                minor_length: 2.0 * (p - d).max(0.0).sqrt(),
                major_angle,
                minor_angle: major_angle + FRAC_PI_2,
            },
        }
    }

    /// Follows the pixel cracks around the region, keeping the region on the right.
    /// At a vertex shared by two diagonal pixels the right-most turn wins, which
    /// keeps the contour consistent with 4-connectivity.
    fn trace_boundary(&self) -> Boundary {
        let Some(first) = self.runs.first() else {
            return Boundary {
                polygon: Vec::new(),
                length: 0,
            };
        };

        // Outgoing crack directions per vertex, one bit per `STEPS` entry.
        let mut cracks: HashMap<(i32, i32), u8> = HashMap::new();
        let mut add = |vertex: (i32, i32), dir: usize| {
            *cracks.entry(vertex).or_insert(0) |= 1 << dir;
        };
        for run in &self.runs {
            for (x, y) in run.pixels() {
                let (x, y) = (x as i32, y as i32);
                if !self.contains_point(x, y - 1) {
                    add((x, y), EAST);
                }
                if !self.contains_point(x + 1, y) {
                    add((x + 1, y), SOUTH);
                }
                if !self.contains_point(x, y + 1) {
                    add((x + 1, y + 1), WEST);
                }
                if !self.contains_point(x - 1, y) {
                    add((x, y + 1), NORTH);
                }
            }
        }

        // The top-left corner of the first run always starts an eastward crack
        // on the outer contour.
        let start = (first.start as i32, first.row as i32);
        let mut polygon = vec![start];
        let mut length = 0;
        let mut vertex = start;
        let mut dir = EAST;

        loop {
            if let Some(bits) = cracks.get_mut(&vertex) {
                *bits &= !(1 << dir);
            }
            let (dx, dy) = STEPS[dir];
            vertex = (vertex.0 + dx, vertex.1 + dy);
            length += 1;
            if vertex == start {
                break;
            }

            let bits = cracks.get(&vertex).copied().unwrap_or(0);
            let next = [(dir + 1) % 4, dir, (dir + 3) % 4]
                .into_iter()
                .find(|&candidate| bits & (1 << candidate) != 0);
            match next {
                Some(next) => {
                    if next != dir {
                        polygon.push(vertex);
                    }
                    dir = next;
                }
                None => break,
            }
        }

        Boundary { polygon, length }
    }
}

const EAST: usize = 0;
const SOUTH: usize = 1;
const WEST: usize = 2;
const NORTH: usize = 3;
/// Clockwise on screen: a right turn is `+1`.
const STEPS: [(i32, i32); 4] = [(1, 0), (0, 1), (-1, 0), (0, -1)];
