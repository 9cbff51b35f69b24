// THEORY:
// The `DetectionSession` owns every buffer the detector needs between frames:
// the run list, the part arena, a per-pixel ownership map sized to the image,
// and the regions of the last call. Callers create one session per video stream
// and pass it by `&mut` into each detection call.
//
// Key architectural principles:
// 1.  **Explicit Scratch State**: Nothing is global. Buffers grow to the largest
//     frame seen and are reused; their contents are meaningless between calls.
// 2.  **Borrowed Results**: `detect` returns `&[Region]` borrowed from the session.
//     The next call needs `&mut self`, so results can never be read while they
//     are being overwritten. Sharing a session across threads therefore means
//     wrapping the whole detect-then-read sequence in one lock.
// 3.  **On-Demand Relations**: Parent, children and neighbour queries are answered
//     the first time they are asked for a region and cached until the next call.
//     Nothing is computed for pairs nobody asks about.
// 4.  **Tree Mode**: `detect_tree` runs one merge pass per value band. A region
//     from a band is a child of the region in the nearest enclosing band that
//     contains its first pixel.

use crate::core_modules::blob_merger::PartArena;
use crate::core_modules::error::BlobError;
use crate::core_modules::label_image::LabelImage;
use crate::core_modules::region::Region;
use crate::core_modules::region_filter::ValueRange;
use crate::core_modules::scanline::{extract_runs, RunMode, ScanlineRun, ValueBand};
use log::debug;
use std::cell::OnceCell;

/// Index of a region in the session's current result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RegionId(pub usize);

/// Parameters of a single-pass detection.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DetectionParams {
    /// Accepted pixel values.
    pub band: ValueBand,
    /// Regions outside this pixel count are dropped before they are built.
    pub size: ValueRange<usize>,
    pub mode: RunMode,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            band: ValueBand::FOREGROUND,
            size: ValueRange::UNBOUNDED,
            mode: RunMode::ExactValue,
        }
    }
}

#[derive(Debug, Default)]
struct RelationCache {
    parent: OnceCell<Option<RegionId>>,
    children: OnceCell<Vec<RegionId>>,
    neighbours: OnceCell<Vec<RegionId>>,
}

/// Reusable detector state for one stream of frames.
#[derive(Debug, Default)]
pub struct DetectionSession {
    runs: Vec<ScanlineRun>,
    arena: PartArena,
    run_buffer: Vec<ScanlineRun>,
    /// Region index + 1 per pixel, 0 for unowned. Only filled by `detect`.
    ownership: Vec<u32>,
    width: u32,
    regions: Vec<Region>,
    region_band: Vec<usize>,
    bands: Vec<ValueBand>,
    relations: Vec<RelationCache>,
}

impl DetectionSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Finds every connected region of accepted pixels.
    pub fn detect(
        &mut self,
        image: &LabelImage,
        params: &DetectionParams,
    ) -> Result<&[Region], BlobError> {
        params.band.validate()?;
        self.reset(image.width());

        self.bands.push(params.band);
        self.run_pass(image, params.band, params.mode, params.size, 0);

        self.ownership.clear();
        self.ownership.resize(image.pixel_count(), 0);
        let width = image.width() as usize;
        for (index, region) in self.regions.iter().enumerate() {
            for run in region.runs() {
                let row = run.row as usize * width;
                self.ownership[row + run.start as usize..row + run.end() as usize]
                    .fill(index as u32 + 1);
            }
        }

        debug!(
            "detected {} regions from {} runs in {}x{} image",
            self.regions.len(),
            self.runs.len(),
            image.width(),
            image.height()
        );
        Ok(&self.regions)
    }

    /// Runs one detection pass per band. Bands should be nested or disjoint;
    /// containment is only reported between nested bands.
    pub fn detect_tree(
        &mut self,
        image: &LabelImage,
        bands: &[ValueBand],
        size: ValueRange<usize>,
    ) -> Result<&[Region], BlobError> {
        for band in bands {
            band.validate()?;
        }
        self.reset(image.width());
        self.ownership.clear();

        for (index, &band) in bands.iter().enumerate() {
            self.bands.push(band);
            self.run_pass(image, band, RunMode::Band, size, index);
        }

        debug!(
            "tree detection over {} bands found {} regions",
            bands.len(),
            self.regions.len()
        );
        Ok(&self.regions)
    }

    /// Regions of the last call.
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn region(&self, id: RegionId) -> &Region {
        &self.regions[id.0]
    }

    /// The band a region was detected in.
    pub fn band_of(&self, id: RegionId) -> ValueBand {
        self.bands[self.region_band[id.0]]
    }

    /// The region of the nearest enclosing band that contains `id`.
    pub fn parent(&self, id: RegionId) -> Option<RegionId> {
        *self.relations[id.0]
            .parent
            .get_or_init(|| self.find_parent(id))
    }

    /// Regions whose parent is `id`.
    pub fn children(&self, id: RegionId) -> &[RegionId] {
        self.relations[id.0].children.get_or_init(|| {
            (0..self.regions.len())
                .map(RegionId)
                .filter(|&other| other != id && self.parent(other) == Some(id))
                .collect()
        })
    }

    /// Regions of a different value sharing a pixel edge with `id`.
    /// Empty after tree detection, where each pass has a single value.
    pub fn neighbours(&self, id: RegionId) -> &[RegionId] {
        self.relations[id.0]
            .neighbours
            .get_or_init(|| self.find_neighbours(id))
    }

    fn reset(&mut self, width: u32) {
        self.width = width;
        self.regions.clear();
        self.region_band.clear();
        self.bands.clear();
        self.relations.clear();
    }

    fn run_pass(
        &mut self,
        image: &LabelImage,
        band: ValueBand,
        mode: RunMode,
        size: ValueRange<usize>,
        band_index: usize,
    ) {
        extract_runs(image, band, mode, &mut self.runs);
        self.arena.merge_runs(&self.runs);

        for i in 0..self.arena.finished().len() {
            let part = self.arena.finished()[i];
            if !size.contains(self.arena.pixel_count(part) as usize) {
                continue;
            }
            self.arena
                .collect_runs(part, &self.runs, &mut self.run_buffer);
            self.regions.push(Region::from_runs(
                self.arena.value(part),
                self.run_buffer.clone(),
            ));
            self.region_band.push(band_index);
            self.relations.push(RelationCache::default());
        }
    }

    fn find_parent(&self, id: RegionId) -> Option<RegionId> {
        let own = self.region_band[id.0];
        let own_band = self.bands[own];

        let parent_band = (0..self.bands.len())
            .filter(|&b| b != own)
            .filter(|&b| self.bands[b] != own_band && self.bands[b].encloses(&own_band))
            .min_by_key(|&b| self.bands[b].width())?;

        let first = self.regions[id.0].runs().first()?;
        let (x, y) = (first.start as i32, first.row as i32);
        (0..self.regions.len())
            .filter(|&r| self.region_band[r] == parent_band)
            .find(|&r| self.regions[r].contains_point(x, y))
            .map(RegionId)
    }

    fn find_neighbours(&self, id: RegionId) -> Vec<RegionId> {
        if self.ownership.is_empty() {
            return Vec::new();
        }
        let width = self.width as usize;
        let height = self.ownership.len() / width;
        let value = self.regions[id.0].value();
        let mut found: Vec<RegionId> = Vec::new();

        let mut visit = |owner: u32| {
            if owner == 0 {
                return;
            }
            let other = RegionId(owner as usize - 1);
            if other != id && self.regions[other.0].value() != value && !found.contains(&other) {
                found.push(other);
            }
        };

        for run in self.regions[id.0].runs() {
            let (row, start, end) = (run.row as usize, run.start as usize, run.end() as usize);
            let base = row * width;
            if start > 0 {
                visit(self.ownership[base + start - 1]);
            }
            if end < width {
                visit(self.ownership[base + end]);
            }
            if row > 0 {
                for x in start..end {
                    visit(self.ownership[base - width + x]);
                }
            }
            if row + 1 < height {
                for x in start..end {
                    visit(self.ownership[base + width + x]);
                }
            }
        }

        found.sort_unstable();
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::region::BoundingBox;

    #[test]
    fn detects_two_classes_and_their_adjacency() {
        #[rustfmt::skip]
        let pixels = [
            1, 1, 2, 0, 3,
            1, 1, 2, 0, 3,
            0, 0, 0, 0, 3,
        ];
        let image = LabelImage::new(5, 3, &pixels).unwrap();
        let mut session = DetectionSession::new();
        let regions = session.detect(&image, &DetectionParams::default()).unwrap();
        assert_eq!(regions.len(), 3);
        assert_eq!(regions[0].value(), 1);
        assert_eq!(regions[1].value(), 2);
        assert_eq!(regions[2].value(), 3);

        assert_eq!(session.neighbours(RegionId(0)), &[RegionId(1)]);
        assert_eq!(session.neighbours(RegionId(1)), &[RegionId(0)]);
        assert!(session.neighbours(RegionId(2)).is_empty());
    }

    #[test]
    fn size_range_drops_small_regions() {
        #[rustfmt::skip]
        let pixels = [
            1, 0, 1, 1,
            0, 0, 1, 1,
        ];
        let image = LabelImage::new(4, 2, &pixels).unwrap();
        let mut session = DetectionSession::new();
        let params = DetectionParams {
            size: ValueRange::new(2, 10),
            ..DetectionParams::default()
        };
        let regions = session.detect(&image, &params).unwrap();
        assert_eq!(regions.len(), 1);
        assert_eq!(
            regions[0].bounding_box(),
            BoundingBox {
                x: 2,
                y: 0,
                width: 2,
                height: 2
            }
        );
    }

    #[test]
    fn invalid_band_is_rejected_before_scanning() {
        let image = LabelImage::new(1, 1, &[1]).unwrap();
        let mut session = DetectionSession::new();
        let params = DetectionParams {
            band: ValueBand { min: 5, max: 1 },
            ..DetectionParams::default()
        };
        assert!(session.detect(&image, &params).is_err());
        assert!(session.regions().is_empty());
    }

    #[test]
    fn tree_mode_links_nested_bands() {
        // A bright core inside a dimmer halo, plus an isolated dim spot.
        #[rustfmt::skip]
        let pixels = [
            10, 10, 10, 10, 0, 0,
            10, 50, 50, 10, 0, 10,
            10, 50, 50, 10, 0, 0,
            10, 10, 10, 10, 0, 0,
        ];
        let image = LabelImage::new(6, 4, &pixels).unwrap();
        let mut session = DetectionSession::new();
        let bands = [
            ValueBand::new(5, 255).unwrap(),
            ValueBand::new(40, 255).unwrap(),
        ];
        let regions = session
            .detect_tree(&image, &bands, ValueRange::UNBOUNDED)
            .unwrap();
        assert_eq!(regions.len(), 3);

        // Band 0: halo (16 px) and spot; band 1: core.
        let halo = RegionId(0);
        let spot = RegionId(1);
        let core = RegionId(2);
        assert_eq!(session.region(halo).size(), 16);
        assert_eq!(session.region(core).size(), 4);
        assert_eq!(session.band_of(core), bands[1]);

        assert_eq!(session.parent(core), Some(halo));
        assert_eq!(session.parent(halo), None);
        assert_eq!(session.children(halo), &[core]);
        assert!(session.children(spot).is_empty());
        assert!(session.neighbours(halo).is_empty());
    }

    #[test]
    fn session_reuse_replaces_results() {
        let mut session = DetectionSession::new();
        let first = LabelImage::new(3, 1, &[1, 0, 1]).unwrap();
        assert_eq!(session.detect(&first, &DetectionParams::default()).unwrap().len(), 2);

        let second = LabelImage::new(2, 2, &[0, 0, 0, 7]).unwrap();
        let regions = session.detect(&second, &DetectionParams::default()).unwrap();
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].center(), (1, 1));
        assert!(session.neighbours(RegionId(0)).is_empty());
    }
}
