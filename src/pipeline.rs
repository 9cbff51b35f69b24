// THEORY:
// The `pipeline` module is the top-level API of the engine. It wires the detection
// session, the region filter and the position tracker into one per-frame call.
// Callers hand it label images and receive a `FrameReport` telling them which
// regions survived filtering and where every track is now.

use crate::core_modules::error::BlobError;
use crate::core_modules::extrapolator::Position;
use crate::core_modules::label_image::LabelImage;
use crate::core_modules::region::{BoundingBox, Region};
use crate::core_modules::region_filter::RegionFilter;
use crate::core_modules::session::{DetectionParams, DetectionSession};
use crate::core_modules::tracker::{PositionTracker, TrackerConfig, TrackingUpdate};
use log::debug;

/// Configuration for the BlobPipeline.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PipelineConfig {
    pub detection: DetectionParams,
    /// Applied after detection; only surviving regions are tracked.
    pub filter: RegionFilter,
    pub tracker: TrackerConfig,
    /// Gate track continuation on region value.
    pub track_by_value: bool,
}

/// Owned snapshot of a region that passed the filter.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RegionSummary {
    pub value: u8,
    pub size: usize,
    pub centroid: Position,
    pub bounding_box: BoundingBox,
}

impl From<&Region> for RegionSummary {
    fn from(region: &Region) -> Self {
        Self {
            value: region.value(),
            size: region.size(),
            centroid: region.center_of_gravity().into(),
            bounding_box: region.bounding_box(),
        }
    }
}

/// The output of the pipeline for a single frame.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FrameReport {
    /// Zero-based index of the frame.
    pub frame: u64,
    /// Regions found before filtering.
    pub region_count: usize,
    pub kept_regions: Vec<RegionSummary>,
    pub tracking: TrackingUpdate,
}

/// The main, top-level struct for the engine.
pub struct BlobPipeline {
    config: PipelineConfig,
    session: DetectionSession,
    tracker: PositionTracker,
    frames_processed: u64,
    centroids: Vec<Position>,
    values: Vec<u8>,
}

impl BlobPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        let tracker = PositionTracker::new(config.tracker.clone());
        Self {
            config,
            session: DetectionSession::new(),
            tracker,
            frames_processed: 0,
            centroids: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn process_frame(&mut self, image: &LabelImage) -> Result<FrameReport, BlobError> {
        // Stage 1: Spatial Grouping
        let regions = self.session.detect(image, &self.config.detection)?;
        let region_count = regions.len();

        // Stage 2: Filtering
        let kept = self.config.filter.apply(regions);
        self.centroids.clear();
        self.values.clear();
        for region in &kept {
            self.centroids.push(region.center_of_gravity().into());
            self.values.push(region.value());
        }
        let kept_regions: Vec<RegionSummary> = kept.into_iter().map(RegionSummary::from).collect();

        // Stage 3: Tracking
        let values = self.config.track_by_value.then_some(self.values.as_slice());
        let tracking = self.tracker.push_data(&self.centroids, values)?;

        let frame = self.frames_processed;
        self.frames_processed += 1;
        debug!(
            "frame {}: {} regions, {} kept, {} live tracks",
            frame,
            region_count,
            kept_regions.len(),
            tracking.positions.len()
        );

        Ok(FrameReport {
            frame,
            region_count,
            kept_regions,
            tracking,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Detection results of the last frame, including filtered-out regions.
    pub fn session(&self) -> &DetectionSession {
        &self.session
    }

    pub fn tracker(&self) -> &PositionTracker {
        &self.tracker
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }
}
