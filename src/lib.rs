// THEORY:
// This file is the main entry point for the `blob_vision` library crate.
// It defines the public API exposed to consumers such as video front-ends.
//
// The engine has two halves that meet in the `pipeline`:
// 1.  **Detection**: a single-channel label image is cut into scanline runs, the
//     runs are merged into connected regions, and each region answers geometric
//     queries (centroid, bounding box, principal axes, boundary) on demand.
// 2.  **Tracking**: region centroids from consecutive frames are associated with
//     persistent tracks through constant-velocity prediction and optimal
//     (Hungarian) assignment.
//
// The `core_modules` stay public for callers that only need one half, but the
// `BlobPipeline` and its configuration are the intended high-level interface.

pub mod core_modules;
pub mod pipeline;

pub use core_modules::error::BlobError;
pub use core_modules::extrapolator::{Extrapolator, LinearExtrapolator, Position, PositionHistory};
pub use core_modules::hungarian::{Assignment, CostMatrix};
pub use core_modules::label_image::LabelImage;
pub use core_modules::region::{BoundingBox, PrincipalAxes, Region};
pub use core_modules::region_filter::{RegionFilter, ValueRange};
pub use core_modules::scanline::{RunMode, ScanlineRun, ValueBand};
pub use core_modules::session::{DetectionParams, DetectionSession, RegionId};
pub use core_modules::tracker::{PositionTracker, Track, TrackId, TrackerConfig, TrackingUpdate};
pub use pipeline::{BlobPipeline, FrameReport, PipelineConfig};
