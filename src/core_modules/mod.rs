pub mod blob_merger;
pub mod error;
pub mod extrapolator;
pub mod hungarian;
pub mod label_image;
pub mod region;
pub mod region_filter;
pub mod relations;
pub mod scanline;
pub mod session;
pub mod tracker;
