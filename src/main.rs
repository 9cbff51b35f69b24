// This file is an example of how to use the `blob_vision` library.
// The main library entry point is `src/lib.rs`.
//
// Usage: blob_vision <frame.png>...
// Every frame is loaded as 8-bit grayscale and pushed through the pipeline in
// command-line order. Set RUST_LOG=debug for per-frame detail.

use anyhow::{bail, Context};
use blob_vision::{BlobPipeline, LabelImage, PipelineConfig, RegionFilter};
use flexi_logger::Logger;
use log::info;

fn main() -> anyhow::Result<()> {
    let _logger = Logger::try_with_env_or_str("info")?.start()?;

    let frames: Vec<String> = std::env::args().skip(1).collect();
    if frames.is_empty() {
        bail!("usage: blob_vision <frame.png>...");
    }

    info!("Blob Vision Engine - Example Runner");
    let config = PipelineConfig {
        filter: RegionFilter::unconstrained().with_size(4, usize::MAX),
        ..PipelineConfig::default()
    };
    let mut pipeline = BlobPipeline::new(config);

    for path in &frames {
        let gray = image::open(path)
            .with_context(|| format!("failed to open {path}"))?
            .to_luma8();
        let image = LabelImage::from_gray(&gray)?;
        let report = pipeline.process_frame(&image)?;

        info!(
            "{}: {} regions, {} kept, {} born, {} died",
            path,
            report.region_count,
            report.kept_regions.len(),
            report.tracking.born.len(),
            report.tracking.died.len()
        );
        for (id, position) in &report.tracking.positions {
            info!("  track {} at ({:.1}, {:.1})", id, position.x, position.y);
        }
    }

    Ok(())
}
