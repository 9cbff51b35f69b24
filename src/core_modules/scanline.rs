// THEORY:
// The scanline extractor is the first and cheapest stage of region detection.
// It walks the label image one row at a time and compresses every maximal
// horizontal stretch of accepted pixels into a `ScanlineRun`. Everything after
// this point (merging, features, relations, boundaries) works on runs instead of
// pixels, which is what keeps the rest of the detector proportional to the
// amount of foreground rather than to the image size.
//
// Two ways of deciding where a run ends:
// - `RunMode::ExactValue`: a run is a stretch of *identical* accepted values. A
//   change of value closes the run and opens the next one. This is the normal
//   mode for classification images where each class is its own label.
// - `RunMode::Band`: every accepted pixel belongs to the same run regardless of
//   its exact value, and the run is labelled with the band's lower bound. Tree
//   mode uses this to detect the same image at several nested thresholds.

use crate::core_modules::error::BlobError;
use crate::core_modules::label_image::LabelImage;

/// A maximal horizontal stretch of accepted pixels in one image row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScanlineRun {
    pub row: u32,
    pub start: u32,
    pub len: u32,
    pub value: u8,
}

impl ScanlineRun {
    pub fn new(row: u32, start: u32, len: u32, value: u8) -> Self {
        Self {
            row,
            start,
            len,
            value,
        }
    }

    /// One past the last column covered by the run.
    #[inline]
    pub fn end(&self) -> u32 {
        self.start + self.len
    }

    #[inline]
    pub fn contains_x(&self, x: u32) -> bool {
        x >= self.start && x < self.end()
    }

    /// True when the two runs share at least one column.
    /// For runs on adjacent rows this is exactly 4-connectivity.
    #[inline]
    pub fn overlaps_x(&self, other: &ScanlineRun) -> bool {
        self.start < other.end() && other.start < self.end()
    }

    /// True when the runs sit side by side on the same row without a gap.
    #[inline]
    pub fn abuts_x(&self, other: &ScanlineRun) -> bool {
        self.row == other.row && (self.end() == other.start || other.end() == self.start)
    }

    /// Pixel coordinates `(x, y)` covered by this run, left to right.
    pub fn pixels(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        (self.start..self.end()).map(move |x| (x, self.row))
    }
}

/// An inclusive range of accepted pixel values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ValueBand {
    pub min: u8,
    pub max: u8,
}

impl ValueBand {
    /// Every non-zero label. Zero is conventionally the background class.
    pub const FOREGROUND: ValueBand = ValueBand { min: 1, max: 255 };

    pub fn new(min: u8, max: u8) -> Result<Self, BlobError> {
        let band = Self { min, max };
        band.validate()?;
        Ok(band)
    }

    pub fn validate(&self) -> Result<(), BlobError> {
        if self.min > self.max {
            return Err(BlobError::InvalidBand {
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }

    #[inline]
    pub fn accepts(&self, value: u8) -> bool {
        value >= self.min && value <= self.max
    }

    /// True when `other` lies entirely inside `self`.
    pub fn encloses(&self, other: &ValueBand) -> bool {
        self.min <= other.min && other.max <= self.max
    }

    pub fn width(&self) -> u16 {
        self.max as u16 - self.min as u16
    }
}

impl Default for ValueBand {
    fn default() -> Self {
        Self::FOREGROUND
    }
}

/// How runs are split inside a row of accepted pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RunMode {
    /// Split on every change of pixel value.
    #[default]
    ExactValue,
    /// Treat the whole band as one value.
    Band,
}

/// Scans `image` row by row and writes every run of accepted pixels to `out`.
///
/// `out` is cleared first so callers can keep one vector across frames. Runs come
/// out ordered by row, then by start column. An image without accepted pixels
/// produces no runs.
pub fn extract_runs(
    image: &LabelImage,
    band: ValueBand,
    mode: RunMode,
    out: &mut Vec<ScanlineRun>,
) {
    out.clear();
    let width = image.width();

    for y in 0..image.height() {
        // (start column, run value)
        let mut open: Option<(u32, u8)> = None;

        for (x, &pixel) in image.row(y).iter().enumerate() {
            let x = x as u32;
            let accepted = band.accepts(pixel);
            let label = match mode {
                RunMode::ExactValue => pixel,
                RunMode::Band => band.min,
            };

            match open {
                Some((start, value)) if !accepted || label != value => {
                    out.push(ScanlineRun::new(y, start, x - start, value));
                    open = accepted.then_some((x, label));
                }
                Some(_) => {}
                None if accepted => open = Some((x, label)),
                None => {}
            }
        }

        if let Some((start, value)) = open {
            out.push(ScanlineRun::new(y, start, width - start, value));
        }
    }
}
