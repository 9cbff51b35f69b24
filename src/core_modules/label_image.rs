// THEORY:
// The `LabelImage` is the only thing the kernel knows about pixels. Whatever
// produced the classification (a colour classifier, a threshold, a segmentation
// net) hands us one byte per pixel, row-major, and we never look at anything
// else. Validation happens once, here, so every later stage can index the buffer
// without re-checking its shape.

use crate::core_modules::error::BlobError;
use image::GrayImage;

/// A validated, borrowed single-channel image.
#[derive(Debug, Clone, Copy)]
pub struct LabelImage<'a> {
    width: u32,
    height: u32,
    pixels: &'a [u8],
}

impl<'a> LabelImage<'a> {
    /// Wraps a row-major buffer of `width * height` labels.
    pub fn new(width: u32, height: u32, pixels: &'a [u8]) -> Result<Self, BlobError> {
        if width == 0 || height == 0 {
            return Err(BlobError::EmptyImage { width, height });
        }
        let expected = width as usize * height as usize;
        if pixels.len() != expected {
            return Err(BlobError::BufferSize {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Wraps a luma buffer from the `image` crate.
    pub fn from_gray(image: &'a GrayImage) -> Result<Self, BlobError> {
        Self::new(image.width(), image.height(), image.as_raw())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel_count(&self) -> usize {
        self.pixels.len()
    }

    /// The pixels of row `y`.
    pub fn row(&self, y: u32) -> &'a [u8] {
        let start = y as usize * self.width as usize;
        &self.pixels[start..start + self.width as usize]
    }

    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.pixels[y as usize * self.width as usize + x as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_dimensions() {
        let err = LabelImage::new(0, 4, &[]).unwrap_err();
        assert_eq!(err, BlobError::EmptyImage { width: 0, height: 4 });
        assert!(err.is_invalid_input());
    }

    #[test]
    fn rejects_short_buffer() {
        let buffer = vec![0u8; 11];
        let err = LabelImage::new(4, 3, &buffer).unwrap_err();
        assert_eq!(
            err,
            BlobError::BufferSize {
                expected: 12,
                actual: 11
            }
        );
    }

    #[test]
    fn wraps_gray_image() {
        let mut gray = GrayImage::new(5, 2);
        gray.put_pixel(3, 1, image::Luma([7]));
        let image = LabelImage::from_gray(&gray).unwrap();
        assert_eq!(image.get(3, 1), 7);
        assert_eq!(image.row(1), &[0, 0, 0, 7, 0]);
        assert_eq!(image.pixel_count(), 10);
    }
}
