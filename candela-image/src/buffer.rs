//! Raster and index-grid value types
//!
//! Buffers are capacity-bounded to the largest device in the family and
//! carry their runtime dimensions, since matrix sizes differ per variant.

use heapless::Vec;
use rgb::RGB8;

use crate::ImageError;

/// Largest matrix edge length in the device family
pub const MAX_MATRIX_DIM: usize = 32;

/// Pixel capacity for buffers sized to the largest matrix
pub const MAX_PIXELS: usize = MAX_MATRIX_DIM * MAX_MATRIX_DIM;

/// Physical pixel matrix dimensions of a device variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MatrixSize {
    pub width: u8,
    pub height: u8,
}

impl MatrixSize {
    /// The common 16×16 device
    pub const SQUARE_16: Self = Self {
        width: 16,
        height: 16,
    };
    /// The 32×32 variant
    pub const SQUARE_32: Self = Self {
        width: 32,
        height: 32,
    };

    /// Total pixel count of the matrix
    pub const fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// A width × height grid of RGB pixels, row-major
///
/// This is the raw-pixel-source handed to the quantizer. Decoding image
/// files into one of these is the caller's concern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBuffer {
    size: MatrixSize,
    pixels: Vec<RGB8, MAX_PIXELS>,
}

impl ImageBuffer {
    /// Create a buffer of the given size, filled with black
    pub fn new(size: MatrixSize) -> Result<Self, ImageError> {
        Self::filled(size, RGB8::new(0, 0, 0))
    }

    /// Create a buffer of the given size, filled with one color
    pub fn filled(size: MatrixSize, color: RGB8) -> Result<Self, ImageError> {
        let mut pixels = Vec::new();
        pixels
            .resize(size.pixel_count(), color)
            .map_err(|_| ImageError::UnsupportedImageSize)?;
        Ok(Self { size, pixels })
    }

    /// Create a buffer from row-major pixel data
    ///
    /// The slice length must match the pixel count of `size` exactly.
    pub fn from_pixels(size: MatrixSize, pixels: &[RGB8]) -> Result<Self, ImageError> {
        if pixels.len() != size.pixel_count() {
            return Err(ImageError::UnsupportedImageSize);
        }
        let mut buf = Vec::new();
        buf.extend_from_slice(pixels)
            .map_err(|_| ImageError::UnsupportedImageSize)?;
        Ok(Self { size, pixels: buf })
    }

    /// Matrix dimensions of this buffer
    pub fn size(&self) -> MatrixSize {
        self.size
    }

    /// Row-major pixel data
    pub fn pixels(&self) -> &[RGB8] {
        &self.pixels
    }

    /// Pixel at (x, y), or `None` outside the matrix
    pub fn get(&self, x: u8, y: u8) -> Option<RGB8> {
        self.index_of(x, y).map(|i| self.pixels[i])
    }

    /// Set the pixel at (x, y); out-of-bounds coordinates are rejected
    pub fn set(&mut self, x: u8, y: u8, color: RGB8) -> Result<(), ImageError> {
        let i = self.index_of(x, y).ok_or(ImageError::UnsupportedImageSize)?;
        self.pixels[i] = color;
        Ok(())
    }

    fn index_of(&self, x: u8, y: u8) -> Option<usize> {
        if x < self.size.width && y < self.size.height {
            Some(y as usize * self.size.width as usize + x as usize)
        } else {
            None
        }
    }
}

/// Per-pixel palette indices for an image, row-major
///
/// Produced by the quantizer; every index is less than the length of the
/// palette produced alongside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexGrid {
    size: MatrixSize,
    indices: Vec<u8, MAX_PIXELS>,
}

impl IndexGrid {
    /// Create a grid from row-major index data
    ///
    /// The slice length must match the pixel count of `size` exactly.
    pub fn from_indices(size: MatrixSize, indices: &[u8]) -> Result<Self, ImageError> {
        if indices.len() != size.pixel_count() {
            return Err(ImageError::UnsupportedImageSize);
        }
        let mut buf = Vec::new();
        buf.extend_from_slice(indices)
            .map_err(|_| ImageError::UnsupportedImageSize)?;
        Ok(Self { size, indices: buf })
    }

    /// Matrix dimensions of this grid
    pub fn size(&self) -> MatrixSize {
        self.size
    }

    /// Row-major index data
    pub fn indices(&self) -> &[u8] {
        &self.indices
    }

    /// Index at (x, y), or `None` outside the matrix
    pub fn get(&self, x: u8, y: u8) -> Option<u8> {
        if x < self.size.width && y < self.size.height {
            Some(self.indices[y as usize * self.size.width as usize + x as usize])
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_count() {
        assert_eq!(MatrixSize::SQUARE_16.pixel_count(), 256);
        assert_eq!(MatrixSize::SQUARE_32.pixel_count(), 1024);
    }

    #[test]
    fn test_buffer_set_get() {
        let mut buf = ImageBuffer::new(MatrixSize::SQUARE_16).unwrap();
        assert_eq!(buf.get(0, 0), Some(RGB8::new(0, 0, 0)));

        buf.set(3, 5, RGB8::new(10, 20, 30)).unwrap();
        assert_eq!(buf.get(3, 5), Some(RGB8::new(10, 20, 30)));
        // row-major layout
        assert_eq!(buf.pixels()[5 * 16 + 3], RGB8::new(10, 20, 30));
    }

    #[test]
    fn test_buffer_out_of_bounds() {
        let mut buf = ImageBuffer::new(MatrixSize::SQUARE_16).unwrap();
        assert_eq!(buf.get(16, 0), None);
        assert_eq!(buf.get(0, 16), None);
        assert_eq!(
            buf.set(16, 0, RGB8::new(1, 2, 3)),
            Err(ImageError::UnsupportedImageSize)
        );
    }

    #[test]
    fn test_from_pixels_wrong_length() {
        let pixels = [RGB8::new(0, 0, 0); 255];
        assert_eq!(
            ImageBuffer::from_pixels(MatrixSize::SQUARE_16, &pixels),
            Err(ImageError::UnsupportedImageSize)
        );
    }

    #[test]
    fn test_grid_from_indices() {
        let indices = [0u8; 256];
        let grid = IndexGrid::from_indices(MatrixSize::SQUARE_16, &indices).unwrap();
        assert_eq!(grid.get(15, 15), Some(0));
        assert_eq!(grid.get(16, 15), None);
    }
}
