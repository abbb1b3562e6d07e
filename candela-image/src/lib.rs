//! Image-side math for Candela LED matrix displays
//!
//! This crate converts arbitrary RGB rasters into the indexed-color,
//! bit-packed pixel representation the display hardware consumes:
//!
//! - [`buffer`]: raster and index-grid value types sized to the device
//!   matrix (16×16 commonly, 32×32 on larger variants)
//! - [`palette`]: deterministic palette quantization (exact pass-through
//!   for images that already fit a tier, median-cut reduction otherwise)
//! - [`packing`]: variable bit-width pixel stream packing and unpacking
//!
//! All operations are pure and synchronous; nothing here touches the wire.

#![cfg_attr(not(any(feature = "std", test)), no_std)]
#![deny(unsafe_code)]

pub mod buffer;
pub mod packing;
pub mod palette;

pub use buffer::{ImageBuffer, IndexGrid, MatrixSize, MAX_MATRIX_DIM, MAX_PIXELS};
pub use packing::{bit_width, pack, unpack, PackedStream, MAX_PACKED_BYTES};
pub use palette::{quantize, Palette, PaletteTier, MAX_PALETTE_COLORS};

/// Errors from raster validation, quantization and packing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ImageError {
    /// Image dimensions do not match the configured device matrix.
    /// Scaling and cropping are explicit pre-processing steps, never implicit.
    UnsupportedImageSize,
    /// Requested or implied palette size is outside the supported tiers
    UnsupportedPaletteTier,
    /// Packed pixel stream holds fewer bits than the grid requires
    TruncatedStream,
}
