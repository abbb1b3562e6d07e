//! Variable bit-width pixel stream packing
//!
//! Palette indices are packed row-major at the minimum bit width for the
//! palette size. Bits fill each byte starting from the least significant
//! bit (pinned against captured device packets), and the final partial
//! byte of the whole stream is zero-padded in its unused high bits. There
//! is no per-row padding; this is the single fixed rule.

use heapless::Vec;

use crate::buffer::{IndexGrid, MatrixSize, MAX_PIXELS};
use crate::ImageError;

/// Packed stream capacity: the largest matrix at 8 bits per pixel
pub const MAX_PACKED_BYTES: usize = MAX_PIXELS;

/// A packed pixel byte stream
pub type PackedStream = Vec<u8, MAX_PACKED_BYTES>;

/// Bits per pixel for a palette of the given size
///
/// `max(1, ceil(log2(size)))` - a one-color palette still spends one bit
/// per pixel, matching the device.
pub fn bit_width(palette_size: usize) -> u32 {
    let n = palette_size.max(2) as u32;
    u32::BITS - (n - 1).leading_zeros()
}

/// Pack an index grid into a dense byte stream
///
/// Indices are masked to the bit width; callers validate that every index
/// is below the palette length before encoding.
pub fn pack(grid: &IndexGrid, palette_size: usize) -> PackedStream {
    let width = bit_width(palette_size);
    let mask = (1u16 << width) - 1;

    let mut out = Vec::new();
    let mut acc: u16 = 0;
    let mut filled: u32 = 0;
    for &index in grid.indices() {
        acc |= (index as u16 & mask) << filled;
        filled += width;
        while filled >= 8 {
            // Capacity covers the largest grid at 8 bpp, push cannot fail
            let _ = out.push((acc & 0xff) as u8);
            acc >>= 8;
            filled -= 8;
        }
    }
    if filled > 0 {
        let _ = out.push((acc & 0xff) as u8);
    }
    out
}

/// Unpack a byte stream back into an index grid
///
/// Fails with [`ImageError::TruncatedStream`] when the stream holds fewer
/// bytes than the grid requires. Excess trailing bytes are ignored.
pub fn unpack(
    stream: &[u8],
    size: MatrixSize,
    palette_size: usize,
) -> Result<IndexGrid, ImageError> {
    let width = bit_width(palette_size);
    let mask = (1u16 << width) - 1;
    let count = size.pixel_count();
    let needed = (count * width as usize).div_ceil(8);
    if stream.len() < needed {
        return Err(ImageError::TruncatedStream);
    }

    let mut indices: Vec<u8, MAX_PIXELS> = Vec::new();
    let mut acc: u16 = 0;
    let mut available: u32 = 0;
    let mut pos = 0;
    for _ in 0..count {
        while available < width {
            acc |= (stream[pos] as u16) << available;
            pos += 1;
            available += 8;
        }
        let _ = indices.push((acc & mask) as u8);
        acc >>= width;
        available -= width;
    }
    IndexGrid::from_indices(size, &indices)
}
