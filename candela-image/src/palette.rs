//! Palette tiers and deterministic color quantization
//!
//! The device supports a fixed set of palette sizes. Images whose distinct
//! color count already fits the requested tier pass through losslessly with
//! the palette in first-seen order; anything else is reduced by median cut
//! over RGB space. Both paths are fully deterministic: the same image and
//! tier always produce the same palette and index grid.

use heapless::Vec;
use rgb::RGB8;

use crate::buffer::{ImageBuffer, IndexGrid, MatrixSize, MAX_PIXELS};
use crate::packing;
use crate::ImageError;

/// Largest supported palette
pub const MAX_PALETTE_COLORS: usize = 256;

/// Device-supported palette size tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PaletteTier {
    Colors4,
    Colors8,
    Colors16,
    Colors64,
    Colors256,
}

impl PaletteTier {
    /// All tiers, smallest first
    pub const ALL: [PaletteTier; 5] = [
        PaletteTier::Colors4,
        PaletteTier::Colors8,
        PaletteTier::Colors16,
        PaletteTier::Colors64,
        PaletteTier::Colors256,
    ];

    /// Maximum color count of this tier
    pub const fn capacity(self) -> usize {
        match self {
            PaletteTier::Colors4 => 4,
            PaletteTier::Colors8 => 8,
            PaletteTier::Colors16 => 16,
            PaletteTier::Colors64 => 64,
            PaletteTier::Colors256 => 256,
        }
    }

    /// Smallest tier that can hold `count` colors
    pub fn for_color_count(count: usize) -> Result<Self, ImageError> {
        if count == 0 {
            return Err(ImageError::UnsupportedPaletteTier);
        }
        Self::ALL
            .into_iter()
            .find(|tier| count <= tier.capacity())
            .ok_or(ImageError::UnsupportedPaletteTier)
    }
}

/// An ordered color table; pixel indices reference slots in order
///
/// Quantizer output is deduplicated: no two slots hold the same color.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    colors: Vec<RGB8, MAX_PALETTE_COLORS>,
}

impl Palette {
    /// Create a palette from an ordered color slice
    ///
    /// The slice must hold between 1 and 256 colors.
    pub fn from_colors(colors: &[RGB8]) -> Result<Self, ImageError> {
        if colors.is_empty() || colors.len() > MAX_PALETTE_COLORS {
            return Err(ImageError::UnsupportedPaletteTier);
        }
        let mut vec = Vec::new();
        vec.extend_from_slice(colors)
            .map_err(|_| ImageError::UnsupportedPaletteTier)?;
        Ok(Self { colors: vec })
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Colors in index order
    pub fn colors(&self) -> &[RGB8] {
        &self.colors
    }

    /// Color at the given index
    pub fn get(&self, index: u8) -> Option<RGB8> {
        self.colors.get(index as usize).copied()
    }

    /// Bits per pixel needed to index this palette (minimum 1)
    pub fn bits_per_pixel(&self) -> u32 {
        packing::bit_width(self.len())
    }
}

/// Reduce an image to at most `tier.capacity()` colors
///
/// Fails with [`ImageError::UnsupportedImageSize`] when the image does not
/// match the device matrix; no implicit scaling is performed.
pub fn quantize(
    image: &ImageBuffer,
    matrix: MatrixSize,
    tier: PaletteTier,
) -> Result<(Palette, IndexGrid), ImageError> {
    if image.size() != matrix {
        return Err(ImageError::UnsupportedImageSize);
    }

    let mut histogram = Histogram::build(image);
    let palette = if histogram.entries.len() <= tier.capacity() {
        // Exact: the distinct colors, first-seen order, zero loss
        let mut colors: Vec<RGB8, MAX_PALETTE_COLORS> = Vec::new();
        for entry in histogram.entries.iter() {
            let _ = colors.push(entry.color);
        }
        Palette { colors }
    } else {
        median_cut(&mut histogram, tier.capacity())
    };

    let mut indices: Vec<u8, MAX_PIXELS> = Vec::new();
    for &pixel in image.pixels() {
        let _ = indices.push(nearest_index(&palette, pixel));
    }
    let grid = IndexGrid::from_indices(image.size(), &indices)?;
    Ok((palette, grid))
}

/// Index of the palette color closest to `pixel` in RGB space
///
/// Exact matches win outright; otherwise squared Euclidean distance with
/// ties broken toward the lowest index.
fn nearest_index(palette: &Palette, pixel: RGB8) -> u8 {
    let mut best = 0u8;
    let mut best_distance = u32::MAX;
    for (i, &color) in palette.colors().iter().enumerate() {
        let d = distance_sq(color, pixel);
        if d < best_distance {
            best = i as u8;
            best_distance = d;
            if d == 0 {
                break;
            }
        }
    }
    best
}

fn distance_sq(a: RGB8, b: RGB8) -> u32 {
    let dr = a.r as i32 - b.r as i32;
    let dg = a.g as i32 - b.g as i32;
    let db = a.b as i32 - b.b as i32;
    (dr * dr + dg * dg + db * db) as u32
}

/// One distinct color with its pixel count and first-seen rank
#[derive(Clone, Copy)]
struct ColorEntry {
    color: RGB8,
    count: u32,
    seen: u16,
}

struct Histogram {
    entries: Vec<ColorEntry, MAX_PIXELS>,
}

impl Histogram {
    fn build(image: &ImageBuffer) -> Self {
        let mut entries: Vec<ColorEntry, MAX_PIXELS> = Vec::new();
        for &pixel in image.pixels() {
            match entries.iter_mut().find(|e| e.color == pixel) {
                Some(entry) => entry.count += 1,
                None => {
                    let seen = entries.len() as u16;
                    let _ = entries.push(ColorEntry {
                        color: pixel,
                        count: 1,
                        seen,
                    });
                }
            }
        }
        Self { entries }
    }
}

/// Channel selector for box splitting
#[derive(Clone, Copy, PartialEq, Eq)]
enum Channel {
    R,
    G,
    B,
}

fn channel_value(color: RGB8, channel: Channel) -> u8 {
    match channel {
        Channel::R => color.r,
        Channel::G => color.g,
        Channel::B => color.b,
    }
}

/// Median-cut reduction to exactly `target` representative colors
///
/// Boxes are ranges over the histogram entry array. Each step splits the
/// box with the widest single-channel spread at its entry midpoint, after
/// sorting the range by that channel with a total-order tie-break, so the
/// result never depends on sort internals or iteration luck.
fn median_cut(histogram: &mut Histogram, target: usize) -> Palette {
    let entries = &mut histogram.entries;
    let mut boxes: Vec<(usize, usize), MAX_PALETTE_COLORS> = Vec::new();
    let _ = boxes.push((0, entries.len()));

    while boxes.len() < target {
        let Some((box_index, channel)) = widest_box(entries, &boxes) else {
            break;
        };
        let (start, end) = boxes[box_index];
        entries[start..end].sort_unstable_by_key(|e| {
            (
                channel_value(e.color, channel),
                e.color.r,
                e.color.g,
                e.color.b,
                e.seen,
            )
        });
        let mid = start + (end - start) / 2;
        boxes[box_index] = (start, mid);
        let _ = boxes.push((mid, end));
    }

    let mut colors: Vec<RGB8, MAX_PALETTE_COLORS> = Vec::new();
    for &(start, end) in boxes.iter() {
        let rep = box_average(&entries[start..end]);
        // Averages of neighbouring boxes can coincide; keep the palette deduplicated
        if !colors.iter().any(|&c| c == rep) {
            let _ = colors.push(rep);
        }
    }
    Palette { colors }
}

/// Find the box with the largest channel spread that can still be split
fn widest_box(
    entries: &[ColorEntry],
    boxes: &[(usize, usize)],
) -> Option<(usize, Channel)> {
    let mut best: Option<(usize, Channel)> = None;
    let mut best_spread = 0u8;
    for (i, &(start, end)) in boxes.iter().enumerate() {
        if end - start < 2 {
            continue;
        }
        for channel in [Channel::R, Channel::G, Channel::B] {
            let mut lo = u8::MAX;
            let mut hi = u8::MIN;
            for entry in &entries[start..end] {
                let v = channel_value(entry.color, channel);
                lo = lo.min(v);
                hi = hi.max(v);
            }
            let spread = hi - lo;
            if spread > best_spread {
                best_spread = spread;
                best = Some((i, channel));
            }
        }
    }
    best
}

/// Pixel-count-weighted mean color of a box, rounded to nearest
fn box_average(entries: &[ColorEntry]) -> RGB8 {
    let mut total = 0u32;
    let mut sum_r = 0u32;
    let mut sum_g = 0u32;
    let mut sum_b = 0u32;
    for entry in entries {
        total += entry.count;
        sum_r += entry.color.r as u32 * entry.count;
        sum_g += entry.color.g as u32 * entry.count;
        sum_b += entry.color.b as u32 * entry.count;
    }
    RGB8::new(
        ((sum_r + total / 2) / total) as u8,
        ((sum_g + total / 2) / total) as u8,
        ((sum_b + total / 2) / total) as u8,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLACK: RGB8 = RGB8 { r: 0, g: 0, b: 0 };
    const RED: RGB8 = RGB8 { r: 255, g: 0, b: 0 };
    const GREEN: RGB8 = RGB8 { r: 0, g: 255, b: 0 };
    const BLUE: RGB8 = RGB8 { r: 0, g: 0, b: 255 };

    fn checkerboard(a: RGB8, b: RGB8) -> ImageBuffer {
        let mut pixels = std::vec::Vec::new();
        for y in 0..16 {
            for x in 0..16 {
                pixels.push(if (x + y) % 2 == 0 { a } else { b });
            }
        }
        ImageBuffer::from_pixels(MatrixSize::SQUARE_16, &pixels).unwrap()
    }

    #[test]
    fn test_tier_for_color_count() {
        assert_eq!(PaletteTier::for_color_count(1), Ok(PaletteTier::Colors4));
        assert_eq!(PaletteTier::for_color_count(4), Ok(PaletteTier::Colors4));
        assert_eq!(PaletteTier::for_color_count(5), Ok(PaletteTier::Colors8));
        assert_eq!(PaletteTier::for_color_count(100), Ok(PaletteTier::Colors256));
        assert_eq!(
            PaletteTier::for_color_count(0),
            Err(ImageError::UnsupportedPaletteTier)
        );
        assert_eq!(
            PaletteTier::for_color_count(257),
            Err(ImageError::UnsupportedPaletteTier)
        );
    }

    #[test]
    fn test_exact_quantization_is_lossless() {
        let image = checkerboard(RED, BLUE);
        let (palette, grid) =
            quantize(&image, MatrixSize::SQUARE_16, PaletteTier::Colors4).unwrap();

        // First-seen order: red at (0,0), blue at (1,0)
        assert_eq!(palette.colors(), &[RED, BLUE]);
        for (index, &pixel) in grid.indices().iter().zip(image.pixels()) {
            assert_eq!(palette.get(*index).unwrap(), pixel);
        }
    }

    #[test]
    fn test_size_mismatch_rejected() {
        let image = ImageBuffer::new(MatrixSize::SQUARE_16).unwrap();
        assert_eq!(
            quantize(&image, MatrixSize::SQUARE_32, PaletteTier::Colors16),
            Err(ImageError::UnsupportedImageSize)
        );
    }

    #[test]
    fn test_reduction_hits_tier_capacity() {
        // 256 distinct grays cannot fit a 4-color tier
        let mut pixels = std::vec::Vec::new();
        for i in 0..256usize {
            let v = i as u8;
            pixels.push(RGB8::new(v, v, v));
        }
        let image = ImageBuffer::from_pixels(MatrixSize::SQUARE_16, &pixels).unwrap();
        let (palette, grid) =
            quantize(&image, MatrixSize::SQUARE_16, PaletteTier::Colors4).unwrap();

        assert_eq!(palette.len(), 4);
        assert!(grid.indices().iter().all(|&i| (i as usize) < palette.len()));
    }

    #[test]
    fn test_quantization_is_deterministic() {
        let mut pixels = std::vec::Vec::new();
        for i in 0..256usize {
            pixels.push(RGB8::new(
                (i * 7) as u8,
                (i * 13) as u8,
                (i * 29) as u8,
            ));
        }
        let image = ImageBuffer::from_pixels(MatrixSize::SQUARE_16, &pixels).unwrap();

        let first = quantize(&image, MatrixSize::SQUARE_16, PaletteTier::Colors16).unwrap();
        let second = quantize(&image, MatrixSize::SQUARE_16, PaletteTier::Colors16).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_palette_deduplicated_after_reduction() {
        let mut pixels = std::vec::Vec::new();
        for i in 0..256usize {
            // Two tight clusters; over-splitting must not duplicate entries
            let v = if i % 2 == 0 { i as u8 / 32 } else { 250 + (i as u8 % 6) };
            pixels.push(RGB8::new(v, v, v));
        }
        let image = ImageBuffer::from_pixels(MatrixSize::SQUARE_16, &pixels).unwrap();
        let (palette, _) =
            quantize(&image, MatrixSize::SQUARE_16, PaletteTier::Colors8).unwrap();

        for (i, &a) in palette.colors().iter().enumerate() {
            for &b in &palette.colors()[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_nearest_tie_takes_lowest_index() {
        let palette = Palette::from_colors(&[RGB8::new(10, 0, 0), RGB8::new(30, 0, 0)]).unwrap();
        // Equidistant between the two
        assert_eq!(nearest_index(&palette, RGB8::new(20, 0, 0)), 0);
    }

    #[test]
    fn test_single_color_image() {
        let image = ImageBuffer::filled(MatrixSize::SQUARE_16, GREEN).unwrap();
        let (palette, grid) =
            quantize(&image, MatrixSize::SQUARE_16, PaletteTier::Colors4).unwrap();
        assert_eq!(palette.colors(), &[GREEN]);
        assert!(grid.indices().iter().all(|&i| i == 0));
        assert_eq!(palette.bits_per_pixel(), 1);
    }

    #[test]
    fn test_first_seen_order() {
        let mut pixels = std::vec![BLACK; 256];
        pixels[1] = RED;
        pixels[2] = GREEN;
        pixels[3] = BLUE;
        let image = ImageBuffer::from_pixels(MatrixSize::SQUARE_16, &pixels).unwrap();
        let (palette, grid) =
            quantize(&image, MatrixSize::SQUARE_16, PaletteTier::Colors4).unwrap();
        assert_eq!(palette.colors(), &[BLACK, RED, GREEN, BLUE]);
        assert_eq!(&grid.indices()[..4], &[0, 1, 2, 3]);
    }
}
