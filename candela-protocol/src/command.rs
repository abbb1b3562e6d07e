//! Typed device commands and their payload codecs
//!
//! The device supports a fixed, enumerable set of operations, modeled as
//! one [`Command`] variant each. Every variant encodes to a frame payload
//! and decodes back exactly, so `parse(frame(cmd)) == cmd` holds for any
//! well-formed command.
//!
//! Image payloads carry one or more picture blocks:
//! ```text
//! ┌──────┬─────────┬────────────┬─────────┬───────┬─────────┬────────┐
//! │ 0xAA │ size LE │ duration LE│ ordinal │ count │ palette │ pixels │
//! │ 1B   │ 2B      │ 2B (ms)    │ 1B      │ 1B    │ count×3 │ packed │
//! └──────┴─────────┴────────────┴─────────┴───────┴─────────┴────────┘
//! ```
//! `size` counts the whole block. `count` 0x00 encodes a 256-color
//! palette. The pixel stream is packed per the rules in `candela-image`.

use heapless::Vec;

use candela_image::{
    packing, ImageError, IndexGrid, MatrixSize, Palette, PaletteTier,
};
use rgb::RGB8;

use crate::frame::{Frame, MAX_BODY_SIZE};

/// Set the wall clock (year through weekday)
pub const CMD_SET_TIME: u8 = 0x18;
/// Display a single static image
pub const CMD_DISPLAY_IMAGE: u8 = 0x44;
/// Switch the built-in display mode
pub const CMD_SET_MODE: u8 = 0x45;
/// Play a multi-frame animation
pub const CMD_PLAY_ANIMATION: u8 = 0x49;
/// Set panel brightness in percent
pub const CMD_SET_BRIGHTNESS: u8 = 0x74;

/// Fixed bytes between the image opcode and the first picture block.
/// Device magic, pinned from captured packets.
const IMAGE_MAGIC: [u8; 4] = [0x00, 0x0a, 0x0a, 0x04];

/// Picture block start marker
const BLOCK_MARKER: u8 = 0xaa;

/// Block bytes before the palette table (marker, size, duration, ordinal, count)
const BLOCK_HEADER_LEN: usize = 7;

/// Most frames one animation transfer may carry
pub const MAX_ANIMATION_FRAMES: usize = 24;

/// Errors from command validation, encoding and decoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandError {
    /// A field value is outside its legal range
    OutOfRange,
    /// Mode byte not in the enumerated device mode set
    UnknownMode,
    /// Palette size outside the supported tiers
    UnsupportedPaletteTier,
    /// Image dimensions do not match the device matrix
    UnsupportedImageSize,
    /// Encoded command exceeds the device buffer limit or frame count cap
    PayloadTooLarge,
    /// Packed pixel stream shorter than the grid requires
    TruncatedStream,
    /// Opcode not recognized
    UnknownCommand,
    /// Payload structure does not match its opcode
    InvalidPayload,
}

impl From<ImageError> for CommandError {
    fn from(err: ImageError) -> Self {
        match err {
            ImageError::UnsupportedImageSize => CommandError::UnsupportedImageSize,
            ImageError::UnsupportedPaletteTier => CommandError::UnsupportedPaletteTier,
            ImageError::TruncatedStream => CommandError::TruncatedStream,
        }
    }
}

/// Built-in display modes selectable with [`Command::SetMode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DisplayMode {
    /// Clock face with weather/date widgets
    Clock,
    /// Solid ambient light
    Light,
    /// Temperature readout
    Temperature,
    /// Built-in effect patterns
    Effects,
    /// Music visualizer
    Visualizer,
    /// User-uploaded content
    Custom,
    /// Scoreboard
    Score,
}

// Wire format values
const MODE_CLOCK: u8 = 0x00;
const MODE_LIGHT: u8 = 0x01;
const MODE_TEMPERATURE: u8 = 0x02;
const MODE_EFFECTS: u8 = 0x03;
const MODE_VISUALIZER: u8 = 0x04;
const MODE_CUSTOM: u8 = 0x05;
const MODE_SCORE: u8 = 0x06;

impl DisplayMode {
    /// Parse a mode from its wire format byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            MODE_CLOCK => Some(DisplayMode::Clock),
            MODE_LIGHT => Some(DisplayMode::Light),
            MODE_TEMPERATURE => Some(DisplayMode::Temperature),
            MODE_EFFECTS => Some(DisplayMode::Effects),
            MODE_VISUALIZER => Some(DisplayMode::Visualizer),
            MODE_CUSTOM => Some(DisplayMode::Custom),
            MODE_SCORE => Some(DisplayMode::Score),
            _ => None,
        }
    }

    /// Convert to wire format byte
    pub fn to_byte(self) -> u8 {
        match self {
            DisplayMode::Clock => MODE_CLOCK,
            DisplayMode::Light => MODE_LIGHT,
            DisplayMode::Temperature => MODE_TEMPERATURE,
            DisplayMode::Effects => MODE_EFFECTS,
            DisplayMode::Visualizer => MODE_VISUALIZER,
            DisplayMode::Custom => MODE_CUSTOM,
            DisplayMode::Score => MODE_SCORE,
        }
    }
}

/// Wall-clock value for [`Command::SetTime`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DateTime {
    pub year: u16,
    /// 1-12
    pub month: u8,
    /// 1-31
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    /// 0 = Sunday .. 6 = Saturday
    pub weekday: u8,
}

impl DateTime {
    fn validate(&self) -> Result<(), CommandError> {
        let ok = self.year <= 9999
            && (1..=12).contains(&self.month)
            && (1..=31).contains(&self.day)
            && self.hour <= 23
            && self.minute <= 59
            && self.second <= 59
            && self.weekday <= 6;
        if ok {
            Ok(())
        } else {
            Err(CommandError::OutOfRange)
        }
    }
}

/// One quantized image with its display duration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFrame {
    pub palette: Palette,
    pub grid: IndexGrid,
    /// How long the device shows this frame, in milliseconds
    pub duration_ms: u16,
}

impl ImageFrame {
    /// Append this frame as one picture block
    fn encode_block(
        &self,
        ordinal: u8,
        out: &mut Vec<u8, MAX_BODY_SIZE>,
    ) -> Result<(), CommandError> {
        let count = self.palette.len();
        // Confirms 1..=256; anything else has no tier
        PaletteTier::for_color_count(count)?;
        if self.grid.indices().iter().any(|&i| i as usize >= count) {
            return Err(CommandError::OutOfRange);
        }

        let pixels = packing::pack(&self.grid, count);
        let size = BLOCK_HEADER_LEN + 3 * count + pixels.len();

        let header = [
            BLOCK_MARKER,
            (size & 0xff) as u8,
            (size >> 8) as u8,
            (self.duration_ms & 0xff) as u8,
            (self.duration_ms >> 8) as u8,
            ordinal,
            (count & 0xff) as u8, // 256 colors encode as 0x00
        ];
        out.extend_from_slice(&header)
            .map_err(|_| CommandError::PayloadTooLarge)?;
        for color in self.palette.colors() {
            out.extend_from_slice(&[color.r, color.g, color.b])
                .map_err(|_| CommandError::PayloadTooLarge)?;
        }
        out.extend_from_slice(&pixels)
            .map_err(|_| CommandError::PayloadTooLarge)?;
        Ok(())
    }

    /// Decode one picture block from the start of `bytes`
    ///
    /// Returns the frame, its ordinal, and the block byte count.
    fn decode_block(
        bytes: &[u8],
        matrix: MatrixSize,
    ) -> Result<(Self, u8, usize), CommandError> {
        if bytes.len() < BLOCK_HEADER_LEN || bytes[0] != BLOCK_MARKER {
            return Err(CommandError::InvalidPayload);
        }
        let size = u16::from_le_bytes([bytes[1], bytes[2]]) as usize;
        if size < BLOCK_HEADER_LEN || size > bytes.len() {
            return Err(CommandError::InvalidPayload);
        }
        let duration_ms = u16::from_le_bytes([bytes[3], bytes[4]]);
        let ordinal = bytes[5];
        let count = match bytes[6] {
            0 => 256usize,
            n => n as usize,
        };

        let palette_end = BLOCK_HEADER_LEN + 3 * count;
        if palette_end > size {
            return Err(CommandError::InvalidPayload);
        }
        let mut colors: Vec<RGB8, { candela_image::MAX_PALETTE_COLORS }> = Vec::new();
        for rgb in bytes[BLOCK_HEADER_LEN..palette_end].chunks_exact(3) {
            let _ = colors.push(RGB8::new(rgb[0], rgb[1], rgb[2]));
        }
        let palette = Palette::from_colors(&colors)?;

        let pixels = &bytes[palette_end..size];
        let expected =
            (matrix.pixel_count() * packing::bit_width(count) as usize).div_ceil(8);
        if pixels.len() > expected {
            return Err(CommandError::InvalidPayload);
        }
        let grid = packing::unpack(pixels, matrix, count)?;
        if grid.indices().iter().any(|&i| i as usize >= count) {
            return Err(CommandError::InvalidPayload);
        }

        Ok((
            Self {
                palette,
                grid,
                duration_ms,
            },
            ordinal,
            size,
        ))
    }
}

/// An ordered sequence of animation frames
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Animation {
    frames: Vec<ImageFrame, MAX_ANIMATION_FRAMES>,
}

impl Animation {
    /// Build an animation from a frame sequence
    ///
    /// At least one frame, at most [`MAX_ANIMATION_FRAMES`].
    pub fn from_frames(frames: &[ImageFrame]) -> Result<Self, CommandError> {
        if frames.is_empty() {
            return Err(CommandError::OutOfRange);
        }
        let mut vec = Vec::new();
        vec.extend_from_slice(frames)
            .map_err(|_| CommandError::PayloadTooLarge)?;
        Ok(Self { frames: vec })
    }

    pub fn frames(&self) -> &[ImageFrame] {
        &self.frames
    }
}

/// An operation the device understands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Show a static image
    DisplayImage(ImageFrame),
    /// Play a frame sequence
    PlayAnimation(Animation),
    /// Panel brightness, 0-100 percent
    SetBrightness(u8),
    /// Switch to a built-in display mode
    SetMode(DisplayMode),
    /// Set the device wall clock
    SetTime(DateTime),
}

impl Command {
    /// Wire opcode of this command
    pub fn opcode(&self) -> u8 {
        match self {
            Command::DisplayImage(_) => CMD_DISPLAY_IMAGE,
            Command::PlayAnimation(_) => CMD_PLAY_ANIMATION,
            Command::SetBrightness(_) => CMD_SET_BRIGHTNESS,
            Command::SetMode(_) => CMD_SET_MODE,
            Command::SetTime(_) => CMD_SET_TIME,
        }
    }

    /// Whether the device acknowledges this command with a response frame
    ///
    /// Animation transfers are fire-and-forget on this hardware.
    pub fn expects_response(&self) -> bool {
        !matches!(self, Command::PlayAnimation(_))
    }

    /// Encode this command into a frame ready for transmission
    pub fn to_frame(&self) -> Result<Frame, CommandError> {
        let mut body: Vec<u8, MAX_BODY_SIZE> = Vec::new();
        match self {
            Command::DisplayImage(image) => {
                body.extend_from_slice(&IMAGE_MAGIC)
                    .map_err(|_| CommandError::PayloadTooLarge)?;
                image.encode_block(0, &mut body)?;
            }
            Command::PlayAnimation(animation) => {
                // Reserve the total-size field, filled in below
                body.extend_from_slice(&[0, 0])
                    .map_err(|_| CommandError::PayloadTooLarge)?;
                for (i, frame) in animation.frames.iter().enumerate() {
                    frame.encode_block(i as u8, &mut body)?;
                }
                let total = (body.len() - 2) as u16;
                body[0] = (total & 0xff) as u8;
                body[1] = (total >> 8) as u8;
            }
            Command::SetBrightness(percent) => {
                if *percent > 100 {
                    return Err(CommandError::OutOfRange);
                }
                body.extend_from_slice(&[*percent])
                    .map_err(|_| CommandError::PayloadTooLarge)?;
            }
            Command::SetMode(mode) => {
                body.extend_from_slice(&[mode.to_byte()])
                    .map_err(|_| CommandError::PayloadTooLarge)?;
            }
            Command::SetTime(time) => {
                time.validate()?;
                let fields = [
                    (time.year % 100) as u8,
                    (time.year / 100) as u8,
                    time.month,
                    time.day,
                    time.hour,
                    time.minute,
                    time.second,
                    time.weekday,
                ];
                body.extend_from_slice(&fields)
                    .map_err(|_| CommandError::PayloadTooLarge)?;
            }
        }
        Frame::new(self.opcode(), &body).map_err(|_| CommandError::PayloadTooLarge)
    }

    /// Decode a received frame into a command
    ///
    /// Image payloads carry no dimensions on the wire, so the device
    /// matrix size is supplied by the caller.
    pub fn from_frame(frame: &Frame, matrix: MatrixSize) -> Result<Self, CommandError> {
        let body: &[u8] = &frame.body;
        match frame.command {
            CMD_DISPLAY_IMAGE => {
                if body.len() < IMAGE_MAGIC.len() || body[..IMAGE_MAGIC.len()] != IMAGE_MAGIC {
                    return Err(CommandError::InvalidPayload);
                }
                let block = &body[IMAGE_MAGIC.len()..];
                let (image, ordinal, consumed) = ImageFrame::decode_block(block, matrix)?;
                if ordinal != 0 || consumed != block.len() {
                    return Err(CommandError::InvalidPayload);
                }
                Ok(Command::DisplayImage(image))
            }
            CMD_PLAY_ANIMATION => {
                if body.len() < 2 {
                    return Err(CommandError::InvalidPayload);
                }
                let total = u16::from_le_bytes([body[0], body[1]]) as usize;
                if total != body.len() - 2 {
                    return Err(CommandError::InvalidPayload);
                }
                let mut frames: Vec<ImageFrame, MAX_ANIMATION_FRAMES> = Vec::new();
                let mut offset = 2;
                while offset < body.len() {
                    let (image, ordinal, consumed) =
                        ImageFrame::decode_block(&body[offset..], matrix)?;
                    if ordinal as usize != frames.len() {
                        return Err(CommandError::InvalidPayload);
                    }
                    frames
                        .push(image)
                        .map_err(|_| CommandError::PayloadTooLarge)?;
                    offset += consumed;
                }
                if frames.is_empty() {
                    return Err(CommandError::InvalidPayload);
                }
                Ok(Command::PlayAnimation(Animation { frames }))
            }
            CMD_SET_BRIGHTNESS => {
                if body.len() != 1 {
                    return Err(CommandError::InvalidPayload);
                }
                if body[0] > 100 {
                    return Err(CommandError::OutOfRange);
                }
                Ok(Command::SetBrightness(body[0]))
            }
            CMD_SET_MODE => {
                if body.len() != 1 {
                    return Err(CommandError::InvalidPayload);
                }
                DisplayMode::from_byte(body[0])
                    .map(Command::SetMode)
                    .ok_or(CommandError::UnknownMode)
            }
            CMD_SET_TIME => {
                if body.len() != 8 {
                    return Err(CommandError::InvalidPayload);
                }
                if body[0] >= 100 {
                    return Err(CommandError::OutOfRange);
                }
                let time = DateTime {
                    year: body[0] as u16 + body[1] as u16 * 100,
                    month: body[2],
                    day: body[3],
                    hour: body[4],
                    minute: body[5],
                    second: body[6],
                    weekday: body[7],
                };
                time.validate()?;
                Ok(Command::SetTime(time))
            }
            _ => Err(CommandError::UnknownCommand),
        }
    }
}
